#[tokio::main]
async fn main() -> anyhow::Result<()> {
    spo_status::bootstrapper::run().await
}

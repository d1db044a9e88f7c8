pub mod aggregator;
pub mod controller;
pub mod k8s;
pub mod memory;
pub mod node_status;
pub mod scheduler;
pub mod store;

pub use aggregator::*;
pub use k8s::*;
pub use memory::InMemoryStore;
pub use node_status::NodeStatusWriter;
pub use store::*;

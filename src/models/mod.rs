pub mod condition;
pub mod node_status;
pub mod profile;
pub mod profile_state;

pub use condition::{Condition, ConditionStatus};
pub use node_status::SecurityProfileNodeStatus;
pub use profile::{
    ProfileKind, ProfileRef, ProfileStatus, SeccompProfile, SeccompProfileSpec, SecurityProfile,
    SelinuxProfile, SelinuxProfileSpec,
};
pub use profile_state::{fold_states, ProfileState};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type the status aggregator owns. All other types are left alone.
pub const SYNCED: &str = "Synced";

pub const REASON_RECONCILE_SUCCESS: &str = "ReconcileSuccess";
pub const REASON_RECONCILE_ERROR: &str = "ReconcileError";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// One observation about a profile object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    pub last_transition_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Condition {
    pub fn reconcile_success() -> Self {
        Self {
            type_: SYNCED.to_string(),
            status: ConditionStatus::True,
            last_transition_time: Utc::now(),
            reason: Some(REASON_RECONCILE_SUCCESS.to_string()),
            message: None,
        }
    }

    pub fn reconcile_error(message: impl Into<String>) -> Self {
        Self {
            type_: SYNCED.to_string(),
            status: ConditionStatus::False,
            last_transition_time: Utc::now(),
            reason: Some(REASON_RECONCILE_ERROR.to_string()),
            message: Some(message.into()),
        }
    }

    fn same_observation(&self, other: &Condition) -> bool {
        self.type_ == other.type_
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// Find a condition by type
pub fn get_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Insert or replace the condition of the same type.
///
/// Returns `false` when nothing changed. The transition time of an existing
/// condition is kept if its status value did not flip.
pub fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition) -> bool {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) if existing.same_observation(&condition) => false,
        Some(existing) => {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time;
            }
            *existing = condition;
            true
        }
        None => {
            conditions.push(condition);
            true
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anti-leave signal reported by the client shell. A weak cheating signal on
/// its own; only the accumulated count closes an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    Blur,
    VisibilityHidden,
    FullscreenExit,
    DevtoolsSuspected,
}

/// One recorded violation. Kept per attempt as an audit trail even when the
/// attempt is already closed; `violation_number` is the counter value at the
/// time the event was counted (0 when it arrived after closure).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationEvent {
    pub kind: ViolationKind,
    pub occurred_at: DateTime<Utc>,
    pub violation_number: u32,
}

impl ViolationEvent {
    pub fn new(kind: ViolationKind, violation_number: u32, occurred_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            occurred_at,
            violation_number,
        }
    }
}

//! Shared identifiers and small helpers used across planning, scheduling and telemetry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Index of a top-level unit in the planned hierarchy.
pub type ModuleId = usize;

/// 0-based position of a sub-unit within its parent.
pub type SubId = usize;

static RUN_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Address of one sub-unit: `(module_id, sub_id)`.
///
/// Ordering is lexicographic, so a `BTreeMap<UnitKey, _>` iterates parent by parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitKey {
    pub module_id: ModuleId,
    pub sub_id: SubId,
}

impl UnitKey {
    pub fn new(module_id: ModuleId, sub_id: SubId) -> Self {
        Self { module_id, sub_id }
    }
}

impl From<(ModuleId, SubId)> for UnitKey {
    fn from((module_id, sub_id): (ModuleId, SubId)) -> Self {
        Self { module_id, sub_id }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module_id, self.sub_id)
    }
}

/// Current time as milliseconds since Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generate a unique pipeline run id.
pub fn new_run_id() -> String {
    let ts = now_millis();
    let pid = std::process::id();
    let seq = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("run-{ts}-{pid}-{seq}")
}

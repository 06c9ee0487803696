//! Unit decomposer: flattens the hierarchy into addressable work items.

use crate::hierarchy::Unit;
use crate::types::{ModuleId, SubId, UnitKey};

/// Planning-time projection of a sub-unit, used only to distribute work across batches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkItem {
    pub module_id: ModuleId,
    pub sub_id: SubId,
    pub parent_size: usize,
    /// `sub_id / parent_size`, in `[0, 1)`.
    pub relative_position: f64,
}

impl WorkItem {
    pub fn new(module_id: ModuleId, sub_id: SubId, parent_size: usize) -> Self {
        Self {
            module_id,
            sub_id,
            parent_size,
            relative_position: sub_id as f64 / parent_size.max(1) as f64,
        }
    }

    pub fn key(&self) -> UnitKey {
        UnitKey::new(self.module_id, self.sub_id)
    }
}

/// One work item per sub-unit, in hierarchy order. Units without sub-units contribute nothing.
///
/// Identity comes from each unit's position in `units` and each sub-unit's position in its
/// parent, which is how the hierarchy assigns `module_id`/`sub_id` in the first place.
pub fn decompose(units: &[Unit]) -> Vec<WorkItem> {
    units
        .iter()
        .enumerate()
        .flat_map(|(module_id, unit)| {
            let parent_size = unit.sub_units.len();
            (0..parent_size).map(move |sub_id| WorkItem::new(module_id, sub_id, parent_size))
        })
        .collect()
}

//! Two-level content hierarchy: top-level units and the sub-units they own.

use crate::types::{ModuleId, SubId, UnitKey};
use serde::{Deserialize, Serialize};

/// Title/description of a top-level unit before its sub-units are planned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOutline {
    pub title: String,
    pub description: String,
}

impl UnitOutline {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// A sub-unit as returned by a planner, before identity and order are assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubUnitDraft {
    pub title: String,
    pub description: String,
}

impl SubUnitDraft {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Child of exactly one [`Unit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubUnit {
    pub module_id: ModuleId,
    pub sub_id: SubId,
    pub title: String,
    pub description: String,
    /// 1-based position within the parent.
    pub order: usize,
}

impl SubUnit {
    pub fn key(&self) -> UnitKey {
        UnitKey::new(self.module_id, self.sub_id)
    }
}

/// Top-level hierarchy element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub module_id: ModuleId,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub sub_units: Vec<SubUnit>,
}

impl Unit {
    /// Build a unit whose sub-units get `sub_id`/`order` from their position.
    pub fn from_drafts(
        module_id: ModuleId,
        outline: &UnitOutline,
        drafts: impl IntoIterator<Item = SubUnitDraft>,
    ) -> Self {
        let sub_units = drafts
            .into_iter()
            .enumerate()
            .map(|(sub_id, draft)| SubUnit {
                module_id,
                sub_id,
                title: draft.title,
                description: draft.description,
                order: sub_id + 1,
            })
            .collect();
        Self {
            module_id,
            title: outline.title.clone(),
            description: outline.description.clone(),
            sub_units,
        }
    }

    /// Fallback unit used when planning its sub-units failed.
    pub fn empty(module_id: ModuleId, outline: &UnitOutline) -> Self {
        Self::from_drafts(module_id, outline, std::iter::empty())
    }
}

/// Resolve a key against the hierarchy, `None` when either index is out of bounds.
pub fn lookup(units: &[Unit], key: UnitKey) -> Option<(&Unit, &SubUnit)> {
    let unit = units.get(key.module_id)?;
    let sub_unit = unit.sub_units.get(key.sub_id)?;
    Some((unit, sub_unit))
}

/// Render every unit as a numbered outline, used as shared context for collaborators.
pub fn render_outline<'a>(outlines: impl IntoIterator<Item = &'a UnitOutline>) -> String {
    outlines
        .into_iter()
        .enumerate()
        .map(|(i, o)| format!("Module {}: {}\n{}", i + 1, o.title, o.description))
        .collect::<Vec<_>>()
        .join("\n")
}

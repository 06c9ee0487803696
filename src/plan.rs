//! Planning: hierarchy fan-out, flattening into work items, and balanced batching.

pub mod batch;
pub mod decompose;
pub mod modules;

pub use batch::{plan_batches, Batch, BatchPlan};
pub use decompose::{decompose, WorkItem};
pub use modules::{plan_hierarchy, HierarchyPlanRequest};

//! Property-based tests for batch planning, scheduling and finalization

mod scheduling;

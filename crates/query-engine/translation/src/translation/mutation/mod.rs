//! Translate changes to a resource into ordered mutation statements.

pub mod change_detector;
pub mod change_set;
pub mod planner;

pub use change_detector::{ResourceChangeDetector, ResourceSnapshot};
pub use change_set::{ChangeSet, ResourceId};
pub use planner::{plan_after_create, plan_create, plan_delete, plan_update, CreatePlan};

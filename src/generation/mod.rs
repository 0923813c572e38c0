//! The daily batch that turns recurring templates into expenses and incomes.
//!
//! A run selects the templates due on a date ([select_candidates]), generates
//! one transaction per template at most once ([generate]) and then counts the
//! occurrence, deactivating used up templates ([advance]). [run_daily] ties
//! these together for one kind of template and [run_all] for both.

mod generator;
mod lifecycle;
mod orchestrator;
mod selector;

pub use generator::{GenerationError, generate};
pub use lifecycle::{DeactivationReason, LifecycleUpdate, advance, deactivation_reason};
pub use orchestrator::{DailyReport, RunSummary, run_all, run_daily};
pub use selector::select_candidates;

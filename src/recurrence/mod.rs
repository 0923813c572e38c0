//! Recurrence rules and the frequencies they are built on.

mod frequency;
mod rule;

pub use frequency::Frequency;
pub use rule::RecurrenceRule;

//! Decision engine: the pure, single-step pause/resume rule.

pub mod rule;

pub use rule::{RuleEngine, StepInput, StepOutcome, Trigger};

pub mod attempt;
pub mod function;
pub mod time_serde;
pub mod xquery;

pub use attempt::{Attempt, AttemptOutcome};
pub use function::{FunctionDoc, ValidationVerdict};
pub use xquery::{QueryFingerprint, RuleViolation, SynthesisResult, VERSION_DECLARATION};

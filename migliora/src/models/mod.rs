//! Data models shown to the user.

mod outcome;

pub use outcome::{Outcome, Severity, MISSING_INPUT};

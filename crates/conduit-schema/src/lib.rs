//! JSON Schema conformance engine
//!
//! Two halves: [`prepare`] rewrites a caller schema so providers with
//! partial JSON-Schema support can accept it, and [`validate`] checks
//! produced output against the caller's original, un-rewritten schema.
//! Validation failures are typed and detailed; output is never silently
//! repaired.

mod prepare;
mod validate;

pub use prepare::prepare;
pub use validate::{
    MAX_SURFACED_ERRORS, ValidationError, ValidationErrorKind, ValidationFailure, validate,
};

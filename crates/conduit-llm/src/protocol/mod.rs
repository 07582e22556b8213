//! Upstream wire formats
//!
//! One module per API family. A dozen-plus vendors collapse onto these
//! closed sets of tagged types; adapters are dispatched from a registry
//! keyed by provider name, not by inheritance.

pub mod anthropic;
pub mod google;
pub mod openai;

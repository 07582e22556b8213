//! Core inference-gateway crate for Conduit
//!
//! Exposes one OpenAI-compatible chat-completion surface and routes each
//! call across heterogeneous upstream providers (`OpenAI`-compatible,
//! Anthropic, Google) with classified-error fallback, response caching,
//! conversation correlation, and JSON-Schema conformance checking.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod convert;
pub mod error;
pub mod fallback;
pub mod health;
pub mod orchestrator;
pub mod protocol;
pub mod provider;
pub mod resolve;
pub mod router;
pub mod structured;
pub mod template;
pub mod types;

pub use error::{ErrorKind, GatewayError, ProviderFailure};
pub use orchestrator::Orchestrator;
pub use provider::{Provider, ProviderCapabilities, ProviderRegistry};
pub use router::{GatewayState, llm_router};
pub use types::{CompletionRequest, CompletionResponse, StreamEvent};

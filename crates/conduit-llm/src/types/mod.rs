//! Canonical, provider-agnostic request and response types

mod message;
mod request;
mod response;
mod stream;
mod tool;

pub use message::{Content, ContentPart, FunctionCall, Message, Role, ToolCall};
pub use request::{
    CompletionParams, CompletionRequest, FallbackPolicy, JsonSchemaSpec, ModelRef, ReasoningEffort,
    ReasoningSpec, ResponseFormat,
};
pub use response::{Choice, ChoiceMessage, CompletionResponse, FinishReason, Usage};
pub use stream::{StreamDelta, StreamEvent, StreamFunctionCall, StreamToolCall};
pub use tool::{
    FunctionDefinition, ToolChoice, ToolChoiceFunction, ToolChoiceFunctionName, ToolChoiceMode, ToolDefinition,
};

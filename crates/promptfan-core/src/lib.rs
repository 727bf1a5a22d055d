//! Core types, configuration and error definitions for promptfan.
//!
//! This crate holds everything the other promptfan crates agree on:
//!
//! - [`PromptfanError`] / [`PromptfanResult`]: the shared error enum.
//! - [`GenerationRequest`], [`AttemptResult`], [`LogRecord`], [`BatchResponse`]:
//!   the data model that flows from an inbound request down to the log sink.
//! - [`GatewayConfig`]: the explicitly constructed process configuration.

pub mod config;
pub mod error;
pub mod record;

pub use config::{
    Credentials, DefaultConfig, DelayConfig, ExecutionConfig, GatewayConfig, ProviderConfig,
    ProviderMode, ServerConfig, SinkConfig,
};
pub use error::{PromptfanError, PromptfanResult};
pub use record::{
    AttemptOutcome, AttemptResult, BatchResponse, GenerationRequest, LogRecord, ModelResults,
    ProviderResults,
};

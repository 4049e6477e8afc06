//! Multi-backend generation layer
//!
//! Each backend sits behind a [`BackendAdapter`] that handles its credential
//! and its primary → secondary model fallback. [`ProviderManager`] composes the
//! available adapters for cross-backend failover.

pub mod adapter;
pub mod anthropic;
pub mod error;
pub mod google;
mod http;
pub mod manager;
pub mod openai;
pub mod types;

pub use adapter::{BackendAdapter, ChatTransport, ProviderKind, TransportRequest, TransportResponse};
pub use error::ProviderError;
pub use manager::{Credentials, ProviderManager};
pub use types::{
    GenerationOptions, GenerationResult, LlmProvider, Message, ModelPreference, Role, Usage,
};

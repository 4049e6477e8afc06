//! Query routing and resilient multi-backend generation
//!
//! This crate decides which processing route a query deserves, runs it on
//! the first backend that answers (degrading across models and backends on
//! failure), and reports cost and latency uniformly whoever served it.

pub mod config;
pub mod events;
pub mod executor;
pub mod orchestrator;
pub mod providers;
pub mod registry;
pub mod route;
pub mod router;

// Re-export main types
pub use config::{ExecutorConfig, ProviderOverride, ProvidersConfig, RouterConfig, RoutewiseConfig};
pub use events::{ChannelEventSink, EventSink, NoopEventSink, RoutingEvent, TracingEventSink};
pub use executor::{ExecutionContext, ExecutionResult, RouteExecutor};
pub use orchestrator::Orchestrator;
pub use providers::{
    BackendAdapter, ChatTransport, Credentials, GenerationOptions, GenerationResult, LlmProvider,
    Message, ProviderError, ProviderKind, ProviderManager,
};
pub use registry::{BackendRegistry, ModelInfo, RegistryError, RouteConfig, TaskKind};
pub use route::Route;
pub use router::{DecisionTier, QueryMode, Router, RouterDecision, RouterStats, RoutingInput};

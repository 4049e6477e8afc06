//! Structured event emission
//!
//! Components report what they decided or survived through an [`EventSink`]
//! instead of printing. The default sink drops everything, so the core stays
//! silent unless the host subscribes.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::route::Route;
use crate::router::DecisionTier;

/// Something worth telling the host about
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RoutingEvent {
    /// The router settled on a route
    DecisionMade {
        route: Route,
        confidence: f64,
        tier: DecisionTier,
        bypassed: bool,
        latency_ms: u64,
    },
    /// Classifier output was unusable or the call failed
    ClassifierFallback { reason: String },
    /// An adapter moved from its primary to its secondary model
    ModelFallback {
        provider: String,
        from_model: String,
        to_model: String,
        reason: String,
    },
    /// A backend failed and the manager moved on
    ProviderFailed {
        provider: String,
        kind: String,
        message: String,
    },
    /// Every backend failed
    ProvidersExhausted { attempts: usize, last_error: String },
    /// A backend stopped at its output-length cap
    ResponseTruncated { provider: String, model: String },
}

/// Receiver of routing events. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &RoutingEvent);
}

/// Drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &RoutingEvent) {}
}

/// Re-emits events as tracing records
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &RoutingEvent) {
        match event {
            RoutingEvent::DecisionMade {
                route,
                confidence,
                tier,
                bypassed,
                latency_ms,
            } => info!(
                route = %route,
                confidence = *confidence,
                tier = ?tier,
                bypassed = *bypassed,
                latency_ms = *latency_ms,
                "Routing decision"
            ),
            RoutingEvent::ClassifierFallback { reason } => {
                warn!(reason = %reason, "Classifier fallback")
            }
            RoutingEvent::ModelFallback {
                provider,
                from_model,
                to_model,
                reason,
            } => warn!(
                provider = %provider,
                from = %from_model,
                to = %to_model,
                reason = %reason,
                "Model fallback"
            ),
            RoutingEvent::ProviderFailed {
                provider,
                kind,
                message,
            } => warn!(provider = %provider, kind = %kind, "Provider failed: {}", message),
            RoutingEvent::ProvidersExhausted {
                attempts,
                last_error,
            } => warn!(attempts = *attempts, "All providers failed: {}", last_error),
            RoutingEvent::ResponseTruncated { provider, model } => {
                warn!(provider = %provider, model = %model, "Response truncated at output cap")
            }
        }
    }
}

/// Forwards events into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<RoutingEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::UnboundedSender<RoutingEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with its receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RoutingEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: &RoutingEvent) {
        // A dropped receiver just means nobody is listening anymore
        let _ = self.tx.send(event.clone());
    }
}

//! Orchestrator: router then executor, or executor alone for a forced route

use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::RoutewiseConfig;
use crate::events::EventSink;
use crate::executor::{ExecutionContext, ExecutionResult, RouteExecutor};
use crate::providers::{Credentials, ProviderError, ProviderManager};
use crate::registry::BackendRegistry;
use crate::route::Route;
use crate::router::{Router, RoutingInput};

pub struct Orchestrator {
    router: Router,
    executor: RouteExecutor,
}

impl Orchestrator {
    pub fn new(router: Router, executor: RouteExecutor) -> Self {
        Self { router, executor }
    }

    /// Build the full graph from configuration and explicit credentials
    pub fn from_config(
        config: RoutewiseConfig,
        registry: Arc<BackendRegistry>,
        credentials: &Credentials,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let manager = Arc::new(ProviderManager::new(
            &config.providers,
            credentials,
            events.clone(),
        ));

        let classifier_name = config.router.classifier_provider.clone();
        let mut router = Router::new(config.router, registry.clone()).with_events(events);
        if let Some(name) = classifier_name {
            match manager.provider(&name) {
                Some(provider) => router = router.with_classifier(provider),
                None => warn!(
                    "Classifier backend '{}' is not available, routing without it",
                    name
                ),
            }
        }

        let executor = RouteExecutor::new(manager, registry, config.executor);
        Self::new(router, executor)
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn executor(&self) -> &RouteExecutor {
        &self.executor
    }

    pub fn available_providers(&self) -> Vec<&str> {
        self.executor.manager().available_providers()
    }

    /// Route the query, then execute on the chosen route.
    ///
    /// With no backends available this fails before any routing work.
    pub async fn process(&self, mut ctx: ExecutionContext) -> Result<ExecutionResult, ProviderError> {
        if !self.executor.manager().has_providers() {
            return Err(ProviderError::NoProvidersAvailable);
        }

        let input = RoutingInput {
            query: &ctx.query,
            mode: ctx.mode,
            history_len: ctx.history.len(),
            has_context: ctx.context_text().is_some(),
        };
        let decision = self.router.route(&input).await;
        let route = decision.route;
        ctx.decision = Some(decision);

        self.executor.execute(route, &ctx).await
    }

    /// Execute on a caller-chosen route without consulting the router
    pub async fn process_with_route(
        &self,
        route: Route,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionResult, ProviderError> {
        debug!(route = %route, "Forced route, skipping router");
        self.executor.execute(route, ctx).await
    }
}

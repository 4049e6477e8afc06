//! Query router: three-tier decision procedure
//!
//! 1. Bypass: pure string checks, no remote call (skipped in research mode).
//! 2. Classifier: a cheap backend model returns a structured decision.
//! 3. Heuristic: keyword signals in fixed priority order.
//!
//! The first tier that produces a decision wins. Every decision is folded
//! into [`RouterStats`].

pub mod classifier;
pub mod signals;
pub mod stats;

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::RouterConfig;
use crate::events::{EventSink, NoopEventSink, RoutingEvent};
use crate::providers::{GenerationOptions, LlmProvider, Message, ModelPreference};
use crate::registry::{BackendRegistry, ModelInfo, TaskKind};
use crate::route::Route;
use classifier::{
    CLASSIFIER_MAX_TOKENS, CLASSIFIER_SYSTEM_PROMPT, PARSE_FAILURE_CONFIDENCE, build_prompt,
    parse_classification,
};
use signals::{SignalMatcher, word_count};
pub use stats::RouterStats;

const RESEARCH_SIGNAL_CONFIDENCE: f64 = 0.8;
const RESEARCH_DEFAULT_CONFIDENCE: f64 = 0.6;
const CREATIVE_CONFIDENCE: f64 = 0.75;
const DEEP_CONFIDENCE: f64 = 0.75;
const FAST_CONFIDENCE: f64 = 0.7;
const DEFAULT_CONFIDENCE: f64 = 0.6;

/// How the caller wants the query treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    #[default]
    Standard,
    Research,
}

/// Which tier produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionTier {
    Bypass,
    Classifier,
    Heuristic,
}

/// What the router looks at
#[derive(Debug, Clone, Copy)]
pub struct RoutingInput<'a> {
    pub query: &'a str,
    pub mode: QueryMode,
    /// Number of prior conversation turns
    pub history_len: usize,
    /// Whether retrieved context accompanies the query
    pub has_context: bool,
}

impl<'a> RoutingInput<'a> {
    pub fn new(query: &'a str) -> Self {
        Self {
            query,
            mode: QueryMode::Standard,
            history_len: 0,
            has_context: false,
        }
    }

    pub fn with_mode(mut self, mode: QueryMode) -> Self {
        self.mode = mode;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterDecision {
    pub route: Route,
    /// Always within [0, 1]
    pub confidence: f64,
    pub reasoning: String,
    pub complexity_signals: Vec<String>,
    pub bypassed: bool,
    pub latency_ms: u64,
    pub tier: DecisionTier,
}

impl RouterDecision {
    fn new(route: Route, confidence: f64, reasoning: String, signals: Vec<String>, tier: DecisionTier) -> Self {
        Self {
            route,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning,
            complexity_signals: dedup(signals),
            bypassed: tier == DecisionTier::Bypass,
            latency_ms: 0,
            tier,
        }
    }
}

fn dedup(signals: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(signals.len());
    for s in signals {
        if !out.contains(&s) {
            out.push(s);
        }
    }
    out
}

struct Classifier {
    provider: Arc<dyn LlmProvider>,
    model: Option<ModelPreference>,
}

pub struct Router {
    config: RouterConfig,
    signals: SignalMatcher,
    registry: Arc<BackendRegistry>,
    classifier: Option<Classifier>,
    stats: Mutex<RouterStats>,
    events: Arc<dyn EventSink>,
}

impl Router {
    pub fn new(config: RouterConfig, registry: Arc<BackendRegistry>) -> Self {
        let signals = SignalMatcher::from_config(&config);
        Self {
            config,
            signals,
            registry,
            classifier: None,
            stats: Mutex::new(RouterStats::new()),
            events: Arc::new(NoopEventSink),
        }
    }

    /// Enable the classifier tier on the given backend. The registry's
    /// classification model is used when it belongs to that backend.
    pub fn with_classifier(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        let model = self
            .registry
            .task_model(TaskKind::Classification)
            .filter(|m| m.provider == provider.name())
            .map(|m| ModelPreference {
                provider: m.provider.clone(),
                model_id: m.id.clone(),
            });
        debug!(
            "Classifier enabled on '{}' (model: {})",
            provider.name(),
            model.as_ref().map(|m| m.model_id.as_str()).unwrap_or("adapter default")
        );
        self.classifier = Some(Classifier { provider, model });
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    /// Primary model the registry assigns to a route
    pub fn route_model(&self, route: Route) -> Option<&ModelInfo> {
        self.registry.route_model(route).ok()
    }

    /// Decide a route for the input. Never fails: the heuristic tier always answers.
    pub async fn route(&self, input: &RoutingInput<'_>) -> RouterDecision {
        let started = Instant::now();

        let mut decision = match self.check_bypass(input) {
            Some(decision) => decision,
            None => match self.classify(input).await {
                Some(decision) => decision,
                None => self.heuristic(input),
            },
        };
        decision.latency_ms = started.elapsed().as_millis() as u64;

        self.lock_stats().record(&decision);

        debug!(
            route = %decision.route,
            confidence = decision.confidence,
            tier = ?decision.tier,
            latency_ms = decision.latency_ms,
            "Routed query: {}",
            decision.reasoning
        );
        self.events.emit(&RoutingEvent::DecisionMade {
            route: decision.route,
            confidence: decision.confidence,
            tier: decision.tier,
            bypassed: decision.bypassed,
            latency_ms: decision.latency_ms,
        });

        decision
    }

    /// Snapshot of the running statistics
    pub fn stats(&self) -> RouterStats {
        self.lock_stats().clone()
    }

    pub fn reset_stats(&self) {
        *self.lock_stats() = RouterStats::new();
    }

    fn lock_stats(&self) -> MutexGuard<'_, RouterStats> {
        // Stats are plain counters; a panic mid-update cannot leave them unusable
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Tier 1. Complexity signals veto the bypass; otherwise the
    /// unconditional very-short rule is checked before the pattern rule.
    fn check_bypass(&self, input: &RoutingInput<'_>) -> Option<RouterDecision> {
        if input.mode == QueryMode::Research {
            return None;
        }
        if !self.signals.complexity(input.query).is_empty() {
            return None;
        }

        let words = word_count(input.query);
        let reasoning = if words < self.config.very_short_query_words {
            format!("Very short query ({words} words), bypassing classification")
        } else if words < self.config.short_query_words && self.signals.is_simple(input.query) {
            format!("Short query ({words} words) matching a simple-question pattern, bypassing classification")
        } else {
            return None;
        };

        Some(RouterDecision::new(
            Route::Fast,
            self.config.bypass_confidence,
            reasoning,
            Vec::new(),
            DecisionTier::Bypass,
        ))
    }

    /// Tier 2. `None` when no classifier is configured or its call failed.
    async fn classify(&self, input: &RoutingInput<'_>) -> Option<RouterDecision> {
        let classifier = self.classifier.as_ref()?;

        let options = GenerationOptions {
            json_mode: Some(true),
            max_tokens: Some(CLASSIFIER_MAX_TOKENS),
            temperature: Some(0.0),
            model: classifier.model.clone(),
        };
        let messages = [Message::user(build_prompt(input))];

        let response = match classifier
            .provider
            .chat(&messages, CLASSIFIER_SYSTEM_PROMPT, &options)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Classifier call failed, using heuristics: {}", e);
                self.events.emit(&RoutingEvent::ClassifierFallback {
                    reason: e.to_string(),
                });
                return None;
            }
        };

        let decision = match parse_classification(&response.content) {
            Ok(c) => RouterDecision::new(c.route, c.confidence, c.reasoning, c.signals, DecisionTier::Classifier),
            Err(reason) => {
                warn!("Classifier output unusable, defaulting to standard: {}", reason);
                self.events.emit(&RoutingEvent::ClassifierFallback {
                    reason: reason.clone(),
                });
                RouterDecision::new(
                    Route::Standard,
                    PARSE_FAILURE_CONFIDENCE,
                    format!("Classifier response could not be parsed ({reason}); defaulting to standard"),
                    Vec::new(),
                    DecisionTier::Classifier,
                )
            }
        };
        Some(decision)
    }

    /// Tier 3. Fixed priority order; always answers.
    fn heuristic(&self, input: &RoutingInput<'_>) -> RouterDecision {
        let query = input.query;
        let tier = DecisionTier::Heuristic;

        if input.mode == QueryMode::Research {
            let research = self.signals.research(query);
            if !research.is_empty() {
                return RouterDecision::new(
                    Route::Research,
                    RESEARCH_SIGNAL_CONFIDENCE,
                    format!("Research mode with research signals: {}", research.join(", ")),
                    research,
                    tier,
                );
            }
            return RouterDecision::new(
                Route::Standard,
                RESEARCH_DEFAULT_CONFIDENCE,
                "Research mode without research signals".to_string(),
                Vec::new(),
                tier,
            );
        }

        let creative = self.signals.creative(query);
        if !creative.is_empty() {
            return RouterDecision::new(
                Route::Creative,
                CREATIVE_CONFIDENCE,
                format!("Creative signals: {}", creative.join(", ")),
                creative,
                tier,
            );
        }

        let complexity = self.signals.complexity(query);
        if !complexity.is_empty() {
            return RouterDecision::new(
                Route::Deep,
                DEEP_CONFIDENCE,
                format!("Complexity signals: {}", complexity.join(", ")),
                complexity,
                tier,
            );
        }

        if word_count(query) < self.config.short_query_words && self.signals.is_simple(query) {
            return RouterDecision::new(
                Route::Fast,
                FAST_CONFIDENCE,
                "Short query matching a simple-question pattern".to_string(),
                Vec::new(),
                tier,
            );
        }

        RouterDecision::new(
            Route::Standard,
            DEFAULT_CONFIDENCE,
            "No strong signals; using the standard route".to_string(),
            Vec::new(),
            tier,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChannelEventSink;
    use crate::providers::{GenerationResult, ProviderError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Classifier double returning a fixed reply and capturing options
    struct FixedClassifier {
        name: String,
        reply: Result<String, ProviderError>,
        calls: AtomicUsize,
        last_options: Mutex<Option<GenerationOptions>>,
    }

    impl FixedClassifier {
        fn new(name: &str, reply: Result<&str, ProviderError>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                reply: reply.map(str::to_string),
                calls: AtomicUsize::new(0),
                last_options: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for FixedClassifier {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn chat(
            &self,
            _messages: &[Message],
            _system: &str,
            options: &GenerationOptions,
        ) -> Result<GenerationResult, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Suspend like a real remote call so concurrent decisions interleave
            tokio::task::yield_now().await;
            *self.last_options.lock().unwrap() = Some(options.clone());
            self.reply.clone().map(|content| GenerationResult {
                content,
                provider_name: self.name.clone(),
                model_id: "classifier".to_string(),
                usage: None,
                truncated: false,
                fallback_reason: None,
            })
        }
    }

    fn router() -> Router {
        Router::new(RouterConfig::default(), Arc::new(BackendRegistry::builtin()))
    }

    fn research(query: &str) -> RoutingInput<'_> {
        RoutingInput::new(query).with_mode(QueryMode::Research)
    }

    #[tokio::test]
    async fn test_bypass_simple_question() {
        let decision = router().route(&RoutingInput::new("What is TypeScript?")).await;
        assert_eq!(decision.route, Route::Fast);
        assert_eq!(decision.confidence, 0.95);
        assert!(decision.bypassed);
        assert_eq!(decision.tier, DecisionTier::Bypass);
    }

    #[tokio::test]
    async fn test_bypass_very_short_without_pattern() {
        let decision = router().route(&RoutingInput::new("rust lifetimes")).await;
        assert!(decision.bypassed);
        assert_eq!(decision.route, Route::Fast);
        assert!(decision.reasoning.contains("Very short"));
    }

    #[tokio::test]
    async fn test_bypass_fires_for_every_short_query_without_complexity() {
        let r = router();
        for query in ["hi", "rust", "borrow checker rules", "What is a monad", "Define entropy please"] {
            let decision = r.route(&RoutingInput::new(query)).await;
            assert!(decision.bypassed, "{query}");
            assert_eq!(decision.route, Route::Fast, "{query}");
            assert_eq!(decision.confidence, 0.95, "{query}");
        }
    }

    #[tokio::test]
    async fn test_complexity_vetoes_bypass() {
        let decision = router().route(&RoutingInput::new("compare them")).await;
        assert!(!decision.bypassed);
        assert_eq!(decision.route, Route::Deep);
    }

    #[tokio::test]
    async fn test_no_bypass_for_medium_query_without_pattern() {
        let decision = router()
            .route(&RoutingInput::new("Tell me about the history of the Rust language"))
            .await;
        assert!(!decision.bypassed);
        assert_eq!(decision.route, Route::Standard);
        assert_eq!(decision.tier, DecisionTier::Heuristic);
    }

    #[tokio::test]
    async fn test_research_mode_never_bypasses() {
        let r = router();
        for query in ["hi", "What is TypeScript?", "sources on sleep", "compare"] {
            let decision = r.route(&research(query)).await;
            assert!(!decision.bypassed, "{query}");
        }
    }

    #[tokio::test]
    async fn test_heuristic_research_routes() {
        let r = router();
        let with_signals = r.route(&research("Find peer reviewed studies on intermittent fasting")).await;
        assert_eq!(with_signals.route, Route::Research);
        assert!(with_signals.complexity_signals.contains(&"studies".to_string()));

        let without = r.route(&research("What is TypeScript?")).await;
        assert_eq!(without.route, Route::Standard);
    }

    #[tokio::test]
    async fn test_heuristic_creative_before_deep() {
        let decision = router()
            .route(&RoutingInput::new(
                "Write a story that compares two rival kingdoms and their architecture",
            ))
            .await;
        assert_eq!(decision.route, Route::Creative);
        assert!(decision.complexity_signals.contains(&"story".to_string()));
    }

    #[tokio::test]
    async fn test_heuristic_deep_scenario() {
        let decision = router()
            .route(&RoutingInput::new(
                "Compare and contrast microservices vs monolith architectures, including trade-offs",
            ))
            .await;
        assert_eq!(decision.route, Route::Deep);
        assert!(!decision.bypassed);
        assert!(decision.complexity_signals.contains(&"compare".to_string()));
        assert!(decision.complexity_signals.contains(&"trade-offs".to_string()));
    }

    #[tokio::test]
    async fn test_classifier_decision_used() {
        let classifier = FixedClassifier::new(
            "openai",
            Ok(r#"Here you go: {"route": "creative", "confidence": 0.9, "reasoning": "Asks for a poem", "complexity_signals": []}"#),
        );
        let r = router().with_classifier(classifier.clone());
        let decision = r
            .route(&RoutingInput::new("Could you help me come up with a name for my bakery business"))
            .await;
        assert_eq!(decision.route, Route::Creative);
        assert_eq!(decision.confidence, 0.9);
        assert_eq!(decision.tier, DecisionTier::Classifier);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);

        let options = classifier.last_options.lock().unwrap().clone().unwrap();
        assert_eq!(options.json_mode, Some(true));
        assert_eq!(options.model.unwrap().model_id, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_classifier_skipped_on_bypass() {
        let classifier = FixedClassifier::new("openai", Ok(r#"{"route": "deep"}"#));
        let r = router().with_classifier(classifier.clone());
        let decision = r.route(&RoutingInput::new("What is TypeScript?")).await;
        assert!(decision.bypassed);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_classifier_garbage_defaults_to_standard() {
        let (sink, mut rx) = ChannelEventSink::channel();
        let r = router()
            .with_classifier(FixedClassifier::new("anthropic", Ok("I'd say this is a turbo query")))
            .with_events(Arc::new(sink));
        let decision = r
            .route(&RoutingInput::new("Please compare these two database engines for me"))
            .await;
        assert_eq!(decision.route, Route::Standard);
        assert_eq!(decision.confidence, 0.5);
        assert_eq!(decision.tier, DecisionTier::Classifier);
        assert!(decision.reasoning.contains("could not be parsed"));
        assert!(matches!(
            rx.try_recv().unwrap(),
            RoutingEvent::ClassifierFallback { .. }
        ));
    }

    #[tokio::test]
    async fn test_classifier_invalid_route_defaults_to_standard() {
        let r = router().with_classifier(FixedClassifier::new(
            "openai",
            Ok(r#"{"route": "ultra", "confidence": 0.99}"#),
        ));
        let decision = r
            .route(&RoutingInput::new("Explain how garbage collection works in Go"))
            .await;
        assert_eq!(decision.route, Route::Standard);
        assert_eq!(decision.confidence, 0.5);
    }

    #[tokio::test]
    async fn test_classifier_call_failure_falls_to_heuristic() {
        let classifier = FixedClassifier::new(
            "openai",
            Err(ProviderError::Unavailable {
                provider: "openai".to_string(),
                message: "503".to_string(),
            }),
        );
        let r = router().with_classifier(classifier.clone());
        let decision = r
            .route(&RoutingInput::new(
                "Compare and contrast microservices vs monolith architectures, including trade-offs",
            ))
            .await;
        assert_eq!(decision.tier, DecisionTier::Heuristic);
        assert_eq!(decision.route, Route::Deep);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_classifier_model_only_for_matching_backend() {
        let classifier = FixedClassifier::new("anthropic", Ok(r#"{"route": "deep"}"#));
        let r = router().with_classifier(classifier.clone());
        r.route(&RoutingInput::new("Walk me through how TLS handshakes establish keys"))
            .await;
        let options = classifier.last_options.lock().unwrap().clone().unwrap();
        assert!(options.model.is_none());
    }

    #[tokio::test]
    async fn test_route_is_always_valid() {
        let replies = [
            "",
            "{}",
            "{\"route\": null}",
            "{\"route\": \"FAST\", \"confidence\": \"high\"}",
            "[\"deep\"]",
            "{\"route\": \"research\", \"confidence\": 2}",
        ];
        for reply in replies {
            let r = router().with_classifier(FixedClassifier::new("openai", Ok(reply)));
            let decision = r
                .route(&RoutingInput::new("Give me a detailed overview of the French revolution"))
                .await;
            assert!(Route::ALL.contains(&decision.route), "{reply}");
            assert!((0.0..=1.0).contains(&decision.confidence), "{reply}");
        }
    }

    #[tokio::test]
    async fn test_stats_track_decisions_and_reset() {
        let r = router();
        r.route(&RoutingInput::new("What is TypeScript?")).await;
        r.route(&RoutingInput::new(
            "Compare and contrast microservices vs monolith architectures, including trade-offs",
        ))
        .await;
        r.route(&research("Summarize the literature on remote work productivity"))
            .await;

        let stats = r.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.bypassed, 1);
        assert_eq!(stats.route_count(Route::Fast), 1);
        assert_eq!(stats.route_count(Route::Deep), 1);
        assert_eq!(stats.route_count(Route::Research), 1);
        let expected = (0.95 + 0.75 + 0.8) / 3.0;
        assert!((stats.avg_confidence - expected).abs() < 1e-9);

        r.reset_stats();
        assert_eq!(r.stats().total, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_decisions_do_not_lose_updates() {
        let classifier = FixedClassifier::new(
            "openai",
            Ok(r#"{"route": "deep", "confidence": 0.9}"#),
        );
        let r = Arc::new(router().with_classifier(classifier.clone()));
        let mut handles = Vec::new();
        for i in 0..200 {
            let r = r.clone();
            handles.push(tokio::spawn(async move {
                let query = if i % 2 == 0 {
                    "What is TypeScript?"
                } else {
                    "Analyze the trade-offs of eventual consistency in detail"
                };
                r.route(&RoutingInput::new(query)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let stats = r.stats();
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 100);
        assert_eq!(stats.total, 200);
        assert_eq!(stats.bypassed, 100);
        assert_eq!(stats.route_count(Route::Deep), 100);
        assert_eq!(stats.tier_count(DecisionTier::Classifier), 100);
        let expected = (0.95 + 0.9) / 2.0;
        assert!((stats.avg_confidence - expected).abs() < 1e-9);
    }

    #[test]
    fn test_route_model_lookup() {
        let r = router();
        assert_eq!(r.route_model(Route::Deep).unwrap().key, "claude-opus");
        assert!(!r.has_classifier());
    }
}

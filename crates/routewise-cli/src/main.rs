//! routewise - route queries to the right model, survive backend failures

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use routewise_core::{
    BackendRegistry, Credentials, ExecutionContext, ExecutionResult, Orchestrator, ProviderKind,
    QueryMode, Route, RoutewiseConfig, RoutingInput, TracingEventSink,
};

#[derive(Parser, Debug)]
#[command(name = "routewise")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (default: ~/.routewise/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log routing and fallback activity to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a query through the router and the backend fallback chain
    Ask {
        query: String,

        /// Skip routing and use this route (fast, standard, deep, creative, research)
        #[arg(long)]
        route: Option<Route>,

        /// Treat the query as a research question
        #[arg(long)]
        research: bool,

        /// File with pre-retrieved context to answer from
        #[arg(long)]
        context_file: Option<PathBuf>,

        /// Replace the route's system prompt
        #[arg(long)]
        system: Option<String>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the routing decision for a query without generating an answer
    Route {
        query: String,

        #[arg(long)]
        research: bool,
    },

    /// List configured backends and whether a credential was found
    Providers,

    /// Show the model catalog and route table
    Models,
}

fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".routewise")
        .join("config.toml")
}

/// Collect backend credentials from the environment
fn credentials_from_env() -> Credentials {
    let mut credentials = Credentials::new();
    for kind in ProviderKind::ALL {
        let key = kind
            .credential_env_vars()
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.trim().is_empty());
        if let Some(key) = key {
            debug!("Found credential for {}", kind.name());
            credentials.set(kind.name(), key);
        }
    }
    credentials
}

fn mode(research: bool) -> QueryMode {
    if research {
        QueryMode::Research
    } else {
        QueryMode::Standard
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = load_config(&config_path, cli.config.is_some())?;
    let registry = Arc::new(BackendRegistry::builtin());

    match cli.command {
        Commands::Models => {
            print_models(&registry);
            Ok(())
        }
        Commands::Providers => {
            let credentials = credentials_from_env();
            print_providers(&config, &credentials);
            Ok(())
        }
        Commands::Route { query, research } => {
            let orchestrator = build(config, registry);
            let input = RoutingInput::new(&query).with_mode(mode(research));
            let decision = orchestrator.router().route(&input).await;
            println!("{}", serde_json::to_string_pretty(&decision)?);
            Ok(())
        }
        Commands::Ask {
            query,
            route,
            research,
            context_file,
            system,
            json,
        } => {
            let orchestrator = build(config, registry);
            let mut ctx = ExecutionContext::new(query).with_mode(mode(research));
            if let Some(path) = context_file {
                let context = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read context file {}", path.display()))?;
                ctx = ctx.with_retrieved_context(context);
            }
            if let Some(system) = system {
                ctx = ctx.with_system_prompt(system);
            }

            let result = match route {
                Some(route) => orchestrator.process_with_route(route, &ctx).await,
                None => orchestrator.process(ctx).await,
            }
            .context("Query failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
            Ok(())
        }
    }
}

fn load_config(path: &Path, explicit: bool) -> Result<RoutewiseConfig> {
    if explicit && !path.exists() {
        bail!("Config file not found: {}", path.display());
    }
    RoutewiseConfig::load_or_default(path)
}

fn build(config: RoutewiseConfig, registry: Arc<BackendRegistry>) -> Orchestrator {
    let credentials = credentials_from_env();
    let orchestrator = Orchestrator::from_config(config, registry, &credentials, Arc::new(TracingEventSink));
    info!(
        "routewise v{} ready with backends: {:?}",
        env!("CARGO_PKG_VERSION"),
        orchestrator.available_providers()
    );
    orchestrator
}

fn print_result(result: &ExecutionResult) {
    println!("{}", result.answer.trim_end());
    println!();
    println!(
        "route: {}  model: {}/{}  confidence: {:.2}",
        result.route, result.provider_name, result.model_id, result.confidence
    );
    println!(
        "tokens: {} in / {} out  cost: ${:.6}  time: {} ms",
        result.costs.input_tokens, result.costs.output_tokens, result.costs.estimated_usd, result.timing.total_ms
    );
    if let Some(reason) = &result.fallback_reason {
        println!("fallback: {reason}");
    }
    if result.truncated {
        println!("note: response was truncated at the output token limit");
    }
}

fn print_providers(config: &RoutewiseConfig, credentials: &Credentials) {
    println!("{:<12} {:<10} {:<28} {}", "BACKEND", "STATUS", "PRIMARY", "SECONDARY");
    for name in &config.providers.order {
        let Some(kind) = ProviderKind::from_name(name) else {
            println!("{:<12} unknown", name);
            continue;
        };
        let overrides = config.providers.overrides.get(kind.name());
        let (primary, secondary) = kind.default_models();
        let primary = overrides
            .and_then(|o| o.primary_model.as_deref())
            .unwrap_or(primary);
        let secondary = overrides
            .and_then(|o| o.secondary_model.as_deref())
            .unwrap_or(secondary);
        let status = if credentials.get(kind.name()).is_some() {
            "ready"
        } else {
            "no key"
        };
        println!("{:<12} {:<10} {:<28} {}", kind.name(), status, primary, secondary);
    }
}

fn print_models(registry: &BackendRegistry) {
    println!(
        "{:<14} {:<28} {:<10} {:>10} {:>10}",
        "KEY", "ID", "BACKEND", "IN $/MTOK", "OUT $/MTOK"
    );
    for model in registry.models() {
        println!(
            "{:<14} {:<28} {:<10} {:>10.2} {:>10.2}",
            model.key, model.id, model.provider, model.input_price_per_mtok, model.output_price_per_mtok
        );
    }

    println!();
    println!("{:<10} {:<14} {:>5} {:>6}  FALLBACKS", "ROUTE", "PRIMARY", "TEMP", "MAX");
    for route in Route::ALL {
        let rc = registry.route_config(route);
        println!(
            "{:<10} {:<14} {:>5.1} {:>6}  {}",
            route.as_str(),
            rc.primary_model,
            rc.temperature,
            rc.max_tokens,
            rc.fallback_models.join(", ")
        );
    }
}

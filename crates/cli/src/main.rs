//! Delegate CLI - resolve task owners from the command line.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use delegate_core::{ActorId, Task};
use delegate_engine::{
    AssignmentStrategy, Collaborators, DelegateStrategy, ResolvedConfig, StrategyConfig,
    StrategyRegistry, DELEGATE_STRATEGY,
};
use delegate_services::{
    HttpDecisionClient, HttpRuleClient, LoadMetricRegistry, RuleEvaluator, ServiceFixtures,
    SkillDecisionService,
};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "delegate")]
#[command(about = "Decide who should own a task", long_about = None)]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assign a task and print the chosen actor
    Assign {
        #[command(flatten)]
        args: ResolveArgs,
        /// Strategy identifier
        #[arg(long, default_value = DELEGATE_STRATEGY)]
        strategy: String,
    },
    /// Print the eligible candidates of a task
    Candidates(ResolveArgs),
    /// Validate a configuration file
    CheckConfig {
        /// TOML configuration
        config: PathBuf,
        /// Property override (key=value)
        #[arg(short = 'D', value_parser = parse_property)]
        property: Vec<(String, String)>,
    },
}

#[derive(Args)]
struct ResolveArgs {
    /// Task JSON file
    #[arg(long)]
    task: PathBuf,
    /// Directory, rules, skills and open task fixtures (JSON)
    #[arg(long)]
    fixtures: Option<PathBuf>,
    /// TOML configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Property override (key=value)
    #[arg(short = 'D', value_parser = parse_property)]
    property: Vec<(String, String)>,
    /// Actor that must not receive the task
    #[arg(long)]
    exclude: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match cli.command {
        Commands::Assign { args, strategy } => {
            let (delegate, task) = prepare(&args).await?;
            let excluded = args.exclude.map(ActorId::from);

            let mut registry = StrategyRegistry::new();
            registry.register(Arc::new(delegate));
            let strategy = registry.get(&strategy).ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown strategy '{}' (known: {})",
                    strategy,
                    registry.identifiers().join(", ")
                )
            })?;

            match strategy.apply(&task, excluded.as_ref()).await {
                Ok(assignment) => {
                    println!("{}", assignment.actor());
                    info!(
                        task = %assignment.task(),
                        decided_by = assignment.decided_by().as_str(),
                        resolution = %assignment.resolution(),
                        "Done"
                    );
                }
                Err(e) if e.is_no_eligible_candidate() => {
                    eprintln!("{}", e);
                    std::process::exit(2);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Candidates(args) => {
            let (strategy, task) = prepare(&args).await?;
            let excluded = args.exclude.map(ActorId::from);

            let candidates = strategy.candidates(&task, excluded.as_ref()).await;
            println!("Candidates ({})", candidates.len());
            for actor in &candidates {
                println!("  {}", actor);
            }
        }
        Commands::CheckConfig { config, property } => {
            let resolved = load_config(Some(&config), property)?;
            print_config(&resolved);
        }
    }

    Ok(())
}

fn init_logger(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("delegate=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("delegate=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}

fn load_config(path: Option<&Path>, properties: Vec<(String, String)>) -> Result<ResolvedConfig> {
    let mut config = match path {
        Some(path) => StrategyConfig::from_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => StrategyConfig::default(),
    };

    let overrides: HashMap<String, String> = properties.into_iter().collect();
    config.apply_properties(&overrides)?;

    Ok(config.resolve()?)
}

async fn prepare(args: &ResolveArgs) -> Result<(DelegateStrategy, Task)> {
    let config = load_config(args.config.as_deref(), args.property.clone())?;
    if !config.assignment_enabled {
        debug!("Assignment disabled in configuration, resolving on request");
    }

    let fixtures = match &args.fixtures {
        Some(path) => ServiceFixtures::load(path)
            .await
            .with_context(|| format!("Failed to load fixtures {}", path.display()))?,
        None => ServiceFixtures::default(),
    };

    let text = tokio::fs::read_to_string(&args.task)
        .await
        .with_context(|| format!("Failed to read task {}", args.task.display()))?;
    let task: Task = serde_json::from_str(&text).context("Invalid task JSON")?;

    let mut collaborators = Collaborators::new(Arc::new(fixtures.directory()));
    if let (Some(rules), Some(skills)) = (&config.rules, &config.skills) {
        let rule_evaluator: Arc<dyn RuleEvaluator> = match &rules.endpoint {
            Some(endpoint) => {
                info!(%endpoint, container = %rules.container, "Using remote rules");
                Arc::new(http_timeout(
                    HttpRuleClient::new(endpoint.as_str(), rules.container.as_str()),
                    config.lookup_timeout,
                    HttpRuleClient::with_timeout,
                ))
            }
            None => Arc::new(fixtures.rule_evaluator()),
        };
        let decisions: Arc<dyn SkillDecisionService> = match &skills.release.endpoint {
            Some(endpoint) => {
                info!(%endpoint, container = %skills.release.container, "Using remote decisions");
                Arc::new(http_timeout(
                    HttpDecisionClient::new(endpoint.as_str(), skills.release.container.as_str()),
                    config.lookup_timeout,
                    HttpDecisionClient::with_timeout,
                ))
            }
            None => Arc::new(fixtures.skill_matrix()),
        };
        collaborators = collaborators.with_skills(rule_evaluator, decisions);
    } else if !fixtures.rules.is_empty() {
        warn!("Fixtures define skill rules but skills matching is not configured");
    }

    let metrics = LoadMetricRegistry::with_builtins(Arc::new(fixtures.open_tasks()));
    let strategy = DelegateStrategy::new(&config, collaborators, &metrics)?;

    Ok((strategy, task))
}

/// Apply the lookup timeout to an HTTP client when one is configured.
fn http_timeout<C>(client: C, timeout: Option<Duration>, apply: fn(C, Duration) -> C) -> C {
    match timeout {
        Some(timeout) => apply(client, timeout),
        None => client,
    }
}

fn print_config(config: &ResolvedConfig) {
    println!("Configuration OK");
    println!("  Assignment enabled: {}", config.assignment_enabled);
    match &config.lookup_timeout {
        Some(timeout) => println!("  Lookup timeout: {:?}", timeout),
        None => println!("  Lookup timeout: none"),
    }
    match &config.rules {
        Some(rules) => println!(
            "  Rules: {} (container {}, scan {})",
            rules.release_id,
            rules.container,
            format_interval(rules.scanner_interval)
        ),
        None => println!("  Rules: none"),
    }
    match &config.skills {
        Some(skills) => println!(
            "  Skills: {} model {} (container {}, scan {})",
            skills.release.release_id,
            skills.model_name,
            skills.release.container,
            format_interval(skills.release.scanner_interval)
        ),
        None => println!("  Skills: disabled"),
    }
    println!(
        "  Workload: {} ({})",
        if config.workload_enabled { "enabled" } else { "disabled" },
        config.calculator
    );
}

fn format_interval(interval: Option<Duration>) -> String {
    match interval {
        Some(interval) => format!("{:?}", interval),
        None => "off".to_string(),
    }
}

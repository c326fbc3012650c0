use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use pathniti_ai::{CounselRequest, CounselTopic, Counselor, RecommendationEngine};
use pathniti_core::{
    summarize_quiz, ConfigManager, ExperimentStore, FeedbackStore, FeedbackType, LoggingConfig,
    NewExperiment, NewFeedback, PathNitiConfig, QuizResponse, RecommendationKind, RequestBudget,
    SystemClock, UsageMonitor, UserProfile,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "pathniti")]
#[command(
    about = "PathNiti - Stream, college and career recommendations for students",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Output format (json, pretty)
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank streams, colleges or careers for a student profile
    Recommend {
        /// Profile JSON file
        #[arg(short, long)]
        profile: PathBuf,

        /// stream, college or career (anything else means stream)
        #[arg(short, long, default_value = "stream")]
        kind: String,

        /// Maximum number of colleges or careers
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Ask the AI counselor a free-form question
    Ask {
        /// The question
        prompt: String,

        /// Extra background about the student
        #[arg(short, long)]
        context: Option<String>,

        /// Counselling topic
        #[arg(short, long, value_enum, default_value = "general")]
        topic: TopicArg,
    },

    /// Summarize quiz responses
    Quiz {
        /// JSON file holding an array of responses
        #[arg(short, long)]
        responses: PathBuf,
    },

    /// Show the AI request budget
    Usage,

    /// Collect and analyse student feedback
    #[command(subcommand)]
    Feedback(FeedbackCommands),

    /// Run A/B experiments over recommendation variants
    #[command(subcommand)]
    Ab(AbCommands),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum FeedbackCommands {
    /// Record a 1-5 star rating
    Submit {
        #[arg(short, long)]
        user: String,

        #[arg(short = 't', long = "type", value_enum)]
        kind: FeedbackTypeArg,

        #[arg(short, long)]
        rating: u8,

        #[arg(short, long)]
        comment: Option<String>,

        #[arg(short, long, default_value = "")]
        session: String,
    },

    /// Ratings and trends over a recent window
    Summary {
        #[arg(short = 't', long = "type", value_enum)]
        kind: Option<FeedbackTypeArg>,

        /// Window length in days
        #[arg(short, long, default_value_t = 30)]
        days: u32,
    },

    /// Sentiment, recurring issues and suggestions for one type
    Analyze {
        #[arg(short = 't', long = "type", value_enum)]
        kind: FeedbackTypeArg,
    },
}

#[derive(Subcommand)]
enum AbCommands {
    /// Create a draft test from a JSON definition
    Create {
        #[arg(short, long)]
        definition: PathBuf,
    },

    /// Start or resume a test
    Start { test_id: String },

    Pause { test_id: String },

    /// Mark a test completed
    Stop { test_id: String },

    /// Variant for a user (stable across calls)
    Assign {
        test_id: String,

        #[arg(short, long)]
        user: String,
    },

    /// Record metrics for an assigned user
    Record {
        test_id: String,

        #[arg(short, long)]
        user: String,

        /// name=value, repeatable
        #[arg(short, long = "metric", value_parser = parse_metric, required = true)]
        metrics: Vec<(String, f64)>,
    },

    /// Per-variant metric statistics
    Results { test_id: String },

    /// Pick a winner on the primary metric
    Analyze { test_id: String },

    /// List all tests
    List,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a default configuration file
    Init {
        /// Target path (defaults to ~/.pathniti/config.toml)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

#[derive(Clone, ValueEnum)]
enum TopicArg {
    General,
    CareerAdvice,
    StreamSelection,
    CollegeGuidance,
}

#[derive(Clone, Copy, ValueEnum)]
enum FeedbackTypeArg {
    Recommendation,
    Quiz,
    College,
    Career,
    General,
}

impl From<FeedbackTypeArg> for FeedbackType {
    fn from(arg: FeedbackTypeArg) -> Self {
        match arg {
            FeedbackTypeArg::Recommendation => FeedbackType::Recommendation,
            FeedbackTypeArg::Quiz => FeedbackType::Quiz,
            FeedbackTypeArg::College => FeedbackType::College,
            FeedbackTypeArg::Career => FeedbackType::Career,
            FeedbackTypeArg::General => FeedbackType::General,
        }
    }
}

impl From<TopicArg> for CounselTopic {
    fn from(arg: TopicArg) -> Self {
        match arg {
            TopicArg::General => CounselTopic::General,
            TopicArg::CareerAdvice => CounselTopic::CareerAdvice,
            TopicArg::StreamSelection => CounselTopic::StreamSelection,
            TopicArg::CollegeGuidance => CounselTopic::CollegeGuidance,
        }
    }
}

#[derive(Serialize)]
struct ConfigInitResult {
    path: String,
    status: String,
}

#[derive(Serialize)]
struct UsageResult {
    requests_today: u32,
    requests_this_minute: u32,
    daily_limit: u32,
    per_minute_limit: u32,
    remaining_today: u32,
    is_approaching_limit: bool,
    ai_enhancement: bool,
    state_file: Option<String>,
}

#[derive(Serialize)]
struct AssignmentResult {
    test_id: String,
    user_id: String,
    variant: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match execute_command(&cli).await {
        Ok(output) => {
            print_output(&cli.output, &output)?;
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so JSON output on stdout stays machine readable
    let _ = match logging.format.as_str() {
        "json" => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        "compact" => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        _ => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
}

async fn execute_command(cli: &Cli) -> Result<serde_json::Value> {
    // `config init` must work even when the existing configuration is invalid
    if let Commands::Config(ConfigCommands::Init { path, force }) = &cli.command {
        return execute_config_init(path.as_deref(), *force);
    }

    let manager = ConfigManager::load().context("Failed to load configuration")?;
    let config = manager.config();
    init_tracing(&config.logging, cli.verbose);
    debug!(
        "Using config file: {}",
        manager
            .config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "defaults".to_string())
    );

    let budget = open_budget(config);

    match &cli.command {
        Commands::Recommend {
            profile,
            kind,
            limit,
        } => {
            let profile =
                read_json::<UserProfile>(profile).context("Failed to read profile")?;
            let engine = RecommendationEngine::from_config_with_budget(config, budget)
                .context("Failed to initialize recommendation engine")?;
            let report = engine
                .recommend(RecommendationKind::parse_lenient(kind), &profile, *limit)
                .await;
            Ok(serde_json::to_value(report)?)
        }

        Commands::Ask {
            prompt,
            context,
            topic,
        } => {
            let counselor = Counselor::from_config(&config.llm, budget)
                .context("Failed to initialize counselor")?;
            let reply = counselor
                .ask(CounselRequest {
                    prompt: prompt.clone(),
                    context: context.clone(),
                    topic: topic.clone().into(),
                })
                .await
                .context("Failed to generate AI response")?;
            Ok(serde_json::to_value(reply)?)
        }

        Commands::Quiz { responses } => {
            let responses =
                read_json::<Vec<QuizResponse>>(responses).context("Failed to read responses")?;
            Ok(serde_json::to_value(summarize_quiz(&responses))?)
        }

        Commands::Usage => {
            let stats = budget.usage_stats();
            let result = UsageResult {
                requests_today: stats.requests_today,
                requests_this_minute: stats.requests_this_minute,
                daily_limit: stats.daily_limit,
                per_minute_limit: stats.per_minute_limit,
                remaining_today: budget.remaining_requests_today(),
                is_approaching_limit: budget.is_approaching_limit(),
                ai_enhancement: config.llm.has_api_key(),
                state_file: budget.state_file().map(|p| p.display().to_string()),
            };
            Ok(serde_json::to_value(result)?)
        }

        Commands::Feedback(command) => execute_feedback(config, command),

        Commands::Ab(command) => execute_ab(config, command),

        Commands::Config(ConfigCommands::Show) => {
            let mut value = serde_json::to_value(config)?;
            if let serde_json::Value::Object(map) = &mut value {
                map.insert(
                    "config_file".to_string(),
                    serde_json::Value::String(
                        manager
                            .config_path()
                            .map(|p| p.display().to_string())
                            .unwrap_or_else(|| "none".to_string()),
                    ),
                );
                map.insert(
                    "ai_enhancement".to_string(),
                    serde_json::Value::Bool(config.llm.has_api_key()),
                );
            }
            Ok(value)
        }

        Commands::Config(ConfigCommands::Init { path, force }) => {
            execute_config_init(path.as_deref(), *force)
        }
    }
}

/// Budget backed by `usage.json` in the data directory, so limits hold across runs.
fn open_budget(config: &PathNitiConfig) -> Arc<UsageMonitor> {
    let clock = Arc::new(SystemClock);
    let monitor = match config.storage.usage_file() {
        Some(path) => UsageMonitor::with_state_file(config.usage.limits(), clock, path),
        None => UsageMonitor::new(config.usage.limits(), clock),
    };
    Arc::new(monitor)
}

fn execute_feedback(
    config: &PathNitiConfig,
    command: &FeedbackCommands,
) -> Result<serde_json::Value> {
    let path = config
        .storage
        .feedback_file()
        .context("Could not determine data directory")?;
    let mut store =
        FeedbackStore::open(path, Arc::new(SystemClock)).context("Failed to open feedback log")?;

    match command {
        FeedbackCommands::Submit {
            user,
            kind,
            rating,
            comment,
            session,
        } => {
            let entry = store.submit(NewFeedback {
                user_id: user.clone(),
                session_id: session.clone(),
                feedback_type: (*kind).into(),
                rating: *rating,
                comment: comment.clone(),
                context: BTreeMap::new(),
            })?;
            Ok(serde_json::to_value(entry)?)
        }
        FeedbackCommands::Summary { kind, days } => Ok(serde_json::to_value(
            store.summary((*kind).map(FeedbackType::from), *days),
        )?),
        FeedbackCommands::Analyze { kind } => {
            Ok(serde_json::to_value(store.analyze((*kind).into()))?)
        }
    }
}

fn execute_ab(config: &PathNitiConfig, command: &AbCommands) -> Result<serde_json::Value> {
    let path = config
        .storage
        .experiments_file()
        .context("Could not determine data directory")?;
    let mut store = ExperimentStore::open(path, Arc::new(SystemClock))
        .context("Failed to open experiment store")?;

    let value = match command {
        AbCommands::Create { definition } => {
            let definition = read_json::<NewExperiment>(definition)
                .context("Failed to read test definition")?;
            serde_json::to_value(store.create_test(definition)?)?
        }
        AbCommands::Start { test_id } => serde_json::to_value(store.start_test(test_id)?)?,
        AbCommands::Pause { test_id } => serde_json::to_value(store.pause_test(test_id)?)?,
        AbCommands::Stop { test_id } => serde_json::to_value(store.stop_test(test_id)?)?,
        AbCommands::Assign { test_id, user } => {
            let variant = store.assign_user_to_variant(user, test_id)?;
            serde_json::to_value(AssignmentResult {
                test_id: test_id.clone(),
                user_id: user.clone(),
                variant,
            })?
        }
        AbCommands::Record {
            test_id,
            user,
            metrics,
        } => {
            let metrics = metrics.iter().cloned().collect();
            serde_json::to_value(store.record_result(test_id, user, metrics, BTreeMap::new())?)?
        }
        AbCommands::Results { test_id } => serde_json::to_value(store.test_results(test_id)?)?,
        AbCommands::Analyze { test_id } => serde_json::to_value(store.analyze_test(test_id)?)?,
        AbCommands::List => serde_json::to_value(store.tests().collect::<Vec<_>>())?,
    };
    Ok(value)
}

fn parse_metric(raw: &str) -> std::result::Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got {:?}", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("metric name missing in {:?}", raw));
    }
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid value for {}: {}", name, e))?;
    Ok((name.to_string(), value))
}

fn execute_config_init(path: Option<&Path>, force: bool) -> Result<serde_json::Value> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            ConfigManager::user_config_path().context("Could not determine home directory")?
        }
    };

    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    ConfigManager::create_default_config(&path).context("Failed to write config file")?;

    Ok(serde_json::to_value(ConfigInitResult {
        path: path.display().to_string(),
        status: "created".to_string(),
    })?)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn print_output(format: &OutputFormat, value: &serde_json::Value) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Pretty => {
            print_pretty(value, 0)?;
        }
    }
    Ok(())
}

fn print_pretty(value: &serde_json::Value, depth: usize) -> Result<()> {
    let indent = "  ".repeat(depth);
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                let key_colored = key.cyan().bold();
                match val {
                    serde_json::Value::String(s) => {
                        println!("{}{}: {}", indent, key_colored, s.green());
                    }
                    serde_json::Value::Number(n) => {
                        println!("{}{}: {}", indent, key_colored, n.to_string().yellow());
                    }
                    serde_json::Value::Bool(b) => {
                        let val_colored = if *b {
                            "true".green()
                        } else {
                            "false".red()
                        };
                        println!("{}{}: {}", indent, key_colored, val_colored);
                    }
                    serde_json::Value::Array(items)
                        if items.iter().all(|i| !i.is_object() && !i.is_array()) =>
                    {
                        let joined = items
                            .iter()
                            .map(|i| match i {
                                serde_json::Value::String(s) => s.clone(),
                                other => other.to_string(),
                            })
                            .collect::<Vec<_>>()
                            .join(", ");
                        println!("{}{}: {}", indent, key_colored, joined);
                    }
                    serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                        println!("{}{}:", indent, key_colored);
                        print_pretty(val, depth + 1)?;
                    }
                    serde_json::Value::Null => {
                        println!("{}{}: {}", indent, key_colored, "-".dimmed());
                    }
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for (i, item) in arr.iter().enumerate() {
                println!(
                    "\n{}{}{}:",
                    indent,
                    "Item ".cyan(),
                    (i + 1).to_string().yellow()
                );
                print_pretty(item, depth + 1)?;
            }
        }
        _ => {
            println!("{}{}", indent, serde_json::to_string_pretty(value)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_recommend_arguments() {
        let cli = Cli::try_parse_from([
            "pathniti", "-o", "json", "recommend", "--profile", "p.json", "--kind", "career",
            "--limit", "3",
        ])
        .unwrap();
        assert!(matches!(cli.output, OutputFormat::Json));
        match cli.command {
            Commands::Recommend { kind, limit, .. } => {
                assert_eq!(
                    RecommendationKind::parse_lenient(&kind),
                    RecommendationKind::Career
                );
                assert_eq!(limit, Some(3));
            }
            _ => panic!("expected recommend"),
        }
    }

    #[test]
    fn test_ask_topic_names() {
        let cli = Cli::try_parse_from([
            "pathniti",
            "ask",
            "Which stream?",
            "--topic",
            "stream-selection",
        ])
        .unwrap();
        match cli.command {
            Commands::Ask { topic, context, .. } => {
                assert_eq!(CounselTopic::from(topic), CounselTopic::StreamSelection);
                assert!(context.is_none());
            }
            _ => panic!("expected ask"),
        }
        assert!(Cli::try_parse_from(["pathniti", "ask", "x", "--topic", "astrology"]).is_err());
    }

    #[test]
    fn test_config_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        assert!(execute_config_init(Some(&path), false).is_err());
        let result = execute_config_init(Some(&path), true).unwrap();
        assert_eq!(result["status"], "created");
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains("gemini-1.5-flash"));
    }

    fn config_in(dir: &TempDir) -> PathNitiConfig {
        let mut config = PathNitiConfig::default();
        config.storage.data_dir = Some(dir.path().to_path_buf());
        config
    }

    #[test]
    fn test_budget_persists_between_runs() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        let first = open_budget(&config);
        first.record_request();
        assert_eq!(
            first.state_file(),
            Some(dir.path().join("usage.json").as_path())
        );

        let second = open_budget(&config);
        assert_eq!(second.usage_stats().requests_today, 1);
        assert_eq!(
            second.remaining_requests_today(),
            config.usage.daily_limit - 1
        );
    }

    #[test]
    fn test_feedback_commands_share_the_log() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        let cli = Cli::try_parse_from([
            "pathniti", "feedback", "submit", "--user", "s1", "--type", "quiz", "--rating", "4",
        ])
        .unwrap();
        let Commands::Feedback(command) = &cli.command else {
            panic!("expected feedback");
        };
        let entry = execute_feedback(&config, command).unwrap();
        assert_eq!(entry["rating"], 4);
        assert_eq!(entry["feedback_type"], "quiz");

        let summary = execute_feedback(
            &config,
            &FeedbackCommands::Summary {
                kind: None,
                days: 30,
            },
        )
        .unwrap();
        assert_eq!(summary["total_feedback"], 1);

        let bad = FeedbackCommands::Submit {
            user: "s1".to_string(),
            kind: FeedbackTypeArg::Quiz,
            rating: 9,
            comment: None,
            session: String::new(),
        };
        assert!(execute_feedback(&config, &bad).is_err());
    }

    #[test]
    fn test_ab_commands_round_trip_through_store() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let definition = dir.path().join("test.json");
        std::fs::write(
            &definition,
            r#"{
                "name": "Ranking weights",
                "variants": [{"name": "baseline"}, {"name": "boosted", "weight": 1.2}],
                "traffic_split": [0.5, 0.5],
                "metrics": ["click_through_rate"]
            }"#,
        )
        .unwrap();

        let created = execute_ab(&config, &AbCommands::Create { definition }).unwrap();
        let test_id = created["test_id"].as_str().unwrap().to_string();
        assert_eq!(created["status"], "draft");
        assert_eq!(created["variants"][1]["weight"], 1.2);

        execute_ab(
            &config,
            &AbCommands::Start {
                test_id: test_id.clone(),
            },
        )
        .unwrap();
        let assign = AbCommands::Assign {
            test_id: test_id.clone(),
            user: "s1".to_string(),
        };
        let first = execute_ab(&config, &assign).unwrap();
        let second = execute_ab(&config, &assign).unwrap();
        assert_eq!(first["variant"], second["variant"]);

        let cli = Cli::try_parse_from([
            "pathniti",
            "ab",
            "record",
            test_id.as_str(),
            "--user",
            "s1",
            "--metric",
            "click_through_rate=0.4",
        ])
        .unwrap();
        let Commands::Ab(record) = &cli.command else {
            panic!("expected ab");
        };
        execute_ab(&config, record).unwrap();

        let results = execute_ab(&config, &AbCommands::Results { test_id }).unwrap();
        assert_eq!(results["total_users"], 1);
    }

    #[test]
    fn test_metric_argument_parsing() {
        assert_eq!(
            parse_metric("time_spent = 42.5"),
            Ok(("time_spent".to_string(), 42.5))
        );
        assert!(parse_metric("time_spent").is_err());
        assert!(parse_metric("=1").is_err());
        assert!(parse_metric("ctr=high").is_err());
        assert!(Cli::try_parse_from(["pathniti", "ab", "record", "t", "--user", "u"]).is_err());
    }
}

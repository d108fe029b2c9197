use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use contractmatch_lib::demo::demo_segments;
use contractmatch_lib::models::{Category, Classification, ComparisonReport, SegmentationMode};
use contractmatch_lib::services::comparison::{
    compare_documents, CancelToken, ConfigurationError, ContractComparator,
};
use contractmatch_lib::services::config_store::ConfigStore;
use contractmatch_lib::services::text_processor::preview;

#[derive(Parser, Debug)]
#[command(
    name = "contractmatch",
    version,
    about = "Compare a reservation contract (V1) against the final deed (V2), paragraph by paragraph",
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    compare: CompareArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect or edit the stored configuration
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// Reservation contract (.txt, .md, .docx, .pdf)
    #[arg(required_unless_present = "demo")]
    v1: Option<PathBuf>,

    /// Final contract
    #[arg(required_unless_present = "demo")]
    v2: Option<PathBuf>,

    /// Write the full report as JSON
    #[arg(long)]
    out: Option<PathBuf>,

    /// Similarity at or above which a pair is unchanged
    #[arg(long)]
    high: Option<f64>,

    /// Similarity at or below which a paragraph is treated as new
    #[arg(long)]
    low: Option<f64>,

    /// Oracle provider, optionally with a model: `gemini` or `openai:gpt-4o`
    #[arg(long)]
    provider: Option<String>,

    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// `lines` or `blank-lines`
    #[arg(long)]
    segmentation: Option<SegmentationMode>,

    /// Use the built-in demo contract pair
    #[arg(long, default_value_t = false, conflicts_with_all = ["v1", "v2"])]
    demo: bool,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[arg(long)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the config file location and content, API keys masked
    Show,
    /// Store an API key for a provider
    SetKey { provider: String, key: String },
    /// Remove a stored API key
    DeleteKey { provider: String },
    /// Override a provider endpoint
    SetUrl { provider: String, url: String },
}

fn open_store(config_dir: Option<PathBuf>) -> Result<ConfigStore> {
    let dir = match config_dir {
        Some(dir) => dir,
        None => ConfigStore::default_config_dir().context("no config directory available on this platform")?,
    };
    Ok(ConfigStore::new(dir))
}

fn mask_key(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    format!("{}***", visible)
}

fn run_config(args: ConfigArgs) -> Result<()> {
    let store = open_store(args.config_dir)?;
    match args.action {
        ConfigAction::Show => {
            let mut config = store.load().map_err(ConfigurationError::Store)?;
            for key in config.api_keys.values_mut() {
                *key = mask_key(key);
            }
            println!("Config file: {}", store.config_file().display());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::SetKey { provider, key } => {
            let provider = provider.trim().to_lowercase();
            store.set_api_key(&provider, key.trim()).map_err(ConfigurationError::Store)?;
            info!("[CONFIG] stored API key for {}", provider);
            println!("Stored API key for {}", provider);
        }
        ConfigAction::DeleteKey { provider } => {
            let provider = provider.trim().to_lowercase();
            store.delete_api_key(&provider).map_err(ConfigurationError::Store)?;
            info!("[CONFIG] deleted API key for {}", provider);
            println!("Deleted API key for {}", provider);
        }
        ConfigAction::SetUrl { provider, url } => {
            let provider = provider.trim().to_lowercase();
            store.set_provider_url(&provider, url.trim()).map_err(ConfigurationError::Store)?;
            info!("[CONFIG] {} base URL set to {}", provider, url.trim());
            println!("Set {} base URL to {}", provider, url.trim());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    contractmatch_lib::init_logging(cli.compare.verbose);

    match cli.command {
        Some(Commands::Config(args)) => run_config(args),
        None => run_compare(cli.compare).await,
    }
}

async fn run_compare(args: CompareArgs) -> Result<()> {
    let store = open_store(args.config_dir.clone())?;
    let mut config = store.load().map_err(ConfigurationError::Store)?;
    info!("Config: {}", store.config_file().display());

    if let Some(high) = args.high {
        config.comparison.high_threshold = high;
    }
    if let Some(low) = args.low {
        config.comparison.low_threshold = low;
    }
    if let Some(mode) = args.segmentation {
        config.comparison.segmentation = mode;
    }

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current paragraph");
                cancel.cancel();
            }
        });
    }

    let result = if args.demo {
        let comparator = ContractComparator::from_config(&config, args.provider.as_deref())?;
        let (source, target) = demo_segments(config.comparison.segmentation);
        comparator.compare_with_cancel(&source, &target, &cancel).await
    } else {
        let (Some(v1), Some(v2)) = (args.v1.as_ref(), args.v2.as_ref()) else {
            bail!("both V1 and V2 documents are required");
        };
        compare_documents(v1, v2, &config, args.provider.as_deref(), &cancel).await
    };
    let report = result.context("comparison failed")?;

    print_report(&report);

    if let Some(out) = args.out {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&out, json).with_context(|| format!("writing {}", out.display()))?;
        println!();
        println!("Wrote JSON: {}", out.display());
    }

    Ok(())
}

fn position(c: &Classification) -> String {
    match (c.target_index, c.source_index) {
        (Some(t), Some(s)) => format!("V2 #{} <- V1 #{}", t + 1, s + 1),
        (Some(t), None) => format!("V2 #{}", t + 1),
        (None, Some(s)) => format!("V1 #{}", s + 1),
        (None, None) => String::new(),
    }
}

fn print_report(report: &ComparisonReport) {
    println!(
        "Run {}  V1={} segments  V2={} segments  thresholds={}/{}  oracle calls={}",
        report.run_id,
        report.source_segments,
        report.target_segments,
        report.low_threshold,
        report.high_threshold,
        report.oracle_calls
    );
    println!();

    for c in &report.classifications {
        let similarity = c
            .similarity
            .map(|s| format!("{:.3}", s))
            .unwrap_or_else(|| "-".to_string());
        let mut markers = String::new();
        if c.anomaly {
            markers.push_str("  [ANOMALIE]");
        }
        if let Some(err) = &c.error {
            markers.push_str(&format!("  [oracle error: {}]", err));
        }
        println!(
            "{:<22} {:<18} sim={}{}",
            c.category.label(),
            position(c),
            similarity,
            markers
        );

        let text = match c.category {
            Category::Removed => c.source_text.as_deref(),
            _ => c.target_text.as_deref(),
        };
        if let Some(text) = text {
            println!("    {}", preview(text, 110));
        }
        if let Some(pos) = &c.original_position {
            println!("    {}", pos);
        }
        if let Some(explanation) = &c.explanation {
            println!("    > {}", preview(explanation, 110));
        }
    }

    println!();
    for (category, items) in report.grouped() {
        println!("{:<22} {}", category.label(), items.len());
    }
    println!(
        "Total {}  anomalies {}  degraded {}",
        report.summary.total(),
        report.summary.anomalies,
        report.summary.degraded
    );
}

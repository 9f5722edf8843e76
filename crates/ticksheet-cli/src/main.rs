//! ticksheet command-line interface.
//!
//! Thin front-end over `ticksheet-runtime`: loads the master list and source
//! text, picks a pipeline, and writes the result CSV. All matching logic
//! lives in the library crates.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ticksheet_core::master::MasterList;
use ticksheet_core::types::Language;
use ticksheet_core::output;
use ticksheet_runtime::{LearningStore, Oracle, Pipeline, RunConfig};

#[derive(Parser)]
#[command(name = "ticksheet", version, about = "Consensus-based feature matching")]
struct Cli {
    /// Run configuration YAML; defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Single-language run: one oracle call, aligned output
    #[command(name = "match")]
    Match {
        /// Master list CSV (code,name,is_title)
        #[arg(long)]
        master: PathBuf,

        /// Source text file
        #[arg(long)]
        input: PathBuf,

        /// Source language
        #[arg(long, value_enum)]
        language: CliLanguage,

        /// Result CSV path
        #[arg(long)]
        output: PathBuf,
    },

    /// Dual-language run: independent LV and EN passes, merged per row
    Dual {
        #[arg(long)]
        master: PathBuf,

        /// Latvian source text file
        #[arg(long)]
        lv_input: PathBuf,

        /// English source text file
        #[arg(long)]
        en_input: PathBuf,

        #[arg(long)]
        output: PathBuf,
    },

    /// Consensus run: N independent attempts, unanimity-for-Yes tally
    Consensus {
        #[arg(long)]
        master: PathBuf,

        #[arg(long)]
        input: PathBuf,

        #[arg(long, value_enum)]
        language: CliLanguage,

        /// Override the configured attempt count
        #[arg(long)]
        attempts: Option<usize>,

        #[arg(long)]
        output: PathBuf,
    },

    /// Rerun over a reviewed prior result; human Yes/Maybe rows are kept
    Rerun {
        #[arg(long)]
        master: PathBuf,

        #[arg(long)]
        input: PathBuf,

        /// Prior (reviewed) result CSV
        #[arg(long)]
        prior: PathBuf,

        #[arg(long, value_enum)]
        language: CliLanguage,

        #[arg(long)]
        output: PathBuf,
    },

    /// Feed a reviewed result CSV into the learning store
    Learn {
        /// Reviewed result CSV
        #[arg(long)]
        reviewed: PathBuf,

        #[arg(long, value_enum)]
        language: CliLanguage,
    },

    /// Learning store row counts
    Stats,

    /// Dump all learned knowledge as JSON
    ExportKnowledge {
        /// Output path; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CliLanguage {
    Lv,
    En,
}

impl From<CliLanguage> for Language {
    fn from(value: CliLanguage) -> Self {
        match value {
            CliLanguage::Lv => Language::Lv,
            CliLanguage::En => Language::En,
        }
    }
}

fn load_config(path: &Option<PathBuf>) -> Result<RunConfig> {
    match path {
        Some(p) => RunConfig::from_yaml_file(p)
            .with_context(|| format!("loading config {}", p.display())),
        None => Ok(RunConfig::default()),
    }
}

fn build_oracle(config: &RunConfig) -> Result<Arc<dyn Oracle>> {
    #[cfg(feature = "openai")]
    {
        let oracle_config = ticksheet_runtime::OracleConfig {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout: config.timeout,
        };
        let oracle = ticksheet_runtime::OpenAiOracle::from_env(oracle_config)?;
        return Ok(Arc::new(oracle));
    }

    #[cfg(not(feature = "openai"))]
    {
        let _ = config;
        bail!("no oracle provider compiled in; rebuild with --features openai");
    }
}

fn open_store(config: &RunConfig) -> Result<Option<Arc<LearningStore>>> {
    match &config.store_path {
        Some(path) => {
            let store = LearningStore::open(path)
                .with_context(|| format!("opening learning store {}", path.display()))?;
            Ok(Some(Arc::new(store)))
        }
        None => Ok(None),
    }
}

fn build_pipeline(config: RunConfig) -> Result<Pipeline> {
    let oracle = build_oracle(&config)?;
    let store = open_store(&config)?;
    let mut pipeline = Pipeline::new(oracle, config);
    if let Some(store) = store {
        pipeline = pipeline.with_store(store);
    }
    Ok(pipeline)
}

fn read_text(path: &PathBuf) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn write_result(path: &PathBuf, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Match {
            master,
            input,
            language,
            output: out_path,
        } => {
            let master = MasterList::from_csv_file(&master)?;
            let text = read_text(&input)?;
            let pipeline = build_pipeline(config)?;
            let result = pipeline
                .run_single(&master, &text, language.into())
                .await?;
            write_result(&out_path, &output::single_csv(&result.rows))?;
        }

        Command::Dual {
            master,
            lv_input,
            en_input,
            output: out_path,
        } => {
            let master = MasterList::from_csv_file(&master)?;
            let lv = read_text(&lv_input)?;
            let en = read_text(&en_input)?;
            let pipeline = build_pipeline(config)?;
            let merged = pipeline.run_dual(&master, &lv, &en).await?;
            write_result(&out_path, &output::dual_csv(&merged))?;
        }

        Command::Consensus {
            master,
            input,
            language,
            attempts,
            output: out_path,
        } => {
            let master = MasterList::from_csv_file(&master)?;
            let text = read_text(&input)?;
            let mut config = config;
            if let Some(attempts) = attempts {
                if attempts == 0 {
                    bail!("attempts must be at least 1");
                }
                config.attempts = attempts;
            }
            let pipeline = build_pipeline(config)?;
            let result = pipeline
                .run_consensus_round(&master, &text, language.into())
                .await?;
            write_result(&out_path, &output::consensus_csv(&result.tallies))?;
        }

        Command::Rerun {
            master,
            input,
            prior,
            language,
            output: out_path,
        } => {
            let master = MasterList::from_csv_file(&master)?;
            let text = read_text(&input)?;
            let prior = output::read_output_csv(&read_text(&prior)?)?;
            let pipeline = build_pipeline(config)?;
            let result = pipeline
                .rerun_with_review(&master, &prior, &text, language.into())
                .await?;
            write_result(&out_path, &output::single_csv(&result.rows))?;
        }

        Command::Learn { reviewed, language } => {
            let store = open_store(&config)?
                .context("learn requires store_path in the run configuration")?;
            let reviewed = output::read_output_csv(&read_text(&reviewed)?)?;
            let summary =
                store.learn_from_results(&reviewed, language.into(), &config.model)?;
            for row in reviewed.iter() {
                if row.is_title || !row.include || row.evidence.is_empty() {
                    continue;
                }
                store.add_dictionary_entry(
                    &row.evidence,
                    &row.code,
                    row.verdict,
                    1.0,
                    "review",
                    true,
                )?;
            }
            println!(
                "learned {} features, {} patterns, {} negative examples",
                summary.features, summary.patterns, summary.negatives
            );
        }

        Command::Stats => {
            let store = open_store(&config)?
                .context("stats requires store_path in the run configuration")?;
            let stats = store.stats()?;
            println!("learned features:  {}", stats.features);
            println!("learned patterns:  {}", stats.patterns);
            println!("negative examples: {}", stats.negatives);
            println!("dictionary:        {}", stats.dictionary);
        }

        Command::ExportKnowledge { output: out_path } => {
            let store = open_store(&config)?
                .context("export-knowledge requires store_path in the run configuration")?;
            let exported = store.export_knowledge()?;
            match out_path {
                Some(path) => write_result(&path, &exported)?,
                None => println!("{}", exported),
            }
        }
    }

    Ok(())
}

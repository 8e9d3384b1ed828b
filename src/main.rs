use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use catalyst_prep::{
    execute_clean, execute_enrich, execute_ingest, execute_inspect, execute_merge,
    execute_multilang, execute_restructure, execute_shape, execute_translate, BatchOptions,
    BatchReport, BatchSettings, ChatClient, CleanPass, HttpFetcher, LlmConfig, PipelineConfig,
};

#[derive(Parser)]
#[command(name = "catalyst-prep")]
#[command(author, version, about = "Multilingual Catalyst proposal dataset pipeline", long_about = None)]
struct Cli {
    /// JSON file overriding the built-in pipeline settings
    #[arg(long, global = true, env = "CATALYST_PREP_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the pipeline's data files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Limits shared by the resumable stages
#[derive(Args, Debug)]
struct BatchArgs {
    /// Maximum external calls in this run
    #[arg(long)]
    max_items: Option<usize>,

    /// Pause between calls in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Save the dataset after this many records (0 disables checkpoints)
    #[arg(long)]
    checkpoint_every: Option<usize>,

    /// Process records that failed on an earlier run
    #[arg(long)]
    retry_failed: bool,

    /// Only process this proposal id
    #[arg(long)]
    id: Option<String>,
}

impl BatchArgs {
    fn options(&self, defaults: &BatchSettings) -> BatchOptions {
        let mut settings = defaults.clone();
        if let Some(max) = self.max_items {
            settings.max_items = Some(max);
        }
        if let Some(delay) = self.delay_ms {
            settings.delay_ms = delay;
        }
        if let Some(every) = self.checkpoint_every {
            settings.checkpoint_every = every;
        }

        BatchOptions {
            retry_failed: self.retry_failed,
            only_id: self.id.clone(),
            ..BatchOptions::from_settings(&settings)
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Read the results spreadsheet (xlsx/xls/ods/csv) into raw rows JSON
    Ingest {
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Turn raw rows into the English proposal dataset
    Shape {
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fetch each proposal page and store its text sections
    Scrape {
        /// English dataset, updated in place
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Page to fetch instead of the stored url (requires --id)
        #[arg(long, requires = "id")]
        url: Option<String>,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Generate the structured English document with the LLM
    Structure {
        /// English dataset, updated in place
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Translate titles and summaries into Japanese
    Translate {
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Produce Japanese, Easy Japanese and Easy Spanish structured documents
    Multilang {
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Repair title and whitespace artifacts in the Japanese dataset
    Clean {
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Write here instead of overwriting the input
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Passes to run (all when omitted)
        #[arg(long = "pass", value_enum)]
        passes: Vec<CleanPass>,
    },

    /// Merge the English and Japanese datasets for the site
    Merge {
        #[arg(long)]
        en: Option<PathBuf>,
        #[arg(long)]
        ja: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print keys, long field previews and stage progress of a dataset
    Inspect {
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    let file = |given: Option<PathBuf>, name: &str| given.unwrap_or_else(|| config.path(name));

    match cli.command {
        Commands::Ingest { input, output } => {
            let input = file(input, &config.files.source);
            let output = file(output, &config.files.raw_rows);
            let result = execute_ingest(&config, &input, &output)?;
            info!("Ingest complete: {} rows", result.rows.len());
        }
        Commands::Shape { input, output } => {
            let input = file(input, &config.files.raw_rows);
            let output = file(output, &config.files.proposals_en);
            let result = execute_shape(&config, &input, &output)?;
            info!(
                "Shape complete: {} records, {} rows dropped, {} carried over",
                result.records.len(),
                result.dropped,
                result.carried_over
            );
        }
        Commands::Scrape { input, url, batch } => {
            let dataset = file(input, &config.files.proposals_en);
            let fetcher = HttpFetcher::new().context("Failed to build HTTP client")?;
            let report = execute_enrich(
                &fetcher,
                &dataset,
                &batch.options(&config.scrape),
                url.as_deref(),
            )
            .await?;
            log_report("Scrape", &report);
        }
        Commands::Structure { input, batch } => {
            let dataset = file(input, &config.files.proposals_en);
            let client = chat_client(&config)?;
            let report = execute_restructure(
                &client,
                config.llm.structure_temperature,
                &dataset,
                &batch.options(&config.structure),
            )
            .await?;
            log_report("Structure", &report);
        }
        Commands::Translate {
            input,
            output,
            batch,
        } => {
            let input = file(input, &config.files.proposals_en);
            let output = file(output, &config.files.proposals_ja);
            let client = chat_client(&config)?;
            let report = execute_translate(
                &client,
                config.llm.translate_temperature,
                &input,
                &output,
                &batch.options(&config.translate),
            )
            .await?;
            log_report("Translate", &report);
        }
        Commands::Multilang {
            input,
            output,
            batch,
        } => {
            let input = file(input, &config.files.proposals_en);
            let output = file(output, &config.files.proposals_multi);
            let client = chat_client(&config)?;
            let report = execute_multilang(
                &client,
                config.llm.translate_temperature,
                &input,
                &output,
                &batch.options(&config.multilang),
            )
            .await?;
            log_report("Multilang", &report);
        }
        Commands::Clean {
            input,
            output,
            passes,
        } => {
            let input = file(input, &config.files.proposals_ja);
            let passes = if passes.is_empty() {
                CleanPass::ALL.to_vec()
            } else {
                passes
            };
            execute_clean(&input, output.as_deref(), &passes)?;
        }
        Commands::Merge { en, ja, output } => {
            let en = file(en, &config.files.proposals_en);
            let ja = file(ja, &config.files.proposals_ja);
            let output = file(output, &config.files.site);
            execute_merge(&en, &ja, &output, &config.challenge_labels)?;
        }
        Commands::Inspect { input } => {
            let input = file(input, &config.files.proposals_ja);
            let report = execute_inspect(&input)?;
            print!("{}", report);
        }
    }

    Ok(())
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn chat_client(config: &PipelineConfig) -> Result<ChatClient> {
    let client = ChatClient::new(LlmConfig::from_env(&config.llm)?);
    info!("Using model {}", client.model());
    Ok(client)
}

fn log_report(stage: &str, report: &BatchReport) {
    info!(
        "{} complete: {} succeeded, {} failed, {} already done{}",
        stage,
        report.succeeded,
        report.failed,
        report.already_done,
        if report.capped { " (stopped at max items)" } else { "" }
    );
}

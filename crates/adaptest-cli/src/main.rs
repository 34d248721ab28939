//! adaptest CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "adaptest", version, about = "IRT adaptive testing engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create starter config and example item bank
    Init,

    /// Validate item bank TOML files
    Validate {
        /// Path to item bank file or directory
        #[arg(long)]
        item_bank: PathBuf,
    },

    /// Replay a response log and report the ability estimate
    Estimate {
        /// Item bank the responses refer to
        #[arg(long)]
        item_bank: PathBuf,

        /// Response log (TOML)
        #[arg(long)]
        responses: PathBuf,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run a Monte Carlo simulation of adaptive sessions
    Simulate {
        /// Item bank to administer from
        #[arg(long)]
        item_bank: PathBuf,

        /// True abilities to simulate (comma-separated)
        #[arg(long, default_value = "-2,-1,0,1,2", allow_hyphen_values = true)]
        thetas: String,

        /// Sessions per ability (overrides config)
        #[arg(long)]
        replications: Option<u32>,

        /// Random seed (overrides config)
        #[arg(long)]
        seed: Option<u64>,

        /// Only use items tagged with these knowledge points
        #[arg(long)]
        filter: Option<String>,

        /// Output directory
        #[arg(long, default_value = "./adaptest-results")]
        output: PathBuf,

        /// Output format: json, markdown, all
        #[arg(long, default_value = "json")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compare two simulation reports
    Compare {
        /// Baseline report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current report JSON
        #[arg(long)]
        current: PathBuf,

        /// RMSE increase that counts as a regression
        #[arg(long, default_value = "0.05")]
        threshold: f64,

        /// Exit code 1 if regressions found
        #[arg(long)]
        fail_on_regression: bool,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Print the test information curve of an item bank
    Info {
        /// Item bank file
        #[arg(long)]
        item_bank: PathBuf,

        /// Lowest ability
        #[arg(long, default_value = "-3", allow_hyphen_values = true)]
        from: f64,

        /// Highest ability
        #[arg(long, default_value = "3", allow_hyphen_values = true)]
        to: f64,

        /// Step between abilities
        #[arg(long, default_value = "0.5")]
        step: f64,
    },

    /// Take an adaptive test interactively
    Take {
        /// Item bank to administer from
        #[arg(long)]
        item_bank: PathBuf,

        /// Examinee identifier
        #[arg(long, default_value = "anonymous")]
        examinee: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("adaptest=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate { item_bank } => commands::validate::execute(item_bank),
        Commands::Estimate {
            item_bank,
            responses,
            format,
            config,
        } => commands::estimate::execute(item_bank, responses, format, config),
        Commands::Simulate {
            item_bank,
            thetas,
            replications,
            seed,
            filter,
            output,
            format,
            config,
        } => commands::simulate::execute(
            item_bank,
            thetas,
            replications,
            seed,
            filter,
            output,
            format,
            config,
        ),
        Commands::Compare {
            baseline,
            current,
            threshold,
            fail_on_regression,
            format,
        } => commands::compare::execute(baseline, current, threshold, fail_on_regression, format),
        Commands::Info {
            item_bank,
            from,
            to,
            step,
        } => commands::info::execute(item_bank, from, to, step),
        Commands::Take {
            item_bank,
            examinee,
            config,
        } => commands::take::execute(item_bank, examinee, config).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

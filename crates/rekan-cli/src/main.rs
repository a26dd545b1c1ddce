//! rekan CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use rekan_core::model::Level;

mod commands;

#[derive(Parser)]
#[command(name = "rekan", version, about = "CBT exam scoring and submission engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create starter config, data directory and sample question bank
    Init,

    /// Validate question bank TOML files
    Validate {
        /// Path to a bank file or directory
        #[arg(long)]
        bank: PathBuf,
    },

    /// Score an answer sheet against a question bank, offline
    Score {
        /// Question bank file
        #[arg(long)]
        bank: PathBuf,

        /// Answer sheet file
        #[arg(long)]
        answers: PathBuf,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Check a license code for a level and show remaining seats
    Activate {
        /// License code
        #[arg(long)]
        license: String,

        /// School level: SD or SMP
        #[arg(long)]
        level: Level,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Score an answer sheet and submit the result under a license
    Submit {
        /// Question bank file
        #[arg(long)]
        bank: PathBuf,

        /// Answer sheet file
        #[arg(long)]
        answers: PathBuf,

        /// Student name
        #[arg(long)]
        student: String,

        /// Class code
        #[arg(long)]
        class: String,

        /// License code
        #[arg(long)]
        license: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show class statistics for one class under one license
    ClassReport {
        /// Class code
        #[arg(long)]
        class: String,

        /// License code
        #[arg(long)]
        license: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Save the report as JSON to this path
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rekan=info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => commands::init::execute().await,
        Commands::Validate { bank } => commands::validate::execute(bank),
        Commands::Score {
            bank,
            answers,
            format,
            config,
        } => commands::score::execute(bank, answers, format, config),
        Commands::Activate {
            license,
            level,
            config,
        } => commands::activate::execute(license, level, config).await,
        Commands::Submit {
            bank,
            answers,
            student,
            class,
            license,
            config,
        } => commands::submit::execute(bank, answers, student, class, license, config).await,
        Commands::ClassReport {
            class,
            license,
            format,
            output,
            config,
        } => commands::class_report::execute(class, license, format, output, config).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

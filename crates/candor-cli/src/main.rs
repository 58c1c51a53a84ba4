//! candor CLI, the command-line front end to the scoring engine.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "candor",
    version,
    about = "Explainable scoring for interview responses"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay transcripts through the engine and score every response
    Run {
        /// Path to a .toml transcript or a directory of transcripts
        #[arg(long)]
        transcript: PathBuf,

        /// Scoring strategy: "rule-based" or a configured provider name
        #[arg(long)]
        strategy: Option<String>,

        /// Scoring profile (overrides the config file)
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Output directory (overrides the config file)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: json, html, markdown, all
        #[arg(long, default_value = "json")]
        format: String,

        /// Leave the session open; its summary is then provisional
        #[arg(long)]
        keep_open: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Summarize a saved session
    Summarize {
        /// Session JSON written by `candor run`
        #[arg(long)]
        session: PathBuf,

        /// Output format: text, json, markdown, html
        #[arg(long, default_value = "text")]
        format: String,

        /// Write the report here instead of stdout (markdown, html)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Scoring profile (overrides the config file)
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the evidence spans found in a response
    Extract {
        /// Response text (reads --file when absent)
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,

        /// File containing the response text
        #[arg(long)]
        file: Option<PathBuf>,

        /// Question type: behavioral, technical, situational
        #[arg(long = "type")]
        question_type: String,

        /// Question text, enables question-keyword evidence
        #[arg(long)]
        question: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Validate transcripts and scoring profiles
    Validate {
        /// Transcript file or directory
        #[arg(long)]
        transcript: Option<PathBuf>,

        /// Scoring profile file
        #[arg(long)]
        profile: Option<PathBuf>,
    },

    /// Create a starter config, scoring profile and sample transcript
    Init,
}

#[tokio::main]
async fn main() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "candor=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            transcript,
            strategy,
            profile,
            output,
            format,
            keep_open,
            config,
        } => {
            commands::run::execute(commands::run::RunArgs {
                transcript,
                strategy,
                profile,
                output,
                format,
                keep_open,
                config,
            })
            .await
        }
        Commands::Summarize {
            session,
            format,
            output,
            profile,
            config,
        } => commands::summarize::execute(session, format, output, profile, config),
        Commands::Extract {
            text,
            file,
            question_type,
            question,
            json,
        } => commands::extract::execute(text, file, question_type, question, json),
        Commands::Validate {
            transcript,
            profile,
        } => commands::validate::execute(transcript, profile),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

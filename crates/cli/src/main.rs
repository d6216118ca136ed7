//! EvoWeb CLI — the main entry point.
//!
//! Commands:
//! - `generate` — Personalize one page from signals and print it
//! - `latest`   — Print the last generated page
//! - `profiles` — List the profile catalog and interest rules
//! - `serve`    — Start the HTTP server
//! - `status`   — Show configuration, engine and visit state
//! - `onboard`  — Write a default config file

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "evoweb",
    about = "EvoWeb — on-device webpage personalization",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Personalize a page and print the HTML
    Generate {
        /// A signal as key=value (repeatable)
        #[arg(short, long = "signal", value_parser = commands::generate::parse_signal)]
        signals: Vec<(String, String)>,

        /// A raw Cookie header to read signals from
        #[arg(short, long)]
        cookie: Option<String>,

        /// Pin a catalog profile instead of rotating by visit count
        #[arg(short, long)]
        profile: Option<String>,

        /// Use the offline echo backend
        #[arg(long)]
        offline: bool,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the last generated page
    Latest {
        /// Print as JSON with the generation timestamp
        #[arg(long)]
        json: bool,
    },

    /// List profiles and interest rules
    Profiles,

    /// Start the HTTP server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show configuration and state
    Status,

    /// Write a default configuration file
    Onboard,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Generate {
            signals,
            cookie,
            profile,
            offline,
            json,
        } => {
            commands::generate::run(commands::generate::GenerateArgs {
                signals,
                cookie,
                profile,
                offline,
                json,
            })
            .await?
        }
        Commands::Latest { json } => commands::latest::run(json).await?,
        Commands::Profiles => commands::profiles::run(),
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Status => commands::status::run().await?,
        Commands::Onboard => commands::onboard::run()?,
    }

    Ok(())
}

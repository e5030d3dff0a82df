//! VideoPlanet CLI
//!
//! Command-line interface for the VideoPlanet calendar - event management
//! and live change watching.

use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use vplanet_core::{CalendarApi, CalendarService, Config, EventId};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "vplanet")]
#[command(about = "VideoPlanet - calendar events with realtime sync")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage calendar events
    Event {
        #[command(subcommand)]
        command: EventCommands,
    },
    /// Watch for calendar changes and print them live
    Watch,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show configuration and server reachability
    Status,
}

#[derive(Subcommand)]
enum EventCommands {
    /// List events
    #[command(alias = "ls")]
    List {
        /// Only events on this day (YYYY-MM-DD)
        #[arg(long, conflicts_with_all = ["from", "to"])]
        date: Option<NaiveDate>,
        /// Range start (YYYY-MM-DD), requires --to
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Range end (YYYY-MM-DD), requires --from
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Show event details
    Show {
        /// Event ID
        id: EventId,
    },
    /// Create a new event
    #[command(alias = "add")]
    Create {
        /// Event title
        title: String,
        /// Event date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Event time (HH:MM)
        #[arg(long)]
        time: NaiveTime,
        /// Event description
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Change some fields of an event
    Edit {
        /// Event ID
        id: EventId,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description
        #[arg(short, long)]
        description: Option<String>,
        /// New date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// New time (HH:MM)
        #[arg(long)]
        time: Option<NaiveTime>,
    },
    /// Replace an event's full content
    Replace {
        /// Event ID
        id: EventId,
        /// Event title
        title: String,
        /// Event date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Event time (HH:MM)
        #[arg(long)]
        time: NaiveTime,
        /// Event description
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete an event
    #[command(alias = "rm")]
    Delete {
        /// Event ID
        id: EventId,
    },
    /// Apply partial updates from a JSON file
    Batch {
        /// Path to a JSON file of [{"id": ..., "data": {...}}, ...]
        file: PathBuf,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (api_url, ws_url, auth_token, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands don't need a server connection
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), &output);
    }

    let config = Config::load()?;
    let api = CalendarApi::from_config(&config)?;
    let service = CalendarService::new(config.sync_config()?, api);

    match cli.command {
        Commands::Event { command } => handle_event_command(command, &service, &output).await,
        Commands::Watch => commands::watch::watch(&service, &output).await,
        Commands::Config { .. } => unreachable!(), // Handled above
        Commands::Status => commands::status::show(&config, &output).await,
    }
}

async fn handle_event_command(
    command: EventCommands,
    service: &CalendarService,
    output: &Output,
) -> Result<()> {
    match command {
        EventCommands::List { date, from, to } => {
            commands::event::list(service, date, from, to, output).await
        }
        EventCommands::Show { id } => commands::event::show(service, id, output).await,
        EventCommands::Create {
            title,
            date,
            time,
            description,
        } => commands::event::create(service, title, date, time, description, output).await,
        EventCommands::Edit {
            id,
            title,
            description,
            date,
            time,
        } => commands::event::edit(service, id, title, description, date, time, output).await,
        EventCommands::Replace {
            id,
            title,
            date,
            time,
            description,
        } => commands::event::replace(service, id, title, date, time, description, output).await,
        EventCommands::Delete { id } => commands::event::delete(service, id, output).await,
        EventCommands::Batch { file } => commands::event::batch(service, file, output).await,
    }
}

fn handle_config_command(command: Option<ConfigCommands>, output: &Output) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(output),
        Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, output),
    }
}

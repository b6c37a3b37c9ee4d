//! Command-line interface for the reception agent.
//!
//! Provides commands for processing a call recording into a ticket and for
//! browsing the ticket table.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config;
use crate::core::{AnalysisOutcome, CallPipeline, TicketFilter, TicketStore};
use crate::domain::{Department, Priority, Ticket};

/// reception-agent - turn recorded calls into routed support tickets
#[derive(Parser, Debug)]
#[command(name = "reception-agent")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe, analyze and store one call recording
    Process {
        /// Audio file (wav, mp3, m4a or ogg)
        audio: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the most recent tickets
    Recent {
        /// Maximum number of tickets (defaults to dashboard.recent_limit)
        #[arg(short, long)]
        limit: Option<usize>,

        #[command(flatten)]
        filter: FilterArgs,

        /// Print tickets as JSON
        #[arg(long)]
        json: bool,
    },

    /// List every ticket, newest first
    List {
        #[command(flatten)]
        filter: FilterArgs,

        /// Print tickets as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one ticket in full
    Show {
        /// Ticket ID
        id: i64,

        /// Print the ticket as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the total number of tickets
    Count,

    /// Create the ticket database if it does not exist
    Init,

    /// Show resolved configuration (debug)
    Config,
}

/// Listing filters
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only tickets routed to this department (e.g. Support, HR)
    #[arg(short, long)]
    pub department: Option<Department>,

    /// Only tickets with this priority
    #[arg(short, long)]
    pub priority: Option<Priority>,

    /// Case-insensitive text search
    #[arg(short, long)]
    pub search: Option<String>,
}

impl From<FilterArgs> for TicketFilter {
    fn from(args: FilterArgs) -> Self {
        Self {
            department: args.department,
            priority: args.priority,
            search: args.search,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Process { audio, json } => process_call(audio, json).await,
            Commands::Recent {
                limit,
                filter,
                json,
            } => recent_tickets(filter.into(), limit, json).await,
            Commands::List { filter, json } => list_tickets(filter.into(), None, json).await,
            Commands::Show { id, json } => show_ticket(id, json).await,
            Commands::Count => count_tickets().await,
            Commands::Init => init_store().await,
            Commands::Config => show_config().await,
        }
    }
}

fn open_store() -> Result<TicketStore> {
    let cfg = config::config()?;
    TicketStore::open(&cfg.database)
        .with_context(|| format!("Failed to open ticket database: {}", cfg.database.display()))
}

/// Run the full pipeline on one recording
async fn process_call(audio: PathBuf, json: bool) -> Result<()> {
    let cfg = config::config()?;
    let pipeline = CallPipeline::from_config(cfg, config::api_key()?)?;

    let processed = pipeline
        .process_call(&audio)
        .await
        .with_context(|| format!("Failed to process {}", audio.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&processed)?);
        return Ok(());
    }

    print_ticket(&processed.ticket);

    match &processed.outcome {
        AnalysisOutcome::Validated => {
            eprintln!("\n[Run {} stored ticket #{}]", processed.run_id, processed.ticket.id);
        }
        AnalysisOutcome::Fallback {
            error,
            raw_response,
        } => {
            eprintln!(
                "\n[Run {} stored fallback ticket #{}: {}]",
                processed.run_id, processed.ticket.id, error
            );
            if let Some(raw) = raw_response {
                eprintln!("Raw model response:\n{}", raw);
            }
        }
    }

    Ok(())
}

/// Most recent tickets; the limit defaults to `dashboard.recent_limit`
async fn recent_tickets(filter: TicketFilter, limit: Option<usize>, json: bool) -> Result<()> {
    let limit = match limit {
        Some(limit) => limit,
        None => config::config()?.recent_limit,
    };
    list_tickets(filter, Some(limit), json).await
}

/// List tickets, newest first
async fn list_tickets(filter: TicketFilter, limit: Option<usize>, json: bool) -> Result<()> {
    let store = open_store()?;

    let tickets = store
        .fetch_filtered(&filter, limit)
        .context("Failed to load tickets")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tickets)?);
        return Ok(());
    }

    if tickets.is_empty() {
        if filter.is_empty() {
            println!("No tickets yet");
        } else {
            println!("No tickets match the filter");
        }
        return Ok(());
    }

    println!(
        "{:<6} {:<20} {:<20} {:<16} {:<9} {:<15} {}",
        "ID", "CREATED", "CALLER", "INTENT", "PRIORITY", "DEPARTMENT", "SUMMARY"
    );
    println!("{}", "-".repeat(120));

    for ticket in &tickets {
        println!(
            "{:<6} {:<20} {:<20} {:<16} {:<9} {:<15} {}",
            ticket.id,
            ticket.created_at.chars().take(19).collect::<String>(),
            truncate(ticket.caller_label(), 20),
            ticket.intent_category,
            ticket.priority,
            ticket.department,
            truncate(&ticket.summary_short, 40),
        );
    }

    println!("\nShowing {} of {} ticket(s)", tickets.len(), store.count()?);

    Ok(())
}

/// Show one ticket in full
async fn show_ticket(id: i64, json: bool) -> Result<()> {
    let store = open_store()?;
    let ticket = store
        .get(id)
        .context("Failed to load ticket")?
        .with_context(|| format!("Ticket not found: {}", id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ticket)?);
    } else {
        print_ticket(&ticket);
    }

    Ok(())
}

async fn count_tickets() -> Result<()> {
    let store = open_store()?;
    println!("{}", store.count().context("Failed to count tickets")?);
    Ok(())
}

async fn init_store() -> Result<()> {
    let store = open_store()?;
    println!("Ticket database ready: {}", store.path().display());
    println!("Tickets: {}", store.count()?);
    Ok(())
}

/// Show resolved configuration
async fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("Reception Agent Configuration");
    println!("{}", "=".repeat(40));
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Gemini:");
    println!("  Extraction model:    {}", cfg.model);
    println!("  Transcription model: {}", cfg.stt_model);
    println!("  Base URL:            {}", cfg.base_url);
    println!("  Timeout:             {}s", cfg.timeout.as_secs());
    println!("  Temperature:         {}", cfg.temperature);
    println!(
        "  API key:             {}",
        if config::api_key().is_ok() {
            "set"
        } else {
            "missing"
        }
    );
    println!();
    println!("Storage:");
    println!("  Database:            {}", cfg.database.display());
    println!();
    println!("Dashboard:");
    println!("  Recent limit:        {}", cfg.recent_limit);

    Ok(())
}

fn print_ticket(ticket: &Ticket) {
    println!("Ticket #{}", ticket.id);
    println!("Created:    {}", ticket.created_at);
    println!("Caller:     {}", ticket.caller_label());
    println!(
        "Contact:    {}",
        ticket.caller_contact.as_deref().unwrap_or("-")
    );
    println!("Intent:     {}", ticket.intent_category);
    println!("Department: {}", ticket.department);
    println!("Priority:   {}", ticket.priority);
    println!("Sentiment:  {}", ticket.sentiment);
    println!();
    println!("Summary: {}", ticket.summary_short);
    println!();
    println!("{}", ticket.summary_full);
    println!();
    println!("Transcript:");
    if ticket.transcript.is_empty() {
        println!("  (empty)");
    } else {
        println!("{}", ticket.transcript);
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let kept: String = value.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

mod client;
mod commands;
mod render;
mod utils;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use fleetdesk_core::config::Preferences;
use fleetdesk_core::history::HistoryFilter;
use fleetdesk_core::{BookingStatus, ResourceKind, WindowArgs};

use crate::client::HttpBackend;

#[derive(Parser)]
#[command(name = "fleetdesk")]
#[command(about = "Review booking requests and assign cars and gear without double-booking")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Either --start/--end or --date/--slot
#[derive(Args)]
struct WindowOpts {
    /// Start (RFC3339 or YYYY-MM-DDTHH:MM, UTC)
    #[arg(long, requires = "end", conflicts_with_all = ["date", "slot"])]
    start: Option<String>,

    /// End (RFC3339 or YYYY-MM-DDTHH:MM, UTC)
    #[arg(long, requires = "start")]
    end: Option<String>,

    /// Date of a named slot (YYYY-MM-DD)
    #[arg(long, requires = "slot")]
    date: Option<String>,

    /// Slot label, e.g. "Morning"
    #[arg(long, requires = "date")]
    slot: Option<String>,
}

impl From<WindowOpts> for WindowArgs {
    fn from(opts: WindowOpts) -> Self {
        WindowArgs {
            start: opts.start,
            end: opts.end,
            date: opts.date,
            slot: opts.slot,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Booking requests waiting for a decision
    Pending,
    /// Approved bookings
    Approved,
    /// Completed, rejected and cancelled bookings, newest first
    History {
        /// all, completed, rejected or cancelled
        #[arg(short, long, default_value = "all")]
        status: HistoryFilter,

        #[arg(short, long, default_value_t = 1)]
        page: usize,

        /// Defaults to the page_size preference
        #[arg(long)]
        page_size: Option<usize>,
    },
    /// Cars and gear
    Resources,
    /// Register a car or gear item
    AddResource {
        label: String,

        /// car or gear
        #[arg(short, long, default_value = "car")]
        kind: ResourceKind,

        /// Units, for multi-unit gear
        #[arg(short, long)]
        quantity: Option<u32>,
    },
    /// File a booking request
    Request {
        requester: String,

        #[command(flatten)]
        window: WindowOpts,

        /// Resource asked for (gear bookings name one up front)
        #[arg(short, long)]
        resource: Option<String>,

        #[arg(long)]
        purpose: Option<String>,
    },
    /// Show which resources could take a booking
    Picker { booking: String },
    /// Check one resource against a window
    Check {
        resource: String,

        #[command(flatten)]
        window: WindowOpts,

        /// Booking under edit, ignored when looking for overlaps
        #[arg(long)]
        exclude: Option<String>,
    },
    /// Assign (or reassign) a resource to a booking
    Assign { booking: String, resource: String },
    /// Approve a pending booking with an assigned resource
    Approve { booking: String },
    /// Reject a pending booking
    Reject {
        booking: String,

        #[arg(short, long)]
        reason: String,
    },
    /// Cancel a pending or approved booking
    Cancel { booking: String },
    /// Check a booking in
    Complete { booking: String },
    /// Put a resource into maintenance, or take it out with --off
    Maintenance {
        resource: String,

        #[arg(long)]
        off: bool,
    },
    /// Live dashboard, refreshed on every change
    Watch,
    /// Show paths and preferences, or change them
    Config(ConfigEdits),
}

#[derive(Args)]
pub struct ConfigEdits {
    /// Server the CLI talks to
    #[arg(long)]
    server_url: Option<String>,

    /// Rows per history page
    #[arg(long)]
    page_size: Option<usize>,

    /// Ring the bell on new requests while watching (true/false)
    #[arg(long)]
    sound: Option<bool>,
}

impl ConfigEdits {
    fn is_empty(&self) -> bool {
        self.server_url.is_none() && self.page_size.is_none() && self.sound.is_none()
    }

    fn apply(&self, prefs: &mut Preferences) {
        if let Some(url) = &self.server_url {
            prefs.server_url = url.clone();
        }
        if let Some(size) = self.page_size {
            prefs.page_size = size;
        }
        if let Some(sound) = self.sound {
            prefs.sound = sound;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetdesk=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let prefs = Preferences::load()?;

    if let Commands::Config(edits) = &cli.command {
        return commands::config::run(&prefs, edits);
    }

    let client = HttpBackend::connect(&prefs).await?;

    match cli.command {
        Commands::Pending => commands::bookings::list(&client, BookingStatus::Pending).await,
        Commands::Approved => commands::bookings::list(&client, BookingStatus::Approved).await,
        Commands::History {
            status,
            page,
            page_size,
        } => {
            let page_size = page_size.unwrap_or_else(|| prefs.page_size());
            commands::history::run(&client, status, page, page_size).await
        }
        Commands::Resources => commands::resources::list(&client).await,
        Commands::AddResource {
            label,
            kind,
            quantity,
        } => commands::resources::add(&client, label, kind, quantity).await,
        Commands::Request {
            requester,
            window,
            resource,
            purpose,
        } => commands::bookings::request(&client, requester, window.into(), resource, purpose).await,
        Commands::Picker { booking } => commands::picker::run(&client, &booking).await,
        Commands::Check {
            resource,
            window,
            exclude,
        } => commands::check::run(&client, &resource, window.into(), exclude).await,
        Commands::Assign { booking, resource } => {
            commands::lifecycle::assign(&client, &booking, &resource).await
        }
        Commands::Approve { booking } => commands::lifecycle::approve(&client, &booking).await,
        Commands::Reject { booking, reason } => {
            commands::lifecycle::reject(&client, &booking, &reason).await
        }
        Commands::Cancel { booking } => commands::lifecycle::cancel(&client, &booking).await,
        Commands::Complete { booking } => commands::lifecycle::complete(&client, &booking).await,
        Commands::Maintenance { resource, off } => {
            commands::resources::maintenance(&client, &resource, off).await
        }
        Commands::Watch => commands::watch::run(client, &prefs).await,
        Commands::Config(edits) => commands::config::run(&prefs, &edits),
    }
}

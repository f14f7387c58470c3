mod client;
mod commands;
mod config;
mod error;
mod feed;
mod forms;
mod identity;
mod models;
mod progress;
mod schedule;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use client::HttpClient;
use commands::Session;
use forms::{DonationForm, EventDetails};

/// GreenMates: community recycling collections and environmental workshops.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to config file
    #[arg(short = 'c', long, default_value = "greenmates.toml", global = true)]
    config: PathBuf,

    /// Bearer token from the identity provider (overrides the config file)
    #[arg(short = 't', long, global = true)]
    token: Option<String>,

    /// Log requests and raw API responses
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the collaborator record of the signed-in user
    Whoami,

    /// Register the signed-in user as a collaborator
    Register {
        #[arg(short = 'u', long)]
        username: String,

        #[arg(short = 'e', long)]
        email: String,
    },

    /// List the user's collections and workshops with their progress
    Events,

    /// Show one collection with every donation
    Collection {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Show one workshop with everyone attending
    Workshop {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Create a recycling collection
    ///
    /// Example:
    ///   create-collection --date 2025-01-01 --start 10:00 --end 12:00 \
    ///       --lat 19.4326 --lon -99.1332 --limit 20
    CreateCollection {
        #[command(flatten)]
        details: DetailsArgs,
    },

    /// Create a workshop
    CreateWorkshop {
        #[arg(long)]
        title: String,

        /// transport, energy, consumption or waste
        #[arg(long)]
        pillar: String,

        #[command(flatten)]
        details: DetailsArgs,
    },

    /// Record recyclables donated to a collection (kilograms per material)
    Donate {
        #[arg(value_name = "ID")]
        id: String,

        /// Federated id of the person donating (defaults to the signed-in user)
        #[arg(long, value_name = "FBID")]
        contributor: Option<String>,

        #[arg(long, default_value = "")]
        paper: String,

        #[arg(long, default_value = "")]
        cardboard: String,

        #[arg(long, default_value = "")]
        metal: String,

        #[arg(long, default_value = "")]
        plastic: String,

        #[arg(long, default_value = "")]
        glass: String,

        #[arg(long, default_value = "")]
        tetrapack: String,
    },

    /// Record someone attending a workshop
    Attend {
        #[arg(value_name = "ID")]
        id: String,

        /// Federated id of the attendee (defaults to the signed-in user)
        #[arg(long, value_name = "FBID")]
        contributor: Option<String>,
    },
}

/// When and where an event happens. Times are in the configured time zone.
#[derive(Args, Debug)]
struct DetailsArgs {
    /// Day of the event (YYYY-MM-DD)
    #[arg(long)]
    date: String,

    /// Start time (HH:MM)
    #[arg(long)]
    start: String,

    /// End time (HH:MM)
    #[arg(long)]
    end: String,

    #[arg(long, allow_hyphen_values = true)]
    lat: String,

    #[arg(long, allow_hyphen_values = true)]
    lon: String,

    /// Maximum number of participants
    #[arg(long)]
    limit: String,
}

impl From<DetailsArgs> for EventDetails {
    fn from(args: DetailsArgs) -> Self {
        EventDetails {
            date: args.date,
            start: args.start,
            end: args.end,
            latitude: args.lat,
            longitude: args.lon,
            limit: args.limit,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cfg = config::load_config(&cli.config)?;
    let token = cli.token.clone().or_else(|| cfg.session.token.clone());
    let federated_id =
        identity::resolve_federated_id(cfg.session.federated_id.as_deref(), token.as_deref())
            .context("No federated id: set session.federated_id or provide a token")?;
    debug!("Acting as {}", federated_id);

    let api = HttpClient::new(&cfg.api.base_url, cfg.api.timeout(), token)?;
    let session = Session {
        api: Arc::new(api),
        federated_id,
        tz: cfg.display.tz()?,
    };

    match cli.command {
        Command::Whoami => commands::run_whoami(&session).await?,
        Command::Register { username, email } => {
            commands::run_register(&session, &username, &email).await?
        }
        Command::Events => commands::run_events(&session).await?,
        Command::Collection { id } => commands::run_collection(&session, &id).await?,
        Command::Workshop { id } => commands::run_workshop(&session, &id).await?,
        Command::CreateCollection { details } => {
            commands::run_create_collection(&session, &details.into()).await?
        }
        Command::CreateWorkshop {
            title,
            pillar,
            details,
        } => commands::run_create_workshop(&session, &title, &pillar, &details.into()).await?,
        Command::Donate {
            id,
            contributor,
            paper,
            cardboard,
            metal,
            plastic,
            glass,
            tetrapack,
        } => {
            let form = DonationForm {
                paper,
                cardboard,
                metal,
                plastic,
                glass,
                tetrapack,
            };
            commands::run_donate(&session, &id, contributor.as_deref(), &form).await?
        }
        Command::Attend { id, contributor } => {
            commands::run_attend(&session, &id, contributor.as_deref()).await?
        }
    }

    Ok(())
}

use clap::{Parser, Subcommand};
use nightlife_scraper::apis::fatsoma::FatsomaApi;
use nightlife_scraper::apis::fixr::FixrTransferApi;
use nightlife_scraper::config::Config;
use nightlife_scraper::db::{EventCleanup, EventSyncer, SupabaseClient};
use nightlife_scraper::parsing::last_entry::LastEntryParser;
use nightlife_scraper::parsing::organizer::OrganizerMatcher;
use nightlife_scraper::server::{self, AppState};
use nightlife_scraper::tasks::{self, SyncStatus};
use nightlife_scraper::{error::Result, logging};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "nightlife_scraper")]
#[command(about = "Nightlife event and ticket scraper")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API with the background sync scheduler
    Serve {
        /// Port to listen on
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    /// Run one scrape-and-sync pass and exit
    Sync,
    /// Remove events whose night is over
    Cleanup {
        /// List past events without deleting them
        #[arg(long)]
        dry_run: bool,
    },
    /// Classify an organizer name against a venue
    Categorize {
        /// Organizer name as shown on the listing
        name: String,
        /// Venue name to compare against
        #[arg(long, default_value = "")]
        location: String,
    },
}

fn build_state(config: Config) -> Result<Arc<AppState>> {
    let client = SupabaseClient::from_env()?;
    let parser = LastEntryParser::new(config.parser.pm_assumption());
    let matcher = OrganizerMatcher::new(config.matcher.similarity_threshold);

    Ok(Arc::new(AppState {
        fatsoma: FatsomaApi::new(&config.scraper),
        fixr: FixrTransferApi::new(parser.clone()),
        syncer: EventSyncer::new(client.clone(), matcher, parser),
        cleanup: EventCleanup::new(client),
        status: SyncStatus::default(),
        config,
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load_or_default();

    match cli.command {
        Commands::Serve { port } => {
            let state = build_state(config)?;
            server::start_server(state, port).await?;
        }
        Commands::Sync => {
            let state = build_state(config)?;
            let results = tasks::run_full_sync(state).await;
            println!(
                "\n📊 Sync results: {} synced ({} created, {} updated), {} errors",
                results.success, results.created, results.updated, results.errors
            );
        }
        Commands::Cleanup { dry_run } => {
            let cleanup = EventCleanup::new(SupabaseClient::from_env()?);
            let past = cleanup.archive_past_events(dry_run).await?;
            for event in &past {
                println!("🗑️  {} (ended {})", event.name, event.event_end);
            }
            if dry_run {
                println!("\n{} past events would be removed", past.len());
            } else {
                println!("\n{} past events removed", past.len());
            }
        }
        Commands::Categorize { name, location } => {
            let matcher = OrganizerMatcher::new(config.matcher.similarity_threshold);
            let info = matcher.organizer_info(&name, &location);
            println!(
                "{} → {} ({:.0}% confidence)",
                name,
                info.category,
                info.confidence * 100.0
            );
            if let Some(venue) = info.home_venue {
                println!("   home venue: {}", venue);
            }
        }
    }

    Ok(())
}

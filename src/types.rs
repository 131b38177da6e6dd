use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which external platform an event was scraped from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Fatsoma,
    Fixr,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Fatsoma => write!(f, "fatsoma"),
            Platform::Fixr => write!(f, "fixr"),
        }
    }
}

/// Sale state of a ticket tier as reported by the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketAvailability {
    Available,
    SoldOut,
    Unavailable,
}

impl fmt::Display for TicketAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketAvailability::Available => write!(f, "Available"),
            TicketAvailability::SoldOut => write!(f, "Sold Out"),
            TicketAvailability::Unavailable => write!(f, "Unavailable"),
        }
    }
}

/// One ticket tier belonging to a scraped event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedTicket {
    pub ticket_type: String,
    pub price: f64,
    pub currency: String,
    pub availability: TicketAvailability,
}

/// Normalized event data as produced by the platform scrapers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedEvent {
    /// Platform-side identifier (UUID for the marketplace, URL-derived for Fixr)
    pub event_id: String,
    pub name: String,
    /// Organizer/brand name as shown on the listing
    pub company: String,
    pub company_logo_url: String,
    pub start: Option<DateTime<Utc>>,
    /// Start time as displayed ("22:00")
    pub time: String,
    /// Event-level last entry, free text straight from the source
    pub last_entry: Option<String>,
    /// Venue name
    pub location: String,
    pub city: String,
    pub age_restriction: String,
    pub url: String,
    pub image_url: String,
    /// End timestamp where the source provides one; used for future-only filtering
    pub end: Option<DateTime<Utc>>,
    pub platform: Platform,
    pub tickets: Vec<ScrapedTicket>,
}

/// Core trait implemented by each platform scraper
#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    /// Unique identifier for this source
    fn source_name(&self) -> &'static str;

    /// Fetch events for a city, newest-first capped at `limit`
    async fn fetch_events(&self, city: &str, limit: usize) -> Result<Vec<ScrapedEvent>>;
}

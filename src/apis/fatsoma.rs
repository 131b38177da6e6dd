//! Fatsoma marketplace scraper, built on the platform's public JSON:API
//! rather than HTML crawling.

use crate::config::ScraperConfig;
use crate::error::{Result, ScraperError};
use crate::types::{EventSource, Platform, ScrapedEvent, ScrapedTicket, TicketAvailability};
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

const BASE_URL: &str = "https://api.fatsoma.com/v1";
const PAGE_SIZE: usize = 50;
const MAX_PAGES: usize = 50;
const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";
const MANUAL_CONFIG_PATH: &str = "manual_organizers.json";

static TIER_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d+)\b").unwrap());

/// Hand-maintained list of organizers and one-off events to track in
/// addition to the city feeds
#[derive(Debug, Default, Deserialize)]
pub struct ManualConfig {
    #[serde(default)]
    pub manual_event_uuids: Vec<ManualEvent>,
    #[serde(default)]
    pub organizers: Vec<ManualOrganizer>,
}

#[derive(Debug, Deserialize)]
pub struct ManualEvent {
    pub event_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ManualOrganizer {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub page_id: Option<String>,
    #[serde(default)]
    pub vanity_url: Option<String>,
}

pub struct FatsomaApi {
    client: reqwest::Client,
    base_url: String,
    min_delay_ms: u64,
    max_delay_ms: u64,
}

impl FatsomaApi {
    pub fn new(config: &ScraperConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: BASE_URL.to_string(),
            min_delay_ms: config.min_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }

    /// Fetch upcoming events for a city.
    ///
    /// The API's own location filter drops events, so pages are fetched
    /// unfiltered (up to 3x the requested limit) and filtered by city here.
    #[instrument(skip(self))]
    pub async fn scrape_events(
        &self,
        location: &str,
        limit: usize,
        future_only: bool,
    ) -> Result<Vec<ScrapedEvent>> {
        let mut all_events = Vec::new();
        let mut page = 1;

        while all_events.len() < limit * 3 && page <= MAX_PAGES {
            let url = format!(
                "{}/events?include=location,page&page[number]={}&page[size]={}",
                self.base_url, page, PAGE_SIZE
            );
            debug!("Fetching page {} from {}", page, url);

            let data = self.get_json(&url).await?;
            let event_list = data["data"].as_array().cloned().unwrap_or_default();
            if event_list.is_empty() {
                debug!("No more events found on page {}", page);
                break;
            }

            let included = index_included(&data);
            for event_data in &event_list {
                match self.parse_event(event_data, &included).await {
                    Ok(event) => all_events.push(event),
                    Err(e) => {
                        warn!("Error parsing event: {}", e);
                        continue;
                    }
                }
            }

            debug!(
                "Page {}: fetched {} events (total: {})",
                page,
                event_list.len(),
                all_events.len()
            );

            if data["links"]["next"].is_null() {
                debug!("Reached last page ({})", page);
                break;
            }
            page += 1;
            self.polite_delay().await;
        }

        let mut city_events: Vec<ScrapedEvent> = if location.is_empty() {
            all_events
        } else {
            let needle = location.to_lowercase();
            let total = all_events.len();
            let filtered: Vec<ScrapedEvent> = all_events
                .into_iter()
                .filter(|e| e.city.to_lowercase().contains(&needle))
                .collect();
            info!(
                "Filtered {} total events to {} events in {}",
                total,
                filtered.len(),
                location
            );
            filtered
        };

        if future_only {
            let now = Utc::now();
            city_events.retain(|e| match (e.end, e.start) {
                // Prefer the end timestamp: a resale marketplace still wants
                // events that have started but not finished
                (Some(end), _) => end > now,
                (None, Some(start)) => start > now,
                (None, None) => false,
            });
            city_events.sort_by_key(|e| e.start.unwrap_or(DateTime::<Utc>::MAX_UTC));
        }

        city_events.truncate(limit);
        info!(
            "Successfully fetched {} events from {}",
            city_events.len(),
            location
        );
        Ok(city_events)
    }

    /// Fetch a single event by its platform UUID
    pub async fn fetch_event_by_uuid(&self, event_id: &str) -> Result<ScrapedEvent> {
        let url = format!("{}/events/{}?include=location,page", self.base_url, event_id);
        let data = self.get_json(&url).await?;
        let included = index_included(&data);
        self.parse_event(&data["data"], &included).await
    }

    /// Resolve an organizer vanity name ("fnd_wrld") to its page id
    pub async fn organizer_page_id(&self, vanity_url: &str) -> Result<String> {
        let url = format!("{}/pages/{}", self.base_url, vanity_url);
        let data = self.get_json(&url).await?;
        data["data"]["id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ScraperError::MissingField(format!("page id for {}", vanity_url)))
    }

    /// Upcoming events for an organizer page within the next `days_ahead` days
    pub async fn organizer_upcoming_events(
        &self,
        page_id: &str,
        days_ahead: i64,
    ) -> Result<Vec<ScrapedEvent>> {
        let now = Utc::now();
        let cutoff = now + Duration::days(days_ahead);
        let mut events = Vec::new();
        let mut page = 1;

        while page <= 5 {
            let url = format!(
                "{}/pages/{}/events?include=location,page&page[number]={}&page[size]={}",
                self.base_url, page_id, page, PAGE_SIZE
            );
            let data = self.get_json(&url).await?;
            let event_list = data["data"].as_array().cloned().unwrap_or_default();
            if event_list.is_empty() {
                break;
            }

            let included = index_included(&data);
            for event_data in &event_list {
                match self.parse_event(event_data, &included).await {
                    Ok(event) => {
                        let in_window = match (event.end, event.start) {
                            (Some(end), _) => now < end && end <= cutoff,
                            (None, Some(start)) => now < start && start <= cutoff,
                            (None, None) => false,
                        };
                        if in_window {
                            events.push(event);
                        }
                    }
                    Err(e) => {
                        warn!("Error parsing organizer event: {}", e);
                        continue;
                    }
                }
            }

            if data["links"]["next"].is_null() {
                break;
            }
            page += 1;
            self.polite_delay().await;
        }

        Ok(events)
    }

    /// Fetch one-off events and tracked organizers from manual_organizers.json.
    /// A missing or unreadable config is not an error, just an empty batch.
    pub async fn fetch_manual_events(&self) -> Vec<ScrapedEvent> {
        let config = match load_manual_config(Path::new(MANUAL_CONFIG_PATH)) {
            Some(config) => config,
            None => return Vec::new(),
        };

        let mut all_events = Vec::new();

        for manual in &config.manual_event_uuids {
            info!("Fetching manual event UUID: {}", manual.event_id);
            match self.fetch_event_by_uuid(&manual.event_id).await {
                Ok(event) => all_events.push(event),
                Err(e) => warn!("Error fetching manual event {}: {}", manual.event_id, e),
            }
        }

        for organizer in &config.organizers {
            let page_id = match &organizer.page_id {
                Some(id) => Some(id.clone()),
                None => match &organizer.vanity_url {
                    Some(vanity) => {
                        info!("Fetching events for organizer: {}", vanity);
                        match self.organizer_page_id(vanity).await {
                            Ok(id) => Some(id),
                            Err(e) => {
                                warn!("Error resolving page {}: {}", vanity, e);
                                None
                            }
                        }
                    }
                    None => None,
                },
            };

            if let Some(page_id) = page_id {
                match self.organizer_upcoming_events(&page_id, 7).await {
                    Ok(events) => {
                        info!(
                            "Found {} upcoming events for {} in the next 7 days",
                            events.len(),
                            organizer.name
                        );
                        all_events.extend(events);
                    }
                    Err(e) => warn!("Error fetching organizer events for {}: {}", organizer.name, e),
                }
            }
        }

        all_events
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ScraperError::Api {
                message: format!("API returned status {} for {}", response.status(), url),
            });
        }

        Ok(response.json().await?)
    }

    /// Build a `ScrapedEvent` from one JSON:API resource plus its included
    /// location and page (brand) resources.
    pub async fn parse_event(
        &self,
        event_data: &Value,
        included: &HashMap<String, Value>,
    ) -> Result<ScrapedEvent> {
        let event_id = event_data["id"]
            .as_str()
            .ok_or_else(|| ScraperError::MissingField("event id not found".into()))?;
        let attrs = &event_data["attributes"];
        let relationships = &event_data["relationships"];

        let mut location_name = String::new();
        let mut city = String::new();
        if let Some(location_id) = relationships["location"]["data"]["id"].as_str() {
            if let Some(location) = included.get(location_id) {
                location_name = location["attributes"]["name"].as_str().unwrap_or("").to_string();
                city = location["attributes"]["city"].as_str().unwrap_or("").to_string();
            }
        }

        let mut company_name = String::new();
        let mut company_logo_url = String::new();
        if let Some(page_id) = relationships["page"]["data"]["id"].as_str() {
            if let Some(brand) = included.get(page_id) {
                company_name = brand["attributes"]["name"].as_str().unwrap_or("").to_string();
                company_logo_url = brand["attributes"]["asset-url"]
                    .as_str()
                    .unwrap_or("")
                    .to_string();
            }
        }

        // Prices come back in pence
        let price_min = attrs["price-min"].as_f64().unwrap_or(0.0) / 100.0;
        let price_max = attrs["price-max"].as_f64().unwrap_or(0.0) / 100.0;

        let starts_at = attrs["starts-at"].as_str().unwrap_or("");
        let start = parse_rfc3339(starts_at);
        let end = attrs["ends-at"].as_str().and_then(parse_rfc3339);
        let time = starts_at
            .split_once('T')
            .map(|(_, t)| t.chars().take(5).collect::<String>())
            .unwrap_or_default();

        let url = format!(
            "https://www.fatsoma.com/e/{}/{}",
            attrs["vanity-name"].as_str().unwrap_or(""),
            attrs["seo-name"].as_str().unwrap_or("")
        );

        let tickets = self.fetch_tickets(event_id, price_min, price_max).await;

        Ok(ScrapedEvent {
            event_id: event_id.to_string(),
            name: attrs["name"].as_str().unwrap_or("").to_string(),
            company: company_name,
            company_logo_url,
            start,
            time,
            last_entry: attrs["last-entry-time"].as_str().map(|s| s.to_string()),
            location: location_name,
            city,
            age_restriction: attrs["age-restrictions"].as_str().unwrap_or("").to_string(),
            url,
            image_url: attrs["asset-url"].as_str().unwrap_or("").to_string(),
            end,
            platform: Platform::Fatsoma,
            tickets,
        })
    }

    /// Fetch ticket tiers for an event; degrades to a single General
    /// Admission ticket built from the event's price range.
    async fn fetch_tickets(
        &self,
        event_id: &str,
        price_min: f64,
        price_max: f64,
    ) -> Vec<ScrapedTicket> {
        let url = format!("{}/events/{}/ticket-options", self.base_url, event_id);

        match self.get_json(&url).await {
            Ok(data) => {
                let mut tickets: Vec<ScrapedTicket> = data["data"]
                    .as_array()
                    .map(|options| {
                        options
                            .iter()
                            .map(|option| parse_ticket(option, price_min, price_max))
                            .collect()
                    })
                    .unwrap_or_default();

                if !tickets.is_empty() {
                    // Phase/tier numbers in the label define display order;
                    // unnumbered tiers go last
                    tickets.sort_by_key(|t| ticket_sort_key(&t.ticket_type));
                    return tickets;
                }
            }
            Err(e) => {
                warn!("Could not fetch detailed tickets for {}: {}", event_id, e);
            }
        }

        if price_min > 0.0 || price_max > 0.0 {
            return vec![ScrapedTicket {
                ticket_type: "General Admission".to_string(),
                price: if price_min > 0.0 { price_min } else { price_max },
                currency: "GBP".to_string(),
                availability: TicketAvailability::Available,
            }];
        }

        Vec::new()
    }

    async fn polite_delay(&self) {
        let delay_ms = {
            let mut rng = rand::thread_rng();
            rng.gen_range(self.min_delay_ms..=self.max_delay_ms.max(self.min_delay_ms))
        };
        tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
    }
}

#[async_trait::async_trait]
impl EventSource for FatsomaApi {
    fn source_name(&self) -> &'static str {
        "fatsoma"
    }

    async fn fetch_events(&self, city: &str, limit: usize) -> Result<Vec<ScrapedEvent>> {
        self.scrape_events(city, limit, true).await
    }
}

fn parse_ticket(option: &Value, price_min: f64, price_max: f64) -> ScrapedTicket {
    let attrs = &option["attributes"];
    let name = attrs["name"].as_str().unwrap_or("General Admission");

    // Sold-out tiers often report no price; fall back to the event range
    let price = match attrs["price"].as_f64() {
        Some(pence) if pence > 0.0 => pence / 100.0,
        _ => {
            if price_min > 0.0 {
                price_min
            } else if price_max > 0.0 {
                price_max
            } else {
                0.0
            }
        }
    };

    let availability = if attrs["sold-out"].as_bool().unwrap_or(false) {
        TicketAvailability::SoldOut
    } else if attrs["on-sale"].as_bool().unwrap_or(false) {
        TicketAvailability::Available
    } else {
        TicketAvailability::Unavailable
    };

    ScrapedTicket {
        ticket_type: name.to_string(),
        price,
        currency: "GBP".to_string(),
        availability,
    }
}

fn ticket_sort_key(ticket_type: &str) -> (u8, u32, String) {
    if let Some(caps) = TIER_NUMBER.captures(ticket_type) {
        if let Ok(n) = caps[1].parse::<u32>() {
            return (0, n, String::new());
        }
    }
    (1, 0, ticket_type.to_string())
}

/// Index the JSON:API `included` array by resource id
pub fn index_included(document: &Value) -> HashMap<String, Value> {
    document["included"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    item["id"]
                        .as_str()
                        .map(|id| (id.to_string(), item.clone()))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn load_manual_config(path: &Path) -> Option<ManualConfig> {
    if !path.exists() {
        debug!("No manual_organizers.json file found");
        return None;
    }
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("Error parsing manual_organizers.json: {}", e);
                None
            }
        },
        Err(e) => {
            warn!("Error reading manual_organizers.json: {}", e);
            None
        }
    }
}

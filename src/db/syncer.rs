//! Sync pass: scraped events into the hosted backend.
//!
//! Each event is upserted keyed on its platform id; tickets are fully
//! replaced on every pass; organizers are created lazily the first time an
//! event references them and only ever accumulate (count increment, logo
//! backfill). One bad event never aborts the batch.

use crate::apis::fixr::TransferEvent;
use crate::db::client::SupabaseClient;
use crate::parsing::last_entry::{self, LastEntryParser};
use crate::parsing::organizer::OrganizerMatcher;
use crate::types::ScrapedEvent;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

pub const EVENTS_TABLE: &str = "fatsoma_events";
pub const TICKETS_TABLE: &str = "fatsoma_tickets";
pub const ORGANIZERS_TABLE: &str = "organizers";
pub const FIXR_EVENTS_TABLE: &str = "fixr_events";

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct SyncResults {
    pub success: usize,
    pub errors: usize,
    pub created: usize,
    pub updated: usize,
}

pub struct EventSyncer {
    client: SupabaseClient,
    matcher: OrganizerMatcher,
    parser: LastEntryParser,
}

impl EventSyncer {
    pub fn new(client: SupabaseClient, matcher: OrganizerMatcher, parser: LastEntryParser) -> Self {
        Self {
            client,
            matcher,
            parser,
        }
    }

    pub fn client(&self) -> &SupabaseClient {
        &self.client
    }

    /// Sync a scraped batch. Failures are logged and tallied, never fatal:
    /// the pass is idempotent and a skipped event heals on the next run.
    pub async fn sync_events(&self, events: &[ScrapedEvent]) -> SyncResults {
        let mut results = SyncResults::default();

        for event in events {
            match self.sync_event(event).await {
                Ok(created) => {
                    results.success += 1;
                    if created {
                        results.created += 1;
                    } else {
                        results.updated += 1;
                    }
                }
                Err(e) => {
                    error!("Error syncing event {}: {}", event.name, e);
                    results.errors += 1;
                }
            }
        }

        info!(
            "Sync complete: {} synced ({} created, {} updated), {} errors",
            results.success, results.created, results.updated, results.errors
        );
        results
    }

    /// Returns true when the event was newly created
    async fn sync_event(&self, event: &ScrapedEvent) -> crate::error::Result<bool> {
        let organizer_id = self
            .get_or_create_organizer(&event.company, &event.location, &event.company_logo_url)
            .await;

        // Store "Venue, City" so a single column is searchable by either
        let full_location = match (event.location.is_empty(), event.city.is_empty()) {
            (false, false) => format!("{}, {}", event.location, event.city),
            (false, true) => event.location.clone(),
            (true, _) => event.city.clone(),
        };

        // The source's last entry is free text; anchor it to the event date.
        // Events without one often encode the rule in a ticket label instead
        let last_entry = match (&event.last_entry, event.start) {
            (Some(text), Some(start)) => self
                .parser
                .parse_time_text(text, start)
                .map(|t| t.to_rfc3339()),
            (None, Some(start)) => event
                .tickets
                .iter()
                .find_map(|ticket| {
                    let phrase = last_entry::entry_phrase(&ticket.ticket_type)?;
                    self.parser.parse_ticket_label(&phrase, start, None).time
                })
                .map(|t| t.to_rfc3339()),
            _ => None,
        };

        let record = json!({
            "event_id": event.event_id,
            "name": event.name,
            "company": event.company,
            "event_date": event.start.map(|s| s.to_rfc3339()),
            "event_time": event.time,
            "last_entry": last_entry,
            "location": full_location,
            "age_restriction": event.age_restriction,
            "url": event.url,
            "image_url": event.image_url,
            "organizer_id": organizer_id,
        });

        let existing = self
            .client
            .select(
                EVENTS_TABLE,
                &[
                    ("select", "id,event_id"),
                    ("event_id", &format!("eq.{}", event.event_id)),
                ],
            )
            .await?;

        let (event_uuid, created) = if let Some(row) = existing.first() {
            let uuid = row["id"]
                .as_str()
                .ok_or_else(|| crate::error::ScraperError::MissingField("event row id".into()))?
                .to_string();
            self.client
                .update(EVENTS_TABLE, &[("id", &format!("eq.{uuid}"))], &record)
                .await?;
            // Full replacement keeps ticket state in step with the source
            self.client
                .delete(TICKETS_TABLE, &[("event_id", &format!("eq.{uuid}"))])
                .await?;
            (uuid, false)
        } else {
            let inserted = self.client.insert(EVENTS_TABLE, &record).await?;
            let uuid = inserted
                .first()
                .and_then(|row| row["id"].as_str())
                .ok_or_else(|| crate::error::ScraperError::MissingField("inserted event id".into()))?
                .to_string();
            (uuid, true)
        };

        for (position, ticket) in event.tickets.iter().enumerate() {
            let ticket_record = json!({
                "event_id": event_uuid,
                "ticket_type": ticket.ticket_type,
                "price": ticket.price,
                "currency": ticket.currency,
                "availability": ticket.availability.to_string(),
                "display_order": position,
            });
            self.client.insert(TICKETS_TABLE, &ticket_record).await?;
        }

        Ok(created)
    }

    /// Get or create an organizer row, returning its UUID. All failures
    /// degrade to None: an event without an organizer link still syncs.
    async fn get_or_create_organizer(
        &self,
        company: &str,
        location: &str,
        logo_url: &str,
    ) -> Option<String> {
        if company.is_empty() {
            return None;
        }

        let existing = match self
            .client
            .select(
                ORGANIZERS_TABLE,
                &[
                    ("select", "id,event_count,logo_url"),
                    ("name", &format!("eq.{company}")),
                ],
            )
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Error looking up organizer {}: {}", company, e);
                return None;
            }
        };

        if let Some(row) = existing.first() {
            let organizer_id = row["id"].as_str()?.to_string();
            let current_count = row["event_count"].as_i64().unwrap_or(0);

            let mut update = json!({ "event_count": current_count + 1 });
            let has_logo = row["logo_url"].as_str().map(|s| !s.is_empty()).unwrap_or(false);
            if !logo_url.is_empty() && !has_logo {
                update["logo_url"] = Value::String(logo_url.to_string());
            }

            if let Err(e) = self
                .client
                .update(
                    ORGANIZERS_TABLE,
                    &[("id", &format!("eq.{organizer_id}"))],
                    &update,
                )
                .await
            {
                warn!("Error updating organizer {}: {}", company, e);
            }

            return Some(organizer_id);
        }

        let info = self.matcher.organizer_info(company, location);
        let record = json!({
            "name": info.name,
            "type": info.category.as_str(),
            "location": info.home_venue,
            "logo_url": if logo_url.is_empty() { Value::Null } else { Value::String(logo_url.to_string()) },
            "event_count": 1,
        });

        match self.client.insert(ORGANIZERS_TABLE, &record).await {
            Ok(rows) => {
                let id = rows.first().and_then(|r| r["id"].as_str()).map(String::from);
                info!(
                    "Created organizer: {} ({}) - {:.0}% confidence",
                    company,
                    info.category,
                    info.confidence * 100.0
                );
                id
            }
            Err(e) => {
                warn!("Error creating organizer {}: {}", company, e);
                None
            }
        }
    }

    /// Upsert an event extracted from a transfer link into its own table;
    /// transfer links are a trusted, user-initiated source.
    pub async fn save_transfer_event(&self, transfer: &TransferEvent) -> crate::error::Result<()> {
        let event = &transfer.event;
        let record = json!({
            "event_id": event.event_id,
            "name": event.name,
            "date": event.start.map(|s| s.to_rfc3339()),
            "location": event.city,
            "venue": event.location,
            "image_url": event.image_url,
            "url": event.url,
            "company": event.company,
            "last_entry": event.last_entry,
            "last_entry_type": transfer.last_entry_type,
            "last_entry_label": transfer.last_entry_label,
            "source": event.platform.to_string(),
            "tickets": serde_json::to_value(&event.tickets)?,
        });

        self.client
            .upsert(FIXR_EVENTS_TABLE, "event_id", &record)
            .await?;
        debug!("Saved transfer event to database: {}", event.name);
        Ok(())
    }

    pub async fn list_events(
        &self,
        skip: usize,
        limit: usize,
        city: Option<&str>,
    ) -> crate::error::Result<Vec<Value>> {
        let select = format!("*,{}(*)", TICKETS_TABLE);
        let offset = skip.to_string();
        let limit = limit.to_string();
        let mut query: Vec<(&str, &str)> = vec![
            ("select", &select),
            ("offset", &offset),
            ("limit", &limit),
            ("order", "event_date.asc"),
        ];
        let city_filter;
        if let Some(city) = city {
            city_filter = format!("ilike.*{city}*");
            query.push(("location", &city_filter));
        }
        self.client.select(EVENTS_TABLE, &query).await
    }

    pub async fn get_event(&self, event_id: &str) -> crate::error::Result<Option<Value>> {
        let select = format!("*,{}(*)", TICKETS_TABLE);
        let filter = format!("eq.{event_id}");
        let rows = self
            .client
            .select(
                EVENTS_TABLE,
                &[("select", &select), ("event_id", &filter)],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Search by name, venue or organizer
    pub async fn search_events(&self, query: &str) -> crate::error::Result<Vec<Value>> {
        let select = format!("*,{}(*)", TICKETS_TABLE);
        let or_filter = format!(
            "(name.ilike.*{q}*,location.ilike.*{q}*,company.ilike.*{q}*)",
            q = query
        );
        self.client
            .select(EVENTS_TABLE, &[("select", &select), ("or", &or_filter)])
            .await
    }

    pub async fn count_events(&self) -> crate::error::Result<usize> {
        let rows = self
            .client
            .select(EVENTS_TABLE, &[("select", "event_id")])
            .await?;
        Ok(rows.len())
    }
}

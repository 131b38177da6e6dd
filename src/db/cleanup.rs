//! Removal of events whose night is over.
//!
//! An event is past once its effective end has elapsed. The effective end
//! is the stored last entry when present (early-morning times belong to the
//! night after the event date), otherwise the end of the event day itself.

use crate::db::client::SupabaseClient;
use crate::db::syncer::{EVENTS_TABLE, TICKETS_TABLE};
use chrono::{DateTime, Duration, Timelike, Utc};
use serde_json::Value;
use tracing::info;

#[derive(Debug, Clone, serde::Serialize)]
pub struct PastEvent {
    pub event_id: String,
    pub name: String,
    pub event_end: DateTime<Utc>,
}

pub struct EventCleanup {
    client: SupabaseClient,
}

impl EventCleanup {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Delete events whose effective end is in the past. With `dry_run` the
    /// candidates are returned without touching the database.
    pub async fn archive_past_events(&self, dry_run: bool) -> crate::error::Result<Vec<PastEvent>> {
        let rows = self
            .client
            .select(
                EVENTS_TABLE,
                &[("select", "id,event_id,name,event_date,last_entry")],
            )
            .await?;

        let now = Utc::now();
        let mut past = Vec::new();

        for row in &rows {
            let Some(end) = effective_end(row) else {
                continue;
            };
            if end >= now {
                continue;
            }

            let event_id = row["event_id"].as_str().unwrap_or("").to_string();
            let name = row["name"].as_str().unwrap_or("").to_string();
            past.push(PastEvent {
                event_id,
                name,
                event_end: end,
            });

            if dry_run {
                continue;
            }

            if let Some(uuid) = row["id"].as_str() {
                // Tickets first so no orphan rows survive a partial failure
                self.client
                    .delete(TICKETS_TABLE, &[("event_id", &format!("eq.{uuid}"))])
                    .await?;
                self.client
                    .delete(EVENTS_TABLE, &[("id", &format!("eq.{uuid}"))])
                    .await?;
            }
        }

        if dry_run {
            info!("Dry run: {} of {} events are past", past.len(), rows.len());
        } else {
            info!("Removed {} past events of {} checked", past.len(), rows.len());
        }

        Ok(past)
    }
}

/// Compute when the event is effectively over. Priority: parsed last entry,
/// then bare "H:MM" last-entry text anchored to the event date, then 23:59
/// on the event day.
fn effective_end(row: &Value) -> Option<DateTime<Utc>> {
    let event_date = row["event_date"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc));

    if let Some(text) = row["last_entry"].as_str() {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
            return Some(parsed.with_timezone(&Utc));
        }
        // Legacy rows carry plain clock text; hours before 6 mean the
        // morning after the event date
        if let (Some(date), Some((hour, minute))) = (event_date, parse_clock(text)) {
            let mut end = date
                .with_hour(hour)?
                .with_minute(minute)?
                .with_second(0)?
                .with_nanosecond(0)?;
            if hour < 6 {
                end += Duration::days(1);
            }
            return Some(end);
        }
    }

    let date = event_date?;
    date.with_hour(23)?
        .with_minute(59)?
        .with_second(0)?
        .with_nanosecond(0)
}

fn parse_clock(text: &str) -> Option<(u32, u32)> {
    let (h, m) = text.trim().split_once(':')?;
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok().filter(|m| *m < 60)?;
    (hour <= 23).then_some((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn rfc3339_last_entry_wins() {
        let row = json!({
            "event_date": "2025-11-14T22:00:00+00:00",
            "last_entry": "2025-11-15T01:00:00+00:00"
        });
        let end = effective_end(&row).unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 11, 15, 1, 0, 0).unwrap());
    }

    #[test]
    fn early_morning_clock_text_rolls_forward() {
        let row = json!({
            "event_date": "2025-11-14T22:00:00+00:00",
            "last_entry": "1:30"
        });
        let end = effective_end(&row).unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 11, 15, 1, 30, 0).unwrap());
    }

    #[test]
    fn missing_last_entry_ends_at_day_close() {
        let row = json!({ "event_date": "2025-11-14T22:00:00+00:00" });
        let end = effective_end(&row).unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 11, 14, 23, 59, 0).unwrap());
    }

    #[test]
    fn undated_rows_are_kept() {
        let row = json!({ "name": "mystery event" });
        assert!(effective_end(&row).is_none());
    }
}

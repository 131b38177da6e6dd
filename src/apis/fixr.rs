//! Fixr transfer-link extractor.
//!
//! Transfer pages are server-rendered and embed the full ticket reference in
//! a `__NEXT_DATA__` JSON script tag, so a plain GET plus HTML parsing is
//! enough. The resulting event carries a single ticket whose label is run
//! through the last-entry parser with the venue's own last entry as fallback.

use crate::error::{Result, ScraperError};
use crate::parsing::last_entry::LastEntryParser;
use crate::types::{Platform, ScrapedEvent, ScrapedTicket, TicketAvailability};
use chrono::{DateTime, TimeZone, Utc};
use scraper::{Html, Selector};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const MAX_RETRIES: u32 = 3;

/// Extracted entry-rule fields stored alongside the event
#[derive(Debug, Clone)]
pub struct TransferEvent {
    pub event: ScrapedEvent,
    pub last_entry_type: &'static str,
    pub last_entry_label: &'static str,
    pub transferer: String,
    pub transfer_url: String,
}

pub struct FixrTransferApi {
    client: reqwest::Client,
    parser: LastEntryParser,
}

impl FixrTransferApi {
    pub fn new(parser: LastEntryParser) -> Self {
        Self {
            client: reqwest::Client::new(),
            parser,
        }
    }

    /// Extract event information from a transfer link such as
    /// `https://fixr.co/transfer-ticket/2156d6630b191850eb92a326`.
    #[instrument(skip(self))]
    pub async fn extract_from_transfer_link(&self, transfer_url: &str) -> Result<TransferEvent> {
        info!("Extracting from transfer link");
        let body = self.fetch_page(transfer_url).await?;
        let data = extract_next_data(&body)?;

        let inner = &data["props"]["pageProps"]["data"]["data"];
        let transfer_code = &inner["transferCode"];
        let ticket_ref = &inner["ticketReference"];
        if ticket_ref.is_null() {
            return Err(ScraperError::MissingField(
                "ticketReference not found in transfer page".into(),
            ));
        }

        let event_info = &ticket_ref["event"];
        let venue_info = &event_info["venue"];
        let ticket_type = &ticket_ref["ticketType"];

        let start = event_info["openTime"].as_i64().and_then(epoch_to_datetime);
        let venue_last_entry = event_info["lastEntry"].as_i64().and_then(epoch_to_datetime);

        let ticket_name = ticket_type["name"].as_str().unwrap_or("").to_string();
        let parsed = match start {
            Some(start) => self
                .parser
                .parse_ticket_label(&ticket_name, start, venue_last_entry),
            None => self.parser.parse_ticket_label(
                &ticket_name,
                Utc::now(),
                venue_last_entry,
            ),
        };

        let city = extract_city(venue_info);
        let share_url = event_info["shareUrl"].as_str().unwrap_or("").to_string();

        let event = ScrapedEvent {
            // Transfer pages have no platform UUID; derive a stable id from
            // the event URL
            event_id: event_id_from_url(&share_url),
            name: event_info["name"].as_str().unwrap_or("").to_string(),
            company: event_info["organiser"]["name"].as_str().unwrap_or("").to_string(),
            company_logo_url: String::new(),
            start,
            time: start.map(|s| s.format("%H:%M").to_string()).unwrap_or_default(),
            last_entry: parsed.time.map(|t| t.to_rfc3339()),
            location: venue_info["name"].as_str().unwrap_or("").to_string(),
            city,
            age_restriction: String::new(),
            url: share_url,
            image_url: event_info["eventImage"].as_str().unwrap_or("").to_string(),
            end: event_info["closeTime"].as_i64().and_then(epoch_to_datetime),
            platform: Platform::Fixr,
            tickets: vec![ScrapedTicket {
                ticket_type: if ticket_name.is_empty() {
                    "General Admission".to_string()
                } else {
                    ticket_name
                },
                // Price is not shown on transfer pages
                price: 0.0,
                currency: "GBP".to_string(),
                availability: TicketAvailability::Available,
            }],
        };

        info!(
            "Extracted '{}' at {} ({} {:?})",
            event.name,
            event.location,
            parsed.label,
            parsed.time
        );

        Ok(TransferEvent {
            event,
            last_entry_type: parsed.rule.as_str(),
            last_entry_label: parsed.label,
            transferer: transfer_code["senderFullName"].as_str().unwrap_or("").to_string(),
            transfer_url: transfer_url.to_string(),
        })
    }

    /// GET with fixed exponential backoff on 429s
    async fn fetch_page(&self, url: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            let response = self.client.get(url).send().await?;

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS && attempt < MAX_RETRIES
            {
                let wait = Duration::from_secs(2u64.pow(attempt));
                warn!("Rate limited on {}, backing off for {:?}", url, wait);
                tokio::time::sleep(wait).await;
                attempt += 1;
                continue;
            }

            if !response.status().is_success() {
                return Err(ScraperError::Api {
                    message: format!("Fixr returned status {} for {}", response.status(), url),
                });
            }

            return Ok(response.text().await?);
        }
    }
}

/// Locate and parse the `__NEXT_DATA__` JSON embedded in the page
fn extract_next_data(body: &str) -> Result<Value> {
    let document = Html::parse_document(body);
    let selector = Selector::parse("script#__NEXT_DATA__[type=\"application/json\"]")
        .expect("static selector");

    if let Some(element) = document.select(&selector).next() {
        debug!("Found __NEXT_DATA__ script tag, parsing JSON");
        let json_text = element.inner_html();
        return Ok(serde_json::from_str(&json_text)?);
    }

    // Some renders drop the id; fall back to any script that carries the
    // ticket reference payload
    let any_script = Selector::parse("script").expect("static selector");
    for element in document.select(&any_script) {
        let text = element.inner_html();
        if text.contains("\"props\"") && text.contains("\"ticketReference\"") {
            debug!("Found ticket reference JSON in unnamed script tag");
            return Ok(serde_json::from_str(&text)?);
        }
    }

    Err(ScraperError::Api {
        message: "Could not find embedded JSON data in transfer page".to_string(),
    })
}

/// Fixr mixes second and millisecond epochs; disambiguate by magnitude
fn epoch_to_datetime(timestamp: i64) -> Option<DateTime<Utc>> {
    if timestamp == 0 {
        return None;
    }
    let seconds = if timestamp > 10_000_000_000 {
        timestamp / 1000
    } else {
        timestamp
    };
    Utc.timestamp_opt(seconds, 0).single()
}

/// City straight from the venue record, else the second-to-last
/// comma-separated address component ("Masonic Place, Nottingham, United
/// Kingdom" yields "Nottingham")
fn extract_city(venue_info: &Value) -> String {
    let city = venue_info["city"].as_str().unwrap_or("");
    if !city.is_empty() {
        return city.to_string();
    }

    let address = venue_info["address"].as_str().unwrap_or("");
    let parts: Vec<&str> = address.split(',').map(|p| p.trim()).collect();
    if parts.len() >= 2 {
        parts[parts.len() - 2].to_string()
    } else {
        String::new()
    }
}

fn event_id_from_url(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .replace('/', "-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn millisecond_epochs_are_scaled() {
        let from_ms = epoch_to_datetime(1_762_293_600_000).unwrap();
        let from_s = epoch_to_datetime(1_762_293_600).unwrap();
        assert_eq!(from_ms, from_s);
        assert_eq!(epoch_to_datetime(0), None);
    }

    #[test]
    fn city_falls_back_to_address() {
        let venue = json!({
            "city": "",
            "address": "Masonic Place, Nottingham, United Kingdom"
        });
        assert_eq!(extract_city(&venue), "Nottingham");

        let venue = json!({ "city": "Leeds", "address": "" });
        assert_eq!(extract_city(&venue), "Leeds");
    }

    #[test]
    fn event_id_is_url_derived() {
        assert_eq!(
            event_id_from_url("https://fixr.co/event/some-night-123"),
            "fixr.co-event-some-night-123"
        );
    }

    #[test]
    fn next_data_script_is_extracted() {
        let body = r#"<html><head>
            <script id="__NEXT_DATA__" type="application/json">{"props":{"pageProps":{}}}</script>
        </head><body></body></html>"#;
        let data = extract_next_data(body).unwrap();
        assert!(data["props"]["pageProps"].is_object());
    }
}

//! Ticket-label last-entry parsing.
//!
//! Club tickets encode their entry rule in the tier name ("Entry Before 11pm",
//! "Arrive After Midnight", "From 23:30"). Given the label and the event's
//! start timestamp this module derives the rule direction, an absolute
//! timestamp and the label shown to users. Unparseable input degrades to the
//! caller-supplied fallback; nothing in here returns an error.

use chrono::{DateTime, Duration, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::ops::RangeInclusive;

static MIDNIGHT_BEFORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:entry\s+before|arrive\s+before|before)\s+midnight").unwrap()
});
static MIDNIGHT_AFTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:entry\s+after|arrive\s+after|from)\s+midnight").unwrap()
});
static AFTER_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:entry\s+after|arrive\s+after|from)\s+(\d{1,2})[:.]?(\d{2})?\s*(am|pm)?").unwrap()
});
static BEFORE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:entry\s+before|arrive\s+before|before)\s+(\d{1,2})[:.]?(\d{2})?\s*(am|pm)?").unwrap()
});
static BARE_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2}):(\d{2})").unwrap());

/// The entry-rule phrases we recognize inside a label, most specific first.
/// Used to pull a normalized ticket-type string out of a longer tier name.
static ENTRY_PHRASES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)((?:entry\s+before|arrive\s+before|before)\s+midnight)",
        r"(?i)((?:entry\s+after|arrive\s+after|from)\s+midnight)",
        r"(?i)((?:entry\s+after|arrive\s+after|from)\s+\d{1,2}[:.]?\d{0,2}\s*(?:am|pm)?)",
        r"(?i)((?:entry\s+before|arrive\s+before|before)\s+\d{1,2}[:.]?\d{0,2}\s*(?:am|pm)?)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Policy for interpreting a bare hour with no am/pm marker.
///
/// Nightlife doors rarely open before noon, so a bare "11:30" almost always
/// means 23:30. The sources are inconsistent about markers though, and the
/// scripts this replaces disagreed with each other (one shifted hours 6-11
/// unconditionally, one only when markers were absent), so the window is a
/// configuration knob rather than a constant. `BareOnly` is the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PmAssumption {
    /// Take bare hours at face value
    Off,
    /// Shift hours inside the window by +12h only when no am/pm marker is present
    BareOnly(RangeInclusive<u32>),
    /// Shift any resolved hour inside the window by +12h, markers or not
    Always(RangeInclusive<u32>),
}

impl Default for PmAssumption {
    fn default() -> Self {
        PmAssumption::BareOnly(6..=11)
    }
}

/// Direction of an entry rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRule {
    /// Attendee must arrive by the given time
    Before,
    /// Attendee may not arrive before the given time
    After,
}

impl EntryRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryRule::Before => "before",
            EntryRule::After => "after",
        }
    }

    /// Human-readable label shown next to the time
    pub fn display_label(&self) -> &'static str {
        match self {
            EntryRule::Before => "Last Entry",
            EntryRule::After => "Arrive After",
        }
    }
}

/// Result of parsing a ticket label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    pub rule: EntryRule,
    /// Absolute last-entry/arrival timestamp; None only when the label had no
    /// time expression and no fallback was available
    pub time: Option<DateTime<Utc>>,
    pub label: &'static str,
}

impl ParsedEntry {
    fn new(rule: EntryRule, time: Option<DateTime<Utc>>) -> Self {
        Self {
            rule,
            time,
            label: rule.display_label(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LastEntryParser {
    pm_assumption: PmAssumption,
}

impl Default for LastEntryParser {
    fn default() -> Self {
        Self::new(PmAssumption::default())
    }
}

impl LastEntryParser {
    pub fn new(pm_assumption: PmAssumption) -> Self {
        Self { pm_assumption }
    }

    /// Parse a ticket-tier label into an entry rule and absolute timestamp.
    ///
    /// Priority order: midnight patterns, explicit "after" times, explicit
    /// "before" times, then the fallback (venue-level last entry) classified
    /// as "before". Midnight always resolves to 00:00 on the night following
    /// the event's start date since these events start in the evening.
    pub fn parse_ticket_label(
        &self,
        label: &str,
        event_start: DateTime<Utc>,
        fallback: Option<DateTime<Utc>>,
    ) -> ParsedEntry {
        if MIDNIGHT_AFTER.is_match(label) {
            return ParsedEntry::new(EntryRule::After, midnight_after(event_start));
        }
        if MIDNIGHT_BEFORE.is_match(label) {
            return ParsedEntry::new(EntryRule::Before, midnight_after(event_start));
        }

        if let Some(caps) = AFTER_TIME.captures(label) {
            if let Some(time) = self.resolve_captured_time(&caps, event_start) {
                return ParsedEntry::new(EntryRule::After, Some(time));
            }
        }

        if let Some(caps) = BEFORE_TIME.captures(label) {
            if let Some(time) = self.resolve_captured_time(&caps, event_start) {
                return ParsedEntry::new(EntryRule::Before, Some(time));
            }
        }

        // No time expression in the label
        ParsedEntry::new(EntryRule::Before, fallback)
    }

    /// Combine an event start with a free-text event-level last-entry string
    /// ("23:30", "11:30pm") into an absolute timestamp. Returns None when no
    /// H:MM expression is present.
    pub fn parse_time_text(
        &self,
        text: &str,
        event_start: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let caps = BARE_TIME.captures(text)?;
        let raw_hour: u32 = caps.get(1)?.as_str().parse().ok()?;
        let minute: u32 = caps.get(2)?.as_str().parse().ok()?;

        let lower = text.to_lowercase();
        let marker = if lower.contains("pm") {
            Some("pm")
        } else if lower.contains("am") {
            Some("am")
        } else {
            None
        };
        let hour = self.to_24h(raw_hour, marker)?;
        if minute > 59 {
            return None;
        }

        let mut time = at_time(event_start, hour, minute)?;
        // Early-morning last entries belong to the following day when the
        // event itself starts in the evening
        if hour < 6 && event_start.hour() >= 18 {
            time += Duration::days(1);
        }
        Some(time)
    }

    fn resolve_captured_time(
        &self,
        caps: &Captures<'_>,
        event_start: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let raw_hour: u32 = caps.get(1)?.as_str().parse().ok()?;
        let minute: u32 = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        let marker = caps.get(3).map(|m| m.as_str().to_lowercase());

        let hour = self.to_24h(raw_hour, marker.as_deref())?;
        if minute > 59 {
            return None;
        }

        let mut time = at_time(event_start, hour, minute)?;
        // An early-hours time below the start hour means the small hours of
        // the following day
        if hour < event_start.hour() && hour < 6 {
            time += Duration::days(1);
        }
        Some(time)
    }

    fn to_24h(&self, hour: u32, marker: Option<&str>) -> Option<u32> {
        let mut hour = match marker {
            Some("pm") if hour != 12 => hour + 12,
            Some("am") if hour == 12 => 0,
            _ => hour,
        };
        match &self.pm_assumption {
            PmAssumption::Off => {}
            PmAssumption::BareOnly(window) => {
                if marker.is_none() && window.contains(&hour) {
                    hour += 12;
                }
            }
            PmAssumption::Always(window) => {
                if window.contains(&hour) {
                    hour += 12;
                }
            }
        }
        (hour <= 23).then_some(hour)
    }
}

/// Extract the entry-rule phrase from a ticket label, if one is present.
/// "STANDARD - Entry Before 11pm" yields "Entry Before 11pm".
pub fn entry_phrase(label: &str) -> Option<String> {
    for pattern in ENTRY_PHRASES.iter() {
        if let Some(caps) = pattern.captures(label) {
            return Some(caps.get(1)?.as_str().trim().to_string());
        }
    }
    None
}

fn at_time(base: DateTime<Utc>, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    base.with_hour(hour)?
        .with_minute(minute)?
        .with_second(0)?
        .with_nanosecond(0)
}

fn midnight_after(event_start: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Some(at_time(event_start, 0, 0)? + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        // A typical club night: Friday 22:00
        Utc.with_ymd_and_hms(2025, 11, 14, 22, 0, 0).unwrap()
    }

    #[test]
    fn before_midnight_rolls_to_next_day() {
        let parser = LastEntryParser::default();
        let parsed = parser.parse_ticket_label("Entry before midnight", start(), None);
        assert_eq!(parsed.rule, EntryRule::Before);
        assert_eq!(parsed.label, "Last Entry");
        assert_eq!(
            parsed.time,
            Some(Utc.with_ymd_and_hms(2025, 11, 15, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn after_midnight_is_arrive_after() {
        let parser = LastEntryParser::default();
        let parsed = parser.parse_ticket_label("2nd Release - From Midnight", start(), None);
        assert_eq!(parsed.rule, EntryRule::After);
        assert_eq!(parsed.label, "Arrive After");
        assert_eq!(
            parsed.time,
            Some(Utc.with_ymd_and_hms(2025, 11, 15, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn explicit_24h_time_is_kept_verbatim() {
        let parser = LastEntryParser::default();
        let parsed = parser.parse_ticket_label("Entry after 23:30", start(), None);
        assert_eq!(parsed.rule, EntryRule::After);
        assert_eq!(
            parsed.time,
            Some(Utc.with_ymd_and_hms(2025, 11, 14, 23, 30, 0).unwrap())
        );
    }

    #[test]
    fn pm_suffix_converts_to_24h() {
        let parser = LastEntryParser::default();
        let parsed = parser.parse_ticket_label("Entry before 11pm", start(), None);
        assert_eq!(parsed.rule, EntryRule::Before);
        assert_eq!(
            parsed.time,
            Some(Utc.with_ymd_and_hms(2025, 11, 14, 23, 0, 0).unwrap())
        );
    }

    #[test]
    fn dotted_minutes_parse_like_colons() {
        let parser = LastEntryParser::default();
        let parsed = parser.parse_ticket_label("Arrive before 11.30pm", start(), None);
        assert_eq!(
            parsed.time,
            Some(Utc.with_ymd_and_hms(2025, 11, 14, 23, 30, 0).unwrap())
        );
    }

    #[test]
    fn early_morning_time_rolls_forward() {
        let parser = LastEntryParser::default();
        let parsed = parser.parse_ticket_label("Entry after 1am", start(), None);
        assert_eq!(parsed.rule, EntryRule::After);
        assert_eq!(
            parsed.time,
            Some(Utc.with_ymd_and_hms(2025, 11, 15, 1, 0, 0).unwrap())
        );
    }

    #[test]
    fn bare_evening_hour_assumed_pm_by_default() {
        let parser = LastEntryParser::default();
        let parsed = parser.parse_ticket_label("Entry before 11:30", start(), None);
        assert_eq!(
            parsed.time,
            Some(Utc.with_ymd_and_hms(2025, 11, 14, 23, 30, 0).unwrap())
        );
    }

    #[test]
    fn pm_assumption_off_takes_bare_hours_literally() {
        let parser = LastEntryParser::new(PmAssumption::Off);
        let parsed = parser.parse_ticket_label("Entry before 11:30", start(), None);
        assert_eq!(
            parsed.time,
            Some(Utc.with_ymd_and_hms(2025, 11, 14, 11, 30, 0).unwrap())
        );
    }

    #[test]
    fn no_time_expression_uses_fallback() {
        let parser = LastEntryParser::default();
        let fallback = Utc.with_ymd_and_hms(2025, 11, 14, 23, 0, 0).unwrap();
        let parsed = parser.parse_ticket_label("General Admission", start(), Some(fallback));
        assert_eq!(parsed.rule, EntryRule::Before);
        assert_eq!(parsed.label, "Last Entry");
        assert_eq!(parsed.time, Some(fallback));
    }

    #[test]
    fn no_time_and_no_fallback_still_classifies() {
        let parser = LastEntryParser::default();
        let parsed = parser.parse_ticket_label("VIP Booth", start(), None);
        assert_eq!(parsed.rule, EntryRule::Before);
        assert_eq!(parsed.label, "Last Entry");
        assert_eq!(parsed.time, None);
    }

    #[test]
    fn nonsense_hour_degrades_to_fallback() {
        let parser = LastEntryParser::default();
        let parsed = parser.parse_ticket_label("Entry before 99:99", start(), None);
        assert_eq!(parsed.rule, EntryRule::Before);
        assert_eq!(parsed.time, None);
    }

    #[test]
    fn time_text_combines_with_event_date() {
        let parser = LastEntryParser::default();
        let time = parser.parse_time_text("23:30", start()).unwrap();
        assert_eq!(time, Utc.with_ymd_and_hms(2025, 11, 14, 23, 30, 0).unwrap());
    }

    #[test]
    fn time_text_early_morning_is_next_day() {
        let parser = LastEntryParser::default();
        let time = parser.parse_time_text("01:00", start()).unwrap();
        assert_eq!(time, Utc.with_ymd_and_hms(2025, 11, 15, 1, 0, 0).unwrap());
    }

    #[test]
    fn time_text_without_time_is_none() {
        let parser = LastEntryParser::default();
        assert_eq!(parser.parse_time_text("TBA", start()), None);
    }

    #[test]
    fn entry_phrase_extraction() {
        assert_eq!(
            entry_phrase("STANDARD - Entry Before 11pm").as_deref(),
            Some("Entry Before 11pm")
        );
        assert_eq!(
            entry_phrase("Final Release (from midnight)").as_deref(),
            Some("from midnight")
        );
        assert_eq!(entry_phrase("General Admission"), None);
    }
}

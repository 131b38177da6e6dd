use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use nightlife_scraper::parsing::last_entry::{
    entry_phrase, EntryRule, LastEntryParser, PmAssumption,
};

fn friday_night() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 14, 22, 0, 0).unwrap()
}

#[test]
fn entry_times_stay_within_the_event_night() -> Result<()> {
    let parser = LastEntryParser::default();
    let start = friday_night();

    // Every label that resolves must land between the start and start + 12h
    let labels = [
        "Entry before 11pm",
        "Entry before 11:30",
        "Entry before midnight",
        "From midnight",
        "Entry after 23:00",
        "Arrive after 1am",
        "From 2.30am",
    ];

    for label in labels {
        let parsed = parser.parse_ticket_label(label, start, None);
        let time = parsed
            .time
            .ok_or_else(|| anyhow::anyhow!("{label} did not resolve"))?;
        assert!(time >= start - chrono::Duration::hours(1), "{label}: {time}");
        assert!(time <= start + chrono::Duration::hours(12), "{label}: {time}");
    }
    Ok(())
}

#[test]
fn midnight_always_means_the_following_day() {
    let parser = LastEntryParser::default();
    let start = friday_night();
    let saturday_midnight = Utc.with_ymd_and_hms(2025, 11, 15, 0, 0, 0).unwrap();

    let before = parser.parse_ticket_label("Entry before midnight", start, None);
    assert_eq!(before.rule, EntryRule::Before);
    assert_eq!(before.time, Some(saturday_midnight));

    let after = parser.parse_ticket_label("Arrive after midnight", start, None);
    assert_eq!(after.rule, EntryRule::After);
    assert_eq!(after.time, Some(saturday_midnight));

    // Even for an event starting just before midnight
    let late_start = Utc.with_ymd_and_hms(2025, 11, 14, 23, 30, 0).unwrap();
    let parsed = parser.parse_ticket_label("Entry before midnight", late_start, None);
    assert_eq!(parsed.time, Some(saturday_midnight));
}

#[test]
fn after_rules_win_over_before_rules_in_mixed_labels() {
    // "From" binds the after-pattern first even when "before" appears later
    let parser = LastEntryParser::default();
    let parsed = parser.parse_ticket_label("From 23:00 - be there before close", friday_night(), None);
    assert_eq!(parsed.rule, EntryRule::After);
    assert_eq!(parsed.label, "Arrive After");
}

#[test]
fn fallback_only_applies_when_no_time_is_present() {
    let parser = LastEntryParser::default();
    let start = friday_night();
    let fallback = Utc.with_ymd_and_hms(2025, 11, 15, 2, 0, 0).unwrap();

    let with_time = parser.parse_ticket_label("Entry before 11pm", start, Some(fallback));
    assert_eq!(
        with_time.time,
        Some(Utc.with_ymd_and_hms(2025, 11, 14, 23, 0, 0).unwrap())
    );

    let without_time = parser.parse_ticket_label("VIP Table", start, Some(fallback));
    assert_eq!(without_time.rule, EntryRule::Before);
    assert_eq!(without_time.time, Some(fallback));
}

#[test]
fn pm_assumption_modes_differ_only_on_bare_hours() {
    let start = friday_night();
    let bare = "Entry before 9:30";
    let marked = "Entry before 9:30am";

    let bare_only = LastEntryParser::new(PmAssumption::BareOnly(6..=11));
    let always = LastEntryParser::new(PmAssumption::Always(6..=11));
    let off = LastEntryParser::new(PmAssumption::Off);

    let evening = Utc.with_ymd_and_hms(2025, 11, 14, 21, 30, 0).unwrap();
    let morning = Utc.with_ymd_and_hms(2025, 11, 14, 9, 30, 0).unwrap();

    assert_eq!(bare_only.parse_ticket_label(bare, start, None).time, Some(evening));
    assert_eq!(off.parse_ticket_label(bare, start, None).time, Some(morning));

    // An explicit am marker holds under BareOnly but not under Always
    assert_eq!(bare_only.parse_ticket_label(marked, start, None).time, Some(morning));
    assert_eq!(always.parse_ticket_label(marked, start, None).time, Some(evening));
}

#[test]
fn parsing_is_pure() {
    let parser = LastEntryParser::default();
    let start = friday_night();
    let first = parser.parse_ticket_label("Entry before 11:30pm", start, None);
    let second = parser.parse_ticket_label("Entry before 11:30pm", start, None);
    assert_eq!(first, second);
}

#[test]
fn free_text_times_anchor_to_the_event_date() {
    let parser = LastEntryParser::default();
    let start = friday_night();

    assert_eq!(
        parser.parse_time_text("Doors 22:00, last entry 23:30", start),
        Some(Utc.with_ymd_and_hms(2025, 11, 14, 23, 30, 0).unwrap())
    );
    assert_eq!(
        parser.parse_time_text("1:00", start),
        Some(Utc.with_ymd_and_hms(2025, 11, 15, 1, 0, 0).unwrap())
    );
    assert_eq!(parser.parse_time_text("see website", start), None);
}

#[test]
fn entry_phrases_extract_from_composite_labels() {
    assert_eq!(
        entry_phrase("2ND RELEASE - Entry Before 11:30PM").as_deref(),
        Some("Entry Before 11:30PM")
    );
    assert_eq!(
        entry_phrase("Standard (arrive after midnight)").as_deref(),
        Some("arrive after midnight")
    );
    assert_eq!(entry_phrase("Student Ticket"), None);
}

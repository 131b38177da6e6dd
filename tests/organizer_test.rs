use nightlife_scraper::parsing::organizer::{OrganizerCategory, OrganizerMatcher};

#[test]
fn venue_run_nights_classify_as_clubs() {
    let matcher = OrganizerMatcher::default();

    let cases = [
        ("Fabric", "Fabric London"),
        ("The Cause", "Cause (Tottenham)"),
        ("PRYZM Leeds", "PRYZM"),
        ("Lab11", "LAB11"),
    ];

    for (company, venue) in cases {
        let info = matcher.organizer_info(company, venue);
        assert_eq!(
            info.category,
            OrganizerCategory::Club,
            "{company} at {venue}"
        );
        assert_eq!(info.home_venue.as_deref(), Some(venue));
    }
}

#[test]
fn promoters_classify_as_event_companies() {
    let matcher = OrganizerMatcher::default();

    let cases = [
        ("MADE Events", "Rainbow Venues"),
        ("Circoloco", "DC10"),
        ("Abode Productions", "Studio 338"),
    ];

    for (company, venue) in cases {
        let info = matcher.organizer_info(company, venue);
        assert_eq!(
            info.category,
            OrganizerCategory::EventCompany,
            "{company} at {venue}"
        );
        assert_eq!(info.home_venue, None);
    }
}

#[test]
fn normalization_strips_noise_and_is_idempotent() {
    let noisy = [
        "The Warehouse Project!",
        "  FABRIC   london  ",
        "Motion (Bristol)",
        "a night at the club",
    ];
    for name in noisy {
        let once = OrganizerMatcher::normalize_name(name);
        let twice = OrganizerMatcher::normalize_name(&once);
        assert_eq!(once, twice, "normalizing {name:?} twice changed the result");
        assert!(
            once.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == ' '),
            "{once:?} contains characters outside [a-z0-9 ]"
        );
    }
}

#[test]
fn similarity_is_symmetric_and_bounded() {
    let matcher = OrganizerMatcher::default();
    let names = ["Fabric", "Fabric London", "MADE Events", "", "The Cause"];

    for a in names {
        for b in names {
            let ab = matcher.calculate_similarity(a, b);
            let ba = matcher.calculate_similarity(b, a);
            assert!((ab - ba).abs() < f64::EPSILON, "{a:?} vs {b:?}");
            assert!((0.0..=1.0).contains(&ab), "{a:?} vs {b:?} gave {ab}");
        }
    }
}

#[test]
fn threshold_is_configurable() {
    // With a high enough bar even a contained substring match needs keywords
    let strict = OrganizerMatcher::new(0.9);
    let (category, _) = strict.categorize("Fabric", "Fabric London");
    assert_eq!(category, OrganizerCategory::EventCompany);

    let lenient = OrganizerMatcher::new(0.5);
    let (category, _) = lenient.categorize("Fabric", "Fabric London");
    assert_eq!(category, OrganizerCategory::Club);
}

#[test]
fn confidence_is_always_in_unit_range() {
    let matcher = OrganizerMatcher::default();
    let pairs = [
        ("", ""),
        ("X", "Y"),
        ("The Warehouse Project", "Depot Mayfield"),
        ("Ministry of Sound", "Ministry of Sound"),
        ("Night Tales Events", "Night Tales Loft"),
    ];
    for (company, venue) in pairs {
        let (_, confidence) = matcher.categorize(company, venue);
        assert!(
            (0.0..=1.0).contains(&confidence),
            "{company:?} at {venue:?} gave {confidence}"
        );
    }
}

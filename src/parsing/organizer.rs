//! Organizer categorization.
//!
//! Decides whether the entity promoting an event is the venue itself (a
//! "club" hosting its own night) or a third-party promoter running a night at
//! someone else's venue. Pure string heuristics: normalization, edit-distance
//! similarity and keyword hints. The confidence score is a heuristic for
//! human review, not a calibrated probability.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Words that suggest a name belongs to a physical venue
const CLUB_KEYWORDS: &[&str] = &[
    "club", "nightclub", "bar", "lounge", "venue", "space", "warehouse", "loft", "basement",
    "room", "hall",
];

/// Words that suggest a name belongs to a promoter/event brand
const EVENT_COMPANY_KEYWORDS: &[&str] = &[
    "events",
    "productions",
    "presents",
    "entertainment",
    "promotions",
    "music",
    "collective",
    "crew",
];

static ARTICLES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:the|a|an)\b").unwrap());
static NON_ALPHANUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s]").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizerCategory {
    Club,
    EventCompany,
}

impl OrganizerCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizerCategory::Club => "club",
            OrganizerCategory::EventCompany => "event_company",
        }
    }
}

impl fmt::Display for OrganizerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full classification result for one organizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizerInfo {
    pub name: String,
    pub category: OrganizerCategory,
    /// Home venue, only meaningful for clubs
    pub home_venue: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct OrganizerMatcher {
    similarity_threshold: f64,
}

impl Default for OrganizerMatcher {
    fn default() -> Self {
        Self::new(0.75)
    }
}

impl OrganizerMatcher {
    pub fn new(similarity_threshold: f64) -> Self {
        Self {
            similarity_threshold,
        }
    }

    /// Normalize a name for comparison: lowercase, drop articles, strip
    /// punctuation, collapse whitespace. Idempotent.
    pub fn normalize_name(name: &str) -> String {
        let lowered = name.to_lowercase();
        let without_articles = ARTICLES.replace_all(lowered.trim(), "");
        let alphanumeric = NON_ALPHANUMERIC.replace_all(&without_articles, "");
        alphanumeric.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Similarity between two names in [0, 1]. Substring containment of one
    /// normalized form in the other floors the score at 0.85, since "Fabric"
    /// vs "Fabric London" is a near-certain match.
    pub fn calculate_similarity(&self, a: &str, b: &str) -> f64 {
        let norm_a = Self::normalize_name(a);
        let norm_b = Self::normalize_name(b);

        if norm_a.is_empty() || norm_b.is_empty() {
            return 0.0;
        }

        let mut similarity = levenshtein_ratio(&norm_a, &norm_b);
        if norm_a.contains(&norm_b) || norm_b.contains(&norm_a) {
            similarity = similarity.max(0.85);
        }
        similarity
    }

    /// Categorize an organizer given the venue its event runs at.
    ///
    /// High name similarity means the organizer is the venue. Below the
    /// threshold, keyword hints on either side bias the call; with no signal
    /// at all, a dissimilar name is most likely a promoter.
    pub fn categorize(&self, company: &str, venue: &str) -> (OrganizerCategory, f64) {
        let similarity = self.calculate_similarity(company, venue);

        if similarity >= self.similarity_threshold {
            return (OrganizerCategory::Club, similarity);
        }

        let company_has_club_kw = has_keyword(company, CLUB_KEYWORDS);
        let company_has_event_kw = has_keyword(company, EVENT_COMPANY_KEYWORDS);
        let venue_has_club_kw = has_keyword(venue, CLUB_KEYWORDS);

        if company_has_event_kw && venue_has_club_kw {
            return (OrganizerCategory::EventCompany, 0.9);
        }

        if company_has_club_kw && similarity > 0.5 {
            return (OrganizerCategory::Club, 0.8);
        }

        if similarity >= 0.5 && (company_has_club_kw || venue_has_club_kw) {
            return (OrganizerCategory::Club, (similarity + 0.1).min(1.0));
        }

        (OrganizerCategory::EventCompany, 1.0 - similarity)
    }

    /// Classification plus the fields persisted on an organizer row
    pub fn organizer_info(&self, company: &str, venue: &str) -> OrganizerInfo {
        let (category, confidence) = self.categorize(company, venue);
        OrganizerInfo {
            name: company.to_string(),
            category,
            home_venue: match category {
                OrganizerCategory::Club => Some(venue.to_string()),
                OrganizerCategory::EventCompany => None,
            },
            confidence,
        }
    }
}

fn has_keyword(name: &str, keywords: &[&str]) -> bool {
    let lowered = name.to_lowercase();
    keywords.iter().any(|kw| lowered.contains(kw))
}

/// Edit-distance similarity in [0, 1]
fn levenshtein_ratio(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }

    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a == 0 || len_b == 0 {
        return 0.0;
    }

    let distance = levenshtein_distance(a, b);
    1.0 - (distance as f64 / len_a.max(len_b) as f64)
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let chars_a: Vec<char> = a.chars().collect();
    let chars_b: Vec<char> = b.chars().collect();
    let len_a = chars_a.len();
    let len_b = chars_b.len();

    let mut matrix = vec![vec![0; len_b + 1]; len_a + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=len_b {
        matrix[0][j] = j;
    }

    for i in 1..=len_a {
        for j in 1..=len_b {
            let cost = if chars_a[i - 1] == chars_b[j - 1] { 0 } else { 1 };
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[len_a][len_b]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_is_idempotent() {
        let once = OrganizerMatcher::normalize_name("The Cause (Tottenham)");
        let twice = OrganizerMatcher::normalize_name(&once);
        assert_eq!(once, twice);
        assert_eq!(once, "cause tottenham");
    }

    #[test]
    fn identical_names_are_a_club() {
        let matcher = OrganizerMatcher::default();
        let (category, confidence) = matcher.categorize("Ink", "Ink");
        assert_eq!(category, OrganizerCategory::Club);
        assert!(confidence >= 0.99);
    }

    #[test]
    fn substring_containment_floors_similarity() {
        let matcher = OrganizerMatcher::default();
        let (category, confidence) = matcher.categorize("Fabric", "Fabric London");
        assert_eq!(category, OrganizerCategory::Club);
        assert!(confidence >= 0.85);
    }

    #[test]
    fn promoter_at_a_club_is_an_event_company() {
        let matcher = OrganizerMatcher::default();
        let (category, _) = matcher.categorize("MADE Events", "Fabric");
        assert_eq!(category, OrganizerCategory::EventCompany);
    }

    #[test]
    fn dissimilar_names_default_to_event_company() {
        let matcher = OrganizerMatcher::default();
        let (category, confidence) = matcher.categorize("Circoloco", "DC10");
        assert_eq!(category, OrganizerCategory::EventCompany);
        assert!(confidence > 0.5);
    }

    #[test]
    fn classification_is_deterministic() {
        let matcher = OrganizerMatcher::default();
        let first = matcher.categorize("Do Not Sleep", "Amnesia");
        let second = matcher.categorize("Do Not Sleep", "Amnesia");
        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
    }

    #[test]
    fn club_keeps_home_venue() {
        let matcher = OrganizerMatcher::default();
        let info = matcher.organizer_info("Printworks", "Printworks London");
        assert_eq!(info.category, OrganizerCategory::Club);
        assert_eq!(info.home_venue.as_deref(), Some("Printworks London"));

        let info = matcher.organizer_info("Outworks Events", "The Palais");
        assert_eq!(info.category, OrganizerCategory::EventCompany);
        assert_eq!(info.home_venue, None);
    }

    #[test]
    fn empty_inputs_never_panic() {
        let matcher = OrganizerMatcher::default();
        let (category, confidence) = matcher.categorize("", "");
        assert_eq!(category, OrganizerCategory::EventCompany);
        assert!((confidence - 1.0).abs() < f64::EPSILON);
    }
}

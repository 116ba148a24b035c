//! Seasonal and date-specific content detection
//!
//! Content tied to a season, holiday or explicit date goes out of date on a
//! calendar schedule rather than by neglect, so the scorer softens its verdict.
//!
//! Markers checked, case-insensitive, whole words:
//! - explicit dates in title or body (`2024-12-25`, `12/25/2024`, `December 25th`, `May 5`)
//! - calendar keywords in title or body (month names except "may", holidays, seasons)
//! - bare years (1900-2099) in the title only, since bodies cite years for
//!   all kinds of non-seasonal reasons

use once_cell::sync::Lazy;
use regex::Regex;

static EXPLICIT_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}/\d{2,4}|(?:january|february|march|april|may|june|july|august|september|october|november|december)\s+\d{1,2}(?:st|nd|rd|th)?)\b",
    )
    .expect("explicit date pattern is valid")
});

static CALENDAR_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:january|february|march|april|june|july|august|september|october|november|december|christmas|xmas|halloween|thanksgiving|easter|valentine'?s|black friday|cyber monday|new year(?:'s|s)?|hanukkah|ramadan|diwali|back to school|summer|winter|spring break|autumn|holiday season|tax season)\b",
    )
    .expect("calendar keyword pattern is valid")
});

static TITLE_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("year pattern is valid"));

static HTML_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Return the first seasonal marker found, lowercased
///
/// Title markers are reported before body markers.
pub fn detect_seasonal(title: &str, body: &str) -> Option<String> {
    let body = HTML_TAG.replace_all(body, " ");

    let found = [title, body.as_ref()]
        .into_iter()
        .find_map(|text| first_match(text, &[&EXPLICIT_DATE, &CALENDAR_KEYWORD]))
        .or_else(|| first_match(title, &[&TITLE_YEAR]));
    found
}

fn first_match(text: &str, patterns: &[&Regex]) -> Option<String> {
    patterns
        .iter()
        .find_map(|pattern| pattern.find(text))
        .map(|m| m.as_str().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_content_is_not_seasonal() {
        assert_eq!(
            detect_seasonal("How to brew pour-over coffee", "<p>Grind the beans medium-fine.</p>"),
            None
        );
    }

    #[test]
    fn test_holiday_keyword_in_title() {
        assert_eq!(
            detect_seasonal("Best Christmas gift ideas", ""),
            Some("christmas".to_string())
        );
    }

    #[test]
    fn test_multi_word_keyword_in_body() {
        assert_eq!(
            detect_seasonal("Deals roundup", "Our favourite Black Friday picks"),
            Some("black friday".to_string())
        );
    }

    #[test]
    fn test_month_keyword() {
        assert_eq!(
            detect_seasonal("What to plant in October", ""),
            Some("october".to_string())
        );
    }

    #[test]
    fn test_may_alone_is_not_seasonal() {
        assert_eq!(detect_seasonal("You may want to read this", "It may help."), None);
    }

    #[test]
    fn test_may_with_day_is_a_date() {
        assert_eq!(
            detect_seasonal("Launch recap", "The event ran on May 5th downtown."),
            Some("may 5th".to_string())
        );
    }

    #[test]
    fn test_iso_and_numeric_dates() {
        assert_eq!(
            detect_seasonal("Release notes", "Shipped 2024-03-18."),
            Some("2024-03-18".to_string())
        );
        assert_eq!(
            detect_seasonal("Release notes", "Shipped 3/18/2024."),
            Some("3/18/2024".to_string())
        );
    }

    #[test]
    fn test_year_counts_in_title_only() {
        assert_eq!(
            detect_seasonal("Top laptops of 2023", ""),
            Some("2023".to_string())
        );
        assert_eq!(
            detect_seasonal("Top laptops", "Prices as of 2023 were higher."),
            None
        );
    }

    #[test]
    fn test_keywords_inside_html_attributes_are_ignored() {
        assert_eq!(
            detect_seasonal("Gallery", r#"<img src="/summer.jpg" alt="">A quiet lake"#),
            None
        );
    }

    #[test]
    fn test_whole_words_only() {
        // "summertime" and "marching" are not markers
        assert_eq!(detect_seasonal("Summertime sadness", "Keep marching"), None);
    }

    #[test]
    fn test_title_marker_reported_first() {
        assert_eq!(
            detect_seasonal("Halloween costumes", "Also good for Easter"),
            Some("halloween".to_string())
        );
    }
}

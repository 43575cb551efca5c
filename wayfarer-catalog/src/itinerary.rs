use serde::Serialize;

/// Result of reading a count out of free text.
///
/// `FallbackUsed` keeps the original text so callers can surface the anomaly
/// instead of silently pricing with a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ParsedCount {
    Exact { value: u32 },
    FallbackUsed { value: u32, original: String },
}

impl ParsedCount {
    pub fn value(&self) -> u32 {
        match self {
            ParsedCount::Exact { value } | ParsedCount::FallbackUsed { value, .. } => *value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ParsedCount::FallbackUsed { .. })
    }
}

/// Used when the text holds no positive count.
pub const FALLBACK_COUNT: u32 = 1;

/// Leading run of ASCII digits after trimming, as a positive `u32`.
fn leading_positive(text: &str) -> Option<u32> {
    let digits: String = text
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u32>().ok().filter(|n| *n > 0)
}

fn parse_count(text: &str) -> ParsedCount {
    match leading_positive(text) {
        Some(value) => ParsedCount::Exact { value },
        None => ParsedCount::FallbackUsed {
            value: FALLBACK_COUNT,
            original: text.to_string(),
        },
    }
}

/// Number of days from an itinerary duration such as "5 days" or "10-day tour".
pub fn parse_days(duration: &str) -> ParsedCount {
    parse_count(duration)
}

/// Number of travelers from the group size a customer entered, e.g. "3" or "4 adults".
pub fn parse_group_size(group_size: &str) -> ParsedCount {
    parse_count(group_size)
}

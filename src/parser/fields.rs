use crate::constants::PLACEHOLDER_DATE;
use chrono::NaiveDate;

/// Join the present, non-blank parts with single spaces.
pub fn coalesce_name<'a>(parts: impl IntoIterator<Item = Option<&'a str>>) -> Option<String> {
    let joined = parts
        .into_iter()
        .flatten()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");
    (!joined.is_empty()).then_some(joined)
}

/// Free-text address from whichever sub-fields are present, `", "` separated.
pub fn assemble_address<'a>(parts: impl IntoIterator<Item = Option<&'a str>>) -> Option<String> {
    let parts: Vec<&str> = parts
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

pub fn is_placeholder_date(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value == PLACEHOLDER_DATE
}

/// Build a date from a combined value, falling back to year/month/day parts.
///
/// Month and day are dropped when zero or absent and zero-padded otherwise;
/// a day without a month is ignored.
pub fn assemble_date(
    combined: Option<&str>,
    year: Option<&str>,
    month: Option<&str>,
    day: Option<&str>,
) -> Option<String> {
    if let Some(date) = combined.filter(|d| !is_placeholder_date(d)) {
        return Some(date.trim().to_string());
    }

    let year = positive(year)?;
    let mut date = format!("{:04}", year);
    if let Some(month) = positive(month) {
        date.push_str(&format!("-{:02}", month));
        if let Some(day) = positive(day) {
            date.push_str(&format!("-{:02}", day));
        }
    }
    Some(date)
}

fn positive(part: Option<&str>) -> Option<u32> {
    part.and_then(|p| p.trim().parse::<u32>().ok()).filter(|n| *n > 0)
}

/// First candidate that yields a usable date.
pub fn first_date(candidates: impl IntoIterator<Item = Option<String>>) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|d| !is_placeholder_date(d))
}

/// Normalize the free-form dates OFAC publishes (`08 Jan 1984`, `Jan 1984`, `1984`).
/// Anything unrecognized is passed through trimmed.
pub fn normalize_free_date(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%d %b %Y") {
        return date.format("%Y-%m-%d").to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%Y-%m-%d").to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("01 {}", raw), "%d %b %Y") {
        return date.format("%Y-%m").to_string();
    }
    raw.to_string()
}

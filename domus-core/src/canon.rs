//! Address canonicalization.
//!
//! Two inputs that differ only in unit/suite designators, punctuation, casing,
//! or street-suffix spelling map to the same [`PropertyKey`]. The function is
//! total and a fixed point: feeding its output back in returns the same output.

use domus_types::{CanonicalAddress, PropertyKey};

const UNIT_DESIGNATORS: [&str; 4] = ["APT", "UNIT", "STE", "SUITE"];

const STREET_SUFFIXES: [(&str, &str); 12] = [
    ("STREET", "ST"),
    ("ROAD", "RD"),
    ("AVENUE", "AVE"),
    ("BOULEVARD", "BLVD"),
    ("DRIVE", "DR"),
    ("LANE", "LN"),
    ("COURT", "CT"),
    ("CIRCLE", "CIR"),
    ("TERRACE", "TER"),
    ("PLACE", "PL"),
    ("PARKWAY", "PKWY"),
    ("HIGHWAY", "HWY"),
];

const STATE_CODES: [(&str, &str); 50] = [
    ("ALABAMA", "AL"),
    ("ALASKA", "AK"),
    ("ARIZONA", "AZ"),
    ("ARKANSAS", "AR"),
    ("CALIFORNIA", "CA"),
    ("COLORADO", "CO"),
    ("CONNECTICUT", "CT"),
    ("DELAWARE", "DE"),
    ("FLORIDA", "FL"),
    ("GEORGIA", "GA"),
    ("HAWAII", "HI"),
    ("IDAHO", "ID"),
    ("ILLINOIS", "IL"),
    ("INDIANA", "IN"),
    ("IOWA", "IA"),
    ("KANSAS", "KS"),
    ("KENTUCKY", "KY"),
    ("LOUISIANA", "LA"),
    ("MAINE", "ME"),
    ("MARYLAND", "MD"),
    ("MASSACHUSETTS", "MA"),
    ("MICHIGAN", "MI"),
    ("MINNESOTA", "MN"),
    ("MISSISSIPPI", "MS"),
    ("MISSOURI", "MO"),
    ("MONTANA", "MT"),
    ("NEBRASKA", "NE"),
    ("NEVADA", "NV"),
    ("NEW HAMPSHIRE", "NH"),
    ("NEW JERSEY", "NJ"),
    ("NEW MEXICO", "NM"),
    ("NEW YORK", "NY"),
    ("NORTH CAROLINA", "NC"),
    ("NORTH DAKOTA", "ND"),
    ("OHIO", "OH"),
    ("OKLAHOMA", "OK"),
    ("OREGON", "OR"),
    ("PENNSYLVANIA", "PA"),
    ("RHODE ISLAND", "RI"),
    ("SOUTH CAROLINA", "SC"),
    ("SOUTH DAKOTA", "SD"),
    ("TENNESSEE", "TN"),
    ("TEXAS", "TX"),
    ("UTAH", "UT"),
    ("VERMONT", "VT"),
    ("VIRGINIA", "VA"),
    ("WASHINGTON", "WA"),
    ("WEST VIRGINIA", "WV"),
    ("WISCONSIN", "WI"),
    ("WYOMING", "WY"),
];

/// Canonicalize raw address fields and derive the property key.
///
/// ```
/// let (addr, key) = domus_core::canon::canonicalize(
///     "123 Main Street, Apt 4B", "Springfield", "Illinois", "62704",
/// );
/// assert_eq!(addr.line1, "123 MAIN ST");
/// assert_eq!(addr.state, "IL");
/// assert_eq!(key.as_str(), "123 main st|springfield|il|62704");
/// ```
#[must_use]
pub fn canonicalize(
    line1: &str,
    city: &str,
    state: &str,
    zip: &str,
) -> (CanonicalAddress, PropertyKey) {
    let addr = CanonicalAddress {
        line1: normalize_line1(line1),
        city: normalize_city(city),
        state: normalize_state(state),
        zip: normalize_zip(zip),
    };
    let key = addr.property_key();
    (addr, key)
}

/// Canonicalize a previously canonicalized or provider-supplied address.
#[must_use]
pub fn canonicalize_address(addr: &CanonicalAddress) -> (CanonicalAddress, PropertyKey) {
    canonicalize(&addr.line1, &addr.city, &addr.state, &addr.zip)
}

fn normalize_line1(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let upper = match upper.find('#') {
        Some(idx) if !upper[..idx].trim().is_empty() => &upper[..idx],
        _ => upper.as_str(),
    };
    let cleaned = strip_punctuation(upper);
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    if let Some(pos) = tokens
        .iter()
        .skip(1)
        .position(|t| UNIT_DESIGNATORS.contains(t))
    {
        tokens.truncate(pos + 1);
    }
    tokens
        .into_iter()
        .map(abbreviate_suffix)
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_city(raw: &str) -> String {
    collapse_whitespace(&strip_punctuation(&raw.trim().to_uppercase()))
}

fn normalize_state(raw: &str) -> String {
    let st = collapse_whitespace(&raw.trim().to_uppercase());
    if st.chars().count() <= 2 {
        return st;
    }
    STATE_CODES
        .iter()
        .find(|(name, _)| *name == st)
        .map_or(st, |(_, code)| (*code).to_string())
}

fn normalize_zip(raw: &str) -> String {
    let head: String = raw.trim().chars().take(5).collect();
    head.trim_end().to_string()
}

fn abbreviate_suffix(token: &str) -> &str {
    STREET_SUFFIXES
        .iter()
        .find(|(long, _)| *long == token)
        .map_or(token, |(_, short)| *short)
}

fn strip_punctuation(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c.is_ascii_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_without_leading_text_is_kept() {
        assert_eq!(normalize_line1("#12 Main St"), "12 MAIN ST");
    }

    #[test]
    fn leading_designator_is_not_truncated() {
        assert_eq!(normalize_line1("Unit Road 5"), "UNIT RD 5");
    }

    #[test]
    fn zip_prefix_never_ends_in_whitespace() {
        assert_eq!(normalize_zip(" 1234 5678 "), "1234");
        assert_eq!(normalize_zip("62704-1234"), "62704");
        assert_eq!(normalize_zip("627"), "627");
    }
}

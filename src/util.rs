//! Input validation and small string helpers shared by the service layer.

use chrono::NaiveDate;

/// Validate a trimmed, bounded string field. Returns the trimmed value.
pub fn validate_bounded_string(
    value: &str,
    field: &str,
    min: usize,
    max: usize,
) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.len() < min {
        return Err(format!("{field} must be at least {min} character(s)"));
    }
    if trimmed.len() > max {
        return Err(format!("{field} must be at most {max} characters"));
    }
    Ok(trimmed.to_string())
}

/// Validate an identifier: non-empty, ASCII alphanumerics plus `-` and `_`.
pub fn validate_id_slug(value: &str, field: &str) -> Result<(), String> {
    if value.is_empty() || value.len() > 64 {
        return Err(format!("{field} must be 1-64 characters"));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(format!("{field} may only contain letters, digits, '-' and '_'"));
    }
    Ok(())
}

/// Validate a `YYYY-MM-DD` date string.
pub fn validate_yyyy_mm_dd(value: &str, field: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("{field} must be a YYYY-MM-DD date"))
}

/// Validate a day-of-week number (1=Monday..7=Sunday).
pub fn validate_day_of_week(value: u8, field: &str) -> Result<(), String> {
    if (1..=7).contains(&value) {
        Ok(())
    } else {
        Err(format!("{field} must be 1 (Monday) through 7 (Sunday)"))
    }
}

/// Validate a quarter number (1-4).
pub fn validate_quarter(value: u8, field: &str) -> Result<(), String> {
    if (1..=4).contains(&value) {
        Ok(())
    } else {
        Err(format!("{field} must be 1 through 4"))
    }
}

/// Validate an ISO week number (1-53).
pub fn validate_week_number(value: u8, field: &str) -> Result<(), String> {
    if (1..=53).contains(&value) {
        Ok(())
    } else {
        Err(format!("{field} must be 1 through 53"))
    }
}

/// Convert a display name to a URL-safe kebab-case slug.
///
/// Example: "Ship v2 Launch" → "ship-v2-launch"
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_string_trims_and_bounds() {
        assert_eq!(
            validate_bounded_string("  Ship v2  ", "title", 1, 280).unwrap(),
            "Ship v2"
        );
        assert!(validate_bounded_string("   ", "title", 1, 280).is_err());
        assert!(validate_bounded_string(&"x".repeat(300), "title", 1, 280).is_err());
    }

    #[test]
    fn id_slug_rules() {
        assert!(validate_id_slug("a1b2-c3_d4", "id").is_ok());
        assert!(validate_id_slug("", "id").is_err());
        assert!(validate_id_slug("has space", "id").is_err());
        assert!(validate_id_slug("semi;colon", "id").is_err());
    }

    #[test]
    fn date_format() {
        assert!(validate_yyyy_mm_dd("2026-02-03", "due_date").is_ok());
        assert!(validate_yyyy_mm_dd("02/03/2026", "due_date").is_err());
        assert!(validate_yyyy_mm_dd("2026-13-40", "due_date").is_err());
    }

    #[test]
    fn period_ranges() {
        assert!(validate_day_of_week(1, "day").is_ok());
        assert!(validate_day_of_week(7, "day").is_ok());
        assert!(validate_day_of_week(0, "day").is_err());
        assert!(validate_day_of_week(8, "day").is_err());
        assert!(validate_quarter(4, "quarter").is_ok());
        assert!(validate_quarter(5, "quarter").is_err());
        assert!(validate_week_number(53, "week").is_ok());
        assert!(validate_week_number(54, "week").is_err());
    }

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Ship v2 Launch"), "ship-v2-launch");
        assert_eq!(slugify("Q1 2026 Review!"), "q1-2026-review");
    }
}

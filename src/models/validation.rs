use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, AppResult};

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern is valid")
});

static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 \-]{6,18}[0-9]$").expect("phone pattern is valid"));

/// Lower-cases and trims an email so lookups are case-insensitive
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> AppResult<()> {
    if email.is_empty() {
        return Err(AppError::validation("Email cannot be empty"));
    }

    if email.len() > 255 {
        return Err(AppError::validation("Email cannot be longer than 255 characters"));
    }

    if !EMAIL.is_match(email) {
        return Err(AppError::validation("Invalid email format"));
    }

    Ok(())
}

pub fn validate_phone(phone: &str) -> AppResult<()> {
    if !PHONE.is_match(phone.trim()) {
        return Err(AppError::validation("Invalid phone number"));
    }
    Ok(())
}

/// Non-blank text no longer than `max` characters
pub fn validate_text(field: &str, value: &str, max: usize) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} cannot be empty")));
    }
    if value.chars().count() > max {
        return Err(AppError::validation(format!(
            "{field} cannot be longer than {max} characters"
        )));
    }
    Ok(())
}

pub fn validate_optional_text(field: &str, value: Option<&str>, max: usize) -> AppResult<()> {
    match value {
        Some(value) => validate_text(field, value, max),
        None => Ok(()),
    }
}

pub fn validate_range<T>(field: &str, value: T, min: T, max: T) -> AppResult<()>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if value < min || value > max {
        return Err(AppError::validation(format!(
            "{field} must be between {min} and {max}"
        )));
    }
    Ok(())
}

pub fn validate_non_negative(field: &str, value: i64) -> AppResult<()> {
    if value < 0 {
        return Err(AppError::validation(format!("{field} cannot be negative")));
    }
    Ok(())
}

/// Upper bound for any single price, one million dollars
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

pub fn validate_price(field: &str, cents: i64) -> AppResult<()> {
    validate_range(field, cents, 0, MAX_PRICE_CENTS)
}

/// 0 = Monday .. 6 = Sunday
pub fn validate_day_of_week(day: i16) -> AppResult<()> {
    validate_range("day_of_week", day, 0, 6)
}

pub fn validate_time_window(start: NaiveTime, end: NaiveTime) -> AppResult<()> {
    if start >= end {
        return Err(AppError::validation(format!(
            "Start time {start} must be before end time {end}"
        )));
    }
    Ok(())
}

pub fn validate_date_range(from: NaiveDate, to: NaiveDate, max_days: i64) -> AppResult<()> {
    if from > to {
        return Err(AppError::validation("'from' must not be after 'to'"));
    }
    if (to - from).num_days() + 1 > max_days {
        return Err(AppError::validation(format!(
            "Date range cannot span more than {max_days} days"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        for email in ["member@finova.fit", "front.desk+1@gym.co.uk", "a_b@c-d.io"] {
            assert!(validate_email(email).is_ok(), "should accept {email}");
        }
        for email in ["", "invalid", "user@", "@domain.com", "user@domain", "a b@c.com"] {
            assert!(validate_email(email).is_err(), "should reject {email}");
        }
    }

    #[test]
    fn test_email_normalization() {
        assert_eq!(normalize_email("  User@Example.COM "), "user@example.com");
    }

    #[test]
    fn test_phone_validation() {
        assert!(validate_phone("+1 555-123-4567").is_ok());
        assert!(validate_phone("03001234567").is_ok());
        assert!(validate_phone("12").is_err());
        assert!(validate_phone("call me").is_err());
    }

    #[test]
    fn test_text_validation() {
        assert!(validate_text("name", "Yoga Studio", 100).is_ok());
        assert!(validate_text("name", "   ", 100).is_err());
        assert!(validate_text("name", &"x".repeat(101), 100).is_err());
        assert!(validate_optional_text("bio", None, 10).is_ok());
    }

    #[test]
    fn test_range_and_day_validation() {
        assert!(validate_range("capacity", 5, 1, 10).is_ok());
        assert!(validate_range("capacity", 0, 1, 10).is_err());
        assert!(validate_day_of_week(6).is_ok());
        assert!(validate_day_of_week(7).is_err());
        assert!(validate_day_of_week(-1).is_err());
    }

    #[test]
    fn test_price_validation() {
        assert!(validate_price("price_cents", 0).is_ok());
        assert!(validate_price("price_cents", MAX_PRICE_CENTS).is_ok());
        assert!(validate_price("price_cents", MAX_PRICE_CENTS + 1).is_err());
        assert!(validate_price("price_cents", -1).is_err());
    }

    #[test]
    fn test_time_window_validation() {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        assert!(validate_time_window(nine, ten).is_ok());
        assert!(validate_time_window(ten, nine).is_err());
        assert!(validate_time_window(nine, nine).is_err());
    }

    #[test]
    fn test_date_range_validation() {
        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(validate_date_range(from, from, 92).is_ok());
        assert!(validate_date_range(from, from + chrono::Duration::days(91), 92).is_ok());
        assert!(validate_date_range(from, from + chrono::Duration::days(92), 92).is_err());
        assert!(validate_date_range(from + chrono::Duration::days(1), from, 92).is_err());
    }
}

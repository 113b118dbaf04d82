//! Input validation shared by the registration and profile-edit flows.
//!
//! Every rule lives here once so the two write paths cannot drift apart.
//! Validators take the raw form value and hand back the accepted text;
//! persisting code applies [`escape_formula`] afterwards where a cell
//! could be interpreted by a spreadsheet.

use std::fmt;
use std::sync::OnceLock;

use chrono::{Local, Months, NaiveDate};
use regex::Regex;

/// A rejected input: which field and why.
#[derive(Debug, Clone)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for FieldError {}

/// Rejects when any already-trimmed required field is empty.
pub fn require_all(fields: &[(&'static str, &str)]) -> Result<(), FieldError> {
    for (field, value) in fields {
        if value.is_empty() {
            return Err(FieldError::new(field, "Fill in all required fields."));
        }
    }
    Ok(())
}

pub fn validate_name(value: &str) -> Result<String, FieldError> {
    person_name("name", "Name", value)
}

pub fn validate_surname(value: &str) -> Result<String, FieldError> {
    person_name("surname", "Surname", value)
}

/// Minimum length counts characters so accented names are not punished;
/// maximum counts bytes because that is what bounds the stored cell.
fn person_name(field: &'static str, label: &str, value: &str) -> Result<String, FieldError> {
    let value = value.trim();
    if value.chars().count() < 2 {
        return Err(FieldError::new(
            field,
            format!("{label} must be at least 2 characters."),
        ));
    }
    if value.len() > 50 {
        return Err(FieldError::new(field, format!("{label} is too long.")));
    }
    Ok(value.to_string())
}

pub fn validate_email(value: &str) -> Result<String, FieldError> {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap_or_else(|_| unreachable!()));

    let value = value.trim();
    if !re.is_match(value) {
        return Err(FieldError::new("email", "Invalid email address."));
    }
    Ok(value.to_string())
}

pub fn validate_phone(value: &str) -> Result<String, FieldError> {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    let re = PHONE
        .get_or_init(|| Regex::new(r"^\+?[1-9]\d{7,14}$").unwrap_or_else(|_| unreachable!()));

    let value = value.trim();
    if !re.is_match(value) {
        return Err(FieldError::new(
            "phone",
            "Invalid phone number, use a format like +420777888999.",
        ));
    }
    Ok(value.to_string())
}

/// Accepts `YYYY-MM-DD` dates of birth for adults (18 or older today).
pub fn validate_dob(value: &str) -> Result<String, FieldError> {
    let value = value.trim();
    let Ok(dob) = NaiveDate::parse_from_str(value, "%Y-%m-%d") else {
        return Err(FieldError::new("DOB", "Invalid date of birth."));
    };

    let today = Local::now().date_naive();
    let cutoff = today
        .checked_sub_months(Months::new(12 * 18))
        .unwrap_or(today);
    if dob > cutoff {
        return Err(FieldError::new("DOB", "You must be at least 18 years old."));
    }
    Ok(value.to_string())
}

/// Passwords are taken verbatim: no trimming, no escaping. Whatever the
/// user typed at registration is what must verify at login.
pub fn validate_password(value: &str) -> Result<String, FieldError> {
    if value.is_empty() {
        return Err(FieldError::new("password", "Password cannot be empty."));
    }
    Ok(value.to_string())
}

/// Company id is optional free text; only surrounding whitespace goes.
#[must_use]
pub fn normalize_ico(value: &str) -> String {
    value.trim().to_string()
}

/// Neutralizes spreadsheet formula injection for cells opened in Excel and
/// friends. Applied on persist to name, surname and ICO, never to fields
/// whose syntax a leading quote would break.
#[must_use]
pub fn escape_formula(value: &str) -> String {
    if value.starts_with(['=', '+', '-', '@']) {
        format!("'{value}")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    #[test]
    fn test_require_all_reports_first_missing_field() {
        assert!(require_all(&[("name", "Jan"), ("email", "a@b.cz")]).is_ok());
        let err = require_all(&[("name", "Jan"), ("email", "")]).unwrap_err();
        assert_eq!(err.field, "email");
    }

    #[test]
    fn test_name_minimum_counts_characters_not_bytes() {
        assert!(validate_name("Íž").is_ok());
        assert!(validate_name("J").is_err());
        assert!(validate_name("  J  ").is_err());
    }

    #[test]
    fn test_name_maximum_counts_bytes() {
        // 26 two-byte characters pass the character minimum but blow the
        // 50-byte cap.
        let name = "ž".repeat(26);
        assert!(validate_name(&name).is_err());
        assert!(validate_name(&"a".repeat(50)).is_ok());
    }

    #[test]
    fn test_email_shape() {
        assert!(validate_email("jan.novak@example.cz").is_ok());
        assert!(validate_email(" jan@x.cz ").is_ok());
        assert!(validate_email("jan@x").is_err());
        assert!(validate_email("jan x@x.cz").is_err());
        assert!(validate_email("@x.cz").is_err());
    }

    #[test]
    fn test_phone_accepts_plus_prefix_and_bare_digits() {
        assert!(validate_phone("+420777888999").is_ok());
        assert!(validate_phone("420777888999").is_ok());
        assert!(validate_phone("0420777888").is_err());
        assert!(validate_phone("+42 077 788").is_err());
        assert!(validate_phone("1234567").is_err());
    }

    #[test]
    fn test_dob_must_parse_and_be_adult() {
        assert!(validate_dob("2000-01-01").is_ok());
        assert!(validate_dob("01.02.2000").is_err());
        assert!(validate_dob("2000-13-01").is_err());

        let today = Local::now().date_naive();
        let adult = today
            .checked_sub_months(Months::new(12 * 18))
            .unwrap_or(today);
        assert!(validate_dob(&adult.format("%Y-%m-%d").to_string()).is_ok());

        let minor = adult.checked_add_days(Days::new(1)).unwrap();
        assert!(validate_dob(&minor.format("%Y-%m-%d").to_string()).is_err());
    }

    #[test]
    fn test_password_is_taken_verbatim() {
        assert!(validate_password("").is_err());
        assert_eq!(validate_password("  heslo  ").unwrap(), "  heslo  ");
    }

    #[test]
    fn test_escape_formula_quotes_risky_prefixes_only() {
        assert_eq!(escape_formula("=1+2"), "'=1+2");
        assert_eq!(escape_formula("+420"), "'+420");
        assert_eq!(escape_formula("-x"), "'-x");
        assert_eq!(escape_formula("@sum"), "'@sum");
        assert_eq!(escape_formula("Novák"), "Novák");
    }
}

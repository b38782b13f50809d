//! Field-level validation for request bodies and query strings
//!
//! Codes and emails are validated newtypes; free text and status strings go
//! through the helper functions below.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::ValidationError;

/// Maximum length for names, titles and other short text
pub const MAX_TEXT_LEN: usize = 255;

/// Maximum length for business codes (client code, employee id, ...)
const MAX_CODE_LEN: usize = 50;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("invalid email regex")
});

/// Letters, digits and `-_/.`, starting with a letter or digit
static CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_./-]*$").expect("invalid code regex")
});

/// Validated email address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Email(String);

impl Email {
    pub fn new(field: &'static str, s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::Empty { field });
        }
        if s.len() > MAX_TEXT_LEN {
            return Err(ValidationError::TooLong {
                field,
                max: MAX_TEXT_LEN,
            });
        }
        if !EMAIL_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field,
                reason: "must be a valid email address",
            });
        }
        Ok(Self(s.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validated business code such as `CLI-1700000000000` or `EMP/042`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Code(String);

impl Code {
    pub fn new(field: &'static str, s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::Empty { field });
        }
        if s.len() > MAX_CODE_LEN {
            return Err(ValidationError::TooLong {
                field,
                max: MAX_CODE_LEN,
            });
        }
        if !CODE_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field,
                reason: "must be letters, digits, '-', '_', '/' or '.'",
            });
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Code {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Required text: present, not blank, at most [`MAX_TEXT_LEN`] characters.
pub fn required_text(field: &'static str, value: Option<&str>) -> Result<String, ValidationError> {
    let value = value.ok_or(ValidationError::Missing { field })?.trim();
    if value.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    check_len(field, value)?;
    Ok(value.to_owned())
}

/// Optional text; blank becomes `None`.
pub fn optional_text(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => {
            check_len(field, v)?;
            Ok(Some(v.to_owned()))
        }
        None => Ok(None),
    }
}

fn check_len(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_TEXT_LEN,
        });
    }
    Ok(())
}

/// Match `value` case-insensitively against `allowed`, returning the
/// canonical spelling.
pub fn one_of(
    field: &'static str,
    value: &str,
    allowed: &[&'static str],
) -> Result<&'static str, ValidationError> {
    let value = value.trim();
    allowed
        .iter()
        .copied()
        .find(|a| a.eq_ignore_ascii_case(value))
        .ok_or_else(|| ValidationError::InvalidVariant {
            field,
            value: value.to_owned(),
        })
}

/// [`one_of`] for an optional value.
pub fn optional_one_of(
    field: &'static str,
    value: Option<&str>,
    allowed: &[&'static str],
) -> Result<Option<&'static str>, ValidationError> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| one_of(field, v, allowed))
        .transpose()
}

/// Comma separated list where every entry must be allowed, e.g. `ACTIVE,ON_HOLD`.
pub fn one_of_list(
    field: &'static str,
    value: &str,
    allowed: &[&'static str],
) -> Result<Vec<String>, ValidationError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| one_of(field, v, allowed).map(str::to_owned))
        .collect()
}

/// Percentage between 0 and 100 inclusive.
pub fn percentage(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    in_range(field, value, 0.0, 100.0)
}

pub fn in_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ValidationError::OutOfRange { field, min, max });
    }
    Ok(value)
}

/// Money and quantities that may be absent but never negative.
pub fn non_negative(
    field: &'static str,
    value: Option<Decimal>,
) -> Result<Option<Decimal>, ValidationError> {
    match value {
        Some(v) if v.is_sign_negative() && !v.is_zero() => Err(ValidationError::OutOfRange {
            field,
            min: 0.0,
            max: f64::MAX,
        }),
        other => Ok(other),
    }
}

/// Parse a UUID from a path segment or body field.
pub fn parse_uuid(field: &'static str, value: &str) -> Result<Uuid, ValidationError> {
    Uuid::parse_str(value.trim()).map_err(|_| ValidationError::InvalidFormat {
        field,
        reason: "invalid UUID format",
    })
}

/// `%term%` for ILIKE, with wildcards in the term escaped.
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Blank query values count as absent.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_emails_are_lowercased() {
        let email = Email::new("email", " Ops@Example.CO.ZA ").unwrap();
        assert_eq!(email.as_str(), "ops@example.co.za");
    }

    #[test]
    fn invalid_emails() {
        assert!(matches!(
            Email::new("email", ""),
            Err(ValidationError::Empty { .. })
        ));
        assert!(matches!(
            Email::new("email", "no-at-sign"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(Email::new("email", "two@@example.com").is_err());
    }

    #[test]
    fn codes() {
        assert!(Code::new("project_code", "LAW-001").is_ok());
        assert!(Code::new("employee_id", "EMP/042").is_ok());
        assert!(Code::new("project_code", "-LAW").is_err());
        assert!(Code::new("project_code", "has space").is_err());
        assert!(matches!(
            Code::new("project_code", &"X".repeat(51)),
            Err(ValidationError::TooLong { max: 50, .. })
        ));
    }

    #[test]
    fn required_text_rules() {
        assert_eq!(required_text("name", Some("  Lawley ")).unwrap(), "Lawley");
        assert_eq!(
            required_text("name", None).unwrap_err(),
            ValidationError::Missing { field: "name" }
        );
        assert_eq!(
            required_text("name", Some("   ")).unwrap_err(),
            ValidationError::Empty { field: "name" }
        );
        assert!(required_text("name", Some(&"a".repeat(256))).is_err());
    }

    #[test]
    fn optional_text_blank_is_none() {
        assert_eq!(optional_text("notes", Some("  ")).unwrap(), None);
        assert_eq!(optional_text("notes", None).unwrap(), None);
        assert_eq!(
            optional_text("notes", Some(" x ")).unwrap().as_deref(),
            Some("x")
        );
    }

    #[test]
    fn one_of_returns_canonical_case() {
        let allowed = &["ACTIVE", "ON_HOLD"];
        assert_eq!(one_of("status", "on_hold", allowed).unwrap(), "ON_HOLD");
        assert!(matches!(
            one_of("status", "paused", allowed),
            Err(ValidationError::InvalidVariant { .. })
        ));
        assert_eq!(optional_one_of("status", Some(""), allowed).unwrap(), None);
    }

    #[test]
    fn status_lists() {
        let allowed = &["ACTIVE", "ON_HOLD", "COMPLETED"];
        assert_eq!(
            one_of_list("status", "active, completed", allowed).unwrap(),
            vec!["ACTIVE", "COMPLETED"]
        );
        assert!(one_of_list("status", "active,bogus", allowed).is_err());
    }

    #[test]
    fn ranges() {
        assert_eq!(percentage("progress", 100.0).unwrap(), 100.0);
        assert!(percentage("progress", 100.1).is_err());
        assert!(percentage("progress", f64::NAN).is_err());
    }

    #[test]
    fn negative_amounts() {
        assert!(non_negative("budget", Some(Decimal::new(-5, 1))).is_err());
        assert_eq!(non_negative("budget", None).unwrap(), None);
        assert_eq!(
            non_negative("budget", Some(Decimal::ZERO)).unwrap(),
            Some(Decimal::ZERO)
        );
    }

    #[test]
    fn uuid_parsing() {
        assert!(parse_uuid("id", "not-a-uuid").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_uuid("id", &id.to_string()).unwrap(), id);
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern(" pole "), "%pole%");
    }
}

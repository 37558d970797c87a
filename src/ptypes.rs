use std::fmt;

use chrono::NaiveDate;

use crate::error::{Error, Result};

/// The primitive type catalog. Every stored field declares one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PTypeName {
    String,
    Name,
    PhoneNumber,
    Date,
    Email,
    CreditCard,
}

impl PTypeName {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Name => "name",
            Self::PhoneNumber => "phoneNumber",
            Self::Date => "date",
            Self::Email => "email",
            Self::CreditCard => "creditCard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "name" => Some(Self::Name),
            "phoneNumber" => Some(Self::PhoneNumber),
            "date" => Some(Self::Date),
            "email" => Some(Self::Email),
            "creditCard" => Some(Self::CreditCard),
            _ => None,
        }
    }
}

impl fmt::Display for PTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw value that has passed its type's validation. Rendering happens on
/// the read side so one stored ciphertext can answer at several
/// confidentiality levels.
#[derive(Debug, Clone)]
pub struct PValue {
    type_name: PTypeName,
    raw: String,
}

/// Validates `raw` against the named primitive type.
pub fn parse(type_name: &str, raw: &str) -> Result<PValue> {
    let ptype = PTypeName::parse(type_name)
        .ok_or_else(|| Error::Value(format!("unknown primitive type '{type_name}'")))?;
    validate(ptype, raw)?;
    Ok(PValue {
        type_name: ptype,
        raw: raw.to_string(),
    })
}

impl PValue {
    /// Renders the value in the named projection. Unknown projections and
    /// projections the type does not define are rejected.
    pub fn render(&self, projection: &str) -> Result<String> {
        match projection {
            "plain" => Ok(self.raw.clone()),
            "masked" if self.supports_masked() => Ok(mask(&self.raw)),
            "last_four" if self.supports_four() => Ok(last_four(&self.raw)),
            "first_four" if self.supports_four() => Ok(first_four(&self.raw)),
            _ => Err(Error::Value(format!(
                "format '{projection}' is not defined for type '{}'",
                self.type_name
            ))),
        }
    }

    fn supports_masked(&self) -> bool {
        !matches!(self.type_name, PTypeName::Date)
    }

    fn supports_four(&self) -> bool {
        matches!(self.type_name, PTypeName::PhoneNumber | PTypeName::CreditCard)
    }
}

fn mask(raw: &str) -> String {
    "*".repeat(raw.chars().count())
}

fn digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

fn last_four(raw: &str) -> String {
    let d = digits(raw);
    let cut = d.len().saturating_sub(4);
    d[cut..].to_string()
}

fn first_four(raw: &str) -> String {
    let d = digits(raw);
    d[..d.len().min(4)].to_string()
}

fn validate(ptype: PTypeName, raw: &str) -> Result<()> {
    let ok = match ptype {
        PTypeName::String => true,
        PTypeName::Name => is_valid_name(raw),
        PTypeName::PhoneNumber => is_valid_phone(raw),
        PTypeName::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok(),
        PTypeName::Email => is_valid_email(raw),
        PTypeName::CreditCard => is_valid_card(raw),
    };
    if ok {
        Ok(())
    } else {
        Err(Error::Value(format!("'{raw}' is not a valid {ptype}")))
    }
}

fn is_valid_name(raw: &str) -> bool {
    !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_alphabetic() || matches!(c, ' ' | '-' | '\'' | '.'))
}

fn is_valid_phone(raw: &str) -> bool {
    let rest = raw.strip_prefix('+').unwrap_or(raw);
    let d: String = rest
        .chars()
        .filter(|&c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    (7..=15).contains(&d.len()) && d.chars().all(|c| c.is_ascii_digit())
}

fn is_valid_email(raw: &str) -> bool {
    let Some((local, domain)) = raw.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !raw.chars().any(char::is_whitespace)
}

fn is_valid_card(raw: &str) -> bool {
    let d: String = raw.chars().filter(|&c| !matches!(c, ' ' | '-')).collect();
    (12..=19).contains(&d.len()) && d.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_is_identity() {
        let value = parse("string", "hello world").unwrap();
        assert_eq!(value.render("plain").unwrap(), "hello world");
    }

    #[test]
    fn test_masked_preserves_length() {
        let value = parse("string", "Crawford").unwrap();
        assert_eq!(value.render("masked").unwrap(), "********");

        let value = parse("name", "Doe").unwrap();
        assert_eq!(value.render("masked").unwrap(), "***");
    }

    #[test]
    fn test_masked_counts_code_points() {
        let value = parse("name", "Zoë").unwrap();
        assert_eq!(value.render("masked").unwrap(), "***");
    }

    #[test]
    fn test_phone_last_and_first_four() {
        let value = parse("phoneNumber", "+44 1234 567890").unwrap();
        assert_eq!(value.render("last_four").unwrap(), "7890");
        assert_eq!(value.render("first_four").unwrap(), "4412");
    }

    #[test]
    fn test_card_last_four() {
        let value = parse("creditCard", "4111-1111-1111-1234").unwrap();
        assert_eq!(value.render("last_four").unwrap(), "1234");
    }

    #[test]
    fn test_unknown_projection_rejected() {
        let value = parse("string", "hello").unwrap();
        assert!(matches!(value.render("hexdump"), Err(Error::Value(_))));
    }

    #[test]
    fn test_projection_not_defined_for_type() {
        let value = parse("string", "hello").unwrap();
        assert!(value.render("last_four").is_err());

        let value = parse("date", "2024-03-01").unwrap();
        assert!(value.render("masked").is_err());
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(matches!(parse("blob", "x"), Err(Error::Value(_))));
    }

    #[test]
    fn test_email_validation() {
        assert!(parse("email", "john@crawford.com").is_ok());
        assert!(parse("email", "jane@doeindustries.com").is_ok());
        assert!(parse("email", "not-an-email").is_err());
        assert!(parse("email", "two@@ats.com").is_err());
        assert!(parse("email", "@nodomain.com").is_err());
        assert!(parse("email", "dot@trailing.").is_err());
    }

    #[test]
    fn test_phone_validation() {
        assert!(parse("phoneNumber", "1234567890").is_ok());
        assert!(parse("phoneNumber", "09873243323423").is_ok());
        assert!(parse("phoneNumber", "+1 (555) 123-4567").is_ok());
        assert!(parse("phoneNumber", "12345").is_err());
        assert!(parse("phoneNumber", "call-me-maybe").is_err());
    }

    #[test]
    fn test_date_validation() {
        assert!(parse("date", "1999-12-31").is_ok());
        assert!(parse("date", "1999-13-31").is_err());
        assert!(parse("date", "31/12/1999").is_err());
    }

    #[test]
    fn test_name_validation() {
        assert!(parse("name", "Mary-Jane O'Neil").is_ok());
        assert!(parse("name", "").is_err());
        assert!(parse("name", "rm -rf /;").is_err());
    }
}

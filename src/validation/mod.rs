use std::fmt;

use crate::domain::Amount;
use crate::stellar::strkey;
use crate::stellar::xdr::MEMO_TEXT_MAX_BYTES;

pub const STELLAR_ACCOUNT_LEN: usize = strkey::ENCODED_LEN;
pub const NAME_MAX_LEN: usize = 255;
pub const EMAIL_MAX_LEN: usize = 255;
pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 72;
pub const AMOUNT_INPUT_MAX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_name(name: &str) -> Result<String, ValidationError> {
    let name = sanitize_string(name);
    validate_required("name", &name)?;
    validate_max_len("name", &name, NAME_MAX_LEN)?;
    Ok(name)
}

/// Returns the normalized (trimmed, lowercased) address.
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim().to_lowercase();
    validate_required("email", &email)?;
    validate_max_len("email", &email, EMAIL_MAX_LEN)?;

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(ValidationError::new("email", "must be a valid email address"));
    }

    Ok(email)
}

pub fn validate_password(password: &str) -> ValidationResult {
    if password.len() < PASSWORD_MIN_LEN {
        return Err(ValidationError::new(
            "password",
            format!("must be at least {} characters", PASSWORD_MIN_LEN),
        ));
    }
    // bcrypt only reads the first 72 bytes
    validate_max_len("password", password, PASSWORD_MAX_LEN)
}

pub fn validate_stellar_address(stellar_address: &str) -> Result<String, ValidationError> {
    let stellar_address = sanitize_string(stellar_address);
    validate_required("destination", &stellar_address)?;

    if stellar_address.len() != STELLAR_ACCOUNT_LEN {
        return Err(ValidationError::new(
            "destination",
            format!("must be exactly {} characters", STELLAR_ACCOUNT_LEN),
        ));
    }

    if !stellar_address.starts_with('G') {
        return Err(ValidationError::new("destination", "must start with 'G'"));
    }

    if !stellar_address
        .chars()
        .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit())
    {
        return Err(ValidationError::new(
            "destination",
            "must contain only uppercase letters and digits",
        ));
    }

    Ok(stellar_address)
}

pub fn validate_amount(raw: &str) -> Result<Amount, ValidationError> {
    let raw = raw.trim();
    validate_required("amount", raw)?;
    validate_max_len("amount", raw, AMOUNT_INPUT_MAX_LEN)?;

    let amount: Amount = raw
        .parse()
        .map_err(|e: crate::domain::AmountError| ValidationError::new("amount", e.to_string()))?;
    if amount.is_zero() {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(amount)
}

/// Empty memos become `None`; the ledger caps text memos at 28 bytes.
pub fn validate_memo(memo: Option<&str>) -> Result<Option<String>, ValidationError> {
    let memo = match memo.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(memo) => memo,
    };

    if memo.len() > MEMO_TEXT_MAX_BYTES {
        return Err(ValidationError::new(
            "memo",
            format!("must be at most {} bytes", MEMO_TEXT_MAX_BYTES),
        ));
    }

    Ok(Some(memo.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_stellar_address() -> String {
        "G".to_owned() + &"A".repeat(55)
    }

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string("single"), "single");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn validates_stellar_address() {
        assert!(validate_stellar_address(&valid_stellar_address()).is_ok());
        assert!(validate_stellar_address("GSHORT").is_err());
        assert!(validate_stellar_address(&("g".to_owned() + &"A".repeat(55))).is_err());
        assert!(validate_stellar_address(&("G".to_owned() + &"a".repeat(55))).is_err());
        assert_eq!(
            validate_stellar_address(&format!(" {} ", valid_stellar_address())).unwrap(),
            valid_stellar_address()
        );
    }

    #[test]
    fn normalizes_email() {
        assert_eq!(validate_email("  Ops@Acme.IO ").unwrap(), "ops@acme.io");
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("a@nodot").is_err());
        assert!(validate_email("@acme.io").is_err());
        assert!(validate_email("a b@acme.io").is_err());
    }

    #[test]
    fn validates_password_length() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
        assert!(validate_password(&"x".repeat(73)).is_err());
    }

    #[test]
    fn validates_amount() {
        assert_eq!(validate_amount("10").unwrap().to_string(), "10.0000000");
        assert!(validate_amount("0").is_err());
        assert!(validate_amount("0.0000000").is_err());
        assert!(validate_amount("-1").is_err());
        assert!(validate_amount("1.00000001").is_err());
        assert!(validate_amount("").is_err());
    }

    #[test]
    fn validates_memo() {
        assert_eq!(validate_memo(None).unwrap(), None);
        assert_eq!(validate_memo(Some("  ")).unwrap(), None);
        assert_eq!(validate_memo(Some(" inv 1 ")).unwrap().as_deref(), Some("inv 1"));
        assert!(validate_memo(Some(&"m".repeat(29))).is_err());
    }
}

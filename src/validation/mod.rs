use std::fmt;

pub const BENEFICIARY_NAME_MAX_LEN: usize = 120;
pub const CLABE_LEN: usize = 18;
pub const PASSWORD_MIN_LEN: usize = 8;
/// Character classes required in a new password (of: lower, upper, digit, symbol).
pub const PASSWORD_MIN_CLASSES: usize = 3;

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

pub fn validate_positive_amount(amount_cents: i64) -> ValidationResult {
    if amount_cents <= 0 {
        return Err(ValidationError::new("amount_cents", "must be greater than zero"));
    }

    Ok(())
}

pub fn validate_beneficiary_name(name: &str) -> ValidationResult {
    let name = sanitize_string(name);
    validate_required("beneficiary_name", &name)?;
    validate_max_len("beneficiary_name", &name, BENEFICIARY_NAME_MAX_LEN)?;

    Ok(())
}

/// Shape check only: a CLABE is 18 ASCII digits. Checksum verification is the
/// account-record owner's concern, not this engine's.
pub fn validate_clabe(account: &str) -> ValidationResult {
    let account = sanitize_string(account);
    validate_required("beneficiary_account", &account)?;

    if account.len() != CLABE_LEN || !account.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ValidationError::new(
            "beneficiary_account",
            format!("must be exactly {} digits", CLABE_LEN),
        ));
    }

    Ok(())
}

pub fn validate_email(email: &str) -> ValidationResult {
    let email = sanitize_string(email);
    validate_required("email", &email)?;

    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = parts.next().unwrap_or("");
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(ValidationError::new("email", "must be a valid address"));
    }

    Ok(())
}

/// Minimum length plus character-class diversity.
pub fn validate_password(password: &str) -> ValidationResult {
    if password.len() < PASSWORD_MIN_LEN {
        return Err(ValidationError::new(
            "password",
            format!("must be at least {} characters", PASSWORD_MIN_LEN),
        ));
    }

    let classes = [
        password.chars().any(|ch| ch.is_ascii_lowercase()),
        password.chars().any(|ch| ch.is_ascii_uppercase()),
        password.chars().any(|ch| ch.is_ascii_digit()),
        password.chars().any(|ch| !ch.is_ascii_alphanumeric()),
    ]
    .iter()
    .filter(|present| **present)
    .count();

    if classes < PASSWORD_MIN_CLASSES {
        return Err(ValidationError::new(
            "password",
            format!(
                "must contain at least {} of: lowercase, uppercase, digits, symbols",
                PASSWORD_MIN_CLASSES
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

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
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn validates_positive_amount() {
        assert!(validate_positive_amount(1).is_ok());
        assert!(validate_positive_amount(0).is_err());
        assert!(validate_positive_amount(-100).is_err());
    }

    #[test]
    fn validates_clabe() {
        assert!(validate_clabe("032180000118359719").is_ok());
        assert!(validate_clabe("  032180000118359719  ").is_ok());
        assert!(validate_clabe("03218000011835971").is_err());
        assert!(validate_clabe("0321800001183597190").is_err());
        assert!(validate_clabe("03218000011835971X").is_err());
        assert!(validate_clabe("").is_err());
    }

    #[test]
    fn validates_email() {
        assert!(validate_email("ops@empresa.mx").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@empresa.mx").is_err());
        assert!(validate_email("ops@localhost").is_err());
    }

    #[test]
    fn password_policy_matrix() {
        assert!(validate_password("Abcdef12").is_ok());
        assert!(validate_password("abcdef1!").is_ok());
        assert!(validate_password("Short1!").is_err()); // too short
        assert!(validate_password("abcdefgh").is_err()); // one class
        assert!(validate_password("abcdefg1").is_err()); // two classes
        assert!(validate_password("Abcdef1!").is_ok()); // four classes
    }
}

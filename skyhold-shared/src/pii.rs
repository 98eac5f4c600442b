use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wraps passenger data (emails, card numbers) so it never lands in log output.
///
/// Serialization is transparent: API responses and stored snapshots carry the
/// real value, only `Debug`/`Display` are masked.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl From<String> for Masked<String> {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Masked<String> {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Keeps the last four digits of a card number, e.g. `**** 4242`.
/// Spaces and dashes in the input are ignored.
pub fn mask_card_number(number: &str) -> String {
    let digits: Vec<char> = number.chars().filter(|c| c.is_ascii_digit()).collect();
    let tail: String = digits[digits.len().saturating_sub(4)..].iter().collect();
    format!("**** {}", tail)
}

/// `maria.lopez@example.com` -> `m***@example.com`
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{}***@{}", first, domain)
        }
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_hides_value_in_debug_and_display() {
        let email = Masked::from("maria@example.com");
        assert_eq!(format!("{:?}", email), "********");
        assert_eq!(format!("{}", email), "********");
        assert_eq!(email.expose(), "maria@example.com");
    }

    #[test]
    fn test_masked_serializes_real_value() {
        let email = Masked::from("maria@example.com");
        let json = serde_json::to_string(&email).unwrap();
        assert_eq!(json, "\"maria@example.com\"");

        let back: Masked<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, email);
    }

    #[test]
    fn test_mask_card_number_keeps_last_four() {
        assert_eq!(mask_card_number("4242 4242 4242 4242"), "**** 4242");
        assert_eq!(mask_card_number("12"), "**** 12");
    }

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("maria.lopez@example.com"), "m***@example.com");
        assert_eq!(mask_email("not-an-email"), "***");
    }
}

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub last_name: String,
    pub first_name: String,
    pub phone_numbers: Vec<String>, // TEXT[]
}

/// Splits a comma separated phone number field as typed at registration.
pub fn parse_phone_numbers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_phone_numbers() {
        assert_eq!(
            parse_phone_numbers(" 555-0100, 555-0101 ,"),
            vec!["555-0100".to_string(), "555-0101".to_string()]
        );
        assert!(parse_phone_numbers("").is_empty());
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// An ISO 4217 currency code, stored normalized to uppercase.
///
/// Generalizes the teacher's closed `Currency` enum (which enumerates the
/// handful of currencies LLM billing uses) into an open newtype, since this
/// system accepts whatever currency a cost-source plugin reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Result<Self, String> {
        let upper = code.to_uppercase();
        if upper.len() != 3 || !upper.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(format!("'{code}' is not a 3-letter ISO 4217 code"));
        }
        Ok(Currency(upper))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Currency {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(&value)
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        c.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_code() {
        assert_eq!(Currency::new("usd").unwrap().as_str(), "USD");
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Currency::new("US").is_err());
        assert!(Currency::new("USDX").is_err());
    }

    #[test]
    fn rejects_non_alpha() {
        assert!(Currency::new("US1").is_err());
    }
}

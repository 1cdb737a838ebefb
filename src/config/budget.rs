//! Budget configuration schema (spec.md §3.7, §6).

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::domain::currency::Currency;
use crate::error::{FinFocusError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Actual,
    Forecasted,
}

/// Budget period. The spec only recognizes `"monthly"`; kept as an enum with
/// a single variant so a second period cannot silently slip through
/// validation unnoticed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Monthly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Percentage threshold, 0–1000.
    pub threshold: Decimal,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopedBudget {
    pub amount: Decimal,
    pub currency: Currency,
    pub period: Period,
    #[serde(default)]
    pub alerts: Vec<AlertConfig>,
    #[serde(default)]
    pub exit_on_threshold: Option<bool>,
    #[serde(default)]
    pub exit_code: Option<u16>,
}

impl ScopedBudget {
    pub fn validate(&self, global_currency: Option<&Currency>) -> Result<()> {
        if self.amount < Decimal::ZERO {
            return Err(FinFocusError::config("budget amount must be >= 0"));
        }
        if let Some(global) = global_currency {
            if self.currency != *global {
                return Err(FinFocusError::config(format!(
                    "scoped budget currency '{}' does not match global currency '{}'",
                    self.currency, global
                )));
            }
        }
        if matches!(self.exit_on_threshold, Some(true)) {
            match self.exit_code {
                Some(code) if code > 255 => {
                    return Err(FinFocusError::config(format!(
                        "exit code {code} out of range [0,255]"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn tag_selector_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]+:(\*|[a-zA-Z0-9_-]+)$").unwrap())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagBudget {
    pub selector: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(flatten)]
    pub budget: ScopedBudget,
}

impl TagBudget {
    pub fn validate_selector(&self) -> Result<()> {
        if !tag_selector_regex().is_match(&self.selector) {
            return Err(FinFocusError::config(format!(
                "tag selector '{}' does not match 'key:(value|*)'",
                self.selector
            )));
        }
        Ok(())
    }

    /// The selector's key, for matching against a resource's tags.
    pub fn key(&self) -> &str {
        self.selector.split_once(':').map(|(k, _)| k).unwrap_or(&self.selector)
    }

    pub fn value(&self) -> &str {
        self.selector.split_once(':').map(|(_, v)| v).unwrap_or("*")
    }

    pub fn matches(&self, tag_key: &str, tag_value: &str) -> bool {
        self.key() == tag_key && (self.value() == "*" || self.value() == tag_value)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetsConfig {
    pub global: Option<ScopedBudget>,
    #[serde(default)]
    pub providers: BTreeMap<String, ScopedBudget>,
    #[serde(default)]
    pub tags: Vec<TagBudget>,
    #[serde(default)]
    pub types: BTreeMap<String, ScopedBudget>,
    #[serde(default)]
    pub exit_on_threshold: Option<bool>,
    #[serde(default)]
    pub exit_code: Option<u16>,
}

impl BudgetsConfig {
    /// Validate currency consistency, amount bounds, tag selector syntax,
    /// period, and exit-code range (spec.md §3.7 invariants).
    pub fn validate(&self) -> Result<()> {
        let global_currency = self.global.as_ref().map(|g| &g.currency);

        let any_scoped = !self.providers.is_empty() || !self.tags.is_empty() || !self.types.is_empty();
        if any_scoped && self.global.is_none() {
            return Err(FinFocusError::config(
                "a Global budget is mandatory when any scoped budget is defined",
            ));
        }

        if let Some(global) = &self.global {
            global.validate(None)?;
        }
        for budget in self.providers.values() {
            budget.validate(global_currency)?;
        }
        for budget in self.types.values() {
            budget.validate(global_currency)?;
        }
        for tag in &self.tags {
            tag.validate_selector()?;
            tag.budget.validate(global_currency)?;
        }
        if matches!(self.exit_on_threshold, Some(true)) {
            if let Some(code) = self.exit_code {
                if code > 255 {
                    return Err(FinFocusError::config(format!(
                        "exit code {code} out of range [0,255]"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usd() -> Currency {
        Currency::new("USD").unwrap()
    }

    fn budget(amount: Decimal, currency: Currency) -> ScopedBudget {
        ScopedBudget {
            amount,
            currency,
            period: Period::Monthly,
            alerts: Vec::new(),
            exit_on_threshold: None,
            exit_code: None,
        }
    }

    #[test]
    fn mismatched_currency_rejected() {
        let eur = Currency::new("EUR").unwrap();
        let mut config = BudgetsConfig {
            global: Some(budget(dec!(100), usd())),
            ..Default::default()
        };
        config.providers.insert("aws".to_string(), budget(dec!(10), eur));
        assert!(config.validate().is_err());
    }

    #[test]
    fn scoped_budget_without_global_rejected() {
        let mut config = BudgetsConfig::default();
        config.providers.insert("aws".to_string(), budget(dec!(10), usd()));
        assert!(config.validate().is_err());
    }

    #[test]
    fn exit_code_out_of_range_rejected_only_when_exit_on_threshold() {
        let mut b = budget(dec!(100), usd());
        b.exit_on_threshold = Some(true);
        b.exit_code = Some(999);
        let config = BudgetsConfig {
            global: Some(b.clone()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        b.exit_on_threshold = Some(false);
        let config = BudgetsConfig {
            global: Some(b),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn tag_selector_syntax_validated() {
        let good = TagBudget {
            selector: "env:production".to_string(),
            priority: 0,
            budget: budget(dec!(1), usd()),
        };
        assert!(good.validate_selector().is_ok());

        let wildcard = TagBudget {
            selector: "env:*".to_string(),
            priority: 0,
            budget: budget(dec!(1), usd()),
        };
        assert!(wildcard.validate_selector().is_ok());

        let bad = TagBudget {
            selector: "not valid!".to_string(),
            priority: 0,
            budget: budget(dec!(1), usd()),
        };
        assert!(bad.validate_selector().is_err());
    }

    #[test]
    fn tag_wildcard_matches_any_value() {
        let tag = TagBudget {
            selector: "env:*".to_string(),
            priority: 0,
            budget: budget(dec!(1), usd()),
        };
        assert!(tag.matches("env", "production"));
        assert!(tag.matches("env", "staging"));
        assert!(!tag.matches("team", "production"));
    }
}

use duematch_core::parse::strict_amount;
use duematch_core::Money;
use serde::Deserialize;

use crate::error::{EngineError, Result};

/// Knobs of the matching pipeline. Defaults are the production constants.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Floor every strategy result must clear to be returned.
    pub acceptance_threshold: f64,
    /// Fixed confidence reported for user-rule matches.
    pub rule_confidence: f64,
    pub payment_confidence_cap: f64,
    pub alias_confidence_cap: f64,
    /// Amount gate shared by the payment, alias and fuzzy strategies.
    #[serde(deserialize_with = "strict_amount")]
    pub amount_tolerance: Money,
    /// Differences at or below this count as an exact amount.
    #[serde(deserialize_with = "strict_amount")]
    pub exact_amount_tolerance: Money,
    /// Amount tolerance for rules that assert an amount without one.
    #[serde(deserialize_with = "strict_amount")]
    pub default_rule_tolerance: Money,
    pub payment_date_window_days: i64,
    pub alias_date_window_days: i64,
    /// Alias and fuzzy strategies give full date credit within this many days.
    pub alias_close_date_days: i64,
    /// Similarity an alias group member needs with the bill to be borrowed.
    pub alias_group_threshold: f64,
    /// Similarity a rule's bill name needs with the bill to apply to it.
    pub rule_name_threshold: f64,
    pub name_weight: f64,
    pub amount_weight: f64,
    pub date_weight: f64,
    /// Amount score for a non-exact amount that passed the gate.
    pub near_amount_score: f64,
    /// Date score for a date that passed the gate but is not close.
    pub near_date_score: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.70,
            rule_confidence: 0.95,
            payment_confidence_cap: 0.90,
            alias_confidence_cap: 0.85,
            amount_tolerance: Money::from_cents(50),
            exact_amount_tolerance: Money::from_cents(1),
            default_rule_tolerance: Money::from_cents(50),
            payment_date_window_days: 5,
            alias_date_window_days: 3,
            alias_close_date_days: 1,
            alias_group_threshold: 0.7,
            rule_name_threshold: 0.7,
            name_weight: 0.5,
            amount_weight: 0.3,
            date_weight: 0.2,
            near_amount_score: 0.8,
            near_date_score: 0.8,
        }
    }
}

impl MatcherConfig {
    pub fn validate(&self) -> Result<()> {
        let unit = [
            ("acceptance_threshold", self.acceptance_threshold),
            ("rule_confidence", self.rule_confidence),
            ("payment_confidence_cap", self.payment_confidence_cap),
            ("alias_confidence_cap", self.alias_confidence_cap),
            ("alias_group_threshold", self.alias_group_threshold),
            ("rule_name_threshold", self.rule_name_threshold),
            ("name_weight", self.name_weight),
            ("amount_weight", self.amount_weight),
            ("date_weight", self.date_weight),
            ("near_amount_score", self.near_amount_score),
            ("near_date_score", self.near_date_score),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::InvalidConfig(format!(
                    "matcher.{name} must be within [0, 1], got {value}"
                )));
            }
        }

        let weights = self.name_weight + self.amount_weight + self.date_weight;
        if weights > 1.0 + 1e-9 {
            return Err(EngineError::InvalidConfig(format!(
                "matcher weights sum to {weights}, more than 1"
            )));
        }

        for (name, amount) in [
            ("amount_tolerance", self.amount_tolerance),
            ("exact_amount_tolerance", self.exact_amount_tolerance),
            ("default_rule_tolerance", self.default_rule_tolerance),
        ] {
            if amount.is_outflow() {
                return Err(EngineError::InvalidConfig(format!(
                    "matcher.{name} must not be negative, got {amount}"
                )));
            }
        }

        for (name, days) in [
            ("payment_date_window_days", self.payment_date_window_days),
            ("alias_date_window_days", self.alias_date_window_days),
            ("alias_close_date_days", self.alias_close_date_days),
        ] {
            if days < 0 {
                return Err(EngineError::InvalidConfig(format!(
                    "matcher.{name} must not be negative, got {days}"
                )));
            }
        }

        Ok(())
    }
}

/// Thresholds of subscription auto-detection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Fewer charges than this and no pattern is inferred.
    pub min_occurrences: usize,
    /// A charge is "consistent" when within this much of the group mean.
    #[serde(deserialize_with = "strict_amount")]
    pub amount_tolerance: Money,
    /// Groups with a lower share of consistent charges are too volatile.
    pub min_amount_consistency: f64,
    /// Candidates scoring below this (0–100) are dropped.
    pub min_confidence: f64,
    /// How many of the latest charges to attach to each candidate.
    pub recent_charge_samples: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_occurrences: 2,
            amount_tolerance: Money::from_cents(200),
            min_amount_consistency: 0.3,
            min_confidence: 75.0,
            recent_charge_samples: 3,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_occurrences < 2 {
            return Err(EngineError::InvalidConfig(
                "subscriptions.min_occurrences must be at least 2".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_amount_consistency) {
            return Err(EngineError::InvalidConfig(format!(
                "subscriptions.min_amount_consistency must be within [0, 1], got {}",
                self.min_amount_consistency
            )));
        }
        if !(0.0..=100.0).contains(&self.min_confidence) {
            return Err(EngineError::InvalidConfig(format!(
                "subscriptions.min_confidence must be within [0, 100], got {}",
                self.min_confidence
            )));
        }
        if self.amount_tolerance.is_outflow() {
            return Err(EngineError::InvalidConfig(
                "subscriptions.amount_tolerance must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level engine configuration file.
///
/// ```toml
/// [matcher]
/// acceptance_threshold = 0.7
/// amount_tolerance = "0.50"
///
/// [subscriptions]
/// min_confidence = 80
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub matcher: MatcherConfig,
    pub subscriptions: DetectionConfig,
}

impl EngineConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(toml_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.matcher.validate()?;
        self.subscriptions.validate()
    }
}

use std::collections::HashSet;

use duematch_core::parse::strict_optional_amount;
use duematch_core::{DateRange, FinancialEvent, Money, Transaction};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::payment::{PaymentPatternExtractor, PaymentType};
use crate::similarity::similarity;

/// A user-authored statement of how a bill gets paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRule {
    pub id: String,
    #[serde(default, alias = "bill_id", skip_serializing_if = "Option::is_none")]
    pub bill_id: Option<String>,
    #[serde(default, alias = "bill_name", skip_serializing_if = "Option::is_none")]
    pub bill_name: Option<String>,
    #[serde(default, alias = "match_criteria")]
    pub match_criteria: MatchCriteria,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCriteria {
    #[serde(
        default,
        alias = "amount_exact",
        deserialize_with = "strict_optional_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount_exact: Option<Money>,
    #[serde(
        default,
        alias = "amount_tolerance",
        deserialize_with = "strict_optional_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount_tolerance: Option<Money>,
    #[serde(default, alias = "required_keywords")]
    pub required_keywords: Vec<String>,
    #[serde(default, alias = "optional_keywords")]
    pub optional_keywords: Vec<String>,
    #[serde(default, alias = "transaction_types")]
    pub transaction_types: Vec<PaymentType>,
    #[serde(default, alias = "date_window", skip_serializing_if = "Option::is_none")]
    pub date_window: Option<DateWindow>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateWindow {
    #[serde(default, alias = "days_before")]
    pub days_before: u32,
    #[serde(default, alias = "days_after")]
    pub days_after: u32,
}

impl PaymentRule {
    pub fn new(id: &str, match_criteria: MatchCriteria) -> Self {
        PaymentRule {
            id: id.to_string(),
            bill_id: None,
            bill_name: None,
            match_criteria,
            enabled: true,
        }
    }

    pub fn for_bill(mut self, bill_id: &str) -> Self {
        self.bill_id = Some(bill_id.to_string());
        self
    }

    pub fn for_bill_name(mut self, bill_name: &str) -> Self {
        self.bill_name = Some(bill_name.to_string());
        self
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| EngineError::InvalidRule {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.id.trim().is_empty() {
            return Err(invalid("rule id is empty"));
        }
        let c = &self.match_criteria;
        if c.amount_tolerance.is_some_and(Money::is_outflow) {
            return Err(invalid("amount tolerance is negative"));
        }
        if c.required_keywords
            .iter()
            .chain(&c.optional_keywords)
            .any(|k| k.trim().is_empty())
        {
            return Err(invalid("keyword lists must not contain blank keywords"));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RuleSnapshot {
    List(Vec<PaymentRule>),
    Table { rules: Vec<PaymentRule> },
}

impl RuleSnapshot {
    fn into_rules(self) -> Vec<PaymentRule> {
        match self {
            RuleSnapshot::List(rules) | RuleSnapshot::Table { rules } => rules,
        }
    }
}

/// Validates a loaded rule set: every rule well-formed, ids unique.
pub fn validate_rules(rules: &[PaymentRule]) -> Result<()> {
    let mut seen = HashSet::new();
    for rule in rules {
        rule.validate()?;
        if !seen.insert(rule.id.as_str()) {
            return Err(EngineError::DuplicateRule(rule.id.clone()));
        }
    }
    Ok(())
}

/// Parses rules from JSON: either a bare array or `{"rules": [...]}`.
pub fn rules_from_json(json: &str) -> Result<Vec<PaymentRule>> {
    let rules = serde_json::from_str::<RuleSnapshot>(json)?.into_rules();
    validate_rules(&rules)?;
    Ok(rules)
}

/// Parses rules from TOML, one `[[rules]]` table per rule.
pub fn rules_from_toml(toml_content: &str) -> Result<Vec<PaymentRule>> {
    let rules = toml::from_str::<RuleSnapshot>(toml_content)?.into_rules();
    validate_rules(&rules)?;
    Ok(rules)
}

/// Scores transactions against user rules. Never applies the acceptance
/// threshold itself.
pub struct RuleEvaluator {
    default_tolerance: Money,
    name_threshold: f64,
}

impl RuleEvaluator {
    pub fn new(default_tolerance: Money, name_threshold: f64) -> Self {
        Self {
            default_tolerance,
            name_threshold,
        }
    }

    /// Whether `rule` speaks about `bill`: enabled, and bound to it by id or
    /// by a rule bill name similar enough to the bill's name.
    pub fn applies_to(&self, rule: &PaymentRule, bill: &FinancialEvent) -> bool {
        if !rule.enabled {
            return false;
        }
        if rule.bill_id.as_deref() == Some(bill.id.as_str()) {
            return true;
        }
        rule.bill_name
            .as_deref()
            .is_some_and(|name| similarity(&bill.name, name) > self.name_threshold)
    }

    /// Fraction of the rule's criteria that `tx` satisfies for `bill`.
    ///
    /// Required keywords are a gate: if any is missing the score is 0 no
    /// matter what else matches. Optional keywords earn half credit. A rule
    /// with no criteria scores 0.
    pub fn score(&self, rule: &PaymentRule, tx: &Transaction, bill: &FinancialEvent) -> f64 {
        let c = &rule.match_criteria;
        let text = tx.search_text();
        let mut applicable = 0.0f64;
        let mut matched = 0.0f64;

        if c.amount_exact.is_some() || c.amount_tolerance.is_some() {
            applicable += 1.0;
            let target = c.amount_exact.unwrap_or(bill.amount);
            let tolerance = c.amount_tolerance.unwrap_or(self.default_tolerance);
            if tx.amount.magnitude_diff(target) <= tolerance {
                matched += 1.0;
            }
        }

        if !c.required_keywords.is_empty() {
            applicable += 1.0;
            let all_present = c
                .required_keywords
                .iter()
                .all(|k| text.contains(&k.trim().to_lowercase()));
            if !all_present {
                return 0.0;
            }
            matched += 1.0;
        }

        if !c.optional_keywords.is_empty() {
            applicable += 1.0;
            if c
                .optional_keywords
                .iter()
                .any(|k| text.contains(&k.trim().to_lowercase()))
            {
                matched += 0.5;
            }
        }

        if !c.transaction_types.is_empty() {
            applicable += 1.0;
            let recognized = tx.texts().find_map(PaymentPatternExtractor::recognize);
            if recognized.is_some_and(|t| c.transaction_types.contains(&t)) {
                matched += 1.0;
            }
        }

        if let Some(window) = c.date_window {
            applicable += 1.0;
            if let (Some(anchor), Some(date)) = (bill.reference_date(), tx.date) {
                if DateRange::around(anchor, window.days_before, window.days_after).contains(date) {
                    matched += 1.0;
                }
            }
        }

        if applicable == 0.0 {
            return 0.0;
        }
        matched / applicable
    }
}

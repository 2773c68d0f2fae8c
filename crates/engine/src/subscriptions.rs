//! Recurring-charge discovery from raw transaction history.
//!
//! No bill records are needed: outflows are grouped by normalized merchant,
//! and a group becomes a [`SubscriptionCandidate`] when its amounts are
//! stable and its charges land on a recognizable billing cycle.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use duematch_core::{days_apart, Frequency, Money, Transaction};
use serde::Serialize;
use tracing::debug;

use crate::aliases::MerchantAliasTable;
use crate::config::DetectionConfig;
use crate::error::Result;

/// One charge attached to a candidate as evidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionCharge {
    pub transaction_id: String,
    pub date: NaiveDate,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionCandidate {
    pub merchant_name: String,
    /// Mean charge, as a positive amount.
    pub amount: Money,
    pub billing_cycle: Frequency,
    /// 0–100.
    pub confidence: f64,
    pub occurrences: usize,
    /// Newest first.
    pub recent_charges: Vec<SubscriptionCharge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_renewal: Option<NaiveDate>,
    pub category: String,
    /// Oldest first.
    pub transaction_ids: Vec<String>,
}

const DEFAULT_CATEGORY: &str = "Other";

const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Streaming",
        &["netflix", "hulu", "disney", "hbo", "paramount", "peacock", "prime video", "apple tv", "youtube premium"],
    ),
    (
        "Music",
        &["spotify", "apple music", "tidal", "pandora", "youtube music", "audible"],
    ),
    (
        "Cloud Storage",
        &["icloud", "google one", "dropbox", "onedrive", "box.com"],
    ),
    (
        "News",
        &["nyt", "new york times", "wsj", "washington post", "medium", "substack"],
    ),
    (
        "Fitness",
        &["peloton", "strava", "fitbit", "myfitnesspal", "headspace", "calm", "gym", "fitness"],
    ),
    (
        "Software",
        &["adobe", "microsoft", "github", "openai", "notion", "1password", "zoom"],
    ),
    (
        "Utilities",
        &["electric", "water", "gas", "comcast", "xfinity", "verizon", "at&t", "t-mobile", "internet"],
    ),
    ("Insurance", &["insurance", "geico", "progressive", "state farm", "allstate"]),
];

/// Corporate suffixes that vary between feeds for the same merchant.
const MERCHANT_SUFFIXES: &[&str] = &[" inc", " llc", ".com", " corp", " co", " ltd"];

/// Group key for a merchant string: lowercase and trimmed, with trailing
/// punctuation and corporate suffixes removed until none remain.
pub fn normalize_merchant(name: &str) -> String {
    let mut current = name.trim().to_lowercase();
    loop {
        let trimmed = current
            .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, '.' | ',' | '*' | '-' | '#' | ';' | ':'))
            .to_string();
        let stripped = MERCHANT_SUFFIXES
            .iter()
            .find_map(|suffix| trimmed.strip_suffix(suffix))
            .filter(|rest| !rest.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| trimmed.clone());
        if stripped == current {
            return current;
        }
        current = stripped;
    }
}

/// Category from the static keyword table, `"Other"` when nothing matches.
pub fn suggest_category(merchant: &str) -> &'static str {
    let lower = merchant.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(DEFAULT_CATEGORY)
}

/// Billing cycle for an average gap, with its nominal gap and the slack an
/// individual gap may have and still count as regular.
fn classify_cycle(average_gap: f64) -> Option<(Frequency, f64, f64)> {
    [
        (Frequency::Monthly, 2.0),
        (Frequency::Quarterly, 2.0),
        (Frequency::Annual, 5.0),
    ]
    .into_iter()
    .map(|(cycle, slack)| (cycle, cycle.nominal_days() as f64, slack))
    .find(|(_, nominal, slack)| (average_gap - nominal).abs() <= *slack)
}

pub struct SubscriptionDetector {
    config: DetectionConfig,
    aliases: MerchantAliasTable,
}

impl Default for SubscriptionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionDetector {
    pub fn new() -> Self {
        Self {
            config: DetectionConfig::default(),
            aliases: MerchantAliasTable::empty(),
        }
    }

    /// Detector with custom thresholds. Fails if `config` is out of range.
    pub fn with_config(config: DetectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// Alias table consulted for categories before the keyword table.
    pub fn with_aliases(mut self, aliases: MerchantAliasTable) -> Self {
        self.aliases = aliases;
        self
    }

    /// Recurring-charge candidates in `transactions`, highest confidence
    /// first. Merchants matching a name in `existing` are left out.
    pub fn detect(&self, transactions: &[Transaction], existing: &[String]) -> Vec<SubscriptionCandidate> {
        let mut groups: BTreeMap<String, Vec<(&Transaction, &str, NaiveDate)>> = BTreeMap::new();
        for tx in transactions {
            if !tx.amount.is_outflow() {
                continue;
            }
            let (Some(merchant), Some(date)) = (tx.merchant(), tx.date) else {
                continue;
            };
            let key = normalize_merchant(merchant);
            if key.is_empty() {
                continue;
            }
            groups.entry(key).or_default().push((tx, merchant, date));
        }

        let existing: Vec<String> = existing
            .iter()
            .map(|name| normalize_merchant(name))
            .filter(|name| !name.is_empty())
            .collect();

        let mut candidates: Vec<SubscriptionCandidate> = groups
            .into_iter()
            .filter_map(|(key, mut charges)| {
                charges.sort_by_key(|(_, _, date)| *date);
                let candidate = self.evaluate_group(&key, &charges)?;
                if existing
                    .iter()
                    .any(|name| key.contains(name.as_str()) || name.contains(key.as_str()))
                {
                    debug!(merchant = %key, "already tracked as a subscription");
                    return None;
                }
                Some(candidate)
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.merchant_name.cmp(&b.merchant_name))
        });
        candidates
    }

    fn evaluate_group(
        &self,
        key: &str,
        charges: &[(&Transaction, &str, NaiveDate)],
    ) -> Option<SubscriptionCandidate> {
        let n = charges.len();
        if n < self.config.min_occurrences {
            return None;
        }

        let amounts: Vec<Money> = charges.iter().map(|(tx, _, _)| tx.amount.abs()).collect();
        let Some(mean) = Money::mean(&amounts) else {
            debug!(merchant = %key, "charge total out of range");
            return None;
        };
        let consistent = amounts
            .iter()
            .filter(|a| a.magnitude_diff(mean) <= self.config.amount_tolerance)
            .count();
        let amount_consistency = consistent as f64 / n as f64;
        if amount_consistency < self.config.min_amount_consistency {
            debug!(merchant = %key, amount_consistency, "amounts too volatile");
            return None;
        }

        let gaps: Vec<i64> = charges
            .windows(2)
            .map(|w| days_apart(w[1].2, w[0].2))
            .collect();
        let average_gap = gaps.iter().sum::<i64>() as f64 / gaps.len() as f64;
        let Some((cycle, expected, slack)) = classify_cycle(average_gap) else {
            debug!(merchant = %key, average_gap, "no billing cycle");
            return None;
        };
        let regular = gaps
            .iter()
            .filter(|&&gap| (gap as f64 - expected).abs() <= slack)
            .count();
        let interval_regularity = regular as f64 / gaps.len() as f64;

        let first = charges[0].2;
        let last = charges[n - 1].2;
        let occurrence_score = ((n as f64 - 2.0) / 4.0 + 0.5).min(1.0);
        let span_score = (days_apart(last, first) as f64 / 30.0 / 3.0).min(1.0);
        let confidence = 100.0
            * (0.4 * occurrence_score
                + 0.3 * amount_consistency
                + 0.2 * interval_regularity
                + 0.1 * span_score);
        if confidence < self.config.min_confidence {
            debug!(merchant = %key, confidence, "below confidence floor");
            return None;
        }

        let merchant_name = charges[n - 1].1.trim().to_string();
        let category = self
            .aliases
            .lookup(&merchant_name)
            .or_else(|| self.aliases.lookup(key))
            .and_then(|entry| entry.category.clone())
            .unwrap_or_else(|| suggest_category(key).to_string());

        let recent_charges = charges
            .iter()
            .rev()
            .take(self.config.recent_charge_samples)
            .map(|(tx, _, date)| SubscriptionCharge {
                transaction_id: tx.id.clone(),
                date: *date,
                amount: tx.amount.abs(),
            })
            .collect();

        Some(SubscriptionCandidate {
            merchant_name,
            amount: mean,
            billing_cycle: cycle,
            confidence,
            occurrences: n,
            recent_charges,
            next_renewal: cycle.advance(last),
            category,
            transaction_ids: charges.iter().map(|(tx, _, _)| tx.id.clone()).collect(),
        })
    }
}

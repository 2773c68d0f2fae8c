use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::parse::{lenient_amount, lenient_date};

/// A bank event as reported by the aggregation feed. Read-only to the
/// engine; `linked_event_id` is written by whoever persists match results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "merchantName", skip_serializing_if = "Option::is_none")]
    pub merchant_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: Money,
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, alias = "accountId")]
    pub account_id: String,
    #[serde(default)]
    pub pending: bool,
    #[serde(default, alias = "institutionName", skip_serializing_if = "Option::is_none")]
    pub institution_name: Option<String>,
    #[serde(
        default,
        alias = "linkedEventId",
        alias = "financialEventId",
        skip_serializing_if = "Option::is_none"
    )]
    pub linked_event_id: Option<String>,
}

impl Transaction {
    pub fn new(id: &str, name: &str, amount: Money, date: Option<NaiveDate>) -> Self {
        Transaction {
            id: id.to_string(),
            name: name.to_string(),
            merchant_name: None,
            amount,
            date,
            account_id: String::new(),
            pending: false,
            institution_name: None,
            linked_event_id: None,
        }
    }

    pub fn with_merchant(mut self, merchant: &str) -> Self {
        self.merchant_name = Some(merchant.to_string());
        self
    }

    /// The non-empty text fields describing the counterparty, merchant
    /// name first.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.merchant_name
            .as_deref()
            .into_iter()
            .chain(std::iter::once(self.name.as_str()))
            .filter(|s| !s.trim().is_empty())
    }

    /// Merchant name when the feed supplied one, otherwise the display name.
    pub fn merchant(&self) -> Option<&str> {
        self.texts().next()
    }

    /// Lowercased concatenation of every text field, for keyword tests.
    pub fn search_text(&self) -> String {
        self.texts()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether this transaction is already claimed by an event other than
    /// `event_id`.
    pub fn is_linked_elsewhere(&self, event_id: &str) -> bool {
        self.linked_event_id
            .as_deref()
            .is_some_and(|linked| !linked.is_empty() && linked != event_id)
    }
}

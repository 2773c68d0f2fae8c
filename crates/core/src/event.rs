use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::parse::{lenient_amount, lenient_date};
use crate::period::Frequency;

/// An expected, dated obligation (a bill) that a transaction may satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialEvent {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: Money,
    #[serde(default, alias = "due_date", deserialize_with = "lenient_date")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, alias = "paid_date", deserialize_with = "lenient_date")]
    pub paid_date: Option<NaiveDate>,
    #[serde(default, alias = "merchant_names")]
    pub merchant_names: Vec<String>,
    #[serde(default, alias = "recurring_pattern_id", skip_serializing_if = "Option::is_none")]
    pub recurring_pattern_id: Option<String>,
}

impl FinancialEvent {
    pub fn new(id: &str, name: &str, amount: Money, due_date: Option<NaiveDate>) -> Self {
        FinancialEvent {
            id: id.to_string(),
            name: name.to_string(),
            amount,
            due_date,
            paid_date: None,
            merchant_names: Vec::new(),
            recurring_pattern_id: None,
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.merchant_names = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    /// The date a matching transaction should land near: the paid date when
    /// known, otherwise the due date.
    pub fn reference_date(&self) -> Option<NaiveDate> {
        self.paid_date.or(self.due_date)
    }
}

/// Template for a recurring obligation. Produced and advanced outside the
/// engine; the matcher only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringPattern {
    pub id: String,
    pub merchant: String,
    #[serde(default, alias = "expected_amount", deserialize_with = "lenient_amount")]
    pub expected_amount: Money,
    pub frequency: Frequency,
    #[serde(default, alias = "next_occurrence", deserialize_with = "lenient_date")]
    pub next_occurrence: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn reference_date_prefers_paid_date() {
        let mut bill = FinancialEvent::new("b1", "Rent", Money::from_cents(150000), Some(date(2025, 11, 1)));
        assert_eq!(bill.reference_date(), Some(date(2025, 11, 1)));
        bill.paid_date = Some(date(2025, 10, 30));
        assert_eq!(bill.reference_date(), Some(date(2025, 10, 30)));
    }

    #[test]
    fn deserializes_camel_case_bill() {
        let bill: FinancialEvent = serde_json::from_str(
            r#"{"id": "b1", "name": "Netflix", "amount": 15.99, "dueDate": "2025-11-05",
                "merchantNames": ["NETFLIX.COM"], "recurringPatternId": "p1"}"#,
        )
        .unwrap();
        assert_eq!(bill.amount, Money::from_cents(1599));
        assert_eq!(bill.due_date, Some(date(2025, 11, 5)));
        assert_eq!(bill.paid_date, None);
        assert_eq!(bill.merchant_names, vec!["NETFLIX.COM".to_string()]);
        assert_eq!(bill.recurring_pattern_id.as_deref(), Some("p1"));
    }

    #[test]
    fn deserializes_snake_case_bill() {
        let bill: FinancialEvent = serde_json::from_str(
            r#"{"id": "b2", "name": "Gym", "amount": "$40.00", "due_date": "2025-11-10",
                "paid_date": "not a date"}"#,
        )
        .unwrap();
        assert_eq!(bill.amount, Money::from_cents(4000));
        assert_eq!(bill.due_date, Some(date(2025, 11, 10)));
        assert_eq!(bill.paid_date, None);
        assert!(bill.merchant_names.is_empty());
    }

    #[test]
    fn pattern_deserializes_feed_fields() {
        let pattern: RecurringPattern = serde_json::from_str(
            r#"{"id": "p1", "merchant": "Netflix", "expectedAmount": 15.99,
                "frequency": "monthly", "nextOccurrence": "2025-11-05"}"#,
        )
        .unwrap();
        assert_eq!(pattern.frequency, Frequency::Monthly);
        assert_eq!(pattern.expected_amount, Money::from_cents(1599));
        assert_eq!(pattern.next_occurrence, Some(date(2025, 11, 5)));
    }
}

//! Forgiving field parsing for upstream feed records.
//!
//! Aggregator payloads are inconsistent: amounts arrive as numbers, strings,
//! `"$1,234.56"` or accounting-style `"(75.25)"`, dates as ISO strings or US
//! slash dates. A field that cannot be read is treated as absent (dates) or
//! zero (amounts) so the affected signal simply scores low.
//!
//! Configuration and rule files get the same spellings through the `strict_*`
//! variants, which reject an unreadable value instead of degrading it.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;

use crate::money::Money;

pub fn parse_amount(s: &str) -> Option<Money> {
    let s = s.trim();
    let (negative, s) = if s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
        (true, &s[1..s.len() - 1])
    } else {
        (false, s)
    };
    let s = s.replace([',', '$', ' '], "");
    let dec = Decimal::from_str(&s).ok()?;
    let money = Money::from_decimal(dec);
    Some(if negative { -money } else { money })
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    // Timestamps ("2025-11-05T00:00:00Z") carry the calendar date up front.
    let s = s.get(..10).filter(|p| p.len() == 10 && s.as_bytes().get(4) == Some(&b'-')).unwrap_or(s);

    ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%m-%d-%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

fn try_amount_from_value(value: &Value) -> Option<Money> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(|i| Money::from_decimal(Decimal::from(i)))
            .or_else(|| parse_amount(&n.to_string())),
        Value::String(s) => parse_amount(s),
        _ => None,
    }
}

fn amount_from_value(value: &Value) -> Money {
    try_amount_from_value(value).unwrap_or_default()
}

/// `deserialize_with` target: unreadable or null amounts become zero.
pub fn lenient_amount<'de, D>(deserializer: D) -> Result<Money, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(amount_from_value(&value))
}

/// `deserialize_with` target that fails on anything but a readable amount.
pub fn strict_amount<'de, D>(deserializer: D) -> Result<Money, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    try_amount_from_value(&value)
        .ok_or_else(|| D::Error::custom(format!("invalid amount: {value}")))
}

/// Like [`strict_amount`], with null or absent meaning `None`.
pub fn strict_optional_amount<'de, D>(deserializer: D) -> Result<Option<Money>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(None),
        _ => try_amount_from_value(&value)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid amount: {value}"))),
    }
}

/// `deserialize_with` target: unreadable dates become `None`. Native TOML
/// dates reach us as a one-entry table holding the date string.
pub fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => parse_date(&s),
        Value::Object(map) if map.len() == 1 => {
            map.values().next().and_then(Value::as_str).and_then(parse_date)
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parse_amount_plain_and_decorated() {
        assert_eq!(parse_amount("123.45"), Some(Money::from_cents(12345)));
        assert_eq!(parse_amount("$1,234.56"), Some(Money::from_cents(123456)));
        assert_eq!(parse_amount("-50.60"), Some(Money::from_cents(-5060)));
    }

    #[test]
    fn parse_amount_accounting_parens() {
        assert_eq!(parse_amount("(75.25)"), Some(Money::from_cents(-7525)));
    }

    #[test]
    fn parse_amount_invalid() {
        assert_eq!(parse_amount("n/a"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn parse_date_formats() {
        assert_eq!(parse_date("2025-11-05"), Some(date(2025, 11, 5)));
        assert_eq!(parse_date("11/05/2025"), Some(date(2025, 11, 5)));
        assert_eq!(parse_date("2025-11-05T12:30:00Z"), Some(date(2025, 11, 5)));
        assert_eq!(parse_date("soon"), None);
    }

    #[derive(Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "lenient_amount")]
        amount: Money,
        #[serde(default, deserialize_with = "lenient_date")]
        date: Option<NaiveDate>,
    }

    #[test]
    fn lenient_fields_degrade_instead_of_failing() {
        let row: Row =
            serde_json::from_str(r#"{"amount": "garbage", "date": 20251105}"#)
                .unwrap();
        assert!(row.amount.is_zero());
        assert_eq!(row.date, None);
    }

    #[test]
    fn lenient_fields_accept_numbers_and_strings() {
        let row: Row =
            serde_json::from_str(r#"{"amount": -15.99, "date": "2025-11-05"}"#)
                .unwrap();
        assert_eq!(row.amount, Money::from_cents(-1599));
        assert_eq!(row.date, Some(date(2025, 11, 5)));
    }

    #[derive(Debug, Deserialize)]
    struct Limits {
        #[serde(deserialize_with = "strict_amount")]
        tolerance: Money,
        #[serde(default, deserialize_with = "strict_optional_amount")]
        cap: Option<Money>,
    }

    #[test]
    fn strict_fields_accept_the_lenient_spellings() {
        let limits: Limits =
            serde_json::from_str(r#"{"tolerance": "$0.50", "cap": 12}"#).unwrap();
        assert_eq!(limits.tolerance, Money::from_cents(50));
        assert_eq!(limits.cap, Some(Money::from_cents(1200)));

        let limits: Limits = serde_json::from_str(r#"{"tolerance": 0.25, "cap": null}"#).unwrap();
        assert_eq!(limits.tolerance, Money::from_cents(25));
        assert_eq!(limits.cap, None);
    }

    #[test]
    fn strict_fields_reject_unreadable_amounts() {
        let err = serde_json::from_str::<Limits>(r#"{"tolerance": "fifty cents"}"#).unwrap_err();
        assert!(err.to_string().contains("invalid amount"));
        assert!(serde_json::from_str::<Limits>(r#"{"tolerance": true}"#).is_err());
        assert!(serde_json::from_str::<Limits>(r#"{"tolerance": 1, "cap": "lots"}"#).is_err());
        assert!(serde_json::from_str::<Limits>(r#"{"tolerance": 1, "cap": [1]}"#).is_err());
    }

    #[test]
    fn lenient_fields_missing_use_defaults() {
        let row: Row = serde_json::from_str("{}").unwrap();
        assert!(row.amount.is_zero());
        assert_eq!(row.date, None);
    }
}

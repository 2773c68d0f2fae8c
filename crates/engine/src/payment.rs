//! Recognition of person-to-person payment text.
//!
//! Bank feeds describe P2P transfers with the human counterparty embedded in
//! free text (`"Zelle Transfer CONF# P73F008MJ; RAYLENE PANDO"`). The
//! extractor walks an ordered table of payment shapes; the first shape that
//! recognizes the text decides the payment type and how the recipient is cut
//! out of it.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::util::collapse_lower;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_zelle, r"(?i)\bzelle\b");
re!(re_zelle_recipient,
    r"(?i)\bzelle\b(?:\s+(?:transfer|payment|pmt|sent|received)\b)?(?:\s+(?:to|from)\b)?(?:\s+conf(?:irmation)?\s*(?:#|no\.?|number)?\s*:?\s*[a-z0-9]+)?[\s;:*\-]*(?P<r>.*)$");

re!(re_venmo, r"(?i)\bvenmo\b");
re!(re_venmo_recipient,
    r"(?i)\bvenmo\b(?:\s+(?:payment|cashout|transfer|pmt)\b)?(?:\s+(?:to|from)\b)?[\s;:*\-]*(?P<r>.*)$");

re!(re_cash_app, r"(?i)\b(?:cash\s*app|square\s+cash|sq\s*\*\s*cash)\b");
re!(re_cash_app_recipient,
    r"(?i)\b(?:cash\s*app|square\s+cash|sq\s*\*\s*cash)\b(?:\s*\*)?(?:\s+(?:payment|transfer|pmt)\b)?(?:\s+(?:to|from)\b)?[\s;:*\-]*(?P<r>.*)$");

re!(re_paypal, r"(?i)\bpaypal\b");
re!(re_paypal_recipient,
    r"(?i)\bpaypal\b(?:\s+(?:inst\s+xfer|transfer|payment|pmt)\b)?(?:\s+(?:to|from)\b)?[\s;:*\-]*(?P<r>.*)$");

re!(re_apple_cash, r"(?i)\bapple\s+cash\b");
re!(re_apple_cash_recipient,
    r"(?i)\bapple\s+cash\b(?:\s+(?:sent\s+money|payment|transfer)\b)?(?:\s+(?:to|from)\b)?[\s;:*\-]*(?P<r>.*)$");

re!(re_wire, r"(?i)\bwire\b");
re!(re_wire_beneficiary,
    r"(?i)\bwire\b.*?\b(?:bnf|beneficiary|benef)\s*[:=]\s*(?P<r>[^:=]*?)(?:\s+[a-z]{2,8}\s*[:=].*)?$");
re!(re_wire_recipient,
    r"(?i)\b(?:outgoing\s+)?wire\s+(?:(?:transfer|trf|xfer|out|payment)\s+)?(?:to|ben(?:eficiary)?)\b[\s:\-]*(?P<r>.*)$");

re!(re_ach, r"(?i)\bach\b");
re!(re_ach_recipient,
    r"(?i)\bach\b(?:\s+(?:debit|credit|payment|pmt|transfer|xfer)\b)?(?:\s+(?:to|from)\b)?[\s:\-]*(?P<r>.*)$");

re!(re_check, r"(?i)\b(?:check|chk|cheque)\s*(?:#|no\.?)?\s*\d+");
re!(re_check_recipient,
    r"(?i)\b(?:check|chk|cheque)\s*(?:#|no\.?)?\s*\d+(?:\s+(?:pay\s+to|paid\s+to|payee|to)\b)?[\s:\-]*(?P<r>.*)$");

re!(re_trailing_reference,
    r"(?i)\s+(?:conf(?:irmation)?\b|ref(?:erence)?\b|trace\b|memo\b|id\b|on\s+\d).*$");

// ── Types ────────────────────────────────────────────────────────────────────

/// Channel a P2P payment went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Zelle,
    Venmo,
    #[serde(alias = "cash_app")]
    CashApp,
    PayPal,
    #[serde(alias = "apple_cash")]
    AppleCash,
    Wire,
    Check,
    Ach,
}

impl PaymentType {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentType::Zelle => "zelle",
            PaymentType::Venmo => "venmo",
            PaymentType::CashApp => "cashapp",
            PaymentType::PayPal => "paypal",
            PaymentType::AppleCash => "applecash",
            PaymentType::Wire => "wire",
            PaymentType::Check => "check",
            PaymentType::Ach => "ach",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '_', '-'], "").as_str() {
            "zelle" => Ok(PaymentType::Zelle),
            "venmo" => Ok(PaymentType::Venmo),
            "cashapp" => Ok(PaymentType::CashApp),
            "paypal" => Ok(PaymentType::PayPal),
            "applecash" => Ok(PaymentType::AppleCash),
            "wire" => Ok(PaymentType::Wire),
            "check" | "cheque" => Ok(PaymentType::Check),
            "ach" => Ok(PaymentType::Ach),
            other => Err(format!("Unknown payment type: '{other}'")),
        }
    }
}

/// What the extractor learned from one piece of payment text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub payment_type: PaymentType,
    /// Cleaned recipient: lowercase letters and single spaces only.
    pub recipient: String,
    /// Recipient words of three or more characters, in order.
    pub keywords: Vec<String>,
    /// Base confidence of the shape that recognized the text.
    pub confidence: f64,
}

struct PaymentShape {
    payment_type: PaymentType,
    recognize: fn() -> &'static Regex,
    /// Tried in order; the first capture of `r` wins.
    recipient: &'static [fn() -> &'static Regex],
    confidence: f64,
}

const APP_CONFIDENCE: f64 = 0.90;
const BANK_CONFIDENCE: f64 = 0.85;

static SHAPES: [PaymentShape; 8] = [
    PaymentShape {
        payment_type: PaymentType::Zelle,
        recognize: re_zelle,
        recipient: &[re_zelle_recipient],
        confidence: APP_CONFIDENCE,
    },
    PaymentShape {
        payment_type: PaymentType::Venmo,
        recognize: re_venmo,
        recipient: &[re_venmo_recipient],
        confidence: APP_CONFIDENCE,
    },
    PaymentShape {
        payment_type: PaymentType::CashApp,
        recognize: re_cash_app,
        recipient: &[re_cash_app_recipient],
        confidence: APP_CONFIDENCE,
    },
    PaymentShape {
        payment_type: PaymentType::PayPal,
        recognize: re_paypal,
        recipient: &[re_paypal_recipient],
        confidence: APP_CONFIDENCE,
    },
    PaymentShape {
        payment_type: PaymentType::AppleCash,
        recognize: re_apple_cash,
        recipient: &[re_apple_cash_recipient],
        confidence: APP_CONFIDENCE,
    },
    PaymentShape {
        payment_type: PaymentType::Wire,
        recognize: re_wire,
        recipient: &[re_wire_beneficiary, re_wire_recipient],
        confidence: BANK_CONFIDENCE,
    },
    PaymentShape {
        payment_type: PaymentType::Ach,
        recognize: re_ach,
        recipient: &[re_ach_recipient],
        confidence: BANK_CONFIDENCE,
    },
    PaymentShape {
        payment_type: PaymentType::Check,
        recognize: re_check,
        recipient: &[re_check_recipient],
        confidence: BANK_CONFIDENCE,
    },
];

/// Recipients shorter than this are noise, not names.
const MIN_RECIPIENT_LEN: usize = 3;
const MIN_KEYWORD_LEN: usize = 3;

/// Score for a recipient that appears verbatim in the bill name (or vice versa).
pub const DIRECT_NAME_SCORE: f64 = 0.95;
const KEYWORD_FLOOR: f64 = 0.75;
const KEYWORD_SPAN: f64 = 0.20;

// ── Public extraction API ─────────────────────────────────────────────────────

pub struct PaymentPatternExtractor;

impl PaymentPatternExtractor {
    /// Payment channel of `text`, if any shape recognizes it. Unlike
    /// [`extract`](Self::extract) this does not require a usable recipient.
    pub fn recognize(text: &str) -> Option<PaymentType> {
        Self::shape_for(text).map(|shape| shape.payment_type)
    }

    /// Full extraction. `None` when no shape recognizes the text or when the
    /// recognized shape yields a recipient too short to be a name.
    pub fn extract(text: &str) -> Option<PaymentInfo> {
        let shape = Self::shape_for(text)?;

        let raw = shape
            .recipient
            .iter()
            .find_map(|re| re().captures(text).and_then(|c| c.name("r")))
            .map(|m| m.as_str())?;

        let recipient = clean_recipient(raw);
        if recipient.chars().count() < MIN_RECIPIENT_LEN {
            return None;
        }

        let mut keywords: Vec<String> = Vec::new();
        for word in recipient.split(' ') {
            if word.chars().count() >= MIN_KEYWORD_LEN && !keywords.iter().any(|k| k == word) {
                keywords.push(word.to_string());
            }
        }

        Some(PaymentInfo {
            payment_type: shape.payment_type,
            recipient,
            keywords,
            confidence: shape.confidence,
        })
    }

    /// How well an extracted recipient names `bill_name`:
    /// [`DIRECT_NAME_SCORE`] on substring containment either way, otherwise
    /// 0.75–0.95 by the share of keywords found in the bill name, 0 when none are.
    pub fn match_to_bill(info: &PaymentInfo, bill_name: &str) -> f64 {
        let bill = collapse_lower(bill_name);
        if bill.is_empty() || info.recipient.is_empty() {
            return 0.0;
        }

        if bill.contains(&info.recipient) || info.recipient.contains(&bill) {
            return DIRECT_NAME_SCORE;
        }

        if info.keywords.is_empty() {
            return 0.0;
        }
        let matched = info
            .keywords
            .iter()
            .filter(|k| bill.contains(k.as_str()))
            .count();
        if matched == 0 {
            return 0.0;
        }

        KEYWORD_FLOOR + KEYWORD_SPAN * (matched as f64 / info.keywords.len() as f64)
    }

    fn shape_for(text: &str) -> Option<&'static PaymentShape> {
        SHAPES.iter().find(|shape| (shape.recognize)().is_match(text))
    }
}

/// Drops trailing reference markers, digits and apostrophes; other
/// punctuation becomes a word break.
fn clean_recipient(raw: &str) -> String {
    let trimmed = re_trailing_reference().replace(raw, "");
    let letters: String = trimmed
        .chars()
        .filter(|c| !c.is_ascii_digit() && *c != '\'')
        .map(|c| if c.is_alphabetic() { c } else { ' ' })
        .collect();
    collapse_lower(&letters)
}

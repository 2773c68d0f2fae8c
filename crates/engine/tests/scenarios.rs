//! End-to-end behaviour of the matcher and detector through the public API.

use std::fs;

use chrono::NaiveDate;
use duematch_core::{FinancialEvent, Frequency, Money, Transaction};
use duematch_engine::{
    generate_aliases, ContextSource, MatchCriteria, MatcherConfig, MatcherContext,
    MerchantAliasEntry, MerchantAliasTable, PaymentPatternExtractor, PaymentRule, PaymentType,
    RuleEvaluator, SnapshotSource, Strategy, SubscriptionDetector, TransactionMatcher,
};
use serde_json::json;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn tx(id: &str, name: &str, cents: i64, d: NaiveDate) -> Transaction {
    Transaction::new(id, name, Money::from_cents(cents), Some(d))
}

fn bill(id: &str, name: &str, cents: i64, due: NaiveDate) -> FinancialEvent {
    FinancialEvent::new(id, name, Money::from_cents(cents), Some(due))
}

fn empty_matcher() -> TransactionMatcher {
    TransactionMatcher::new(MatcherContext::default())
}

fn matcher(rules: Vec<PaymentRule>, aliases: Vec<MerchantAliasEntry>) -> TransactionMatcher {
    TransactionMatcher::new(
        MatcherContext::new(
            rules,
            MerchantAliasTable::new(aliases).unwrap(),
            Vec::new(),
            MatcherConfig::default(),
        )
        .unwrap(),
    )
}

#[test]
fn netflix_bill_matches_netflix_charge() {
    let netflix = bill("b1", "Netflix", 1599, date(2025, 11, 5));
    let pool = vec![tx("t1", "NETFLIX.COM", -1599, date(2025, 11, 5))];

    let result = empty_matcher().find_match(&netflix, &pool).unwrap().unwrap();
    assert!(matches!(
        result.strategy,
        Strategy::MerchantAlias | Strategy::FuzzyMatch
    ));
    assert!(result.confidence >= 0.85 - 1e-9, "confidence was {}", result.confidence);
    assert_eq!(result.transaction.id, "t1");
}

#[test]
fn zelle_text_yields_recipient_and_keywords() {
    let info = PaymentPatternExtractor::extract("Zelle Transfer CONF# P73F008MJ; RAYLENE PANDO").unwrap();
    assert_eq!(info.payment_type, PaymentType::Zelle);
    assert_eq!(info.recipient, "raylene pando");
    assert_eq!(info.keywords, vec!["raylene", "pando"]);
}

#[test]
fn amount_sixty_cents_off_never_matches() {
    let electric = bill("b1", "City Electric", 5000, date(2025, 11, 15));
    let pool = vec![tx("t1", "City Electric", -5060, date(2025, 11, 15))];
    assert!(empty_matcher().find_match(&electric, &pool).unwrap().is_none());
}

#[test]
fn monthly_spotify_history_is_a_subscription() {
    let history: Vec<Transaction> = (1..=4)
        .map(|m| tx(&format!("s{m}"), "Spotify", -1099, date(2025, m, 1)))
        .collect();
    let candidates = SubscriptionDetector::new().detect(&history, &[]);
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].billing_cycle, Frequency::Monthly);
    assert!(candidates[0].confidence >= 75.0);

    let value = serde_json::to_value(&candidates[0]).unwrap();
    assert_eq!(value["billingCycle"], "Monthly");
    assert_eq!(value["merchantName"], "Spotify");
}

#[test]
fn required_keyword_gate_ignores_amount_and_date() {
    let rule = PaymentRule::new(
        "r1",
        MatchCriteria {
            required_keywords: vec!["landlord".to_string()],
            ..MatchCriteria::default()
        },
    )
    .for_bill("rent");
    let rent = bill("rent", "Rent", 150000, date(2025, 11, 1));
    let exact = tx("t1", "ONLINE TRANSFER 4471", -150000, date(2025, 11, 1));

    let evaluator = RuleEvaluator::new(Money::from_cents(50), 0.7);
    assert_eq!(evaluator.score(&rule, &exact, &rent), 0.0);

    let result = matcher(vec![rule], Vec::new())
        .find_match(&rent, &[exact])
        .unwrap();
    assert!(result.map_or(true, |r| r.strategy != Strategy::UserRule));
}

#[test]
fn amount_tolerance_is_monotonic() {
    let gym = bill("b1", "Gym", 4000, date(2025, 11, 10));
    let m = empty_matcher();

    let near = vec![tx("t1", "GYM", -4030, date(2025, 11, 10))];
    assert!(m.find_match(&gym, &near).unwrap().is_some());

    let far = vec![tx("t1", "GYM", -4080, date(2025, 11, 10))];
    assert!(m.find_match(&gym, &far).unwrap().is_none());
}

#[test]
fn user_rule_outranks_fuzzy_candidate() {
    let rule = PaymentRule::new(
        "r1",
        MatchCriteria {
            required_keywords: vec!["pando".to_string()],
            ..MatchCriteria::default()
        },
    )
    .for_bill_name("Rent");
    let rent = bill("rent", "Rent", 150000, date(2025, 11, 1));
    let pool = vec![
        tx("t1", "RENT", -150000, date(2025, 11, 1)),
        tx("t2", "Zelle to Raylene Pando", -150000, date(2025, 11, 3)),
    ];

    assert!(empty_matcher().find_match(&rent, &pool).unwrap().is_some());

    let result = matcher(vec![rule], Vec::new()).find_match(&rent, &pool).unwrap().unwrap();
    assert_eq!(result.strategy, Strategy::UserRule);
    assert_eq!(result.transaction.id, "t2");
}

// Documented asymmetry: a rule that only half-matches still reports the full
// rule confidence instead of a blended score.
#[test]
fn weak_rule_match_still_reports_rule_confidence() {
    let rule = PaymentRule::new(
        "r1",
        MatchCriteria {
            optional_keywords: vec!["pando".to_string()],
            ..MatchCriteria::default()
        },
    )
    .for_bill("rent");
    let rent = bill("rent", "Rent", 150000, date(2025, 11, 1));
    let pool = vec![tx("t1", "Zelle to Raylene Pando", -20000, date(2025, 12, 20))];

    let evaluator = RuleEvaluator::new(Money::from_cents(50), 0.7);
    assert_eq!(evaluator.score(&rule, &pool[0], &rent), 0.5);

    let result = matcher(vec![rule], Vec::new()).find_match(&rent, &pool).unwrap().unwrap();
    assert_eq!(result.strategy, Strategy::UserRule);
    assert_eq!(result.confidence, 0.95);
}

#[test]
fn returned_matches_clear_the_threshold() {
    let names = ["Netflix", "NETFLIX.COM", "NFLX", "Hulu", "Zelle to Netflix", "CHECK #1001"];
    let amounts = [-1599, -1620, -1650, -1700, 1599];
    let days = [5, 6, 8, 9];
    let netflix = bill("b1", "Netflix", 1599, date(2025, 11, 5));
    let m = empty_matcher();

    let mut seen = 0;
    for (i, name) in names.iter().enumerate() {
        for (j, &cents) in amounts.iter().enumerate() {
            for &d in &days {
                let pool = vec![tx(&format!("t{i}-{j}-{d}"), name, cents, date(2025, 11, d))];
                if let Some(result) = m.find_match(&netflix, &pool).unwrap() {
                    seen += 1;
                    assert!(result.confidence >= 0.70, "{name} {cents} {d}: {}", result.confidence);
                    assert!(result.confidence <= 1.0);
                }
            }
        }
    }
    assert!(seen > 0);
}

#[test]
fn matching_and_detection_are_deterministic() {
    let netflix = bill("b1", "Netflix", 1599, date(2025, 11, 5));
    let pool = vec![
        tx("t1", "NETFLX", -1599, date(2025, 11, 6)),
        tx("t2", "NETFLIX.COM", -1599, date(2025, 11, 5)),
        tx("t3", "NETFLIX.COM", -1599, date(2025, 11, 5)),
    ];
    let m = empty_matcher();
    let first = m.find_match(&netflix, &pool).unwrap();
    assert_eq!(first, m.find_match(&netflix, &pool).unwrap());

    let history: Vec<Transaction> = (1..=6)
        .flat_map(|month| {
            [
                tx(&format!("a{month}"), "Spotify", -1099, date(2025, month, 1)),
                tx(&format!("b{month}"), "Dropbox", -1199, date(2025, month, 2)),
            ]
        })
        .collect();
    let detector = SubscriptionDetector::new();
    assert_eq!(detector.detect(&history, &[]), detector.detect(&history, &[]));
}

#[test]
fn alias_generation_is_idempotent() {
    assert_eq!(generate_aliases("Netflix"), generate_aliases("Netflix"));
    assert_eq!(generate_aliases("netflix"), vec!["netflix"]);
}

#[test]
fn two_charges_forty_five_days_apart_are_not_a_subscription() {
    let history = vec![
        tx("t1", "Climbing Gym", -6500, date(2025, 3, 1)),
        tx("t2", "Climbing Gym", -6500, date(2025, 4, 15)),
    ];
    assert!(SubscriptionDetector::new().detect(&history, &[]).is_empty());
}

#[test]
fn transitive_alias_groups_are_one_directional() {
    let bundle = tx("t1", "DSNY*BUNDLE", -1999, date(2025, 11, 12));

    let broad_group = vec![MerchantAliasEntry::new("hulu-live", "Hulu Live TV", &["DSNY*BUNDLE"])];
    let hulu = bill("b1", "Hulu", 1999, date(2025, 11, 12));
    let result = matcher(Vec::new(), broad_group)
        .find_match(&hulu, &[bundle.clone()])
        .unwrap()
        .unwrap();
    assert_eq!(result.strategy, Strategy::MerchantAlias);

    let narrow_group = vec![MerchantAliasEntry::new("hulu", "Hulu", &["DSNY*BUNDLE"])];
    let hulu_live = bill("b2", "Hulu Live TV", 1999, date(2025, 11, 12));
    assert!(matcher(Vec::new(), narrow_group)
        .find_match(&hulu_live, &[bundle])
        .unwrap()
        .is_none());
}

#[test]
fn undated_bill_uses_recurring_pattern() {
    let source = SnapshotSource::new().patterns_json(
        json!([{"id": "p1", "merchant": "NETFLIX.COM", "expectedAmount": 15.99,
                "frequency": "monthly", "nextOccurrence": "2025-11-05"}])
        .to_string(),
    );
    let m = TransactionMatcher::from_source(&source).unwrap();

    let mut streaming = FinancialEvent::new("b1", "Streaming", Money::from_cents(1599), None);
    let pool = vec![tx("t1", "NETFLIX.COM", -1599, date(2025, 11, 5))];
    assert!(m.find_match(&streaming, &pool).unwrap().is_none());

    streaming.recurring_pattern_id = Some("p1".to_string());
    let result = m.find_match(&streaming, &pool).unwrap().unwrap();
    assert_eq!(result.strategy, Strategy::MerchantAlias);
    assert_eq!(result.scores.unwrap().date, 1.0);
}

#[test]
fn snapshot_directory_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("rules.json"),
        json!({"rules": [{"id": "rent", "billName": "Rent",
                          "matchCriteria": {"requiredKeywords": ["pando"], "transactionTypes": ["zelle"]}}]})
        .to_string(),
    )
    .unwrap();
    fs::write(
        dir.path().join("aliases.toml"),
        "[merchants.att]\ncanonicalName = \"AT&T\"\naliases = [\"ATT*BILL PAYMENT\"]\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("config.toml"),
        "[matcher]\nalias_date_window_days = 4\n",
    )
    .unwrap();

    let source = SnapshotSource::from_dir(dir.path()).unwrap();
    let context = source.load().unwrap();
    assert_eq!(context.rules.len(), 1);
    assert_eq!(context.aliases.len(), 1);
    assert_eq!(context.config.alias_date_window_days, 4);

    let m = TransactionMatcher::from_source(&source).unwrap();
    let bills = vec![
        bill("rent", "Rent", 150000, date(2025, 11, 1)),
        bill("phone", "AT&T", 8500, date(2025, 11, 20)),
    ];
    let pool = vec![
        tx("t1", "ATT*BILL PAYMENT", -8500, date(2025, 11, 24)),
        tx("t2", "Zelle to Raylene Pando", -150000, date(2025, 11, 1)),
    ];
    let matches = m.match_all(&bills, &pool).unwrap();
    assert_eq!(matches[0].result.as_ref().unwrap().rule_id.as_deref(), Some("rent"));
    assert_eq!(matches[1].result.as_ref().unwrap().transaction.id, "t1");
}

#[test]
fn match_results_serialize_with_snake_case_strategy() {
    let netflix = bill("b1", "Netflix", 1599, date(2025, 11, 5));
    let pool = vec![tx("t1", "NETFLIX.COM", -1599, date(2025, 11, 5))];
    let result = empty_matcher().find_match(&netflix, &pool).unwrap().unwrap();
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["strategy"], "merchant_alias");
    assert_eq!(value["transaction"]["id"], "t1");
    assert!(value.get("rule_id").is_none());
}

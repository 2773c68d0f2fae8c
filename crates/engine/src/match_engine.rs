use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use duematch_core::{days_apart, FinancialEvent, Money, Transaction};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::MatcherConfig;
use crate::context::{ContextSource, MatcherContext};
use crate::error::{EngineError, Result};
use crate::payment::{PaymentInfo, PaymentPatternExtractor, PaymentType};
use crate::rules::RuleEvaluator;
use crate::similarity::{best_similarity, similarity};

/// Matching strategies, tried in [`Strategy::PRIORITY`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    UserRule,
    PaymentPattern,
    MerchantAlias,
    FuzzyMatch,
}

impl Strategy {
    pub const PRIORITY: [Strategy; 4] = [
        Strategy::UserRule,
        Strategy::PaymentPattern,
        Strategy::MerchantAlias,
        Strategy::FuzzyMatch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::UserRule => "user_rule",
            Strategy::PaymentPattern => "payment_pattern",
            Strategy::MerchantAlias => "merchant_alias",
            Strategy::FuzzyMatch => "fuzzy_match",
        }
    }

    /// Best candidate this strategy finds for `bill`, before the acceptance
    /// threshold is applied.
    pub fn evaluate(
        self,
        context: &MatcherContext,
        bill: &FinancialEvent,
        pool: &[&Transaction],
    ) -> Option<MatchResult> {
        match self {
            Strategy::UserRule => user_rule(context, bill, pool),
            Strategy::PaymentPattern => payment_pattern(&context.config, bill, pool),
            Strategy::MerchantAlias => merchant_alias(context, bill, pool),
            Strategy::FuzzyMatch => fuzzy_match(&context.config, bill, pool),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Component scores behind a weighted confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub name: f64,
    pub amount: f64,
    pub date: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub transaction: Transaction,
    pub confidence: f64,
    pub strategy: Strategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<ScoreBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<PaymentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl MatchResult {
    fn new(transaction: &Transaction, confidence: f64, strategy: Strategy) -> Self {
        MatchResult {
            transaction: transaction.clone(),
            confidence,
            strategy,
            scores: None,
            payment_type: None,
            recipient: None,
            rule_id: None,
        }
    }
}

/// Outcome for one bill of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillMatch {
    pub bill_id: String,
    pub result: Option<MatchResult>,
}

/// Priority-ordered transaction-to-bill matcher.
///
/// The context is shared behind an `Arc`, so cloning a matcher is cheap.
/// Matching never mutates the bill or the pool.
#[derive(Debug, Clone)]
pub struct TransactionMatcher {
    context: Arc<MatcherContext>,
}

impl TransactionMatcher {
    pub fn new(context: MatcherContext) -> Self {
        Self {
            context: Arc::new(context),
        }
    }

    pub fn from_source(source: &dyn ContextSource) -> Result<Self> {
        Ok(Self::new(source.load()?))
    }

    /// Replaces the context with a fresh load. On error the current context
    /// stays in place.
    pub fn reload(&mut self, source: &dyn ContextSource) -> Result<()> {
        self.context = Arc::new(source.load()?);
        Ok(())
    }

    pub fn context(&self) -> &MatcherContext {
        &self.context
    }

    /// Finds the transaction in `pool` that best satisfies `bill`, or `None`.
    ///
    /// Transactions already linked to another event are skipped. A pool that
    /// lists the same transaction id twice is rejected.
    pub fn find_match(
        &self,
        bill: &FinancialEvent,
        pool: &[Transaction],
    ) -> Result<Option<MatchResult>> {
        ensure_unique_ids(pool)?;
        let candidates: Vec<&Transaction> = pool
            .iter()
            .filter(|t| !t.is_linked_elsewhere(&bill.id))
            .collect();
        Ok(self.run(bill, &candidates))
    }

    /// Matches every bill in order. A transaction accepted for one bill is
    /// not offered to the bills after it.
    pub fn match_all(
        &self,
        bills: &[FinancialEvent],
        pool: &[Transaction],
    ) -> Result<Vec<BillMatch>> {
        ensure_unique_ids(pool)?;
        let mut claimed: HashSet<&str> = HashSet::new();
        let mut matches = Vec::with_capacity(bills.len());

        for bill in bills {
            let candidates: Vec<&Transaction> = pool
                .iter()
                .filter(|t| !t.is_linked_elsewhere(&bill.id) && !claimed.contains(t.id.as_str()))
                .collect();
            let result = self.run(bill, &candidates);
            if let Some(r) = &result {
                if let Some(tx) = pool.iter().find(|t| t.id == r.transaction.id) {
                    claimed.insert(tx.id.as_str());
                }
            }
            matches.push(BillMatch {
                bill_id: bill.id.clone(),
                result,
            });
        }

        info!(
            bills = bills.len(),
            matched = claimed.len(),
            "batch matching finished"
        );
        Ok(matches)
    }

    fn run(&self, bill: &FinancialEvent, pool: &[&Transaction]) -> Option<MatchResult> {
        let threshold = self.context.config.acceptance_threshold;
        let resolved = self.context.resolve(bill);

        for strategy in Strategy::PRIORITY {
            match strategy.evaluate(&self.context, &resolved, pool) {
                Some(result) if result.confidence >= threshold => {
                    info!(
                        bill = %bill.id,
                        transaction = %result.transaction.id,
                        strategy = %strategy,
                        confidence = result.confidence,
                        "bill matched"
                    );
                    return Some(result);
                }
                Some(result) => {
                    debug!(
                        bill = %bill.id,
                        transaction = %result.transaction.id,
                        strategy = %strategy,
                        confidence = result.confidence,
                        "best candidate below acceptance threshold"
                    );
                }
                None => debug!(bill = %bill.id, strategy = %strategy, "no candidate"),
            }
        }
        None
    }
}

fn ensure_unique_ids(pool: &[Transaction]) -> Result<()> {
    let mut seen = HashSet::with_capacity(pool.len());
    for tx in pool {
        if !seen.insert(tx.id.as_str()) {
            return Err(EngineError::DuplicateTransaction(tx.id.clone()));
        }
    }
    Ok(())
}

/// Keeps the first of equally good candidates.
fn keep_best(best: &mut Option<MatchResult>, candidate: MatchResult) {
    if best
        .as_ref()
        .map_or(true, |b| candidate.confidence > b.confidence)
    {
        *best = Some(candidate);
    }
}

fn amount_score(config: &MatcherConfig, diff: Money) -> f64 {
    if diff <= config.exact_amount_tolerance {
        1.0
    } else {
        config.near_amount_score
    }
}

fn weighted(config: &MatcherConfig, scores: ScoreBreakdown) -> f64 {
    config.name_weight * scores.name
        + config.amount_weight * scores.amount
        + config.date_weight * scores.date
}

/// Days between the transaction and the bill's reference date, when both are
/// known.
fn date_gap(bill: &FinancialEvent, tx: &Transaction) -> Option<i64> {
    match (bill.reference_date(), tx.date) {
        (Some(reference), Some(date)) => Some(days_apart(reference, date)),
        _ => None,
    }
}

fn user_rule(
    context: &MatcherContext,
    bill: &FinancialEvent,
    pool: &[&Transaction],
) -> Option<MatchResult> {
    let config = &context.config;
    let evaluator = RuleEvaluator::new(config.default_rule_tolerance, config.rule_name_threshold);

    let mut best: Option<(f64, &str, &Transaction)> = None;
    for rule in context.rules.iter().filter(|r| evaluator.applies_to(r, bill)) {
        for &tx in pool {
            let score = evaluator.score(rule, tx, bill);
            debug!(rule = %rule.id, transaction = %tx.id, score, "rule scored");
            if best.map_or(true, |(s, _, _)| score > s) {
                best = Some((score, rule.id.as_str(), tx));
            }
        }
    }

    let (score, rule_id, tx) = best?;
    if score <= 0.0 {
        return None;
    }
    let mut result = MatchResult::new(tx, config.rule_confidence, Strategy::UserRule);
    result.rule_id = Some(rule_id.to_string());
    result.payment_type = tx.texts().find_map(PaymentPatternExtractor::recognize);
    Some(result)
}

fn payment_pattern(
    config: &MatcherConfig,
    bill: &FinancialEvent,
    pool: &[&Transaction],
) -> Option<MatchResult> {
    let bill_names: Vec<&str> = std::iter::once(bill.name.as_str())
        .chain(bill.merchant_names.iter().map(String::as_str))
        .collect();

    let mut best = None;
    for &tx in pool {
        let diff = tx.amount.magnitude_diff(bill.amount);
        if diff > config.amount_tolerance {
            continue;
        }
        let gap = date_gap(bill, tx);
        if gap.is_some_and(|g| g > config.payment_date_window_days) {
            continue;
        }

        let mut tx_best: Option<(f64, PaymentInfo)> = None;
        for info in tx.texts().filter_map(PaymentPatternExtractor::extract) {
            let name = bill_names
                .iter()
                .map(|n| PaymentPatternExtractor::match_to_bill(&info, n))
                .fold(0.0, f64::max);
            if tx_best.as_ref().map_or(true, |(s, _)| name > *s) {
                tx_best = Some((name, info));
            }
        }
        let Some((name, info)) = tx_best else {
            continue;
        };

        let scores = ScoreBreakdown {
            name,
            amount: amount_score(config, diff),
            date: match gap {
                Some(0) => 1.0,
                Some(_) => config.near_date_score,
                None => 0.0,
            },
        };
        let confidence = weighted(config, scores).min(config.payment_confidence_cap);
        debug!(transaction = %tx.id, recipient = %info.recipient, confidence, "payment candidate");

        let mut result = MatchResult::new(tx, confidence, Strategy::PaymentPattern);
        result.scores = Some(scores);
        result.payment_type = Some(info.payment_type);
        result.recipient = Some(info.recipient);
        keep_best(&mut best, result);
    }
    best
}

fn merchant_alias(
    context: &MatcherContext,
    bill: &FinancialEvent,
    pool: &[&Transaction],
) -> Option<MatchResult> {
    let config = &context.config;
    let bill_aliases = context.bill_aliases(bill);

    let mut names: Vec<&str> = std::iter::once(bill.name.as_str())
        .chain(bill_aliases.iter().map(String::as_str))
        .collect();
    for group in context.aliases.groups() {
        let related = group.members().any(|member| {
            similarity(member, &bill.name) > config.alias_group_threshold
                || bill_aliases
                    .iter()
                    .any(|alias| similarity(member, alias) > config.alias_group_threshold)
        });
        if related {
            debug!(bill = %bill.id, group = %group.canonical_name, "borrowing alias group");
            names.extend(group.members());
        }
    }

    let mut best = None;
    for &tx in pool {
        let Some(scores) = gated_scores(config, bill, tx, |text| best_similarity(text, names.iter().copied())) else {
            continue;
        };
        let confidence = weighted(config, scores).min(config.alias_confidence_cap);
        let mut result = MatchResult::new(tx, confidence, Strategy::MerchantAlias);
        result.scores = Some(scores);
        keep_best(&mut best, result);
    }
    best
}

fn fuzzy_match(
    config: &MatcherConfig,
    bill: &FinancialEvent,
    pool: &[&Transaction],
) -> Option<MatchResult> {
    let mut best = None;
    for &tx in pool {
        let Some(scores) = gated_scores(config, bill, tx, |text| similarity(text, &bill.name)) else {
            continue;
        };
        let mut result = MatchResult::new(tx, weighted(config, scores), Strategy::FuzzyMatch);
        result.scores = Some(scores);
        keep_best(&mut best, result);
    }
    best
}

/// Shared gates and component scores of the alias and fuzzy strategies. The
/// name score is the best of `name_score` over the transaction's texts.
fn gated_scores(
    config: &MatcherConfig,
    bill: &FinancialEvent,
    tx: &Transaction,
    name_score: impl Fn(&str) -> f64,
) -> Option<ScoreBreakdown> {
    let diff = tx.amount.magnitude_diff(bill.amount);
    if diff > config.amount_tolerance {
        return None;
    }
    let gap = date_gap(bill, tx);
    if gap.is_some_and(|g| g > config.alias_date_window_days) {
        return None;
    }

    Some(ScoreBreakdown {
        name: tx.texts().map(name_score).fold(0.0, f64::max),
        amount: amount_score(config, diff),
        date: match gap {
            Some(g) if g <= config.alias_close_date_days => 1.0,
            Some(_) => config.near_date_score,
            None => 0.0,
        },
    })
}

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use duematch_core::{FinancialEvent, Transaction};
use duematch_engine::{
    BillMatch, EngineConfig, MerchantAliasTable, SnapshotSource, SubscriptionCandidate,
    SubscriptionDetector, TransactionMatcher,
};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::cli::{DetectArgs, MatchArgs};

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    EngineConfig::from_toml(&content).with_context(|| format!("Invalid config {}", path.display()))
}

fn load_aliases(path: &Path) -> Result<MerchantAliasTable> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let table = if path.extension().is_some_and(|e| e == "toml") {
        MerchantAliasTable::from_toml(&content)
    } else {
        MerchantAliasTable::from_json(&content)
    };
    table.with_context(|| format!("Invalid alias table {}", path.display()))
}

pub fn cmd_match(args: &MatchArgs, config: &EngineConfig) -> Result<Vec<BillMatch>> {
    let bills: Vec<FinancialEvent> = read_json(&args.bills)?;
    let transactions: Vec<Transaction> = read_json(&args.transactions)?;

    let mut source = SnapshotSource::new().config(config.matcher.clone());
    if let Some(path) = &args.rules {
        source = source.rules_file(path)?;
    }
    if let Some(path) = &args.aliases {
        source = source.aliases_file(path)?;
    }
    if let Some(path) = &args.patterns {
        source = source.patterns_file(path)?;
    }
    let matcher = TransactionMatcher::from_source(&source).context("Failed to load matcher context")?;

    info!(
        bills = bills.len(),
        transactions = transactions.len(),
        "matching"
    );

    if args.independent {
        bills
            .iter()
            .map(|bill| {
                let result = matcher.find_match(bill, &transactions)?;
                Ok::<_, anyhow::Error>(BillMatch {
                    bill_id: bill.id.clone(),
                    result,
                })
            })
            .collect()
    } else {
        Ok(matcher.match_all(&bills, &transactions)?)
    }
}

pub fn cmd_detect(args: &DetectArgs, config: &EngineConfig) -> Result<Vec<SubscriptionCandidate>> {
    let transactions: Vec<Transaction> = read_json(&args.transactions)?;
    let existing: Vec<String> = match &args.existing {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };

    let mut detector = SubscriptionDetector::with_config(config.subscriptions.clone())?;
    if let Some(path) = &args.aliases {
        detector = detector.with_aliases(load_aliases(path)?);
    }

    let candidates = detector.detect(&transactions, &existing);
    info!(
        transactions = transactions.len(),
        candidates = candidates.len(),
        "detection finished"
    );
    Ok(candidates)
}

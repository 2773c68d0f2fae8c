use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use duematch_core::{FinancialEvent, RecurringPattern};
use serde::Deserialize;
use tracing::{info, warn};

use crate::aliases::{generate_aliases, MerchantAliasTable};
use crate::config::{EngineConfig, MatcherConfig};
use crate::error::{EngineError, Result};
use crate::rules::{rules_from_json, rules_from_toml, validate_rules, PaymentRule};

/// Everything the matcher reads besides the bill and the pool. Immutable once
/// built; reloading replaces it wholesale.
#[derive(Debug, Clone, Default)]
pub struct MatcherContext {
    pub rules: Vec<PaymentRule>,
    pub aliases: MerchantAliasTable,
    patterns: Vec<RecurringPattern>,
    pattern_index: HashMap<String, usize>,
    pub config: MatcherConfig,
}

impl MatcherContext {
    pub fn new(
        rules: Vec<PaymentRule>,
        aliases: MerchantAliasTable,
        patterns: Vec<RecurringPattern>,
        config: MatcherConfig,
    ) -> Result<Self> {
        config.validate()?;
        validate_rules(&rules)?;

        for rule in rules.iter().filter(|r| r.bill_id.is_none() && r.bill_name.is_none()) {
            warn!(rule = %rule.id, "rule names neither a bill id nor a bill name; it will never apply");
        }

        let mut pattern_index = HashMap::with_capacity(patterns.len());
        for (pos, pattern) in patterns.iter().enumerate() {
            if pattern_index.insert(pattern.id.clone(), pos).is_some() {
                return Err(EngineError::DuplicatePattern(pattern.id.clone()));
            }
        }

        info!(
            rules = rules.len(),
            aliases = aliases.len(),
            patterns = patterns.len(),
            "matcher context loaded"
        );

        Ok(Self {
            rules,
            aliases,
            patterns,
            pattern_index,
            config,
        })
    }

    pub fn with_config(config: MatcherConfig) -> Result<Self> {
        Self::new(Vec::new(), MerchantAliasTable::empty(), Vec::new(), config)
    }

    pub fn patterns(&self) -> &[RecurringPattern] {
        &self.patterns
    }

    pub fn pattern(&self, id: &str) -> Option<&RecurringPattern> {
        self.pattern_index.get(id).map(|&pos| &self.patterns[pos])
    }

    /// The recurring pattern a bill was generated from, if it is loaded.
    pub fn pattern_for(&self, bill: &FinancialEvent) -> Option<&RecurringPattern> {
        bill.recurring_pattern_id
            .as_deref()
            .and_then(|id| self.pattern(id))
    }

    /// Paid date, else due date, else the linked pattern's next occurrence.
    pub fn reference_date(&self, bill: &FinancialEvent) -> Option<NaiveDate> {
        bill.reference_date()
            .or_else(|| self.pattern_for(bill).and_then(|p| p.next_occurrence))
    }

    /// The bill as the strategies see it: an undated bill borrows its
    /// pattern's next occurrence as due date.
    pub fn resolve<'b>(&self, bill: &'b FinancialEvent) -> Cow<'b, FinancialEvent> {
        if bill.reference_date().is_some() {
            return Cow::Borrowed(bill);
        }
        match self.reference_date(bill) {
            Some(date) => {
                let mut resolved = bill.clone();
                resolved.due_date = Some(date);
                Cow::Owned(resolved)
            }
            None => Cow::Borrowed(bill),
        }
    }

    /// Names the bill is known by in bank feeds: its curated merchant names,
    /// or generated aliases when it has none, plus the linked pattern's
    /// merchant.
    pub fn bill_aliases(&self, bill: &FinancialEvent) -> Vec<String> {
        let curated: Vec<String> = bill
            .merchant_names
            .iter()
            .filter(|n| !n.trim().is_empty())
            .cloned()
            .collect();
        let mut aliases = if curated.is_empty() {
            generate_aliases(&bill.name)
        } else {
            curated
        };

        if let Some(pattern) = self.pattern_for(bill) {
            if !pattern.merchant.trim().is_empty() && !aliases.contains(&pattern.merchant) {
                aliases.push(pattern.merchant.clone());
            }
        }
        aliases
    }
}

/// Where a [`MatcherContext`] comes from. Implementations may read files,
/// a database or anything else; matching itself never does I/O.
pub trait ContextSource {
    fn load(&self) -> Result<MatcherContext>;
}

impl ContextSource for MatcherContext {
    fn load(&self) -> Result<MatcherContext> {
        Ok(self.clone())
    }
}

#[derive(Debug, Clone)]
enum Snapshot {
    Json(String),
    Toml(String),
}

impl Snapshot {
    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        Ok(if is_toml {
            Snapshot::Toml(content)
        } else {
            Snapshot::Json(content)
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PatternSnapshot {
    List(Vec<RecurringPattern>),
    Table { patterns: Vec<RecurringPattern> },
}

/// Parses recurring patterns from JSON: a bare array or `{"patterns": [...]}`.
pub fn patterns_from_json(json: &str) -> Result<Vec<RecurringPattern>> {
    Ok(into_patterns(serde_json::from_str(json)?))
}

/// Parses recurring patterns from TOML, one `[[patterns]]` table each.
pub fn patterns_from_toml(toml_content: &str) -> Result<Vec<RecurringPattern>> {
    Ok(into_patterns(toml::from_str(toml_content)?))
}

fn into_patterns(snapshot: PatternSnapshot) -> Vec<RecurringPattern> {
    match snapshot {
        PatternSnapshot::List(patterns) | PatternSnapshot::Table { patterns } => patterns,
    }
}

/// Context built from serialized snapshots of rules, aliases and patterns.
///
/// ```no_run
/// # use duematch_engine::{SnapshotSource, TransactionMatcher};
/// let source = SnapshotSource::from_dir("./data".as_ref())?;
/// let matcher = TransactionMatcher::from_source(&source)?;
/// # Ok::<(), duematch_engine::EngineError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SnapshotSource {
    rules: Option<Snapshot>,
    aliases: Option<Snapshot>,
    patterns: Option<Snapshot>,
    config: MatcherConfig,
}

impl SnapshotSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rules_json(mut self, json: impl Into<String>) -> Self {
        self.rules = Some(Snapshot::Json(json.into()));
        self
    }

    pub fn rules_toml(mut self, toml_content: impl Into<String>) -> Self {
        self.rules = Some(Snapshot::Toml(toml_content.into()));
        self
    }

    pub fn aliases_json(mut self, json: impl Into<String>) -> Self {
        self.aliases = Some(Snapshot::Json(json.into()));
        self
    }

    pub fn aliases_toml(mut self, toml_content: impl Into<String>) -> Self {
        self.aliases = Some(Snapshot::Toml(toml_content.into()));
        self
    }

    pub fn patterns_json(mut self, json: impl Into<String>) -> Self {
        self.patterns = Some(Snapshot::Json(json.into()));
        self
    }

    pub fn patterns_toml(mut self, toml_content: impl Into<String>) -> Self {
        self.patterns = Some(Snapshot::Toml(toml_content.into()));
        self
    }

    pub fn config(mut self, config: MatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Rules file; `.toml` files are read as TOML, anything else as JSON.
    pub fn rules_file(mut self, path: &Path) -> Result<Self> {
        self.rules = Some(Snapshot::read(path)?);
        Ok(self)
    }

    pub fn aliases_file(mut self, path: &Path) -> Result<Self> {
        self.aliases = Some(Snapshot::read(path)?);
        Ok(self)
    }

    pub fn patterns_file(mut self, path: &Path) -> Result<Self> {
        self.patterns = Some(Snapshot::read(path)?);
        Ok(self)
    }

    /// Reads `rules`, `aliases` and `patterns` (`.json` or `.toml`) and the
    /// `[matcher]` section of `config.toml` from `dir`. Missing files leave
    /// the corresponding part empty or defaulted.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut source = Self::new();
        if let Some(path) = find_snapshot(dir, "rules") {
            source = source.rules_file(&path)?;
        }
        if let Some(path) = find_snapshot(dir, "aliases") {
            source = source.aliases_file(&path)?;
        }
        if let Some(path) = find_snapshot(dir, "patterns") {
            source = source.patterns_file(&path)?;
        }

        let config_path = dir.join("config.toml");
        if config_path.is_file() {
            let content = fs::read_to_string(&config_path).map_err(|source| EngineError::Io {
                path: config_path.display().to_string(),
                source,
            })?;
            source.config = EngineConfig::from_toml(&content)?.matcher;
        }
        Ok(source)
    }
}

fn find_snapshot(dir: &Path, stem: &str) -> Option<PathBuf> {
    ["json", "toml"]
        .iter()
        .map(|ext| dir.join(format!("{stem}.{ext}")))
        .find(|path| path.is_file())
}

impl ContextSource for SnapshotSource {
    fn load(&self) -> Result<MatcherContext> {
        let rules = match &self.rules {
            Some(Snapshot::Json(s)) => rules_from_json(s)?,
            Some(Snapshot::Toml(s)) => rules_from_toml(s)?,
            None => Vec::new(),
        };
        let aliases = match &self.aliases {
            Some(Snapshot::Json(s)) => MerchantAliasTable::from_json(s)?,
            Some(Snapshot::Toml(s)) => MerchantAliasTable::from_toml(s)?,
            None => MerchantAliasTable::empty(),
        };
        let patterns = match &self.patterns {
            Some(Snapshot::Json(s)) => patterns_from_json(s)?,
            Some(Snapshot::Toml(s)) => patterns_from_toml(s)?,
            None => Vec::new(),
        };
        MatcherContext::new(rules, aliases, patterns, self.config.clone())
    }
}

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EngineError, Result};

/// One merchant identity and the strings it shows up as in bank feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantAliasEntry {
    #[serde(default)]
    pub id: String,
    #[serde(alias = "canonical_name")]
    pub canonical_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, alias = "merchant_type", alias = "type", skip_serializing_if = "Option::is_none")]
    pub merchant_type: Option<String>,
}

impl MerchantAliasEntry {
    pub fn new(id: &str, canonical_name: &str, aliases: &[&str]) -> Self {
        MerchantAliasEntry {
            id: id.to_string(),
            canonical_name: canonical_name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            category: None,
            merchant_type: None,
        }
    }

    /// Canonical name followed by every alias.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.canonical_name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Wire shape of an alias snapshot: `{"merchants": {"<id>": {...}}}`.
#[derive(Debug, Deserialize)]
struct AliasSnapshot {
    #[serde(default)]
    merchants: BTreeMap<String, MerchantAliasEntry>,
}

/// Case-insensitive alias → merchant lookup. Read-mostly; built once when
/// the matcher context is loaded.
#[derive(Debug, Clone, Default)]
pub struct MerchantAliasTable {
    entries: Vec<MerchantAliasEntry>,
    index: HashMap<String, usize>,
}

impl MerchantAliasTable {
    /// Builds the table, rejecting entries without a canonical name. When two
    /// entries claim the same alias the first one keeps it.
    pub fn new(entries: Vec<MerchantAliasEntry>) -> Result<Self> {
        let mut index = HashMap::new();

        for (pos, entry) in entries.iter().enumerate() {
            if entry.canonical_name.trim().is_empty() {
                return Err(EngineError::InvalidAlias {
                    id: entry.id.clone(),
                    reason: "canonical name is empty".to_string(),
                });
            }

            for member in entry.members() {
                let key = member.trim().to_lowercase();
                if key.is_empty() {
                    continue;
                }
                match index.get(&key) {
                    Some(&owner) if owner != pos => {
                        let owner: &MerchantAliasEntry = &entries[owner];
                        warn!(
                            alias = %key,
                            kept = %owner.canonical_name,
                            ignored = %entry.canonical_name,
                            "alias claimed by two merchants"
                        );
                    }
                    Some(_) => {}
                    None => {
                        index.insert(key, pos);
                    }
                }
            }
        }

        Ok(Self { entries, index })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses the JSON snapshot shape. Entries are ordered by id; an entry
    /// without its own `id` takes its map key.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: AliasSnapshot = serde_json::from_str(json)?;
        Self::from_snapshot(snapshot)
    }

    /// TOML equivalent of [`from_json`](Self::from_json): one `[merchants.<id>]`
    /// table per merchant.
    pub fn from_toml(toml_content: &str) -> Result<Self> {
        let snapshot: AliasSnapshot = toml::from_str(toml_content)?;
        Self::from_snapshot(snapshot)
    }

    fn from_snapshot(snapshot: AliasSnapshot) -> Result<Self> {
        let entries = snapshot
            .merchants
            .into_iter()
            .map(|(key, mut entry)| {
                if entry.id.is_empty() {
                    entry.id = key;
                }
                entry
            })
            .collect();
        Self::new(entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry owning `alias` (or whose canonical name is `alias`), ignoring case
    /// and surrounding whitespace.
    pub fn lookup(&self, alias: &str) -> Option<&MerchantAliasEntry> {
        self.index
            .get(&alias.trim().to_lowercase())
            .map(|&pos| &self.entries[pos])
    }

    /// Every alias group, in table order.
    pub fn groups(&self) -> impl Iterator<Item = &MerchantAliasEntry> {
        self.entries.iter()
    }

    /// Canonical bill name for a piece of transaction text: the first entry
    /// with a member that appears in the text.
    pub fn canonical_name_for(&self, text: &str) -> Option<&str> {
        let text = text.to_lowercase();
        if text.trim().is_empty() {
            return None;
        }
        if let Some(entry) = self.lookup(&text) {
            return Some(entry.canonical_name.as_str());
        }
        self.entries
            .iter()
            .find(|entry| {
                entry.members().any(|member| {
                    let member = member.trim().to_lowercase();
                    !member.is_empty() && text.contains(&member)
                })
            })
            .map(|entry| entry.canonical_name.as_str())
    }
}

/// Default alias set for a name with no curated aliases: the lowercase form,
/// the whitespace-free form and, for multi-word names, the initials when they
/// are longer than one character. Ordered and free of duplicates.
pub fn generate_aliases(name: &str) -> Vec<String> {
    let lower = name.trim().to_lowercase();
    if lower.is_empty() {
        return Vec::new();
    }

    let mut aliases = vec![lower.clone()];
    let mut push = |alias: String| {
        if !alias.is_empty() && !aliases.contains(&alias) {
            aliases.push(alias);
        }
    };

    push(lower.split_whitespace().collect::<String>());

    let words: Vec<&str> = lower.split_whitespace().collect();
    if words.len() > 1 {
        let initials: String = words.iter().filter_map(|w| w.chars().next()).collect();
        if initials.chars().count() > 1 {
            push(initials);
        }
    }

    aliases
}

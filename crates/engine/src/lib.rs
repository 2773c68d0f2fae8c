pub mod aliases;
pub mod config;
pub mod context;
pub mod error;
pub mod match_engine;
pub mod payment;
pub mod rules;
pub mod similarity;
pub mod subscriptions;
pub(crate) mod util;

pub use aliases::{generate_aliases, MerchantAliasEntry, MerchantAliasTable};
pub use config::{DetectionConfig, EngineConfig, MatcherConfig};
pub use context::{patterns_from_json, patterns_from_toml, ContextSource, MatcherContext, SnapshotSource};
pub use error::{EngineError, Result};
pub use match_engine::{BillMatch, MatchResult, ScoreBreakdown, Strategy, TransactionMatcher};
pub use payment::{PaymentInfo, PaymentPatternExtractor, PaymentType};
pub use rules::{rules_from_json, rules_from_toml, DateWindow, MatchCriteria, PaymentRule, RuleEvaluator};
pub use similarity::{best_similarity, similarity};
pub use subscriptions::{normalize_merchant, suggest_category, SubscriptionCandidate, SubscriptionCharge, SubscriptionDetector};

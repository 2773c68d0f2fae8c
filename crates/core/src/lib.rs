pub mod event;
pub mod money;
pub mod parse;
pub mod period;
pub mod transaction;

pub use event::{FinancialEvent, RecurringPattern};
pub use money::Money;
pub use period::{days_apart, DateRange, Frequency};
pub use transaction::Transaction;

pub use accounting::{Accounting, BalanceBelowZero};
pub use accounts::{Account, BudgetAccount, ContactAccount};
pub use collections::{
    AccountCollection, AccountCollectionValues, BudgetAccountCollection, ContactAccountCollection,
    ContactAccountCollectionValues,
};
pub use error::EngineError;
pub use group_status::{AccountGroupStatus, BudgetAccountGroupStatus};
pub use groups::{AccountGroup, AccountGroupType, BudgetAccountGroup};
pub use info::{
    InfoCollection, InfoFlags, InfoRecord, StatusSummary,
    budget::{BudgetInfo, BudgetInfoValues},
    contact::{ContactInfo, ContactInfoValues},
    credit::{CreditInfo, CreditInfoValues},
};
pub use money::Money;
pub use posting::{
    AccountKey, AccountKind, AccountReference, PostingLine, PostingLineBuilder, SnapshotOrigin,
};
pub use posting_lines::{PostingEvaluator, PostingLineCollection};
pub use status::CalculationView;
pub use warnings::{
    PostingWarning, PostingWarningCalculator, PostingWarningCollection, PostingWarningReason,
};
pub use year_month::{MAX_YEAR, MIN_YEAR, YearMonth};

mod accounting;
mod accounts;
mod cache;
mod collections;
mod error;
mod group_status;
mod groups;
mod info;
mod money;
mod posting;
mod posting_lines;
mod status;
mod util;
mod warnings;
mod year_month;

pub type ResultEngine<T> = Result<T, EngineError>;

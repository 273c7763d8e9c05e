//! Posting warnings.
//!
//! The warning pass inspects the snapshots calculated on postings. It never
//! calculates anything itself, so accounts have to be calculated first.
use std::{fmt, sync::Arc};

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::{AccountGroupType, AccountReference, Money, PostingLine, PostingLineCollection};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostingWarningReason {
    AccountIsOverdrawn,
    ExpectedIncomeHasNotBeenReachedYet,
    ExpectedExpensesHaveAlreadyBeenReached,
}

impl fmt::Display for PostingWarningReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PostingWarningReason::AccountIsOverdrawn => "account is overdrawn",
            PostingWarningReason::ExpectedIncomeHasNotBeenReachedYet => {
                "expected income has not been reached yet"
            }
            PostingWarningReason::ExpectedExpensesHaveAlreadyBeenReached => {
                "expected expenses have already been reached"
            }
        };
        f.write_str(text)
    }
}

#[derive(Clone, Debug)]
pub struct PostingWarning {
    reason: PostingWarningReason,
    account: Arc<AccountReference>,
    amount: Money,
    posting_line: Arc<PostingLine>,
}

impl PostingWarning {
    pub fn reason(&self) -> PostingWarningReason {
        self.reason
    }

    /// The account the warning is about.
    pub fn account(&self) -> &AccountReference {
        &self.account
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn posting_line(&self) -> &Arc<PostingLine> {
        &self.posting_line
    }
}

#[derive(Clone, Debug, Default)]
pub struct PostingWarningCollection {
    warnings: Vec<PostingWarning>,
}

impl PostingWarningCollection {
    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PostingWarning> {
        self.warnings.iter()
    }

    /// Latest posting first, then descending sort order, then by reason.
    pub fn ordered(&self) -> Vec<PostingWarning> {
        let mut warnings = self.warnings.clone();
        warnings.sort_by(|a, b| {
            let (a_line, b_line) = (&a.posting_line, &b.posting_line);
            b_line
                .posting_date()
                .cmp(&a_line.posting_date())
                .then_with(|| b_line.sort_order().cmp(&a_line.sort_order()))
                .then_with(|| a.reason.cmp(&b.reason))
        });
        warnings
    }

    pub fn top(&self, count: usize) -> Vec<PostingWarning> {
        let mut warnings = self.ordered();
        warnings.truncate(count);
        warnings
    }
}

impl Extend<PostingWarning> for PostingWarningCollection {
    fn extend<I: IntoIterator<Item = PostingWarning>>(&mut self, iter: I) {
        self.warnings.extend(iter);
    }
}

impl FromIterator<PostingWarning> for PostingWarningCollection {
    fn from_iter<I: IntoIterator<Item = PostingWarning>>(iter: I) -> Self {
        Self {
            warnings: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for PostingWarningCollection {
    type Item = PostingWarning;
    type IntoIter = std::vec::IntoIter<PostingWarning>;

    fn into_iter(self) -> Self::IntoIter {
        self.warnings.into_iter()
    }
}

/// Detects overdrafts and budget breaches on calculated postings.
#[derive(Clone, Copy, Debug, Default)]
pub struct PostingWarningCalculator;

impl PostingWarningCalculator {
    pub fn new() -> Self {
        Self
    }

    pub async fn calculate(&self, posting_line: &Arc<PostingLine>) -> PostingWarningCollection {
        let (account, budget_account, contact_account) = futures::join!(
            account_warning(posting_line),
            budget_account_warning(posting_line),
            contact_account_warning(posting_line)
        );
        [account, budget_account, contact_account].into_iter().flatten().collect()
    }

    pub async fn calculate_collection(
        &self,
        posting_lines: &PostingLineCollection,
    ) -> PostingWarningCollection {
        let lines = posting_lines.ordered();
        let warnings = join_all(lines.iter().map(|line| self.calculate(line))).await;
        let collection: PostingWarningCollection = warnings.into_iter().flatten().collect();
        tracing::debug!(
            postings = lines.len(),
            warnings = collection.len(),
            "calculated posting warnings"
        );
        collection
    }
}

/// Assets accounts only: fires when the balance is below the negated credit.
async fn account_warning(posting_line: &Arc<PostingLine>) -> Option<PostingWarning> {
    let account = posting_line.account();
    if account.account_group_type() != Some(AccountGroupType::Assets) {
        return None;
    }
    let values = posting_line.account_values_at_posting_date()?;
    let (balance, credit) = (values.balance, values.credit.abs());
    if !balance.is_negative() || balance.abs() <= credit {
        return None;
    }
    Some(PostingWarning {
        reason: PostingWarningReason::AccountIsOverdrawn,
        account,
        amount: balance.abs() - credit,
        posting_line: Arc::clone(posting_line),
    })
}

async fn budget_account_warning(posting_line: &Arc<PostingLine>) -> Option<PostingWarning> {
    let budget_account = posting_line.budget_account()?;
    let values = posting_line.budget_account_values_at_posting_date()?;
    let (budget, posted) = (values.budget, values.posted);

    let (reason, amount) = if budget.is_positive() && posted < budget {
        (
            PostingWarningReason::ExpectedIncomeHasNotBeenReachedYet,
            budget - posted,
        )
    } else if budget.is_negative() && posted < budget {
        (
            PostingWarningReason::ExpectedExpensesHaveAlreadyBeenReached,
            posted.abs() - budget.abs(),
        )
    } else {
        return None;
    };

    Some(PostingWarning {
        reason,
        account: budget_account,
        amount,
        posting_line: Arc::clone(posting_line),
    })
}

/// No rule applies to contact accounts yet.
async fn contact_account_warning(_posting_line: &Arc<PostingLine>) -> Option<PostingWarning> {
    None
}

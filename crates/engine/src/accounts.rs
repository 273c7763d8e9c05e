//! Ledger, budget and contact accounts.
//!
//! The three account kinds share one calculation core: an info collection
//! with the account's monthly records and the collection of postings booked
//! on the account. Calculating an account for a status date runs both
//! concurrently (phase 1); afterwards the account's fresh
//! [`AccountReference`](crate::AccountReference) is pushed onto its postings
//! (phase 2).
use chrono::NaiveDate;

use crate::{
    AccountKey, AccountKind, InfoCollection, PostingLineCollection, ResultEngine,
    info::InfoRecord,
    posting_lines::PostingEvaluator,
    status::{Calculation, StatusGuard},
    util::normalize_required,
};

mod account;
mod budget_account;
mod contact_account;

pub use account::Account;
pub use budget_account::BudgetAccount;
pub use contact_account::ContactAccount;

#[derive(Debug)]
struct AccountCore<I: InfoRecord> {
    kind: AccountKind,
    key: AccountKey,
    name: String,
    description: Option<String>,
    infos: InfoCollection<I>,
    posting_lines: PostingLineCollection,
    guard: StatusGuard,
}

impl<I: InfoRecord> AccountCore<I> {
    fn new(
        kind: AccountKind,
        accounting_number: i32,
        account_number: &str,
        name: &str,
    ) -> ResultEngine<Self> {
        Ok(Self {
            kind,
            key: AccountKey::new(accounting_number, account_number)?,
            name: normalize_required(name, "account name")?,
            description: None,
            infos: InfoCollection::new(),
            posting_lines: PostingLineCollection::new(),
            guard: StatusGuard::new(),
        })
    }

    fn set_description(&mut self, description: &str) {
        let trimmed = description.trim();
        self.description = (!trimmed.is_empty()).then(|| trimmed.to_string());
    }

    async fn calculate<E: PostingEvaluator>(
        &self,
        status_date: NaiveDate,
        evaluator: &E,
    ) -> ResultEngine<Calculation> {
        let target = format!("{} {}", self.kind, self.key);
        self.guard
            .run(&target, status_date, move || async move {
                futures::try_join!(
                    self.infos.calculate(status_date, &self.posting_lines),
                    self.posting_lines.calculate(status_date, evaluator)
                )?;
                Ok(())
            })
            .await
    }
}

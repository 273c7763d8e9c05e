use std::{
    hash::{Hash, Hasher},
    sync::{Arc, RwLock},
};

use chrono::NaiveDate;

use crate::{
    AccountGroup, AccountKey, AccountKind, AccountReference, CreditInfo, CreditInfoValues,
    InfoCollection, PostingLine, PostingLineCollection, ResultEngine,
    accounts::AccountCore,
    info::StatusSummary,
    posting_lines::PostingEvaluator,
    status::Calculation,
    util::{read_lock, write_lock},
};

/// A ledger account, e.g. a bank account or a credit card.
#[derive(Debug)]
pub struct Account {
    core: AccountCore<CreditInfo>,
    account_group: RwLock<AccountGroup>,
}

impl Account {
    pub fn new(
        accounting_number: i32,
        account_number: &str,
        name: &str,
        account_group: AccountGroup,
    ) -> ResultEngine<Self> {
        Ok(Self {
            core: AccountCore::new(AccountKind::Account, accounting_number, account_number, name)?,
            account_group: RwLock::new(account_group),
        })
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.core.set_description(description);
        self
    }

    pub fn key(&self) -> &AccountKey {
        &self.core.key
    }

    pub fn accounting_number(&self) -> i32 {
        self.core.key.accounting_number()
    }

    pub fn account_number(&self) -> &str {
        self.core.key.account_number()
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn description(&self) -> Option<&str> {
        self.core.description.as_deref()
    }

    pub fn account_group(&self) -> AccountGroup {
        read_lock(&self.account_group).clone()
    }

    /// Moves the account to `account_group` and rebinds its postings, so
    /// rules reading the group type see the new one at once.
    ///
    /// Collection totals keep the old split until they are calculated again;
    /// [`Accounting::set_account_group`](crate::Accounting::set_account_group)
    /// takes care of that.
    pub fn set_account_group(&self, account_group: AccountGroup) {
        *write_lock(&self.account_group) = account_group;
        let reference = Arc::new(self.reference());
        let rebound = self
            .core
            .posting_lines
            .ordered()
            .iter()
            .filter(|line| line.apply_calculation(&reference))
            .count();
        tracing::debug!(account = %self.core.key, rebound, "account group changed");
    }

    pub fn credit_infos(&self) -> &InfoCollection<CreditInfo> {
        &self.core.infos
    }

    pub fn posting_lines(&self) -> &PostingLineCollection {
        &self.core.posting_lines
    }

    pub fn status_date(&self) -> Option<NaiveDate> {
        self.core.guard.status_date()
    }

    pub fn summary(&self) -> StatusSummary<CreditInfoValues> {
        self.core.infos.summary()
    }

    pub fn values_at_status_date(&self) -> CreditInfoValues {
        self.summary().at_status_date
    }

    pub fn values_at_end_of_last_month(&self) -> CreditInfoValues {
        self.summary().end_of_last_month
    }

    pub fn values_at_end_of_last_year(&self) -> CreditInfoValues {
        self.summary().end_of_last_year
    }

    /// The version of this account postings should carry right now.
    pub fn reference(&self) -> AccountReference {
        AccountReference::new(
            AccountKind::Account,
            self.core.key.clone(),
            &self.core.name,
            Some(read_lock(&self.account_group).account_group_type()),
            self.status_date(),
        )
    }

    /// Calculates the account as of `status_date` and rebinds its postings.
    pub async fn calculate(&self, status_date: NaiveDate) -> ResultEngine<&Self> {
        if self.calculate_values(status_date).await? == Calculation::Calculated {
            self.core
                .posting_lines
                .apply_calculation(&Arc::new(self.reference()))
                .await;
        }
        Ok(self)
    }

    pub(crate) async fn calculate_values(&self, status_date: NaiveDate) -> ResultEngine<Calculation> {
        let evaluator = AccountValues {
            credit_infos: &self.core.infos,
            posting_lines: &self.core.posting_lines,
        };
        self.core.calculate(status_date, &evaluator).await
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.core.key == other.core.key
    }
}

impl Eq for Account {}

impl Hash for Account {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.core.key.hash(state);
    }
}

/// Credit line and balance of the account when a posting was made.
struct AccountValues<'a> {
    credit_infos: &'a InfoCollection<CreditInfo>,
    posting_lines: &'a PostingLineCollection,
}

impl PostingEvaluator for AccountValues<'_> {
    fn needs_calculation(&self, line: &PostingLine, status_date: NaiveDate) -> bool {
        line.needs_calculation(AccountKind::Account, status_date)
    }

    fn calculate(&self, line: &PostingLine, status_date: NaiveDate) -> ResultEngine<()> {
        line.refresh_account_values(status_date, || {
            let credit = self
                .credit_infos
                .find_latest(line.posting_date())
                .map(|info| info.credit())
                .unwrap_or_default();
            let balance = self.posting_lines.calculate_posting_value(
                NaiveDate::MIN,
                line.posting_date(),
                Some(line.sort_order()),
            );
            Ok(CreditInfoValues::new(credit, balance))
        })
    }
}

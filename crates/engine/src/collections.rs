//! Account collections and the totals they aggregate.
//!
//! Each collection calculates its accounts concurrently for a status date
//! behind its own [`StatusGuard`] and then folds the account summaries into
//! collection-wide values.
use std::{
    collections::BTreeMap,
    ops::Add,
    sync::{Arc, RwLock},
};

use chrono::NaiveDate;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::{
    Account, AccountGroup, AccountGroupStatus, AccountGroupType, AccountKey, AccountKind,
    BalanceBelowZero, BudgetAccount, BudgetAccountGroup, BudgetAccountGroupStatus,
    BudgetInfoValues, ContactAccount, EngineError, Money, ResultEngine,
    info::StatusSummary,
    status::{Calculation, StatusGuard},
    util::{read_lock, write_lock},
};

/// What the collections need to know about their members.
trait Member: Send + Sync {
    const KIND: AccountKind;

    fn member_key(&self) -> &AccountKey;
}

impl Member for Account {
    const KIND: AccountKind = AccountKind::Account;

    fn member_key(&self) -> &AccountKey {
        self.key()
    }
}

impl Member for BudgetAccount {
    const KIND: AccountKind = AccountKind::BudgetAccount;

    fn member_key(&self) -> &AccountKey {
        self.key()
    }
}

impl Member for ContactAccount {
    const KIND: AccountKind = AccountKind::ContactAccount;

    fn member_key(&self) -> &AccountKey {
        self.key()
    }
}

/// Accounts ordered by key.
#[derive(Debug)]
struct Members<A> {
    accounts: RwLock<BTreeMap<AccountKey, Arc<A>>>,
}

impl<A: Member> Members<A> {
    fn new() -> Self {
        Self {
            accounts: RwLock::new(BTreeMap::new()),
        }
    }

    fn add(&self, account: Arc<A>) -> ResultEngine<()> {
        let mut accounts = write_lock(&self.accounts);
        let key = account.member_key().clone();
        if accounts.contains_key(&key) {
            return Err(EngineError::ExistingKey(format!("{} {key}", A::KIND)));
        }
        accounts.insert(key, account);
        Ok(())
    }

    fn get(&self, key: &AccountKey) -> Option<Arc<A>> {
        read_lock(&self.accounts).get(key).cloned()
    }

    fn all(&self) -> Vec<Arc<A>> {
        read_lock(&self.accounts).values().cloned().collect()
    }

    fn len(&self) -> usize {
        read_lock(&self.accounts).len()
    }
}

impl<A: Member> FromIterator<Arc<A>> for Members<A> {
    fn from_iter<I: IntoIterator<Item = Arc<A>>>(iter: I) -> Self {
        Self {
            accounts: RwLock::new(
                iter.into_iter()
                    .map(|account| (account.member_key().clone(), account))
                    .collect(),
            ),
        }
    }
}

fn not_calculated(what: &str) -> EngineError {
    EngineError::Unsupported(format!("{what} has not been calculated"))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCollectionValues {
    pub assets: Money,
    pub liabilities: Money,
}

impl Add for AccountCollectionValues {
    type Output = AccountCollectionValues;

    fn add(self, rhs: Self) -> Self::Output {
        AccountCollectionValues {
            assets: self.assets + rhs.assets,
            liabilities: self.liabilities + rhs.liabilities,
        }
    }
}

#[derive(Debug)]
pub struct AccountCollection {
    members: Members<Account>,
    summary: RwLock<StatusSummary<AccountCollectionValues>>,
    guard: StatusGuard,
}

impl AccountCollection {
    pub fn new() -> Self {
        Self::with_members(Members::new())
    }

    fn with_members(members: Members<Account>) -> Self {
        Self {
            members,
            summary: RwLock::new(StatusSummary::default()),
            guard: StatusGuard::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add(&self, account: Arc<Account>) -> ResultEngine<()> {
        self.members.add(account)
    }

    pub fn get(&self, key: &AccountKey) -> Option<Arc<Account>> {
        self.members.get(key)
    }

    pub fn accounts(&self) -> Vec<Arc<Account>> {
        self.members.all()
    }

    pub fn status_date(&self) -> Option<NaiveDate> {
        self.guard.status_date()
    }

    pub fn values_at_status_date(&self) -> AccountCollectionValues {
        read_lock(&self.summary).at_status_date
    }

    pub fn values_at_end_of_last_month(&self) -> AccountCollectionValues {
        read_lock(&self.summary).end_of_last_month
    }

    pub fn values_at_end_of_last_year(&self) -> AccountCollectionValues {
        read_lock(&self.summary).end_of_last_year
    }

    /// Calculates every account as of `status_date` and totals assets and
    /// liabilities.
    pub async fn calculate(&self, status_date: NaiveDate) -> ResultEngine<&Self> {
        self.calculate_accounts(status_date, true).await?;
        Ok(self)
    }

    /// Like [`calculate`](Self::calculate) without rebinding postings.
    pub(crate) async fn calculate_values(&self, status_date: NaiveDate) -> ResultEngine<Calculation> {
        self.calculate_accounts(status_date, false).await
    }

    async fn calculate_accounts(
        &self,
        status_date: NaiveDate,
        rebind: bool,
    ) -> ResultEngine<Calculation> {
        self.guard
            .run("account collection", status_date, move || async move {
                let accounts = self.accounts();
                try_join_all(accounts.iter().map(|account| async move {
                    if rebind {
                        account.calculate(status_date).await.map(|_| ())
                    } else {
                        account.calculate_values(status_date).await.map(|_| ())
                    }
                }))
                .await?;

                let summary = accounts
                    .iter()
                    .map(|account| {
                        let group_type = account.account_group().account_group_type();
                        account.summary().map(|values| match group_type {
                            AccountGroupType::Assets => AccountCollectionValues {
                                assets: values.balance,
                                liabilities: Money::ZERO,
                            },
                            AccountGroupType::Liabilities => AccountCollectionValues {
                                assets: Money::ZERO,
                                liabilities: values.balance,
                            },
                        })
                    })
                    .fold(StatusSummary::default(), Add::add);
                *write_lock(&self.summary) = summary;
                Ok(())
            })
            .await
    }

    /// Drops the calculated totals, so the next calculation splits them anew.
    pub(crate) fn invalidate(&self) {
        self.guard.invalidate();
    }

    /// One calculated status per account group, ordered by group number.
    pub async fn group_by_account_group(&self) -> ResultEngine<Vec<AccountGroupStatus>> {
        let status_date = self
            .status_date()
            .ok_or_else(|| not_calculated("account collection"))?;
        let groups: BTreeMap<i32, AccountGroup> = self
            .accounts()
            .iter()
            .map(|account| account.account_group())
            .map(|group| (group.number(), group))
            .collect();
        try_join_all(
            groups
                .into_values()
                .map(|group| async move { group.calculate(status_date, self).await }),
        )
        .await
    }

    pub(crate) fn subset(&self, belongs: impl Fn(&Account) -> bool) -> AccountCollection {
        Self::with_members(
            self.accounts()
                .into_iter()
                .filter(|account| belongs(account.as_ref()))
                .collect(),
        )
    }
}

impl Default for AccountCollection {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct BudgetAccountCollection {
    members: Members<BudgetAccount>,
    summary: RwLock<StatusSummary<BudgetInfoValues>>,
    guard: StatusGuard,
}

impl BudgetAccountCollection {
    pub fn new() -> Self {
        Self::with_members(Members::new())
    }

    fn with_members(members: Members<BudgetAccount>) -> Self {
        Self {
            members,
            summary: RwLock::new(StatusSummary::default()),
            guard: StatusGuard::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add(&self, budget_account: Arc<BudgetAccount>) -> ResultEngine<()> {
        self.members.add(budget_account)
    }

    pub fn get(&self, key: &AccountKey) -> Option<Arc<BudgetAccount>> {
        self.members.get(key)
    }

    pub fn budget_accounts(&self) -> Vec<Arc<BudgetAccount>> {
        self.members.all()
    }

    pub fn status_date(&self) -> Option<NaiveDate> {
        self.guard.status_date()
    }

    pub fn values_for_month_of_status_date(&self) -> BudgetInfoValues {
        read_lock(&self.summary).at_status_date
    }

    pub fn values_for_last_month_of_status_date(&self) -> BudgetInfoValues {
        read_lock(&self.summary).end_of_last_month
    }

    pub fn values_for_year_to_date_of_status_date(&self) -> BudgetInfoValues {
        read_lock(&self.summary).year_to_date
    }

    pub fn values_for_last_year_of_status_date(&self) -> BudgetInfoValues {
        read_lock(&self.summary).end_of_last_year
    }

    pub async fn calculate(&self, status_date: NaiveDate) -> ResultEngine<&Self> {
        self.calculate_accounts(status_date, true).await?;
        Ok(self)
    }

    pub(crate) async fn calculate_values(&self, status_date: NaiveDate) -> ResultEngine<Calculation> {
        self.calculate_accounts(status_date, false).await
    }

    async fn calculate_accounts(
        &self,
        status_date: NaiveDate,
        rebind: bool,
    ) -> ResultEngine<Calculation> {
        self.guard
            .run("budget account collection", status_date, move || async move {
                let budget_accounts = self.budget_accounts();
                try_join_all(budget_accounts.iter().map(|budget_account| async move {
                    if rebind {
                        budget_account.calculate(status_date).await.map(|_| ())
                    } else {
                        budget_account.calculate_values(status_date).await.map(|_| ())
                    }
                }))
                .await?;

                let summary = budget_accounts
                    .iter()
                    .map(|budget_account| budget_account.summary())
                    .fold(StatusSummary::default(), Add::add);
                *write_lock(&self.summary) = summary;
                Ok(())
            })
            .await
    }

    pub async fn group_by_budget_account_group(
        &self,
    ) -> ResultEngine<Vec<BudgetAccountGroupStatus>> {
        let status_date = self
            .status_date()
            .ok_or_else(|| not_calculated("budget account collection"))?;
        let groups: BTreeMap<i32, BudgetAccountGroup> = self
            .budget_accounts()
            .iter()
            .map(|budget_account| budget_account.budget_account_group())
            .map(|group| (group.number(), group))
            .collect();
        try_join_all(
            groups
                .into_values()
                .map(|group| async move { group.calculate(status_date, self).await }),
        )
        .await
    }

    pub(crate) fn subset(&self, belongs: impl Fn(&BudgetAccount) -> bool) -> BudgetAccountCollection {
        Self::with_members(
            self.budget_accounts()
                .into_iter()
                .filter(|budget_account| belongs(budget_account.as_ref()))
                .collect(),
        )
    }
}

impl Default for BudgetAccountCollection {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactAccountCollectionValues {
    pub debtors: Money,
    pub creditors: Money,
}

impl Add for ContactAccountCollectionValues {
    type Output = ContactAccountCollectionValues;

    fn add(self, rhs: Self) -> Self::Output {
        ContactAccountCollectionValues {
            debtors: self.debtors + rhs.debtors,
            creditors: self.creditors + rhs.creditors,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Standing {
    Debtor,
    Creditor,
    Settled,
}

#[derive(Debug)]
pub struct ContactAccountCollection {
    balance_below_zero: BalanceBelowZero,
    members: Members<ContactAccount>,
    summary: RwLock<StatusSummary<ContactAccountCollectionValues>>,
    guard: StatusGuard,
}

impl ContactAccountCollection {
    pub fn new(balance_below_zero: BalanceBelowZero) -> Self {
        Self {
            balance_below_zero,
            members: Members::new(),
            summary: RwLock::new(StatusSummary::default()),
            guard: StatusGuard::new(),
        }
    }

    pub fn balance_below_zero(&self) -> BalanceBelowZero {
        self.balance_below_zero
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add(&self, contact_account: Arc<ContactAccount>) -> ResultEngine<()> {
        self.members.add(contact_account)
    }

    pub fn get(&self, key: &AccountKey) -> Option<Arc<ContactAccount>> {
        self.members.get(key)
    }

    pub fn contact_accounts(&self) -> Vec<Arc<ContactAccount>> {
        self.members.all()
    }

    pub fn status_date(&self) -> Option<NaiveDate> {
        self.guard.status_date()
    }

    pub fn values_at_status_date(&self) -> ContactAccountCollectionValues {
        read_lock(&self.summary).at_status_date
    }

    pub fn values_at_end_of_last_month(&self) -> ContactAccountCollectionValues {
        read_lock(&self.summary).end_of_last_month
    }

    pub fn values_at_end_of_last_year(&self) -> ContactAccountCollectionValues {
        read_lock(&self.summary).end_of_last_year
    }

    pub async fn calculate(&self, status_date: NaiveDate) -> ResultEngine<&Self> {
        self.calculate_accounts(status_date, true).await?;
        Ok(self)
    }

    pub(crate) async fn calculate_values(&self, status_date: NaiveDate) -> ResultEngine<Calculation> {
        self.calculate_accounts(status_date, false).await
    }

    async fn calculate_accounts(
        &self,
        status_date: NaiveDate,
        rebind: bool,
    ) -> ResultEngine<Calculation> {
        self.guard
            .run("contact account collection", status_date, move || async move {
                let contact_accounts = self.contact_accounts();
                try_join_all(contact_accounts.iter().map(|contact_account| async move {
                    if rebind {
                        contact_account.calculate(status_date).await.map(|_| ())
                    } else {
                        contact_account.calculate_values(status_date).await.map(|_| ())
                    }
                }))
                .await?;

                let summary = contact_accounts
                    .iter()
                    .map(|contact_account| {
                        contact_account.summary().map(|values| match self.standing(values.balance) {
                            Standing::Debtor => ContactAccountCollectionValues {
                                debtors: values.balance,
                                creditors: Money::ZERO,
                            },
                            Standing::Creditor => ContactAccountCollectionValues {
                                debtors: Money::ZERO,
                                creditors: values.balance,
                            },
                            Standing::Settled => ContactAccountCollectionValues::default(),
                        })
                    })
                    .fold(StatusSummary::default(), Add::add);
                *write_lock(&self.summary) = summary;
                Ok(())
            })
            .await
    }

    /// Contacts owing money as of the status date.
    pub fn find_debtors(&self) -> Vec<Arc<ContactAccount>> {
        self.find(Standing::Debtor)
    }

    /// Contacts owed money as of the status date.
    pub fn find_creditors(&self) -> Vec<Arc<ContactAccount>> {
        self.find(Standing::Creditor)
    }

    fn find(&self, standing: Standing) -> Vec<Arc<ContactAccount>> {
        self.contact_accounts()
            .into_iter()
            .filter(|contact_account| {
                self.standing(contact_account.values_at_status_date().balance) == standing
            })
            .collect()
    }

    fn standing(&self, balance: Money) -> Standing {
        if balance.is_zero() {
            return Standing::Settled;
        }
        match (self.balance_below_zero, balance.is_negative()) {
            (BalanceBelowZero::Debtors, true) | (BalanceBelowZero::Creditors, false) => {
                Standing::Debtor
            }
            _ => Standing::Creditor,
        }
    }
}

//! Ledger postings and the account references they carry.
//!
//! A [`PostingLine`] never points back into the account graph. It holds an
//! [`AccountReference`] per account it books on: a versioned copy of what the
//! posting needs to know about the account (identity, name, group type and
//! the status date the account was last calculated for). Accounts push fresh
//! references onto their postings once they are calculated.
use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, Mutex, RwLock},
};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Account, AccountGroupType, BudgetAccount, BudgetInfoValues, ContactAccount, ContactInfoValues,
    CreditInfoValues, EngineError, Money, ResultEngine, YearMonth,
    util::{ensure_positive_number, lock, normalize_account_number, read_lock, write_lock},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Account,
    BudgetAccount,
    ContactAccount,
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AccountKind::Account => "account",
            AccountKind::BudgetAccount => "budget account",
            AccountKind::ContactAccount => "contact account",
        };
        f.write_str(label)
    }
}

/// Identity of an account: its number within an accounting.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountKey {
    accounting_number: i32,
    account_number: String,
}

impl AccountKey {
    pub fn new(accounting_number: i32, account_number: &str) -> ResultEngine<Self> {
        Ok(Self {
            accounting_number: ensure_positive_number(accounting_number, "accounting number")?,
            account_number: normalize_account_number(account_number)?,
        })
    }

    pub fn accounting_number(&self) -> i32 {
        self.accounting_number
    }

    pub fn account_number(&self) -> &str {
        &self.account_number
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.account_number, self.accounting_number)
    }
}

/// What a posting knows about one of its accounts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountReference {
    kind: AccountKind,
    key: AccountKey,
    name: String,
    account_group_type: Option<AccountGroupType>,
    status_date: Option<NaiveDate>,
}

impl AccountReference {
    pub(crate) fn new(
        kind: AccountKind,
        key: AccountKey,
        name: &str,
        account_group_type: Option<AccountGroupType>,
        status_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            kind,
            key,
            name: name.to_string(),
            account_group_type,
            status_date,
        }
    }

    pub fn kind(&self) -> AccountKind {
        self.kind
    }

    pub fn key(&self) -> &AccountKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Only set for ledger accounts.
    pub fn account_group_type(&self) -> Option<AccountGroupType> {
        self.account_group_type
    }

    pub fn status_date(&self) -> Option<NaiveDate> {
        self.status_date
    }

    /// Same kind and same `number@accounting`, whatever the version.
    pub fn refers_to(&self, other: &AccountReference) -> bool {
        self.kind == other.kind && self.key == other.key
    }
}

/// Who owns a snapshot stored on a posting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrigin {
    /// Supplied when the posting was built and never recalculated.
    Frozen,
    /// Calculated by the account the snapshot belongs to.
    Engine,
}

#[derive(Debug)]
struct Snapshot<V> {
    origin: SnapshotOrigin,
    status_date: Option<NaiveDate>,
    values: Option<V>,
}

impl<V: Copy> Snapshot<V> {
    fn new(frozen: Option<V>) -> Self {
        match frozen {
            Some(values) => Self {
                origin: SnapshotOrigin::Frozen,
                status_date: None,
                values: Some(values),
            },
            None => Self {
                origin: SnapshotOrigin::Engine,
                status_date: None,
                values: None,
            },
        }
    }

    fn needs_calculation(&self, status_date: NaiveDate) -> bool {
        self.origin == SnapshotOrigin::Engine && self.status_date != Some(status_date)
    }

    fn refresh(
        &mut self,
        status_date: NaiveDate,
        calculate: impl FnOnce() -> ResultEngine<V>,
    ) -> ResultEngine<()> {
        if !self.needs_calculation(status_date) {
            return Ok(());
        }
        self.values = Some(calculate()?);
        self.status_date = Some(status_date);
        Ok(())
    }
}

#[derive(Clone, Debug)]
struct References {
    account: Arc<AccountReference>,
    budget_account: Option<Arc<AccountReference>>,
    contact_account: Option<Arc<AccountReference>>,
}

/// One ledger entry.
///
/// Equality and hashing use the identifier only.
#[derive(Debug)]
pub struct PostingLine {
    identifier: Uuid,
    posting_date: NaiveDate,
    details: Option<String>,
    debit: Money,
    credit: Money,
    sort_order: u32,
    references: RwLock<References>,
    account_values: Mutex<Snapshot<CreditInfoValues>>,
    budget_account_values: Mutex<Snapshot<BudgetInfoValues>>,
    contact_account_values: Mutex<Snapshot<ContactInfoValues>>,
}

impl PostingLine {
    pub fn builder(identifier: Uuid, posting_date: NaiveDate) -> PostingLineBuilder {
        PostingLineBuilder {
            identifier,
            posting_date,
            details: None,
            account: None,
            budget_account: None,
            contact_account: None,
            debit: Money::ZERO,
            credit: Money::ZERO,
            sort_order: 0,
            account_values: None,
            budget_account_values: None,
            contact_account_values: None,
        }
    }

    pub fn identifier(&self) -> Uuid {
        self.identifier
    }

    pub fn posting_date(&self) -> NaiveDate {
        self.posting_date
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn debit(&self) -> Money {
        self.debit
    }

    pub fn credit(&self) -> Money {
        self.credit
    }

    /// `debit - credit`
    pub fn posting_value(&self) -> Money {
        self.debit - self.credit
    }

    pub fn sort_order(&self) -> u32 {
        self.sort_order
    }

    pub fn account(&self) -> Arc<AccountReference> {
        Arc::clone(&read_lock(&self.references).account)
    }

    pub fn budget_account(&self) -> Option<Arc<AccountReference>> {
        read_lock(&self.references).budget_account.clone()
    }

    pub fn contact_account(&self) -> Option<Arc<AccountReference>> {
        read_lock(&self.references).contact_account.clone()
    }

    pub fn account_values_at_posting_date(&self) -> Option<CreditInfoValues> {
        lock(&self.account_values).values
    }

    pub fn budget_account_values_at_posting_date(&self) -> Option<BudgetInfoValues> {
        lock(&self.budget_account_values).values
    }

    pub fn contact_account_values_at_posting_date(&self) -> Option<ContactInfoValues> {
        lock(&self.contact_account_values).values
    }

    pub fn snapshot_origin(&self, kind: AccountKind) -> SnapshotOrigin {
        match kind {
            AccountKind::Account => lock(&self.account_values).origin,
            AccountKind::BudgetAccount => lock(&self.budget_account_values).origin,
            AccountKind::ContactAccount => lock(&self.contact_account_values).origin,
        }
    }

    /// Status date the snapshot of `kind` was last calculated for.
    pub fn snapshot_status_date(&self, kind: AccountKind) -> Option<NaiveDate> {
        match kind {
            AccountKind::Account => lock(&self.account_values).status_date,
            AccountKind::BudgetAccount => lock(&self.budget_account_values).status_date,
            AccountKind::ContactAccount => lock(&self.contact_account_values).status_date,
        }
    }

    pub(crate) fn needs_calculation(&self, kind: AccountKind, status_date: NaiveDate) -> bool {
        match kind {
            AccountKind::Account => lock(&self.account_values).needs_calculation(status_date),
            AccountKind::BudgetAccount => {
                lock(&self.budget_account_values).needs_calculation(status_date)
            }
            AccountKind::ContactAccount => {
                lock(&self.contact_account_values).needs_calculation(status_date)
            }
        }
    }

    pub(crate) fn refresh_account_values(
        &self,
        status_date: NaiveDate,
        calculate: impl FnOnce() -> ResultEngine<CreditInfoValues>,
    ) -> ResultEngine<()> {
        lock(&self.account_values).refresh(status_date, calculate)
    }

    pub(crate) fn refresh_budget_account_values(
        &self,
        status_date: NaiveDate,
        calculate: impl FnOnce() -> ResultEngine<BudgetInfoValues>,
    ) -> ResultEngine<()> {
        lock(&self.budget_account_values).refresh(status_date, calculate)
    }

    pub(crate) fn refresh_contact_account_values(
        &self,
        status_date: NaiveDate,
        calculate: impl FnOnce() -> ResultEngine<ContactInfoValues>,
    ) -> ResultEngine<()> {
        lock(&self.contact_account_values).refresh(status_date, calculate)
    }

    /// Replaces the reference `reference` is a newer version of.
    ///
    /// Returns `false` when the posting does not book on that account.
    pub fn apply_calculation(&self, reference: &Arc<AccountReference>) -> bool {
        let mut references = write_lock(&self.references);
        let slot = match reference.kind() {
            AccountKind::Account => Some(&mut references.account),
            AccountKind::BudgetAccount => references.budget_account.as_mut(),
            AccountKind::ContactAccount => references.contact_account.as_mut(),
        };
        match slot {
            Some(current) if current.refers_to(reference) => {
                *current = Arc::clone(reference);
                true
            }
            _ => false,
        }
    }

    /// Rebinds every account the posting books on for which `resolve` has a
    /// reference. Returns the number of accounts rebound.
    pub(crate) fn rebind<'r>(
        &self,
        resolve: impl Fn(AccountKind, &AccountKey) -> Option<&'r Arc<AccountReference>>,
    ) -> usize {
        let mut references = write_lock(&self.references);
        let References {
            account,
            budget_account,
            contact_account,
        } = &mut *references;
        [Some(account), budget_account.as_mut(), contact_account.as_mut()]
            .into_iter()
            .flatten()
            .filter_map(|current| {
                let newer = resolve(current.kind(), current.key())?;
                *current = Arc::clone(newer);
                Some(())
            })
            .count()
    }

    /// Whether the posting books on the account `reference` points at.
    pub fn books_on(&self, reference: &AccountReference) -> bool {
        let references = read_lock(&self.references);
        match reference.kind() {
            AccountKind::Account => references.account.refers_to(reference),
            AccountKind::BudgetAccount => references
                .budget_account
                .as_ref()
                .is_some_and(|current| current.refers_to(reference)),
            AccountKind::ContactAccount => references
                .contact_account
                .as_ref()
                .is_some_and(|current| current.refers_to(reference)),
        }
    }
}

impl PartialEq for PostingLine {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
    }
}

impl Eq for PostingLine {}

impl Hash for PostingLine {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier.hash(state);
    }
}

#[derive(Debug)]
pub struct PostingLineBuilder {
    identifier: Uuid,
    posting_date: NaiveDate,
    details: Option<String>,
    account: Option<AccountReference>,
    budget_account: Option<AccountReference>,
    contact_account: Option<AccountReference>,
    debit: Money,
    credit: Money,
    sort_order: u32,
    account_values: Option<CreditInfoValues>,
    budget_account_values: Option<BudgetInfoValues>,
    contact_account_values: Option<ContactInfoValues>,
}

impl PostingLineBuilder {
    pub fn details(mut self, details: &str) -> Self {
        let trimmed = details.trim();
        self.details = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn account(mut self, account: &Account) -> Self {
        self.account = Some(account.reference());
        self
    }

    pub fn budget_account(mut self, budget_account: &BudgetAccount) -> Self {
        self.budget_account = Some(budget_account.reference());
        self
    }

    pub fn contact_account(mut self, contact_account: &ContactAccount) -> Self {
        self.contact_account = Some(contact_account.reference());
        self
    }

    pub fn debit(mut self, debit: Money) -> Self {
        self.debit = debit;
        self
    }

    pub fn credit(mut self, credit: Money) -> Self {
        self.credit = credit;
        self
    }

    pub fn sort_order(mut self, sort_order: u32) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn account_values_at_posting_date(mut self, values: CreditInfoValues) -> Self {
        self.account_values = Some(values);
        self
    }

    pub fn budget_account_values_at_posting_date(mut self, values: BudgetInfoValues) -> Self {
        self.budget_account_values = Some(values);
        self
    }

    pub fn contact_account_values_at_posting_date(mut self, values: ContactInfoValues) -> Self {
        self.contact_account_values = Some(values);
        self
    }

    pub fn build(self) -> ResultEngine<PostingLine> {
        YearMonth::new(self.posting_date.year(), self.posting_date.month())?;
        let account = self.account.ok_or_else(|| {
            EngineError::InvalidArgument("posting line must book on an account".to_string())
        })?;
        let debit = self.debit.ensure_amount("debit")?;
        let credit = self.credit.ensure_amount("credit")?;
        if let Some(values) = &self.account_values {
            values.credit.ensure_bounded("credit at posting date")?;
            values.balance.ensure_bounded("balance at posting date")?;
        }
        if let Some(values) = &self.budget_account_values {
            values.budget.ensure_bounded("budget at posting date")?;
            values.posted.ensure_bounded("posted at posting date")?;
        }
        if let Some(values) = &self.contact_account_values {
            values.balance.ensure_bounded("contact balance at posting date")?;
        }

        let accounting_number = account.key().accounting_number();
        for reference in [&self.budget_account, &self.contact_account].into_iter().flatten() {
            if reference.key().accounting_number() != accounting_number {
                return Err(EngineError::AccountingMismatch(format!(
                    "{} {} does not belong to accounting {accounting_number}",
                    reference.kind(),
                    reference.key()
                )));
            }
        }

        Ok(PostingLine {
            identifier: self.identifier,
            posting_date: self.posting_date,
            details: self.details,
            debit,
            credit,
            sort_order: self.sort_order,
            references: RwLock::new(References {
                account: Arc::new(account),
                budget_account: self.budget_account.map(Arc::new),
                contact_account: self.contact_account.map(Arc::new),
            }),
            account_values: Mutex::new(Snapshot::new(self.account_values)),
            budget_account_values: Mutex::new(Snapshot::new(self.budget_account_values)),
            contact_account_values: Mutex::new(Snapshot::new(self.contact_account_values)),
        })
    }
}

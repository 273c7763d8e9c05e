//! The accounting: the root of one ledger.
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    Account, AccountCollection, AccountGroup, AccountKey, BudgetAccount, BudgetAccountCollection, ContactAccount,
    ContactAccountCollection, EngineError, PostingLine, PostingLineCollection, ResultEngine,
    status::StatusGuard,
    util::{ensure_positive_number, normalize_required},
};

/// Which contacts a negative balance belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceBelowZero {
    #[default]
    Debtors,
    Creditors,
}

#[derive(Debug)]
pub struct Accounting {
    number: i32,
    name: String,
    accounts: AccountCollection,
    budget_accounts: BudgetAccountCollection,
    contact_accounts: ContactAccountCollection,
    guard: StatusGuard,
}

impl Accounting {
    pub fn new(number: i32, name: &str, balance_below_zero: BalanceBelowZero) -> ResultEngine<Self> {
        Ok(Self {
            number: ensure_positive_number(number, "accounting number")?,
            name: normalize_required(name, "accounting name")?,
            accounts: AccountCollection::new(),
            budget_accounts: BudgetAccountCollection::new(),
            contact_accounts: ContactAccountCollection::new(balance_below_zero),
            guard: StatusGuard::new(),
        })
    }

    pub fn number(&self) -> i32 {
        self.number
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn balance_below_zero(&self) -> BalanceBelowZero {
        self.contact_accounts.balance_below_zero()
    }

    pub fn accounts(&self) -> &AccountCollection {
        &self.accounts
    }

    pub fn budget_accounts(&self) -> &BudgetAccountCollection {
        &self.budget_accounts
    }

    pub fn contact_accounts(&self) -> &ContactAccountCollection {
        &self.contact_accounts
    }

    pub fn status_date(&self) -> Option<NaiveDate> {
        self.guard.status_date()
    }

    pub fn add_account(&self, account: Account) -> ResultEngine<Arc<Account>> {
        self.ensure_member(account.key())?;
        let account = Arc::new(account);
        self.accounts.add(Arc::clone(&account))?;
        Ok(account)
    }

    pub fn add_budget_account(&self, budget_account: BudgetAccount) -> ResultEngine<Arc<BudgetAccount>> {
        self.ensure_member(budget_account.key())?;
        let budget_account = Arc::new(budget_account);
        self.budget_accounts.add(Arc::clone(&budget_account))?;
        Ok(budget_account)
    }

    pub fn add_contact_account(
        &self,
        contact_account: ContactAccount,
    ) -> ResultEngine<Arc<ContactAccount>> {
        self.ensure_member(contact_account.key())?;
        let contact_account = Arc::new(contact_account);
        self.contact_accounts.add(Arc::clone(&contact_account))?;
        Ok(contact_account)
    }

    /// Books `line` on every account it references.
    ///
    /// Nothing is booked when one of the accounts is unknown or already holds
    /// a posting with the same identifier.
    pub fn add_posting_line(&self, line: PostingLine) -> ResultEngine<Arc<PostingLine>> {
        let account_key = line.account().key().clone();
        self.ensure_member(&account_key)?;
        let account = self
            .accounts
            .get(&account_key)
            .ok_or_else(|| EngineError::KeyNotFound(format!("account {account_key}")))?;
        let budget_account = line
            .budget_account()
            .map(|reference| {
                self.budget_accounts.get(reference.key()).ok_or_else(|| {
                    EngineError::KeyNotFound(format!("budget account {}", reference.key()))
                })
            })
            .transpose()?;
        let contact_account = line
            .contact_account()
            .map(|reference| {
                self.contact_accounts.get(reference.key()).ok_or_else(|| {
                    EngineError::KeyNotFound(format!("contact account {}", reference.key()))
                })
            })
            .transpose()?;

        let mut targets = vec![account.posting_lines()];
        targets.extend(budget_account.as_deref().map(BudgetAccount::posting_lines));
        targets.extend(contact_account.as_deref().map(ContactAccount::posting_lines));

        let identifier = line.identifier();
        if targets.iter().any(|posting_lines| posting_lines.contains(identifier)) {
            return Err(EngineError::ExistingKey(format!("posting line {identifier}")));
        }

        let line = Arc::new(line);
        for posting_lines in targets {
            posting_lines.add(Arc::clone(&line))?;
        }
        Ok(line)
    }

    /// Moves the account `key` to `account_group`.
    ///
    /// The account's postings see the new group at once. The account totals
    /// and the accounting are calculated again on their next run, even for the
    /// status date they were calculated for.
    pub fn set_account_group(
        &self,
        key: &AccountKey,
        account_group: AccountGroup,
    ) -> ResultEngine<Arc<Account>> {
        self.ensure_member(key)?;
        let account = self
            .accounts
            .get(key)
            .ok_or_else(|| EngineError::KeyNotFound(format!("account {key}")))?;
        account.set_account_group(account_group);
        self.accounts.invalidate();
        self.guard.invalidate();
        Ok(account)
    }

    /// Every posting of the accounting, each once.
    pub fn posting_lines(&self) -> PostingLineCollection {
        self.accounts
            .accounts()
            .iter()
            .flat_map(|account| account.posting_lines().ordered())
            .collect()
    }

    /// Calculates the whole accounting as of `status_date`.
    ///
    /// The three collections are calculated concurrently first; afterwards
    /// every posting is rebound to the fresh references of its accounts in one
    /// pass.
    pub async fn calculate(&self, status_date: NaiveDate) -> ResultEngine<&Self> {
        let target = format!("accounting {}", self.number);
        self.guard
            .run(&target, status_date, move || async move {
                futures::try_join!(
                    self.accounts.calculate_values(status_date),
                    self.budget_accounts.calculate_values(status_date),
                    self.contact_accounts.calculate_values(status_date)
                )?;

                let mut references = Vec::new();
                references.extend(self.accounts.accounts().iter().map(|a| Arc::new(a.reference())));
                references.extend(
                    self.budget_accounts
                        .budget_accounts()
                        .iter()
                        .map(|a| Arc::new(a.reference())),
                );
                references.extend(
                    self.contact_accounts
                        .contact_accounts()
                        .iter()
                        .map(|a| Arc::new(a.reference())),
                );
                let rebound = self.posting_lines().apply_references(&references).await;
                tracing::debug!(accounting = self.number, rebound, "applied account references");
                Ok(())
            })
            .await?;
        Ok(self)
    }

    fn ensure_member(&self, key: &AccountKey) -> ResultEngine<()> {
        if key.accounting_number() != self.number {
            return Err(EngineError::AccountingMismatch(format!(
                "{key} does not belong to accounting {}",
                self.number
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::{
        AccountGroupType, BudgetAccountGroup, Money, PostingWarningCalculator,
        PostingWarningReason,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn household() -> (Accounting, Arc<Account>, Arc<BudgetAccount>) {
        let accounting = Accounting::new(1, "Household", BalanceBelowZero::Creditors).unwrap();
        let bank = accounting
            .add_account(
                Account::new(
                    1,
                    "bank",
                    "Bank",
                    AccountGroup::new(1, "Bank", AccountGroupType::Assets).unwrap(),
                )
                .unwrap(),
            )
            .unwrap();
        let food = accounting
            .add_budget_account(
                BudgetAccount::new(1, "food", "Food", BudgetAccountGroup::new(1, "Household").unwrap())
                    .unwrap(),
            )
            .unwrap();
        (accounting, bank, food)
    }

    #[test]
    fn rejects_account_of_other_accounting() {
        let (accounting, _, _) = household();
        let foreign = Account::new(
            2,
            "bank",
            "Bank",
            AccountGroup::new(1, "Bank", AccountGroupType::Assets).unwrap(),
        )
        .unwrap();

        assert_eq!(
            accounting.add_account(foreign).unwrap_err(),
            EngineError::AccountingMismatch("BANK@2 does not belong to accounting 1".to_string())
        );
    }

    #[test]
    fn posting_on_unknown_contact_is_rejected() {
        let (accounting, bank, _) = household();
        let stranger = ContactAccount::new(1, "stranger", "Stranger").unwrap();
        let line = PostingLine::builder(Uuid::new_v4(), date(2024, 1, 1))
            .account(&bank)
            .contact_account(&stranger)
            .debit(Money::new(100))
            .build()
            .unwrap();

        assert_eq!(
            accounting.add_posting_line(line).unwrap_err(),
            EngineError::KeyNotFound("contact account STRANGER@1".to_string())
        );
        assert!(bank.posting_lines().is_empty());
    }

    #[test]
    fn duplicate_posting_is_rejected_everywhere() {
        let (accounting, bank, food) = household();
        let id = Uuid::new_v4();
        let build = || {
            PostingLine::builder(id, date(2024, 1, 1))
                .account(&bank)
                .budget_account(&food)
                .credit(Money::new(100))
                .build()
                .unwrap()
        };
        accounting.add_posting_line(build()).unwrap();

        assert!(accounting.add_posting_line(build()).unwrap_err().is_existing_key());
        assert_eq!(bank.posting_lines().len(), 1);
        assert_eq!(food.posting_lines().len(), 1);
        assert_eq!(accounting.posting_lines().len(), 1);
    }

    #[tokio::test]
    async fn calculate_rebinds_every_reference() {
        let (accounting, bank, food) = household();
        let line = accounting
            .add_posting_line(
                PostingLine::builder(Uuid::new_v4(), date(2024, 1, 5))
                    .account(&bank)
                    .budget_account(&food)
                    .credit(Money::new(2_000))
                    .build()
                    .unwrap(),
            )
            .unwrap();

        accounting.calculate(date(2024, 1, 31)).await.unwrap();

        assert_eq!(accounting.status_date(), Some(date(2024, 1, 31)));
        assert_eq!(line.account().status_date(), Some(date(2024, 1, 31)));
        assert_eq!(line.budget_account().unwrap().status_date(), Some(date(2024, 1, 31)));
        assert_eq!(line.account_values_at_posting_date().unwrap().balance, Money::new(-2_000));
        assert_eq!(line.budget_account_values_at_posting_date().unwrap().posted, Money::new(-2_000));
        assert_eq!(accounting.accounts().values_at_status_date().assets, Money::new(-2_000));
        assert_eq!(
            accounting.budget_accounts().values_for_month_of_status_date().posted,
            Money::new(-2_000)
        );
    }

    #[tokio::test]
    async fn group_change_is_picked_up_for_the_same_status_date() {
        let (accounting, bank, _) = household();
        accounting
            .add_posting_line(
                PostingLine::builder(Uuid::new_v4(), date(2024, 1, 5))
                    .account(&bank)
                    .credit(Money::new(5_000))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let status_date = date(2024, 2, 29);
        accounting.calculate(status_date).await.unwrap();

        let warnings = PostingWarningCalculator::new()
            .calculate_collection(&accounting.posting_lines())
            .await;
        let reasons: Vec<_> = warnings.iter().map(|warning| warning.reason()).collect();
        assert_eq!(reasons, vec![PostingWarningReason::AccountIsOverdrawn]);

        let cards = AccountGroup::new(2, "Cards", AccountGroupType::Liabilities).unwrap();
        accounting.set_account_group(bank.key(), cards).unwrap();

        let warnings = PostingWarningCalculator::new()
            .calculate_collection(&accounting.posting_lines())
            .await;
        assert!(warnings.is_empty());
        assert_eq!(accounting.status_date(), None);

        accounting.calculate(status_date).await.unwrap();
        assert_eq!(accounting.status_date(), Some(status_date));
        let values = accounting.accounts().values_at_status_date();
        assert_eq!(values.assets, Money::ZERO);
        assert_eq!(values.liabilities, Money::new(-5_000));
    }

    #[test]
    fn group_change_of_unknown_account_is_rejected() {
        let (accounting, _, _) = household();
        let key = AccountKey::new(1, "cash").unwrap();
        let group = AccountGroup::new(1, "Bank", AccountGroupType::Assets).unwrap();

        assert_eq!(
            accounting.set_account_group(&key, group).unwrap_err(),
            EngineError::KeyNotFound("account CASH@1".to_string())
        );
    }
}

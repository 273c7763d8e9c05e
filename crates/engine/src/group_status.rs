//! Calculated views of account groups.
//!
//! A group definition is [`CalculationView::Live`]: it can build a new status
//! from a collection. The status it builds is a
//! [`CalculationView::ComputedSnapshot`] that only knows how to recalculate
//! itself for another status date.
use chrono::NaiveDate;

use crate::{
    AccountCollection, AccountCollectionValues, AccountGroup, BudgetAccountCollection,
    BudgetAccountGroup, BudgetInfoValues, ResultEngine,
    status::{CalculationView, StatusGuard},
};

impl AccountGroup {
    pub fn view(&self) -> CalculationView {
        CalculationView::Live
    }

    /// Builds the status of this group from the members of `accounts`.
    pub async fn calculate(
        &self,
        status_date: NaiveDate,
        accounts: &AccountCollection,
    ) -> ResultEngine<AccountGroupStatus> {
        let status = AccountGroupStatus {
            account_group: self.clone(),
            accounts: accounts.subset(|account| account.account_group() == *self),
            guard: StatusGuard::new(),
        };
        status.calculate(status_date).await?;
        Ok(status)
    }
}

impl BudgetAccountGroup {
    pub fn view(&self) -> CalculationView {
        CalculationView::Live
    }

    pub async fn calculate(
        &self,
        status_date: NaiveDate,
        budget_accounts: &BudgetAccountCollection,
    ) -> ResultEngine<BudgetAccountGroupStatus> {
        let status = BudgetAccountGroupStatus {
            budget_account_group: self.clone(),
            budget_accounts: budget_accounts
                .subset(|budget_account| budget_account.budget_account_group() == *self),
            guard: StatusGuard::new(),
        };
        status.calculate(status_date).await?;
        Ok(status)
    }
}

#[derive(Debug)]
pub struct AccountGroupStatus {
    account_group: AccountGroup,
    accounts: AccountCollection,
    guard: StatusGuard,
}

impl AccountGroupStatus {
    pub fn view(&self) -> CalculationView {
        CalculationView::ComputedSnapshot
    }

    pub fn account_group(&self) -> &AccountGroup {
        &self.account_group
    }

    pub fn accounts(&self) -> &AccountCollection {
        &self.accounts
    }

    pub fn status_date(&self) -> Option<NaiveDate> {
        self.guard.status_date()
    }

    pub fn values_at_status_date(&self) -> AccountCollectionValues {
        self.accounts.values_at_status_date()
    }

    pub fn values_at_end_of_last_month(&self) -> AccountCollectionValues {
        self.accounts.values_at_end_of_last_month()
    }

    pub fn values_at_end_of_last_year(&self) -> AccountCollectionValues {
        self.accounts.values_at_end_of_last_year()
    }

    pub async fn calculate(&self, status_date: NaiveDate) -> ResultEngine<&Self> {
        let target = format!("account group {}", self.account_group.number());
        self.guard
            .run(&target, status_date, move || async move {
                self.accounts.calculate(status_date).await?;
                Ok(())
            })
            .await?;
        Ok(self)
    }
}

#[derive(Debug)]
pub struct BudgetAccountGroupStatus {
    budget_account_group: BudgetAccountGroup,
    budget_accounts: BudgetAccountCollection,
    guard: StatusGuard,
}

impl BudgetAccountGroupStatus {
    pub fn view(&self) -> CalculationView {
        CalculationView::ComputedSnapshot
    }

    pub fn budget_account_group(&self) -> &BudgetAccountGroup {
        &self.budget_account_group
    }

    pub fn budget_accounts(&self) -> &BudgetAccountCollection {
        &self.budget_accounts
    }

    pub fn status_date(&self) -> Option<NaiveDate> {
        self.guard.status_date()
    }

    pub fn values_for_month_of_status_date(&self) -> BudgetInfoValues {
        self.budget_accounts.values_for_month_of_status_date()
    }

    pub fn values_for_last_month_of_status_date(&self) -> BudgetInfoValues {
        self.budget_accounts.values_for_last_month_of_status_date()
    }

    pub fn values_for_year_to_date_of_status_date(&self) -> BudgetInfoValues {
        self.budget_accounts.values_for_year_to_date_of_status_date()
    }

    pub fn values_for_last_year_of_status_date(&self) -> BudgetInfoValues {
        self.budget_accounts.values_for_last_year_of_status_date()
    }

    pub async fn calculate(&self, status_date: NaiveDate) -> ResultEngine<&Self> {
        let target = format!("budget account group {}", self.budget_account_group.number());
        self.guard
            .run(&target, status_date, move || async move {
                self.budget_accounts.calculate(status_date).await?;
                Ok(())
            })
            .await?;
        Ok(self)
    }
}

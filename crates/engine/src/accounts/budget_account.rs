use std::{
    hash::{Hash, Hasher},
    sync::{Arc, RwLock},
};

use chrono::NaiveDate;

use crate::{
    AccountKey, AccountKind, AccountReference, BudgetAccountGroup, BudgetInfo, BudgetInfoValues,
    InfoCollection, PostingLine, PostingLineCollection, ResultEngine, YearMonth,
    accounts::AccountCore,
    info::StatusSummary,
    posting_lines::PostingEvaluator,
    status::Calculation,
    util::{read_lock, write_lock},
};

/// An income or expense category with a monthly budget.
#[derive(Debug)]
pub struct BudgetAccount {
    core: AccountCore<BudgetInfo>,
    budget_account_group: RwLock<BudgetAccountGroup>,
}

impl BudgetAccount {
    pub fn new(
        accounting_number: i32,
        account_number: &str,
        name: &str,
        budget_account_group: BudgetAccountGroup,
    ) -> ResultEngine<Self> {
        Ok(Self {
            core: AccountCore::new(
                AccountKind::BudgetAccount,
                accounting_number,
                account_number,
                name,
            )?,
            budget_account_group: RwLock::new(budget_account_group),
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

    pub fn budget_account_group(&self) -> BudgetAccountGroup {
        read_lock(&self.budget_account_group).clone()
    }

    pub fn set_budget_account_group(&self, budget_account_group: BudgetAccountGroup) {
        *write_lock(&self.budget_account_group) = budget_account_group;
    }

    pub fn budget_infos(&self) -> &InfoCollection<BudgetInfo> {
        &self.core.infos
    }

    pub fn posting_lines(&self) -> &PostingLineCollection {
        &self.core.posting_lines
    }

    pub fn status_date(&self) -> Option<NaiveDate> {
        self.core.guard.status_date()
    }

    pub fn summary(&self) -> StatusSummary<BudgetInfoValues> {
        self.core.infos.summary()
    }

    pub fn values_for_month_of_status_date(&self) -> BudgetInfoValues {
        self.summary().at_status_date
    }

    pub fn values_for_last_month_of_status_date(&self) -> BudgetInfoValues {
        self.summary().end_of_last_month
    }

    pub fn values_for_year_to_date_of_status_date(&self) -> BudgetInfoValues {
        self.summary().year_to_date
    }

    pub fn values_for_last_year_of_status_date(&self) -> BudgetInfoValues {
        self.summary().end_of_last_year
    }

    pub fn reference(&self) -> AccountReference {
        AccountReference::new(
            AccountKind::BudgetAccount,
            self.core.key.clone(),
            &self.core.name,
            None,
            self.status_date(),
        )
    }

    /// Calculates the budget account as of `status_date` and rebinds its
    /// postings.
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
        let evaluator = BudgetAccountValues {
            budget_infos: &self.core.infos,
            posting_lines: &self.core.posting_lines,
        };
        self.core.calculate(status_date, &evaluator).await
    }
}

impl PartialEq for BudgetAccount {
    fn eq(&self, other: &Self) -> bool {
        self.core.key == other.core.key
    }
}

impl Eq for BudgetAccount {}

impl Hash for BudgetAccount {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.core.key.hash(state);
    }
}

/// Budget of the posting month and what was posted in it up to the posting.
struct BudgetAccountValues<'a> {
    budget_infos: &'a InfoCollection<BudgetInfo>,
    posting_lines: &'a PostingLineCollection,
}

impl PostingEvaluator for BudgetAccountValues<'_> {
    fn needs_calculation(&self, line: &PostingLine, status_date: NaiveDate) -> bool {
        line.needs_calculation(AccountKind::BudgetAccount, status_date)
    }

    fn calculate(&self, line: &PostingLine, status_date: NaiveDate) -> ResultEngine<()> {
        line.refresh_budget_account_values(status_date, || {
            let budget = self
                .budget_infos
                .find(line.posting_date())
                .map(|info| info.budget())
                .unwrap_or_default();
            let posted = self.posting_lines.calculate_posting_value(
                YearMonth::from_date(line.posting_date()).first_day(),
                line.posting_date(),
                Some(line.sort_order()),
            );
            Ok(BudgetInfoValues::new(budget, posted))
        })
    }
}

use std::ops::Add;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    Money, PostingLineCollection, ResultEngine, YearMonth,
    info::{InfoFlags, InfoRecord, StatusSummary},
};

/// Planned and posted amounts of a budget account.
///
/// `budget` is income minus expenses, so an expense budget is negative.
/// `posted` follows the same sign: money coming in is positive, money spent
/// is negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetInfoValues {
    pub budget: Money,
    pub posted: Money,
}

impl BudgetInfoValues {
    pub fn new(budget: Money, posted: Money) -> Self {
        Self { budget, posted }
    }

    /// `budget - posted`
    pub fn available(&self) -> Money {
        self.budget - self.posted
    }
}

impl Add for BudgetInfoValues {
    type Output = BudgetInfoValues;

    fn add(self, rhs: Self) -> Self::Output {
        BudgetInfoValues {
            budget: self.budget + rhs.budget,
            posted: self.posted + rhs.posted,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BudgetInfo {
    year_month: YearMonth,
    income: Money,
    expenses: Money,
    posted: Money,
    flags: InfoFlags,
}

impl BudgetInfo {
    pub fn new(year: i32, month: u32, income: Money, expenses: Money) -> ResultEngine<Self> {
        Ok(Self {
            year_month: YearMonth::new(year, month)?,
            income: income.ensure_amount("income")?,
            expenses: expenses.ensure_amount("expenses")?,
            posted: Money::ZERO,
            flags: InfoFlags::default(),
        })
    }

    pub fn income(&self) -> Money {
        self.income
    }

    pub fn expenses(&self) -> Money {
        self.expenses
    }

    pub fn budget(&self) -> Money {
        self.income - self.expenses
    }

    pub fn posted(&self) -> Money {
        self.posted
    }

    pub fn set_income(&mut self, income: Money) -> ResultEngine<()> {
        self.flags.ensure_mutable(Self::KIND)?;
        self.income = income.ensure_amount("income")?;
        Ok(())
    }

    pub fn set_expenses(&mut self, expenses: Money) -> ResultEngine<()> {
        self.flags.ensure_mutable(Self::KIND)?;
        self.expenses = expenses.ensure_amount("expenses")?;
        Ok(())
    }
}

impl InfoRecord for BudgetInfo {
    type Values = BudgetInfoValues;
    const KIND: &'static str = "budget info";

    fn year_month(&self) -> YearMonth {
        self.year_month
    }

    /// A missing month has no budget.
    fn populate(year_month: YearMonth, _previous: Option<&Self>) -> Self {
        Self {
            year_month,
            income: Money::ZERO,
            expenses: Money::ZERO,
            posted: Money::ZERO,
            flags: InfoFlags::default(),
        }
    }

    fn calculate(
        &mut self,
        status_date: NaiveDate,
        posting_lines: &PostingLineCollection,
    ) -> ResultEngine<()> {
        let from = self.year_month.first_day();
        let to = self.year_month.last_day().min(status_date);
        self.posted = posting_lines.calculate_posting_value(from, to, None);
        Ok(())
    }

    fn values(&self) -> BudgetInfoValues {
        BudgetInfoValues::new(self.budget(), self.posted)
    }

    fn flags(&self) -> InfoFlags {
        self.flags
    }

    fn flags_mut(&mut self) -> &mut InfoFlags {
        &mut self.flags
    }

    /// Budgets are per month, so the yearly figures are sums.
    fn summarize(records: &[Self], status_date: NaiveDate) -> StatusSummary<BudgetInfoValues> {
        let sum = |matches: fn(YearMonth, NaiveDate) -> bool| {
            records
                .iter()
                .filter(|record| matches(record.year_month, status_date))
                .map(Self::values)
                .fold(BudgetInfoValues::default(), Add::add)
        };

        StatusSummary {
            at_status_date: sum(YearMonth::is_month_of),
            end_of_last_month: sum(YearMonth::is_last_month_of),
            year_to_date: sum(YearMonth::is_year_to_date_of),
            end_of_last_year: sum(YearMonth::is_last_year_of),
        }
    }
}

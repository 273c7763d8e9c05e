use std::ops::Add;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    Money, PostingLineCollection, ResultEngine, YearMonth,
    info::{InfoFlags, InfoRecord},
};

/// Credit line and running balance of an account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditInfoValues {
    pub credit: Money,
    pub balance: Money,
}

impl CreditInfoValues {
    pub fn new(credit: Money, balance: Money) -> Self {
        Self { credit, balance }
    }

    /// What can still be drawn: `credit + balance`.
    pub fn available(&self) -> Money {
        self.credit + self.balance
    }
}

impl Add for CreditInfoValues {
    type Output = CreditInfoValues;

    fn add(self, rhs: Self) -> Self::Output {
        CreditInfoValues {
            credit: self.credit + rhs.credit,
            balance: self.balance + rhs.balance,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CreditInfo {
    year_month: YearMonth,
    credit: Money,
    balance: Money,
    flags: InfoFlags,
}

impl CreditInfo {
    pub fn new(year: i32, month: u32, credit: Money) -> ResultEngine<Self> {
        Ok(Self {
            year_month: YearMonth::new(year, month)?,
            credit: credit.ensure_amount("credit")?,
            balance: Money::ZERO,
            flags: InfoFlags::default(),
        })
    }

    pub fn credit(&self) -> Money {
        self.credit
    }

    pub fn balance(&self) -> Money {
        self.balance
    }

    pub fn set_credit(&mut self, credit: Money) -> ResultEngine<()> {
        self.flags.ensure_mutable(Self::KIND)?;
        self.credit = credit.ensure_amount("credit")?;
        Ok(())
    }
}

impl InfoRecord for CreditInfo {
    type Values = CreditInfoValues;
    const KIND: &'static str = "credit info";

    fn year_month(&self) -> YearMonth {
        self.year_month
    }

    /// A missing month keeps the credit line of the month before it.
    fn populate(year_month: YearMonth, previous: Option<&Self>) -> Self {
        Self {
            year_month,
            credit: previous.map(CreditInfo::credit).unwrap_or_default(),
            balance: Money::ZERO,
            flags: InfoFlags::default(),
        }
    }

    fn calculate(
        &mut self,
        status_date: NaiveDate,
        posting_lines: &PostingLineCollection,
    ) -> ResultEngine<()> {
        let to = self.year_month.last_day().min(status_date);
        self.balance = posting_lines.calculate_posting_value(NaiveDate::MIN, to, None);
        Ok(())
    }

    fn values(&self) -> CreditInfoValues {
        CreditInfoValues::new(self.credit, self.balance)
    }

    fn flags(&self) -> InfoFlags {
        self.flags
    }

    fn flags_mut(&mut self) -> &mut InfoFlags {
        &mut self.flags
    }
}

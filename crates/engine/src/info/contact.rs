use std::ops::Add;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    Money, PostingLineCollection, ResultEngine, YearMonth,
    info::{InfoFlags, InfoRecord},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfoValues {
    pub balance: Money,
}

impl ContactInfoValues {
    pub fn new(balance: Money) -> Self {
        Self { balance }
    }
}

impl Add for ContactInfoValues {
    type Output = ContactInfoValues;

    fn add(self, rhs: Self) -> Self::Output {
        ContactInfoValues::new(self.balance + rhs.balance)
    }
}

/// Running balance of a contact account; contacts have no monthly inputs.
#[derive(Clone, Debug)]
pub struct ContactInfo {
    year_month: YearMonth,
    balance: Money,
    flags: InfoFlags,
}

impl ContactInfo {
    pub fn new(year: i32, month: u32) -> ResultEngine<Self> {
        Ok(Self::populate(YearMonth::new(year, month)?, None))
    }

    pub fn balance(&self) -> Money {
        self.balance
    }
}

impl InfoRecord for ContactInfo {
    type Values = ContactInfoValues;
    const KIND: &'static str = "contact info";

    fn year_month(&self) -> YearMonth {
        self.year_month
    }

    fn populate(year_month: YearMonth, _previous: Option<&Self>) -> Self {
        Self {
            year_month,
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

    fn values(&self) -> ContactInfoValues {
        ContactInfoValues::new(self.balance)
    }

    fn flags(&self) -> InfoFlags {
        self.flags
    }

    fn flags_mut(&mut self) -> &mut InfoFlags {
        &mut self.flags
    }
}

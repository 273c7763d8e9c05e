//! The JSON ledger the host reads.
//!
//! Amounts are decimal strings (`"1250.50"`) and accounts are referenced by
//! their number inside the accounting.
use std::{collections::HashMap, path::Path};

use accounting_engine::{
    Account, AccountGroup, AccountGroupType, Accounting, BalanceBelowZero, BudgetAccount,
    BudgetAccountGroup, BudgetInfo, ContactAccount, ContactInfo, CreditInfo, Money, PostingLine,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize)]
pub struct LedgerFile {
    pub accounting: AccountingEntry,
    #[serde(default)]
    pub account_groups: Vec<AccountGroupEntry>,
    #[serde(default)]
    pub budget_account_groups: Vec<BudgetAccountGroupEntry>,
    #[serde(default)]
    pub accounts: Vec<AccountEntry>,
    #[serde(default)]
    pub budget_accounts: Vec<BudgetAccountEntry>,
    #[serde(default)]
    pub contact_accounts: Vec<ContactAccountEntry>,
    #[serde(default)]
    pub posting_lines: Vec<PostingLineEntry>,
}

#[derive(Debug, Deserialize)]
pub struct AccountingEntry {
    pub number: i32,
    pub name: String,
    #[serde(default)]
    pub balance_below_zero: BalanceBelowZero,
}

#[derive(Debug, Deserialize)]
pub struct AccountGroupEntry {
    pub number: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub account_group_type: AccountGroupType,
}

#[derive(Debug, Deserialize)]
pub struct BudgetAccountGroupEntry {
    pub number: i32,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AccountEntry {
    pub number: String,
    pub name: String,
    pub description: Option<String>,
    pub group: i32,
    #[serde(default)]
    pub credits: Vec<CreditEntry>,
}

#[derive(Debug, Deserialize)]
pub struct CreditEntry {
    pub year: i32,
    pub month: u32,
    pub credit: String,
    /// Protects every credit info of the account once loaded.
    #[serde(default)]
    pub protected: bool,
}

#[derive(Debug, Deserialize)]
pub struct BudgetAccountEntry {
    pub number: String,
    pub name: String,
    pub description: Option<String>,
    pub group: i32,
    #[serde(default)]
    pub budgets: Vec<BudgetEntry>,
}

#[derive(Debug, Deserialize)]
pub struct BudgetEntry {
    pub year: i32,
    pub month: u32,
    #[serde(default)]
    pub income: Option<String>,
    #[serde(default)]
    pub expenses: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContactAccountEntry {
    pub number: String,
    pub name: String,
    pub description: Option<String>,
    /// Months to keep a contact info for even without postings.
    #[serde(default)]
    pub months: Vec<(i32, u32)>,
}

#[derive(Debug, Deserialize)]
pub struct PostingLineEntry {
    pub id: Uuid,
    pub date: NaiveDate,
    pub account: String,
    pub budget_account: Option<String>,
    pub contact_account: Option<String>,
    #[serde(default)]
    pub debit: Option<String>,
    #[serde(default)]
    pub credit: Option<String>,
    #[serde(default)]
    pub sort_order: u32,
    pub details: Option<String>,
}

impl LedgerFile {
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Builds the accounting with every account, info record and posting of
    /// the file.
    pub fn into_accounting(self) -> Result<Accounting> {
        let accounting_number = self.accounting.number;
        let accounting = Accounting::new(
            accounting_number,
            &self.accounting.name,
            self.accounting.balance_below_zero,
        )?;

        let account_groups = self
            .account_groups
            .iter()
            .map(|group| {
                AccountGroup::new(group.number, &group.name, group.account_group_type)
                    .map(|account_group| (group.number, account_group))
            })
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;
        let budget_account_groups = self
            .budget_account_groups
            .iter()
            .map(|group| {
                BudgetAccountGroup::new(group.number, &group.name)
                    .map(|budget_account_group| (group.number, budget_account_group))
            })
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;

        let mut accounts = HashMap::new();
        for entry in self.accounts {
            let group = account_groups
                .get(&entry.group)
                .cloned()
                .ok_or_else(|| unknown("account group", &entry.group.to_string()))?;
            let mut account = Account::new(accounting_number, &entry.number, &entry.name, group)?;
            if let Some(description) = &entry.description {
                account = account.with_description(description);
            }
            let account = accounting.add_account(account)?;
            let protect = entry.credits.iter().any(|credit| credit.protected);
            for credit in entry.credits {
                account
                    .credit_infos()
                    .add(CreditInfo::new(credit.year, credit.month, amount(&credit.credit)?)?)?;
            }
            if protect {
                account.credit_infos().apply_protection();
            }
            accounts.insert(entry.number, account);
        }

        let mut budget_accounts = HashMap::new();
        for entry in self.budget_accounts {
            let group = budget_account_groups
                .get(&entry.group)
                .cloned()
                .ok_or_else(|| unknown("budget account group", &entry.group.to_string()))?;
            let mut budget_account =
                BudgetAccount::new(accounting_number, &entry.number, &entry.name, group)?;
            if let Some(description) = &entry.description {
                budget_account = budget_account.with_description(description);
            }
            let budget_account = accounting.add_budget_account(budget_account)?;
            let infos = entry
                .budgets
                .iter()
                .map(|budget| {
                    Ok(BudgetInfo::new(
                        budget.year,
                        budget.month,
                        optional_amount(budget.income.as_deref())?,
                        optional_amount(budget.expenses.as_deref())?,
                    )?)
                })
                .collect::<Result<Vec<_>>>()?;
            budget_account.budget_infos().add_many(infos)?;
            budget_accounts.insert(entry.number, budget_account);
        }

        let mut contact_accounts = HashMap::new();
        for entry in self.contact_accounts {
            let mut contact_account =
                ContactAccount::new(accounting_number, &entry.number, &entry.name)?;
            if let Some(description) = &entry.description {
                contact_account = contact_account.with_description(description);
            }
            let contact_account = accounting.add_contact_account(contact_account)?;
            let infos = entry
                .months
                .iter()
                .map(|(year, month)| ContactInfo::new(*year, *month))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            contact_account.contact_infos().add_many(infos)?;
            contact_accounts.insert(entry.number, contact_account);
        }

        for entry in self.posting_lines {
            let account = accounts
                .get(&entry.account)
                .ok_or_else(|| unknown("account", &entry.account))?;
            let mut builder = PostingLine::builder(entry.id, entry.date)
                .account(account)
                .debit(optional_amount(entry.debit.as_deref())?)
                .credit(optional_amount(entry.credit.as_deref())?)
                .sort_order(entry.sort_order);
            if let Some(number) = &entry.budget_account {
                let budget_account = budget_accounts
                    .get(number)
                    .ok_or_else(|| unknown("budget account", number))?;
                builder = builder.budget_account(budget_account);
            }
            if let Some(number) = &entry.contact_account {
                let contact_account = contact_accounts
                    .get(number)
                    .ok_or_else(|| unknown("contact account", number))?;
                builder = builder.contact_account(contact_account);
            }
            if let Some(details) = &entry.details {
                builder = builder.details(details);
            }
            accounting.add_posting_line(builder.build()?)?;
        }

        Ok(accounting)
    }
}

fn amount(text: &str) -> Result<Money> {
    Ok(text.parse::<Money>()?)
}

fn optional_amount(text: Option<&str>) -> Result<Money> {
    text.map_or(Ok(Money::ZERO), amount)
}

fn unknown(what: &str, number: &str) -> AppError {
    AppError::Ledger(format!("unknown {what} {number}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEDGER: &str = r#"{
        "accounting": { "number": 3, "name": "Club", "balance_below_zero": "creditors" },
        "account_groups": [{ "number": 1, "name": "Bank", "type": "assets" }],
        "budget_account_groups": [{ "number": 1, "name": "Fees" }],
        "accounts": [{
            "number": "bank", "name": "Bank", "group": 1,
            "credits": [{ "year": 2024, "month": 1, "credit": "200", "protected": true }]
        }],
        "budget_accounts": [{
            "number": "fees", "name": "Fees", "group": 1,
            "budgets": [{ "year": 2024, "month": 1, "income": "120,00" }]
        }],
        "contact_accounts": [{ "number": "anna", "name": "Anna" }],
        "posting_lines": [{
            "id": "6f1c2a52-8d5e-4b59-9a55-2f7f6b0e8d11", "date": "2024-01-09",
            "account": "bank", "budget_account": "fees", "contact_account": "anna",
            "debit": "100.50", "sort_order": 1
        }]
    }"#;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn builds_and_calculates_the_ledger() {
        let file: LedgerFile = serde_json::from_str(LEDGER).unwrap();
        let accounting = file.into_accounting().unwrap();
        accounting.calculate(date(2024, 1, 31)).await.unwrap();

        let bank = accounting.accounts().values_at_status_date();
        assert_eq!(bank.assets, "100.50".parse().unwrap());
        let fees = accounting.budget_accounts().values_for_month_of_status_date();
        assert_eq!(fees.budget, "120".parse().unwrap());
        assert_eq!(fees.available(), "19.50".parse().unwrap());
        assert_eq!(accounting.contact_accounts().find_debtors().len(), 1);
        assert!(accounting.accounts().accounts()[0].credit_infos().is_protected());
    }

    #[test]
    fn unknown_account_is_reported() {
        let ledger = LEDGER.replace(r#""account": "bank""#, r#""account": "cash""#);
        let file: LedgerFile = serde_json::from_str(&ledger).unwrap();

        let err = file.into_accounting().unwrap_err();
        assert_eq!(err.to_string(), "ledger error: unknown account cash");
    }
}

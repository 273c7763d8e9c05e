//! Account group definitions.
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::{
    ResultEngine,
    util::{ensure_positive_number, normalize_required},
};

/// Which side of the balance sheet a group of accounts sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountGroupType {
    Assets,
    Liabilities,
}

/// Groups accounts for reporting, e.g. "Bank accounts" or "Credit cards".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountGroup {
    number: i32,
    name: String,
    account_group_type: AccountGroupType,
}

impl AccountGroup {
    pub fn new(number: i32, name: &str, account_group_type: AccountGroupType) -> ResultEngine<Self> {
        Ok(Self {
            number: ensure_positive_number(number, "account group number")?,
            name: normalize_required(name, "account group name")?,
            account_group_type,
        })
    }

    pub fn number(&self) -> i32 {
        self.number
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn account_group_type(&self) -> AccountGroupType {
        self.account_group_type
    }
}

impl PartialEq for AccountGroup {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number
    }
}

impl Eq for AccountGroup {}

impl Hash for AccountGroup {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.number.hash(state);
    }
}

/// Groups budget accounts, e.g. "Household" or "Salary".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BudgetAccountGroup {
    number: i32,
    name: String,
}

impl BudgetAccountGroup {
    pub fn new(number: i32, name: &str) -> ResultEngine<Self> {
        Ok(Self {
            number: ensure_positive_number(number, "budget account group number")?,
            name: normalize_required(name, "budget account group name")?,
        })
    }

    pub fn number(&self) -> i32 {
        self.number
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for BudgetAccountGroup {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number
    }
}

impl Eq for BudgetAccountGroup {}

impl Hash for BudgetAccountGroup {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.number.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_compare_by_number() {
        let bank = AccountGroup::new(1, "Bank", AccountGroupType::Assets).unwrap();
        let renamed = AccountGroup::new(1, "Banks", AccountGroupType::Assets).unwrap();
        assert_eq!(bank, renamed);
        assert_eq!(bank.name(), "Bank");
    }

    #[test]
    #[should_panic(expected = "InvalidArgument(\"budget account group name must not be empty\")")]
    fn rejects_empty_name() {
        BudgetAccountGroup::new(1, " ").unwrap();
    }
}

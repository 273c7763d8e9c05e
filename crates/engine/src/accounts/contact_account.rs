use std::{
    hash::{Hash, Hasher},
    sync::Arc,
};

use chrono::NaiveDate;

use crate::{
    AccountKey, AccountKind, AccountReference, ContactInfo, ContactInfoValues, InfoCollection,
    PostingLine, PostingLineCollection, ResultEngine,
    accounts::AccountCore,
    info::StatusSummary,
    posting_lines::PostingEvaluator,
    status::Calculation,
};

/// A debtor or creditor.
#[derive(Debug)]
pub struct ContactAccount {
    core: AccountCore<ContactInfo>,
}

impl ContactAccount {
    pub fn new(accounting_number: i32, account_number: &str, name: &str) -> ResultEngine<Self> {
        Ok(Self {
            core: AccountCore::new(
                AccountKind::ContactAccount,
                accounting_number,
                account_number,
                name,
            )?,
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

    pub fn contact_infos(&self) -> &InfoCollection<ContactInfo> {
        &self.core.infos
    }

    pub fn posting_lines(&self) -> &PostingLineCollection {
        &self.core.posting_lines
    }

    pub fn status_date(&self) -> Option<NaiveDate> {
        self.core.guard.status_date()
    }

    pub fn summary(&self) -> StatusSummary<ContactInfoValues> {
        self.core.infos.summary()
    }

    pub fn values_at_status_date(&self) -> ContactInfoValues {
        self.summary().at_status_date
    }

    pub fn values_at_end_of_last_month(&self) -> ContactInfoValues {
        self.summary().end_of_last_month
    }

    pub fn values_at_end_of_last_year(&self) -> ContactInfoValues {
        self.summary().end_of_last_year
    }

    pub fn reference(&self) -> AccountReference {
        AccountReference::new(
            AccountKind::ContactAccount,
            self.core.key.clone(),
            &self.core.name,
            None,
            self.status_date(),
        )
    }

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
        let evaluator = ContactAccountValues {
            posting_lines: &self.core.posting_lines,
        };
        self.core.calculate(status_date, &evaluator).await
    }
}

impl PartialEq for ContactAccount {
    fn eq(&self, other: &Self) -> bool {
        self.core.key == other.core.key
    }
}

impl Eq for ContactAccount {}

impl Hash for ContactAccount {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.core.key.hash(state);
    }
}

struct ContactAccountValues<'a> {
    posting_lines: &'a PostingLineCollection,
}

impl PostingEvaluator for ContactAccountValues<'_> {
    fn needs_calculation(&self, line: &PostingLine, status_date: NaiveDate) -> bool {
        line.needs_calculation(AccountKind::ContactAccount, status_date)
    }

    fn calculate(&self, line: &PostingLine, status_date: NaiveDate) -> ResultEngine<()> {
        line.refresh_contact_account_values(status_date, || {
            Ok(ContactInfoValues::new(self.posting_lines.calculate_posting_value(
                NaiveDate::MIN,
                line.posting_date(),
                Some(line.sort_order()),
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::{
        Account, AccountGroup, AccountGroupType, BalanceBelowZero, ContactAccountCollection,
        ContactAccountCollectionValues, Money,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bank() -> Account {
        let group = AccountGroup::new(1, "Bank", AccountGroupType::Assets).unwrap();
        Account::new(1, "bank", "Bank", group).unwrap()
    }

    fn post(
        bank: &Account,
        contact: &ContactAccount,
        posting_date: NaiveDate,
        debit: i64,
        credit: i64,
        sort_order: u32,
    ) {
        let line = PostingLine::builder(Uuid::new_v4(), posting_date)
            .account(bank)
            .contact_account(contact)
            .debit(Money::new(debit))
            .credit(Money::new(credit))
            .sort_order(sort_order)
            .build()
            .unwrap();
        contact.posting_lines().add(Arc::new(line)).unwrap();
    }

    #[tokio::test]
    async fn calculates_running_balance_and_snapshots() {
        let bank = bank();
        let anna = ContactAccount::new(1, "anna", "Anna").unwrap();
        post(&bank, &anna, date(2023, 12, 10), 0, 2_000, 1);
        post(&bank, &anna, date(2024, 1, 15), 500, 0, 2);
        post(&bank, &anna, date(2024, 2, 3), 0, 300, 3);

        anna.calculate(date(2024, 2, 10)).await.unwrap();

        assert_eq!(anna.status_date(), Some(date(2024, 2, 10)));
        assert_eq!(anna.values_at_status_date().balance, Money::new(-1_800));
        assert_eq!(anna.values_at_end_of_last_month().balance, Money::new(-1_500));
        assert_eq!(anna.values_at_end_of_last_year().balance, Money::new(-2_000));

        let lines = anna.posting_lines().ordered();
        let snapshots: Vec<_> = lines
            .iter()
            .map(|line| line.contact_account_values_at_posting_date().unwrap().balance)
            .collect();
        assert_eq!(
            snapshots,
            vec![Money::new(-1_800), Money::new(-1_500), Money::new(-2_000)]
        );
        for line in lines {
            assert_eq!(
                line.contact_account().unwrap().status_date(),
                Some(date(2024, 2, 10))
            );
        }
    }

    async fn contacts(balance_below_zero: BalanceBelowZero) -> ContactAccountCollection {
        let bank = bank();
        let collection = ContactAccountCollection::new(balance_below_zero);
        let anna = ContactAccount::new(1, "anna", "Anna").unwrap();
        let bob = ContactAccount::new(1, "bob", "Bob").unwrap();
        let carl = ContactAccount::new(1, "carl", "Carl").unwrap();
        post(&bank, &anna, date(2024, 1, 5), 0, 1_000, 1);
        post(&bank, &bob, date(2024, 1, 6), 400, 0, 2);
        post(&bank, &carl, date(2024, 1, 7), 250, 250, 3);
        for contact in [anna, bob, carl] {
            collection.add(Arc::new(contact)).unwrap();
        }
        collection.calculate(date(2024, 1, 31)).await.unwrap();
        collection
    }

    fn names(contacts: Vec<Arc<ContactAccount>>) -> Vec<String> {
        let mut names: Vec<_> = contacts.iter().map(|c| c.name().to_string()).collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn negative_balances_are_debtors_by_default() {
        let collection = contacts(BalanceBelowZero::Debtors).await;

        assert_eq!(names(collection.find_debtors()), vec!["Anna"]);
        assert_eq!(names(collection.find_creditors()), vec!["Bob"]);
        assert_eq!(
            collection.values_at_status_date(),
            ContactAccountCollectionValues {
                debtors: Money::new(-1_000),
                creditors: Money::new(400),
            }
        );
    }

    #[tokio::test]
    async fn balance_below_zero_can_mark_creditors() {
        let collection = contacts(BalanceBelowZero::Creditors).await;

        assert_eq!(names(collection.find_debtors()), vec!["Bob"]);
        assert_eq!(names(collection.find_creditors()), vec!["Anna"]);
        assert_eq!(
            collection.values_at_status_date(),
            ContactAccountCollectionValues {
                debtors: Money::new(400),
                creditors: Money::new(-1_000),
            }
        );
    }
}

use std::sync::Arc;

use accounting_engine::{
    Account, AccountGroup, AccountGroupType, Accounting, BalanceBelowZero, BudgetAccount,
    BudgetAccountGroup, BudgetInfo, CalculationView, ContactAccount, CreditInfo, EngineError,
    Money, PostingLine, YearMonth,
};
use chrono::NaiveDate;
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn money(text: &str) -> Money {
    text.parse().unwrap()
}

struct Ledger {
    accounting: Accounting,
    bank: Arc<Account>,
    visa: Arc<Account>,
    salary: Arc<BudgetAccount>,
    food: Arc<BudgetAccount>,
    landlord: Arc<ContactAccount>,
}

fn ledger() -> Ledger {
    let accounting = Accounting::new(1, "Household", BalanceBelowZero::Debtors).unwrap();
    let bank_group = AccountGroup::new(1, "Bank", AccountGroupType::Assets).unwrap();
    let card_group = AccountGroup::new(2, "Credit cards", AccountGroupType::Liabilities).unwrap();
    let income = BudgetAccountGroup::new(1, "Income").unwrap();
    let household = BudgetAccountGroup::new(2, "Household").unwrap();

    let bank = accounting
        .add_account(Account::new(1, "bank", "Bank", bank_group).unwrap())
        .unwrap();
    bank.credit_infos()
        .add(CreditInfo::new(2024, 1, money("1000")).unwrap())
        .unwrap();
    let visa = accounting
        .add_account(Account::new(1, "visa", "Visa", card_group).unwrap())
        .unwrap();

    let salary = accounting
        .add_budget_account(BudgetAccount::new(1, "salary", "Salary", income).unwrap())
        .unwrap();
    let food = accounting
        .add_budget_account(BudgetAccount::new(1, "food", "Food", household).unwrap())
        .unwrap();
    for month in 1..=3 {
        salary
            .budget_infos()
            .add(BudgetInfo::new(2024, month, money("3000"), Money::ZERO).unwrap())
            .unwrap();
        food.budget_infos()
            .add(BudgetInfo::new(2024, month, Money::ZERO, money("800")).unwrap())
            .unwrap();
    }
    let landlord = accounting
        .add_contact_account(ContactAccount::new(1, "landlord", "Landlord").unwrap())
        .unwrap();

    Ledger {
        accounting,
        bank,
        visa,
        salary,
        food,
        landlord,
    }
}

fn post(
    ledger: &Ledger,
    posting_date: NaiveDate,
    sort_order: u32,
    account: &Account,
    debit: &str,
    credit: &str,
) -> PostingLine {
    PostingLine::builder(Uuid::new_v4(), posting_date)
        .account(account)
        .debit(money(debit))
        .credit(money(credit))
        .sort_order(sort_order)
        .details(&format!("posting {sort_order} of {}", ledger.accounting.name()))
        .build()
        .unwrap()
}

fn book_quarter(ledger: &Ledger) {
    let accounting = &ledger.accounting;
    let mut sort_order = 0;
    let mut next = || {
        sort_order += 1;
        sort_order
    };
    for month in 1..=3 {
        let salary = PostingLine::builder(Uuid::new_v4(), date(2024, month, 1))
            .account(&ledger.bank)
            .budget_account(&ledger.salary)
            .debit(money("3000"))
            .sort_order(next())
            .build()
            .unwrap();
        accounting.add_posting_line(salary).unwrap();

        let rent = PostingLine::builder(Uuid::new_v4(), date(2024, month, 3))
            .account(&ledger.bank)
            .contact_account(&ledger.landlord)
            .credit(money("1500"))
            .sort_order(next())
            .build()
            .unwrap();
        accounting.add_posting_line(rent).unwrap();

        for (day, amount) in [(10, "250.50"), (17, "310.25"), (24, "199.99")] {
            let groceries = PostingLine::builder(Uuid::new_v4(), date(2024, month, day))
                .account(&ledger.visa)
                .budget_account(&ledger.food)
                .credit(money(amount))
                .sort_order(next())
                .build()
                .unwrap();
            accounting.add_posting_line(groceries).unwrap();
        }
    }
    let refund = post(ledger, date(2024, 2, 17), next(), &ledger.visa, "10.25", "0");
    accounting.add_posting_line(refund).unwrap();
}

#[tokio::test]
async fn calculates_accounting_as_of_status_date() {
    let ledger = ledger();
    book_quarter(&ledger);

    ledger.accounting.calculate(date(2024, 3, 15)).await.unwrap();

    let accounts = ledger.accounting.accounts();
    assert_eq!(accounts.values_at_status_date().assets, money("4500"));
    assert_eq!(accounts.values_at_status_date().liabilities, money("-1761.73"));
    assert_eq!(accounts.values_at_end_of_last_month().assets, money("3000"));
    assert_eq!(accounts.values_at_end_of_last_year().assets, Money::ZERO);

    let budget = ledger.accounting.budget_accounts();
    assert_eq!(budget.values_for_month_of_status_date().budget, money("2200"));
    assert_eq!(budget.values_for_month_of_status_date().posted, money("2749.50"));
    assert_eq!(budget.values_for_year_to_date_of_status_date().budget, money("6600"));
    assert_eq!(ledger.food.values_for_last_month_of_status_date().posted, money("-760.74"));
    assert_eq!(ledger.salary.values_for_year_to_date_of_status_date().posted, money("9000"));

    let contacts = ledger.accounting.contact_accounts();
    assert_eq!(contacts.values_at_status_date().debtors, money("-4500"));
    assert_eq!(contacts.find_debtors().len(), 1);
    assert!(contacts.find_creditors().is_empty());

    let bank = ledger.bank.values_at_status_date();
    assert_eq!(bank.credit, money("1000"));
    assert_eq!(bank.available(), money("5500"));
}

#[tokio::test]
async fn recalculating_the_same_date_changes_nothing() {
    let ledger = ledger();
    book_quarter(&ledger);
    let status_date = date(2024, 2, 29);

    ledger.accounting.calculate(status_date).await.unwrap();
    let first = (
        ledger.accounting.accounts().values_at_status_date(),
        ledger.accounting.budget_accounts().values_for_year_to_date_of_status_date(),
        ledger.visa.posting_lines().calculate_posting_value(date(2024, 1, 5), status_date, None),
    );
    ledger.accounting.calculate(status_date).await.unwrap();
    let second = (
        ledger.accounting.accounts().values_at_status_date(),
        ledger.accounting.budget_accounts().values_for_year_to_date_of_status_date(),
        ledger.visa.posting_lines().calculate_posting_value(date(2024, 1, 5), status_date, None),
    );

    assert_eq!(first, second);
    assert_eq!(ledger.accounting.status_date(), Some(status_date));
}

#[tokio::test]
async fn concurrent_calculations_converge() {
    let ledger = ledger();
    book_quarter(&ledger);

    let (first, second) = tokio::join!(
        ledger.accounting.calculate(date(2024, 3, 31)),
        ledger.accounting.calculate(date(2024, 3, 31))
    );
    first.unwrap();
    second.unwrap();

    for line in ledger.accounting.posting_lines().ordered() {
        assert_eq!(line.account().status_date(), Some(date(2024, 3, 31)));
        assert_eq!(
            line.snapshot_status_date(accounting_engine::AccountKind::Account),
            Some(date(2024, 3, 31))
        );
    }
}

#[test]
fn posting_ranges_add_up_across_months() {
    let ledger = ledger();
    book_quarter(&ledger);
    let lines = ledger.accounting.posting_lines();
    assert_eq!(lines.len(), 16);

    let start = date(2024, 1, 1);
    let end = date(2024, 3, 31);
    let whole = lines.calculate_posting_value(start, end, None);
    let mut split = start;
    while split < end {
        let after = split.succ_opt().unwrap();
        assert_eq!(
            whole,
            lines.calculate_posting_value(start, split, None)
                + lines.calculate_posting_value(after, end, None)
        );
        split = after;
    }
}

#[test]
fn full_month_sum_matches_every_posting_in_the_month() {
    let ledger = ledger();
    book_quarter(&ledger);
    let lines = ledger.visa.posting_lines();

    for month in 1..=3 {
        let year_month = YearMonth::new(2024, month).unwrap();
        let expected: Money = lines
            .between(year_month.first_day(), year_month.last_day())
            .iter()
            .map(|line| line.posting_value())
            .sum();
        assert_eq!(
            lines.calculate_posting_value(year_month.first_day(), year_month.last_day(), None),
            expected
        );
    }
}

#[test]
fn duplicate_posting_leaves_sums_unchanged() {
    let ledger = ledger();
    book_quarter(&ledger);
    let lines = ledger.bank.posting_lines();
    let before = (
        lines.len(),
        lines.calculate_posting_value(NaiveDate::MIN, date(2024, 12, 31), None),
    );
    let existing = lines.top(1)[0].identifier();

    let duplicate = PostingLine::builder(existing, date(2024, 3, 30))
        .account(&ledger.bank)
        .debit(money("1"))
        .build()
        .unwrap();
    let err = ledger.accounting.add_posting_line(duplicate).unwrap_err();

    assert_eq!(err, EngineError::ExistingKey(format!("posting line {existing}")));
    assert_eq!(
        before,
        (
            lines.len(),
            lines.calculate_posting_value(NaiveDate::MIN, date(2024, 12, 31), None)
        )
    );
}

#[tokio::test]
async fn groups_report_their_own_members() {
    let ledger = ledger();
    book_quarter(&ledger);
    ledger.accounting.calculate(date(2024, 1, 31)).await.unwrap();

    let groups = ledger.accounting.accounts().group_by_account_group().await.unwrap();
    assert_eq!(groups.len(), 2);
    assert!(groups.iter().all(|group| group.view() == CalculationView::ComputedSnapshot));
    assert_eq!(groups[0].values_at_status_date().assets, money("1500"));
    assert_eq!(groups[1].values_at_status_date().liabilities, money("-760.74"));

    let budget_groups = ledger
        .accounting
        .budget_accounts()
        .group_by_budget_account_group()
        .await
        .unwrap();
    assert_eq!(budget_groups[0].budget_account_group().name(), "Income");
    assert_eq!(budget_groups[1].values_for_month_of_status_date().budget, money("-800"));
}

#[test]
fn summaries_serialize_as_cents() {
    let ledger = ledger();
    let json = serde_json::to_value(ledger.bank.values_at_status_date()).unwrap();
    assert_eq!(json, serde_json::json!({ "credit": 0, "balance": 0 }));
}

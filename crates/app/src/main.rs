use accounting_engine::{Accounting, PostingWarningCalculator};
use chrono::Local;

use crate::{error::Result, ledger_file::LedgerFile, settings::Settings};

mod error;
mod ledger_file;
mod settings;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "intranet={level},accounting_engine={level}",
            level = settings.app.level
        ))
        .init();

    let status_date = settings
        .calculation
        .status_date
        .unwrap_or_else(|| Local::now().date_naive());
    tracing::info!(ledger = %settings.ledger.path, %status_date, "loading ledger");

    let accounting = LedgerFile::read(&settings.ledger.path)?.into_accounting()?;
    accounting.calculate(status_date).await?;
    report(&accounting).await?;

    let warnings = PostingWarningCalculator::new()
        .calculate_collection(&accounting.posting_lines())
        .await;
    println!("\nwarnings: {}", warnings.len());
    for warning in warnings.top(settings.calculation.top_warnings) {
        let line = warning.posting_line();
        println!(
            "  {} #{:<4} {:<20} {} ({})",
            line.posting_date(),
            line.sort_order(),
            warning.account().name(),
            warning.reason(),
            warning.amount()
        );
    }

    Ok(())
}

async fn report(accounting: &Accounting) -> Result<()> {
    println!(
        "{} {} as of {}",
        accounting.number(),
        accounting.name(),
        accounting
            .status_date()
            .map(|date| date.to_string())
            .unwrap_or_default()
    );

    let accounts = accounting.accounts();
    let now = accounts.values_at_status_date();
    let last_month = accounts.values_at_end_of_last_month();
    let last_year = accounts.values_at_end_of_last_year();
    println!("\naccounts         status date  last month   last year");
    println!("  assets       {:>12} {:>12} {:>12}", now.assets, last_month.assets, last_year.assets);
    println!(
        "  liabilities  {:>12} {:>12} {:>12}",
        now.liabilities, last_month.liabilities, last_year.liabilities
    );
    for group in accounts.group_by_account_group().await? {
        let values = group.values_at_status_date();
        println!(
            "  {:<20} {:>12} {:>12}",
            group.account_group().name(),
            values.assets,
            values.liabilities
        );
    }

    let budget_accounts = accounting.budget_accounts();
    let month = budget_accounts.values_for_month_of_status_date();
    let year_to_date = budget_accounts.values_for_year_to_date_of_status_date();
    println!("\nbudget           budget       posted       available");
    println!(
        "  month        {:>12} {:>12} {:>12}",
        month.budget,
        month.posted,
        month.available()
    );
    println!(
        "  year to date {:>12} {:>12} {:>12}",
        year_to_date.budget,
        year_to_date.posted,
        year_to_date.available()
    );
    for group in budget_accounts.group_by_budget_account_group().await? {
        let values = group.values_for_month_of_status_date();
        println!(
            "  {:<20} {:>12} {:>12}",
            group.budget_account_group().name(),
            values.budget,
            values.posted
        );
    }

    let contact_accounts = accounting.contact_accounts();
    let contacts = contact_accounts.values_at_status_date();
    println!("\ncontacts");
    println!("  debtors      {:>12}", contacts.debtors);
    println!("  creditors    {:>12}", contacts.creditors);
    for contact in contact_accounts.find_debtors() {
        println!("  debtor   {:<20} {:>12}", contact.name(), contact.values_at_status_date().balance);
    }
    for contact in contact_accounts.find_creditors() {
        println!("  creditor {:<20} {:>12}", contact.name(), contact.values_at_status_date().balance);
    }

    Ok(())
}

//! The posting collection and its range-sum caches.
//!
//! [`PostingLineCollection::calculate_posting_value`] is the aggregation
//! primitive every balance in the engine is derived from. It answers range
//! queries from three caches that are built on first use and dropped on every
//! insert: postings by year, postings by month and the full sum of every
//! month. Exact `(from, to)` answers without a tie-break are memoized as well.
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, RwLock},
};

use chrono::{Datelike, NaiveDate};
use futures::future::try_join_all;
use uuid::Uuid;

use crate::{
    AccountKey, AccountKind, AccountReference, EngineError, Money, PostingLine, ResultEngine, YearMonth,
    cache::CacheCell,
    status::StatusGuard,
    util::{lock, read_lock, write_lock},
};

/// Calculates the snapshot one account keeps on its postings.
///
/// Each account kind brings its own evaluator to
/// [`PostingLineCollection::calculate`]; the collection decides which
/// postings are visited and in which order.
pub trait PostingEvaluator: Sync {
    fn needs_calculation(&self, line: &PostingLine, status_date: NaiveDate) -> bool;

    fn calculate(&self, line: &PostingLine, status_date: NaiveDate) -> ResultEngine<()>;
}

type Lines = Vec<Arc<PostingLine>>;

#[derive(Debug, Default)]
pub struct PostingLineCollection {
    lines: RwLock<HashMap<Uuid, Arc<PostingLine>>>,
    by_year: CacheCell<BTreeMap<i32, Lines>>,
    by_month: CacheCell<BTreeMap<YearMonth, Lines>>,
    month_sums: CacheCell<BTreeMap<YearMonth, Money>>,
    interval_sums: Mutex<HashMap<(NaiveDate, NaiveDate), Money>>,
    guard: StatusGuard,
}

impl PostingLineCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        read_lock(&self.lines).len()
    }

    pub fn is_empty(&self) -> bool {
        read_lock(&self.lines).is_empty()
    }

    pub fn contains(&self, identifier: Uuid) -> bool {
        read_lock(&self.lines).contains_key(&identifier)
    }

    pub fn get(&self, identifier: Uuid) -> Option<Arc<PostingLine>> {
        read_lock(&self.lines).get(&identifier).cloned()
    }

    pub fn status_date(&self) -> Option<NaiveDate> {
        self.guard.status_date()
    }

    pub fn add(&self, line: Arc<PostingLine>) -> ResultEngine<()> {
        self.add_many([line])
    }

    /// Adds every posting or, when one of them is a duplicate, none.
    pub fn add_many(&self, lines: impl IntoIterator<Item = Arc<PostingLine>>) -> ResultEngine<()> {
        let mut current = write_lock(&self.lines);
        let mut incoming: HashMap<Uuid, Arc<PostingLine>> = HashMap::new();
        for line in lines {
            let identifier = line.identifier();
            if current.contains_key(&identifier) || incoming.contains_key(&identifier) {
                return Err(EngineError::ExistingKey(format!("posting line {identifier}")));
            }
            incoming.insert(identifier, line);
        }
        if incoming.is_empty() {
            return Ok(());
        }

        current.extend(incoming);
        drop(current);
        self.invalidate();
        Ok(())
    }

    /// Sum of `debit - credit` of the postings dated within `from..=to`.
    ///
    /// With a `sort_order`, postings dated `to` only count up to and including
    /// that sort order, which gives a posting the value "up to and including
    /// itself".
    pub fn calculate_posting_value(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        sort_order: Option<u32>,
    ) -> Money {
        if from > to {
            return Money::ZERO;
        }
        if sort_order.is_none()
            && let Some(value) = self.memoized(from, to)
        {
            return value;
        }

        let from_month = YearMonth::from_date(from);
        let to_month = YearMonth::from_date(to);
        let whole_last_month = sort_order.is_none() && to_month.ends_on(to);

        if from_month == to_month && from_month.starts_on(from) && whole_last_month {
            return self.month_sum(from_month);
        }

        let value = if from_month == to_month {
            self.filtered_sum(from, to, sort_order)
        } else {
            let first = if from_month.starts_on(from) {
                self.month_sum(from_month)
            } else {
                self.filtered_sum(from, from_month.last_day(), None)
            };
            let middle = match (from_month.next(), to_month.prev()) {
                (Some(start), Some(end)) if start <= end => {
                    self.month_sums().range(start..=end).map(|(_, sum)| *sum).sum()
                }
                _ => Money::ZERO,
            };
            let last = if whole_last_month {
                self.month_sum(to_month)
            } else {
                self.filtered_sum(to_month.first_day(), to, sort_order)
            };
            first + middle + last
        };

        if sort_order.is_none() {
            lock(&self.interval_sums).insert((from, to), value);
        }
        value
    }

    /// Postings dated within `from..=to`, latest first.
    pub fn between(&self, from: NaiveDate, to: NaiveDate) -> Lines {
        if from > to {
            return Vec::new();
        }
        let by_month = self.by_month();
        let mut lines: Lines = by_month
            .range(YearMonth::from_date(from)..=YearMonth::from_date(to))
            .flat_map(|(_, lines)| lines.iter())
            .filter(|line| (from..=to).contains(&line.posting_date()))
            .cloned()
            .collect();
        sort_latest_first(&mut lines);
        lines
    }

    /// Every posting, latest date first and within a date by descending
    /// sort order.
    pub fn ordered(&self) -> Lines {
        let mut lines: Lines = read_lock(&self.lines).values().cloned().collect();
        sort_latest_first(&mut lines);
        lines
    }

    pub fn top(&self, count: usize) -> Lines {
        let mut lines = self.ordered();
        lines.truncate(count);
        lines
    }

    /// Runs `evaluator` over every posting that needs it for `status_date`.
    ///
    /// Postings are grouped by year. Groups run concurrently, postings within
    /// a group one after the other in date order.
    pub async fn calculate<E: PostingEvaluator>(
        &self,
        status_date: NaiveDate,
        evaluator: &E,
    ) -> ResultEngine<()> {
        self.guard
            .run("posting lines", status_date, move || async move {
                let by_year = self.by_year();
                let groups = by_year.iter().map(|(year, lines)| async move {
                    let mut calculated = 0usize;
                    for line in lines {
                        if evaluator.needs_calculation(line, status_date) {
                            evaluator.calculate(line, status_date)?;
                            calculated += 1;
                        }
                    }
                    tracing::trace!(year, calculated, "calculated posting lines");
                    Ok::<_, EngineError>(())
                });
                try_join_all(groups).await?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Rebinds the postings booking on the account `reference` identifies.
    ///
    /// Returns the number of postings rebound.
    pub async fn apply_calculation(&self, reference: &Arc<AccountReference>) -> usize {
        self.apply_references(std::slice::from_ref(reference)).await
    }

    /// Rebinds every posting to those of `references` it books on.
    ///
    /// References are keyed by account, so each posting is resolved with one
    /// lookup per account it books on. Returns the number of rebound accounts.
    pub async fn apply_references(&self, references: &[Arc<AccountReference>]) -> usize {
        let by_account: HashMap<(AccountKind, &AccountKey), &Arc<AccountReference>> = references
            .iter()
            .map(|reference| ((reference.kind(), reference.key()), reference))
            .collect();
        let by_account = &by_account;
        let by_year = self.by_year();
        let groups = by_year.values().map(|lines| async move {
            lines
                .iter()
                .map(|line| line.rebind(|kind, key| by_account.get(&(kind, key)).copied()))
                .sum::<usize>()
        });
        futures::future::join_all(groups).await.into_iter().sum()
    }

    fn invalidate(&self) {
        self.by_year.invalidate();
        self.by_month.invalidate();
        self.month_sums.invalidate();
        lock(&self.interval_sums).clear();
    }

    fn memoized(&self, from: NaiveDate, to: NaiveDate) -> Option<Money> {
        lock(&self.interval_sums).get(&(from, to)).copied()
    }

    fn by_year(&self) -> Arc<BTreeMap<i32, Lines>> {
        self.by_year.get_or_build(|| {
            tracing::trace!("building posting year index");
            let mut index: BTreeMap<i32, Lines> = BTreeMap::new();
            for line in read_lock(&self.lines).values() {
                index.entry(line.posting_date().year()).or_default().push(Arc::clone(line));
            }
            index.values_mut().for_each(sort_earliest_first);
            index
        })
    }

    fn by_month(&self) -> Arc<BTreeMap<YearMonth, Lines>> {
        self.by_month.get_or_build(|| {
            tracing::trace!("building posting month index");
            let mut index: BTreeMap<YearMonth, Lines> = BTreeMap::new();
            for line in read_lock(&self.lines).values() {
                index
                    .entry(YearMonth::from_date(line.posting_date()))
                    .or_default()
                    .push(Arc::clone(line));
            }
            index.values_mut().for_each(sort_earliest_first);
            index
        })
    }

    fn month_sums(&self) -> Arc<BTreeMap<YearMonth, Money>> {
        self.month_sums.get_or_build(|| {
            tracing::trace!("building posting month sums");
            self.by_month()
                .iter()
                .map(|(month, lines)| (*month, lines.iter().map(|line| line.posting_value()).sum()))
                .collect()
        })
    }

    fn month_sum(&self, month: YearMonth) -> Money {
        self.month_sums().get(&month).copied().unwrap_or_default()
    }

    /// Sum over `from..=to`, both within one month.
    fn filtered_sum(&self, from: NaiveDate, to: NaiveDate, sort_order: Option<u32>) -> Money {
        let by_month = self.by_month();
        let Some(lines) = by_month.get(&YearMonth::from_date(from)) else {
            return Money::ZERO;
        };
        lines
            .iter()
            .filter(|line| (from..=to).contains(&line.posting_date()))
            .filter(|line| match sort_order {
                Some(sort_order) if line.posting_date() == to => line.sort_order() <= sort_order,
                _ => true,
            })
            .map(|line| line.posting_value())
            .sum()
    }
}

impl FromIterator<Arc<PostingLine>> for PostingLineCollection {
    /// Collects postings, keeping the first of duplicate identifiers.
    fn from_iter<I: IntoIterator<Item = Arc<PostingLine>>>(iter: I) -> Self {
        let collection = PostingLineCollection::new();
        {
            let mut lines = write_lock(&collection.lines);
            for line in iter {
                lines.entry(line.identifier()).or_insert(line);
            }
        }
        collection
    }
}

fn sort_earliest_first(lines: &mut Lines) {
    lines.sort_by(|a, b| {
        (a.posting_date(), a.sort_order(), a.identifier()).cmp(&(
            b.posting_date(),
            b.sort_order(),
            b.identifier(),
        ))
    });
}

fn sort_latest_first(lines: &mut Lines) {
    sort_earliest_first(lines);
    lines.reverse();
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{Account, AccountGroup, AccountGroupType, BudgetAccount, BudgetAccountGroup};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn account() -> Account {
        let group = AccountGroup::new(1, "Bank", AccountGroupType::Assets).unwrap();
        Account::new(1, "BANK", "Bank", group).unwrap()
    }

    fn line(account: &Account, posting_date: NaiveDate, value: i64, sort_order: u32) -> Arc<PostingLine> {
        let builder = PostingLine::builder(Uuid::new_v4(), posting_date)
            .account(account)
            .sort_order(sort_order);
        let builder = if value >= 0 {
            builder.debit(Money::new(value))
        } else {
            builder.credit(Money::new(-value))
        };
        Arc::new(builder.build().unwrap())
    }

    fn sample() -> PostingLineCollection {
        let account = account();
        let collection = PostingLineCollection::new();
        collection
            .add_many([
                line(&account, date(2023, 12, 31), 1_000, 1),
                line(&account, date(2024, 1, 1), 200, 2),
                line(&account, date(2024, 1, 15), -50, 3),
                line(&account, date(2024, 1, 15), -25, 4),
                line(&account, date(2024, 1, 31), 10, 5),
                line(&account, date(2024, 2, 10), 300, 6),
                line(&account, date(2024, 3, 1), -400, 7),
                line(&account, date(2024, 3, 20), 5, 8),
            ])
            .unwrap();
        collection
    }

    fn brute_force(collection: &PostingLineCollection, from: NaiveDate, to: NaiveDate) -> Money {
        collection
            .ordered()
            .iter()
            .filter(|line| (from..=to).contains(&line.posting_date()))
            .map(|line| line.posting_value())
            .sum()
    }

    #[test]
    fn empty_range_is_zero() {
        let collection = sample();
        assert_eq!(
            collection.calculate_posting_value(date(2024, 2, 1), date(2024, 1, 1), None),
            Money::ZERO
        );
    }

    #[test]
    fn full_month_matches_brute_force() {
        let collection = sample();
        for month in 1..=3 {
            let first = date(2024, month, 1);
            let last = YearMonth::from_date(first).last_day();
            assert_eq!(
                collection.calculate_posting_value(first, last, None),
                brute_force(&collection, first, last)
            );
        }
    }

    #[test]
    fn ranges_add_up() {
        let collection = sample();
        let a = date(2023, 12, 20);
        let c = date(2024, 3, 10);
        let mut b = a;
        while b < c {
            let whole = collection.calculate_posting_value(a, c, None);
            let left = collection.calculate_posting_value(a, b, None);
            let right = collection.calculate_posting_value(b.succ_opt().unwrap(), c, None);
            assert_eq!(whole, left + right, "split at {b}");
            assert_eq!(whole, brute_force(&collection, a, c));
            b = b.succ_opt().unwrap();
        }
    }

    #[test]
    fn sums_from_the_beginning_of_time() {
        let collection = sample();
        assert_eq!(
            collection.calculate_posting_value(NaiveDate::MIN, date(2024, 2, 29), None),
            Money::new(1_435)
        );
    }

    #[test]
    fn sort_order_breaks_ties_on_the_last_day() {
        let collection = sample();
        let to = date(2024, 1, 15);
        assert_eq!(
            collection.calculate_posting_value(NaiveDate::MIN, to, Some(3)),
            Money::new(1_150)
        );
        assert_eq!(
            collection.calculate_posting_value(NaiveDate::MIN, to, Some(4)),
            Money::new(1_125)
        );
        assert_eq!(
            collection.calculate_posting_value(NaiveDate::MIN, date(2024, 1, 31), Some(5)),
            collection.calculate_posting_value(NaiveDate::MIN, date(2024, 1, 31), None)
        );
    }

    #[test]
    fn duplicate_leaves_collection_unchanged() {
        let collection = sample();
        let before = collection.calculate_posting_value(NaiveDate::MIN, date(2024, 12, 31), None);
        let duplicate = collection.ordered()[0].clone();
        let fresh = line(&account(), date(2024, 3, 2), 99, 9);

        let err = collection.add_many([fresh, duplicate.clone()]).unwrap_err();

        assert_eq!(
            err,
            EngineError::ExistingKey(format!("posting line {}", duplicate.identifier()))
        );
        assert_eq!(collection.len(), 8);
        assert!(collection.month_sums.is_fresh());
        assert_eq!(
            collection.calculate_posting_value(NaiveDate::MIN, date(2024, 12, 31), None),
            before
        );
    }

    #[test]
    fn add_drops_caches() {
        let collection = sample();
        let to = date(2024, 3, 31);
        assert_eq!(collection.calculate_posting_value(NaiveDate::MIN, to, None), Money::new(1_040));

        collection.add(line(&account(), date(2024, 3, 31), 60, 10)).unwrap();

        assert!(!collection.by_month.is_fresh());
        assert_eq!(collection.calculate_posting_value(NaiveDate::MIN, to, None), Money::new(1_100));
    }

    #[test]
    fn read_views_are_latest_first() {
        let collection = sample();

        let top = collection.top(3);
        let dates: Vec<_> = top.iter().map(|line| (line.posting_date(), line.sort_order())).collect();
        assert_eq!(
            dates,
            vec![(date(2024, 3, 20), 8), (date(2024, 3, 1), 7), (date(2024, 2, 10), 6)]
        );

        let january = collection.between(date(2024, 1, 1), date(2024, 1, 15));
        let orders: Vec<_> = january.iter().map(|line| line.sort_order()).collect();
        assert_eq!(orders, vec![4, 3, 2]);
    }

    struct CountingEvaluator {
        calls: AtomicUsize,
    }

    impl PostingEvaluator for CountingEvaluator {
        fn needs_calculation(&self, _line: &PostingLine, _status_date: NaiveDate) -> bool {
            true
        }

        fn calculate(&self, _line: &PostingLine, _status_date: NaiveDate) -> ResultEngine<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn calculates_each_posting_once_per_status_date() {
        let collection = sample();
        let evaluator = CountingEvaluator {
            calls: AtomicUsize::new(0),
        };
        let status_date = date(2024, 3, 31);

        let (first, second) = tokio::join!(
            collection.calculate(status_date, &evaluator),
            collection.calculate(status_date, &evaluator)
        );
        first.unwrap();
        second.unwrap();
        collection.calculate(status_date, &evaluator).await.unwrap();

        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 8);
        assert_eq!(collection.status_date(), Some(status_date));
    }

    #[tokio::test]
    async fn apply_calculation_rebinds_by_key() {
        let account = account();
        let collection = PostingLineCollection::new();
        collection.add(line(&account, date(2024, 1, 2), 100, 1)).unwrap();
        collection.add(line(&account, date(2025, 1, 2), 100, 1)).unwrap();

        account.calculate(date(2025, 1, 31)).await.unwrap();
        let applied = collection.apply_calculation(&Arc::new(account.reference())).await;

        assert_eq!(applied, 2);
        for line in collection.ordered() {
            assert_eq!(line.account().status_date(), Some(date(2025, 1, 31)));
        }
    }

    #[tokio::test]
    async fn apply_references_rebinds_each_booked_account_once() {
        let bank = account();
        let household = BudgetAccountGroup::new(1, "Household").unwrap();
        let food = BudgetAccount::new(1, "food", "Food", household).unwrap();
        let cash = Account::new(
            1,
            "cash",
            "Cash",
            AccountGroup::new(1, "Bank", AccountGroupType::Assets).unwrap(),
        )
        .unwrap();
        let collection = PostingLineCollection::new();
        collection.add(line(&bank, date(2024, 1, 2), 100, 1)).unwrap();
        collection
            .add(Arc::new(
                PostingLine::builder(Uuid::new_v4(), date(2024, 1, 3))
                    .account(&bank)
                    .budget_account(&food)
                    .credit(Money::new(40))
                    .build()
                    .unwrap(),
            ))
            .unwrap();

        bank.calculate(date(2024, 1, 31)).await.unwrap();
        food.calculate(date(2024, 1, 31)).await.unwrap();
        cash.calculate(date(2024, 1, 31)).await.unwrap();
        let references = [
            Arc::new(cash.reference()),
            Arc::new(bank.reference()),
            Arc::new(food.reference()),
        ];

        assert_eq!(collection.apply_references(&references).await, 3);
        for line in collection.ordered() {
            assert_eq!(line.account().status_date(), Some(date(2024, 1, 31)));
            assert!(!line.books_on(&cash.reference()));
        }
        let budgeted = collection.ordered()[0].budget_account().unwrap();
        assert_eq!(budgeted.status_date(), Some(date(2024, 1, 31)));

        assert_eq!(collection.apply_references(&references[..1]).await, 0);
    }
}

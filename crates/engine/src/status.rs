//! Status-date bookkeeping for calculated aggregates.
//!
//! Every collection and group status owns a [`StatusGuard`]. The guard lets
//! exactly one calculation per status date through: a caller asking for the
//! date that is being calculated waits on the guard's lane and then reuses the
//! result instead of calculating again.

use std::{future::Future, sync::RwLock};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    ResultEngine, YearMonth,
    util::{read_lock, write_lock},
};

/// What a calculated object is allowed to do.
///
/// `Live` objects are definitions that can build new calculated views from a
/// collection; `ComputedSnapshot` objects only recalculate themselves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationView {
    Live,
    ComputedSnapshot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Calculation {
    Calculated,
    Reused,
}

#[derive(Debug, Default)]
pub(crate) struct StatusGuard {
    lane: Mutex<()>,
    status_date: RwLock<Option<NaiveDate>>,
}

impl StatusGuard {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn status_date(&self) -> Option<NaiveDate> {
        *read_lock(&self.status_date)
    }

    /// Forgets the calculated status date, so the next run calculates again.
    pub(crate) fn invalidate(&self) {
        *write_lock(&self.status_date) = None;
    }

    /// Runs `calculate` unless `status_date` is already calculated.
    ///
    /// Status dates outside the supported years fail before anything runs.
    /// The status date is advanced before `calculate` runs and restored when it
    /// fails, so a retry for the same date calculates again.
    pub(crate) async fn run<F, Fut>(
        &self,
        target: &str,
        status_date: NaiveDate,
        calculate: F,
    ) -> ResultEngine<Calculation>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ResultEngine<()>>,
    {
        YearMonth::of_status_date(status_date)?;
        let _lane = self.lane.lock().await;

        let previous = self.status_date();
        if previous == Some(status_date) {
            tracing::debug!(target_name = target, %status_date, "reusing calculation");
            return Ok(Calculation::Reused);
        }

        tracing::debug!(target_name = target, %status_date, "calculating");
        *write_lock(&self.status_date) = Some(status_date);
        match calculate().await {
            Ok(()) => {
                tracing::debug!(target_name = target, %status_date, "calculated");
                Ok(Calculation::Calculated)
            }
            Err(err) => {
                *write_lock(&self.status_date) = previous;
                tracing::warn!(
                    target_name = target,
                    %status_date,
                    "calculation failed, status date rolled back: {err}"
                );
                Err(err)
            }
        }
    }
}

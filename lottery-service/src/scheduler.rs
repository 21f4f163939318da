//! Daily winner-selection scheduler.
//!
//! One logical cycle per day: gather the day's ballots for every active
//! lottery, pick one winner per lottery, durably record each exactly once.
//! The timer is wall-clock based and does not catch up missed firings: if
//! the process was down at the configured instant, that day's cycle simply
//! does not happen.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::{watch, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::database::models::{Ballot, NewWinner, WinnerRecord};
use crate::ledger::{Ledger, LedgerError, RecordOutcome};
use crate::metrics;
use crate::selector;

/// Read retries within a cycle: attempts and initial backoff.
const READ_ATTEMPTS: u32 = 3;
const RETRY_INITIAL_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Selecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleOutcome {
    Committed,
    Skipped,
}

/// Result of one cycle, kept in memory for the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub date: NaiveDate,
    pub outcome: CycleOutcome,
    pub winners: Vec<WinnerRecord>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Wall-clock instant the daily cycle fires at, in `utc_offset`.
    pub fire_at: NaiveTime,
    pub utc_offset: FixedOffset,
    /// Per-call budget for ledger operations inside a cycle.
    pub ledger_timeout: Duration,
    /// Fixed seed for reproducible selection; None draws from entropy.
    pub rng_seed: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fire_at: NaiveTime::from_hms_opt(23, 59, 0).unwrap(),
            utc_offset: FixedOffset::east_opt(0).unwrap(),
            ledger_timeout: Duration::from_millis(5000),
            rng_seed: None,
        }
    }
}

/// Per-cycle state serialized by the cycle mutex. Holding the lock is what
/// guarantees a cycle never overlaps itself.
struct CycleGuard {
    rng: StdRng,
    /// Local date of the last timer firing, used to drop duplicate wakeups.
    last_fired: Option<NaiveDate>,
}

/// The daily selection state machine: Idle → Selecting → Committed | Skipped.
///
/// Owned instance with injected ledger and randomness; constructed at
/// service start, stopped through its `RunnerHandle`. Holds no durable
/// state of its own.
pub struct DailyScheduler {
    ledger: Arc<dyn Ledger>,
    config: SchedulerConfig,
    cycle: TokioMutex<CycleGuard>,
    state: StdMutex<SchedulerState>,
    last_report: StdMutex<Option<CycleReport>>,
}

impl DailyScheduler {
    pub fn new(ledger: Arc<dyn Ledger>, config: SchedulerConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            ledger,
            config,
            cycle: TokioMutex::new(CycleGuard {
                rng,
                last_fired: None,
            }),
            state: StdMutex::new(SchedulerState::Idle),
            last_report: StdMutex::new(None),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock().expect("state mutex poisoned")
    }

    pub fn last_cycle(&self) -> Option<CycleReport> {
        self.last_report
            .lock()
            .expect("report mutex poisoned")
            .clone()
    }

    /// Force an immediate cycle, bypassing the timer. Waits its turn behind
    /// any in-flight cycle rather than running alongside it.
    pub async fn trigger_now(&self) -> CycleReport {
        let today = self.local_date(Utc::now());
        let mut guard = self.cycle.lock().await;
        self.run_locked(&mut guard, today).await
    }

    /// Timer entry point. A firing that lands while a cycle is in flight is
    /// dropped, and at most one firing counts per local date.
    async fn on_timer_fire(&self, now: DateTime<Utc>) {
        let today = self.local_date(now);
        let Ok(mut guard) = self.cycle.try_lock() else {
            warn!("cycle already in flight, dropping timer firing for {}", today);
            return;
        };
        if guard.last_fired == Some(today) {
            return;
        }
        guard.last_fired = Some(today);
        self.run_locked(&mut guard, today).await;
    }

    fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.config.utc_offset).date_naive()
    }

    /// Time left until the next configured firing instant.
    fn until_next_fire(&self, now: DateTime<Utc>) -> Duration {
        let local = now.with_timezone(&self.config.utc_offset).naive_local();
        let mut target = local.date().and_time(self.config.fire_at);
        if target <= local {
            target += chrono::Duration::days(1);
        }
        (target - local).to_std().unwrap_or(Duration::ZERO)
    }

    async fn run_locked(&self, guard: &mut CycleGuard, today: NaiveDate) -> CycleReport {
        *self.state.lock().expect("state mutex poisoned") = SchedulerState::Selecting;
        info!("selection cycle starting for {}", today);

        let report = self.run_cycle(guard, today).await;

        match report.outcome {
            CycleOutcome::Committed => info!(
                "cycle for {} committed: {} winner(s), {} error(s)",
                today,
                report.winners.len(),
                report.errors.len()
            ),
            CycleOutcome::Skipped => info!("cycle for {} skipped: {:?}", today, report.errors),
        }
        metrics::record_cycle(report.outcome);
        metrics::record_winners(report.winners.len() as u64);

        *self.last_report.lock().expect("report mutex poisoned") = Some(report.clone());
        *self.state.lock().expect("state mutex poisoned") = SchedulerState::Idle;
        report
    }

    async fn run_cycle(&self, guard: &mut CycleGuard, today: NaiveDate) -> CycleReport {
        let mut report = CycleReport {
            date: today,
            outcome: CycleOutcome::Skipped,
            winners: Vec::new(),
            errors: Vec::new(),
        };

        // A read fault or timeout at either gating step aborts the whole
        // cycle; the scheduler stays eligible for the next trigger.
        let lotteries = match self
            .read_with_retry("list_active_lotteries", || {
                self.ledger.list_active_lotteries(today)
            })
            .await
        {
            Ok(lotteries) => lotteries,
            Err(err) => {
                report.errors.push(format!("listing active lotteries: {}", err));
                return report;
            }
        };
        if lotteries.is_empty() {
            info!("no active lotteries on {}", today);
            return report;
        }

        let ids: Vec<i64> = lotteries.iter().map(|l| l.id).collect();
        let ballots = match self
            .read_with_retry("list_ballots_on", || self.ledger.list_ballots_on(&ids, today))
            .await
        {
            Ok(ballots) => ballots,
            Err(err) => {
                report.errors.push(format!("listing ballots: {}", err));
                return report;
            }
        };
        if ballots.is_empty() {
            info!("no ballots submitted on {}", today);
            return report;
        }

        // Group per lottery, one winner per group. Grouping preserves the
        // read order, so a seeded RNG makes each pick reproducible.
        let mut groups: BTreeMap<i64, Vec<Ballot>> = BTreeMap::new();
        for ballot in ballots {
            groups.entry(ballot.lottery_id).or_default().push(ballot);
        }

        for (lottery_id, group) in &groups {
            let winning = match selector::select(group, &mut guard.rng) {
                Ok(ballot) => ballot.clone(),
                Err(err) => {
                    // Groups are non-empty by construction; a violated
                    // precondition is scoped to its group like any other
                    // per-group failure.
                    error!("selection precondition violated for lottery {}: {}", lottery_id, err);
                    report.errors.push(format!("lottery {}: {}", lottery_id, err));
                    continue;
                }
            };
            if let Err(err) = self
                .commit_winner(*lottery_id, &winning, today, &mut report)
                .await
            {
                // One group's failed commit must not block the others.
                warn!("recording winner for lottery {} failed: {}", lottery_id, err);
                report.errors.push(format!("lottery {}: {}", lottery_id, err));
            }
        }

        report.outcome = CycleOutcome::Committed;
        report
    }

    /// Snapshot names, build the record, write it. `AlreadyRecorded` is an
    /// idempotent replay: the surviving record is reported as the winner.
    async fn commit_winner(
        &self,
        lottery_id: i64,
        winning: &Ballot,
        today: NaiveDate,
        report: &mut CycleReport,
    ) -> Result<(), LedgerError> {
        let lottery_name = self
            .read_with_retry("lookup_lottery_name", || {
                self.ledger.lookup_lottery_name(lottery_id)
            })
            .await?
            .unwrap_or_else(|| format!("lottery-{}", lottery_id));

        let user_name = match winning.user_id {
            Some(user_id) => {
                match self
                    .read_with_retry("lookup_user_name", || self.ledger.lookup_user_name(user_id))
                    .await?
                {
                    Some(name) => name,
                    None => {
                        warn!("winning ballot {} references unknown user {}", winning.id, user_id);
                        "anonymous".to_string()
                    }
                }
            }
            None => "anonymous".to_string(),
        };

        let winner = NewWinner {
            lottery_id,
            lottery_name,
            user_name,
            ballot_id: winning.id,
            selection_date: today,
        };

        let outcome = tokio::time::timeout(
            self.config.ledger_timeout,
            self.ledger.record_winner(winner),
        )
        .await
        .map_err(|_| LedgerError::Timeout)??;

        match outcome {
            RecordOutcome::Recorded(record) => {
                info!(
                    "winner recorded for '{}' on {}: ballot {} by {}",
                    record.lottery_name, today, record.ballot_id, record.user_name
                );
                report.winners.push(record);
            }
            RecordOutcome::AlreadyRecorded => {
                info!("winner for lottery {} on {} already recorded", lottery_id, today);
                let existing = tokio::time::timeout(
                    self.config.ledger_timeout,
                    self.ledger.winner_for(lottery_id, today),
                )
                .await
                .map_err(|_| LedgerError::Timeout)??;
                if let Some(record) = existing {
                    report.winners.push(record);
                }
            }
        }
        Ok(())
    }

    /// Bounded-backoff retry for cycle reads. Transient faults retry up to
    /// READ_ATTEMPTS; a timeout aborts immediately so the cycle never hangs.
    async fn read_with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, LedgerError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, LedgerError>>,
    {
        let mut backoff = RETRY_INITIAL_BACKOFF;
        let mut attempt = 1;
        loop {
            match tokio::time::timeout(self.config.ledger_timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) if attempt < READ_ATTEMPTS => {
                    warn!("{} failed (attempt {}/{}): {}", what, attempt, READ_ATTEMPTS, err);
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    warn!("{} timed out after {:?}", what, self.config.ledger_timeout);
                    return Err(LedgerError::Timeout);
                }
            }
        }
    }
}

/// Handle on the background timer task. Dropping it does not stop the task;
/// call `stop` during shutdown.
pub struct RunnerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RunnerHandle {
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Spawn the daily timer: sleep until the configured instant, fire, re-arm
/// for the next day.
pub fn spawn_timer(scheduler: Arc<DailyScheduler>) -> RunnerHandle {
    let (shutdown, mut rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        info!(
            "daily selection timer armed for {} (offset {})",
            scheduler.config.fire_at, scheduler.config.utc_offset
        );
        loop {
            let wait = scheduler.until_next_fire(Utc::now());
            tokio::select! {
                _ = tokio::time::sleep(wait) => scheduler.on_timer_fire(Utc::now()).await,
                _ = rx.changed() => {
                    info!("daily selection timer stopping");
                    break;
                }
            }
        }
    });
    RunnerHandle { shutdown, task }
}

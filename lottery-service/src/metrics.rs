use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::OnceCell;

use crate::database::constants::DEFAULT_DB_PATH;
use crate::scheduler::CycleOutcome;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum BallotOutcome {
    Accepted,
    LotteryNotFound,
    LotteryClosed,
    UserNotFound,
}

pub struct Metrics {
    ballots_total: HashMap<BallotOutcome, u64>,
    cycles_total: HashMap<CycleOutcome, u64>,
    winners_recorded_total: u64,
}

static METRICS: OnceCell<Mutex<Metrics>> = OnceCell::new();

fn get() -> &'static Mutex<Metrics> {
    METRICS.get_or_init(|| {
        Mutex::new(Metrics {
            ballots_total: HashMap::new(),
            cycles_total: HashMap::new(),
            winners_recorded_total: 0,
        })
    })
}

pub fn record_ballot_outcome(outcome: BallotOutcome) {
    let mut m = get().lock().expect("metrics mutex poisoned");
    *m.ballots_total.entry(outcome).or_insert(0) += 1;
}

pub fn record_cycle(outcome: CycleOutcome) {
    let mut m = get().lock().expect("metrics mutex poisoned");
    *m.cycles_total.entry(outcome).or_insert(0) += 1;
}

pub fn record_winners(count: u64) {
    let mut m = get().lock().expect("metrics mutex poisoned");
    m.winners_recorded_total += count;
}

pub fn snapshot_as_json() -> serde_json::Value {
    use serde_json::json;
    let m = get().lock().expect("metrics mutex poisoned");

    let ballots: Vec<serde_json::Value> = m
        .ballots_total
        .iter()
        .map(|(outcome, count)| {
            json!({
                "outcome": match outcome {
                    BallotOutcome::Accepted => "accepted",
                    BallotOutcome::LotteryNotFound => "lottery_not_found",
                    BallotOutcome::LotteryClosed => "lottery_closed",
                    BallotOutcome::UserNotFound => "user_not_found",
                },
                "count": count
            })
        })
        .collect();

    let cycles: Vec<serde_json::Value> = m
        .cycles_total
        .iter()
        .map(|(outcome, count)| {
            json!({
                "outcome": match outcome {
                    CycleOutcome::Committed => "committed",
                    CycleOutcome::Skipped => "skipped",
                },
                "count": count
            })
        })
        .collect();

    let (db_path_str, db_bytes) = storage_db_info();
    let db_mb = db_bytes.map(|b| round2(bytes_to_mb(b)));
    let fs_free_mb = filesystem_free_mb_from_db_path(&db_path_str);

    json!({
        "ballots_total": ballots,
        "cycles_total": cycles,
        "winners_recorded_total": m.winners_recorded_total,
        "storage": {
            "db_path": db_path_str,
            "db_size_mb": db_mb,
            "free_storage_mb": fs_free_mb,
        }
    })
}

fn storage_db_info() -> (String, Option<u64>) {
    let db_path = std::env::var("DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
    let db_bytes =
        std::fs::metadata(&db_path)
            .ok()
            .and_then(|m| if m.is_file() { Some(m.len()) } else { None });

    (db_path, db_bytes)
}

fn bytes_to_mb(bytes: u64) -> f64 {
    let mb = 1024.0 * 1024.0;
    (bytes as f64) / mb
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn filesystem_free_mb_from_db_path(db_path: &str) -> Option<f64> {
    use sysinfo::Disks;
    let disks = Disks::new_with_refreshed_list();
    let path = std::path::Path::new(db_path);
    let mount = path.canonicalize().ok().and_then(|p| {
        disks
            .iter()
            .filter(|d| p.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
    });

    mount.map(|d| round2(bytes_to_mb(d.available_space())))
}

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::sync::Semaphore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Quick-and-dirty CLI via envs
    let base_url = std::env::var("BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string());
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let duration_secs: u64 = std::env::var("DURATION_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(30);
    let concurrency: usize = std::env::var("CONCURRENCY").ok().and_then(|v| v.parse().ok()).unwrap_or(64);
    let user_count: usize = std::env::var("USERS").ok().and_then(|v| v.parse().ok()).unwrap_or(16);

    println!("BASE_URL={}", base_url);
    println!("DURATION_SECS={} CONCURRENCY={} USERS={}", duration_secs, concurrency, user_count);

    let client = Client::builder()
        .pool_max_idle_per_host(10_000)
        .tcp_nodelay(true)
        .timeout(Duration::from_secs(15))
        .build()?;

    let run_tag = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_millis();

    // Lottery to hammer: created via the admin surface when a token is
    // supplied, otherwise LOTTERY_NAME must name an existing open lottery.
    let lottery_name = match &admin_token {
        Some(token) => {
            let name = format!("loadtest-{}", run_tag);
            let due = (chrono::Utc::now().date_naive() + chrono::Days::new(7)).to_string();
            let resp = client
                .post(format!("{}/admin/lotteries", base_url))
                .header("authorization", format!("Bearer {}", token))
                .json(&serde_json::json!({ "name": name, "due_date": due }))
                .send()
                .await?;
            anyhow::ensure!(resp.status().is_success(), "creating lottery failed: {}", resp.status());
            name
        }
        None => std::env::var("LOTTERY_NAME")
            .map_err(|_| anyhow::anyhow!("set ADMIN_TOKEN or LOTTERY_NAME"))?,
    };
    println!("LOTTERY={}", lottery_name);

    // Register a pool of users to attribute ballots to
    let mut user_ids = Vec::with_capacity(user_count);
    for i in 0..user_count {
        let resp: serde_json::Value = client
            .post(format!("{}/users", base_url))
            .json(&serde_json::json!({ "username": format!("loadtest-{}-{}", run_tag, i) }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        user_ids.push(resp["user_id"].as_i64().unwrap_or_default());
    }
    println!("Registered {} users", user_ids.len());

    let start_at = Instant::now();
    let end_at = start_at + Duration::from_secs(duration_secs);
    let sem = Arc::new(Semaphore::new(concurrency));
    let issued = Arc::new(AtomicU64::new(0));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<(bool, u128)>();
    let issued_for_stats = issued.clone();
    let stats_handle = tokio::spawn(async move {
        let mut ok_count = 0u64;
        let mut err_count = 0u64;
        let mut latencies: Vec<u128> = Vec::new();
        while let Some((ok, elapsed_ms)) = rx.recv().await {
            if ok { ok_count += 1 } else { err_count += 1 }
            latencies.push(elapsed_ms);
        }
        latencies.sort_unstable();
        let pct = |p: f64| -> u128 {
            if latencies.is_empty() {
                return 0;
            }
            let idx = ((latencies.len() as f64 - 1.0) * p) as usize;
            latencies[idx]
        };
        let issued = issued_for_stats.load(Ordering::Relaxed);
        println!("issued={} ok={} err={}", issued, ok_count, err_count);
        println!("latency ms: p50={} p95={} p99={} max={}", pct(0.50), pct(0.95), pct(0.99), pct(1.0));
        if issued > 0 {
            println!("throughput: {:.1} req/s", ok_count as f64 / start_at.elapsed().as_secs_f64());
        }
    });

    let mut tasks = Vec::new();
    let mut next_user = 0usize;
    while Instant::now() < end_at {
        let permit = sem.clone().acquire_owned().await.unwrap();
        issued.fetch_add(1, Ordering::Relaxed);

        let user_id = user_ids[next_user % user_ids.len()];
        next_user += 1;

        let client_ref = client.clone();
        let tx_ref = tx.clone();
        let url = format!("{}/ballots", base_url);
        let body = serde_json::json!({ "lottery_name": lottery_name, "user_id": user_id });
        tasks.push(tokio::spawn(async move {
            let started = Instant::now();
            let resp = client_ref.post(&url).json(&body).send().await;
            let elapsed = started.elapsed().as_millis();
            let ok = matches!(&resp, Ok(r) if r.status().is_success());
            let _ = tx_ref.send((ok, elapsed));
            drop(permit);
            if !ok {
                match resp {
                    Ok(r) => eprintln!("err {}ms status={}", elapsed, r.status()),
                    Err(e) => eprintln!("err {}ms net={}", elapsed, e),
                }
            }
        }));
    }

    // Close the stats channel so the summary prints
    drop(tx);

    for task in tasks {
        let _ = task.await;
    }
    let _ = stats_handle.await;

    Ok(())
}

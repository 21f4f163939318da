mod common;
use common::{setup_server, ADMIN_TOKEN};

use reqwest::StatusCode;
use serde_json::{json, Value};

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

#[tokio::test]
#[serial_test::serial]
async fn e2e_binary_daily_selection_flow() -> anyhow::Result<()> {
    let (base_url, _guard) = setup_server().await?;
    let client = reqwest::Client::new();
    let today = chrono::Utc::now().date_naive();

    // GET /healthz
    let health = client.get(format!("{}/healthz", base_url)).send().await?;
    assert!(health.status().is_success());

    // GET /version
    let version: Value = client
        .get(format!("{}/version", base_url))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    assert!(version.get("built_at_unix").is_some());

    // POST /users - register two players
    let alice: Value = client
        .post(format!("{}/users", base_url))
        .json(&json!({ "username": "alice" }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let alice_id = alice["user_id"].as_i64().unwrap();

    let bob: Value = client
        .post(format!("{}/users", base_url))
        .json(&json!({ "username": "bob" }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let bob_id = bob["user_id"].as_i64().unwrap();

    // Duplicate username -> 409
    let dup = client
        .post(format!("{}/users", base_url))
        .json(&json!({ "username": "alice" }))
        .send()
        .await?;
    assert_eq!(dup.status(), StatusCode::CONFLICT);

    // Admin surface without/with wrong token -> 401
    let body = json!({ "name": "Big Chance", "due_date": (today + chrono::Days::new(2)).to_string() });
    let no_hdr = client
        .post(format!("{}/admin/lotteries", base_url))
        .json(&body)
        .send()
        .await?;
    assert_eq!(no_hdr.status(), StatusCode::UNAUTHORIZED);
    let bad_hdr = client
        .post(format!("{}/admin/lotteries", base_url))
        .header("authorization", bearer("invalid"))
        .json(&body)
        .send()
        .await?;
    assert_eq!(bad_hdr.status(), StatusCode::UNAUTHORIZED);

    // POST /admin/lotteries with the right token -> 201
    let created = client
        .post(format!("{}/admin/lotteries", base_url))
        .header("authorization", bearer(ADMIN_TOKEN))
        .json(&body)
        .send()
        .await?;
    assert_eq!(created.status(), StatusCode::CREATED);

    // Duplicate lottery name -> 409
    let dup_lottery = client
        .post(format!("{}/admin/lotteries", base_url))
        .header("authorization", bearer(ADMIN_TOKEN))
        .json(&body)
        .send()
        .await?;
    assert_eq!(dup_lottery.status(), StatusCode::CONFLICT);

    // POST /ballots - alice twice, bob once
    let mut submitted = Vec::new();
    for user_id in [alice_id, alice_id, bob_id] {
        let resp = client
            .post(format!("{}/ballots", base_url))
            .json(&json!({ "lottery_name": "Big Chance", "user_id": user_id }))
            .send()
            .await?;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let ballot: Value = resp.json().await?;
        submitted.push(ballot["ballot_id"].as_i64().unwrap());
    }

    // Unknown lottery -> 404; unknown user -> 400
    let unknown = client
        .post(format!("{}/ballots", base_url))
        .json(&json!({ "lottery_name": "No Such Draw", "user_id": alice_id }))
        .send()
        .await?;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    let ghost = client
        .post(format!("{}/ballots", base_url))
        .json(&json!({ "lottery_name": "Big Chance", "user_id": 99_999 }))
        .send()
        .await?;
    assert_eq!(ghost.status(), StatusCode::BAD_REQUEST);

    // GET /lotteries with alice's id -> her ballot count
    let lotteries: Value = client
        .get(format!("{}/lotteries?user_id={}", base_url, alice_id))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let listed = lotteries["lotteries"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["lottery_name"], "Big Chance");
    assert_eq!(listed[0]["ballot_count"], 2);

    // POST /admin/trigger - run the selection cycle now
    let report: Value = client
        .post(format!("{}/admin/trigger", base_url))
        .header("authorization", bearer(ADMIN_TOKEN))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    assert_eq!(report["outcome"], "committed");
    let winners = report["winners"].as_array().unwrap();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0]["lottery_name"], "Big Chance");
    let winning_ballot = winners[0]["ballot_id"].as_i64().unwrap();
    assert!(submitted.contains(&winning_ballot));
    assert!(["alice", "bob"].contains(&winners[0]["user_name"].as_str().unwrap()));

    // GET /winners for today matches the report
    let winners_page: Value = client
        .get(format!("{}/winners?date={}", base_url, today))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let records = winners_page["winners"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["ballot_id"].as_i64().unwrap(), winning_ballot);

    // Re-trigger: idempotent replay, same single surviving record
    let replay: Value = client
        .post(format!("{}/admin/trigger", base_url))
        .header("authorization", bearer(ADMIN_TOKEN))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    assert_eq!(replay["outcome"], "committed");
    let replay_winners = replay["winners"].as_array().unwrap();
    assert_eq!(replay_winners.len(), 1);
    assert_eq!(replay_winners[0]["ballot_id"].as_i64().unwrap(), winning_ballot);

    // GET /admin/cycle - scheduler is idle with a stored report
    let cycle: Value = client
        .get(format!("{}/admin/cycle", base_url))
        .header("authorization", bearer(ADMIN_TOKEN))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    assert_eq!(cycle["state"], "idle");
    assert_eq!(cycle["last_cycle"]["outcome"], "committed");

    // GET /admin/stats - token guard then counters
    let stats_no_hdr = client.get(format!("{}/admin/stats", base_url)).send().await?;
    assert_eq!(stats_no_hdr.status(), StatusCode::UNAUTHORIZED);
    let stats_bad = client
        .get(format!("{}/admin/stats", base_url))
        .header("authorization", bearer("invalid"))
        .send()
        .await?;
    assert_eq!(stats_bad.status(), StatusCode::UNAUTHORIZED);

    let stats: Value = client
        .get(format!("{}/admin/stats", base_url))
        .header("authorization", bearer(ADMIN_TOKEN))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let accepted = stats["ballots_total"]
        .as_array()
        .unwrap()
        .iter()
        .find(|entry| entry["outcome"] == "accepted")
        .expect("accepted counter present");
    assert!(accepted["count"].as_u64().unwrap() >= 3);
    assert!(stats["winners_recorded_total"].as_u64().unwrap() >= 1);

    Ok(())
}

#[tokio::test]
#[serial_test::serial]
async fn e2e_concurrent_submissions_yield_one_winner_per_lottery() -> anyhow::Result<()> {
    let (base_url, _guard) = setup_server().await?;
    let client = reqwest::Client::new();
    let today = chrono::Utc::now().date_naive();

    for name in ["draw-a", "draw-b"] {
        let resp = client
            .post(format!("{}/admin/lotteries", base_url))
            .header("authorization", bearer(ADMIN_TOKEN))
            .json(&json!({ "name": name, "due_date": (today + chrono::Days::new(1)).to_string() }))
            .send()
            .await?;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    // Hammer both lotteries while triggering cycles concurrently. Every
    // ballot is either in a cycle's snapshot or not; either way at most one
    // winner per lottery per day survives.
    let mut tasks = Vec::new();
    for i in 0..16 {
        let client = client.clone();
        let base_url = base_url.clone();
        tasks.push(tokio::spawn(async move {
            let name = if i % 2 == 0 { "draw-a" } else { "draw-b" };
            for _ in 0..5 {
                let resp = client
                    .post(format!("{}/ballots", base_url))
                    .json(&json!({ "lottery_name": name }))
                    .send()
                    .await
                    .expect("submit");
                assert_eq!(resp.status(), StatusCode::CREATED);
            }
        }));
    }
    for round in 0..3 {
        let client = client.clone();
        let base_url = base_url.clone();
        tasks.push(tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(round * 20)).await;
            let resp = client
                .post(format!("{}/admin/trigger", base_url))
                .header("authorization", bearer(ADMIN_TOKEN))
                .send()
                .await
                .expect("trigger");
            assert!(resp.status().is_success());
        }));
    }
    for task in tasks {
        task.await?;
    }

    // One final cycle so both lotteries certainly have today's ballots seen
    client
        .post(format!("{}/admin/trigger", base_url))
        .header("authorization", bearer(ADMIN_TOKEN))
        .send()
        .await?
        .error_for_status()?;

    let winners_page: Value = client
        .get(format!("{}/winners?date={}", base_url, today))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let records = winners_page["winners"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    let mut names: Vec<&str> = records
        .iter()
        .map(|r| r["lottery_name"].as_str().unwrap())
        .collect();
    names.sort_unstable();
    assert_eq!(names, ["draw-a", "draw-b"]);
    for record in records {
        assert_eq!(record["user_name"], "anonymous");
    }

    Ok(())
}

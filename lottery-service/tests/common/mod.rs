use reqwest::Client;
use std::process::{Command, Stdio};
use std::{
    net::TcpListener,
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::time::sleep;

pub const ADMIN_TOKEN: &str = "test-admin-token";

/// Get an available ephemeral port on localhost.
pub fn find_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Resolve the lottery-service binary path from env or common target dirs.
pub fn resolve_binary_path() -> String {
    if let Ok(p) = std::env::var("CARGO_BIN_EXE_lottery-service") {
        return p;
    }
    if let Ok(p) = std::env::var("CARGO_BIN_EXE_lottery_service") {
        return p;
    }

    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let workspace_root = manifest.parent().unwrap_or(&manifest).to_path_buf();
    let candidates = [
        manifest.join("target/debug/lottery-service"),
        manifest.join("target/release/lottery-service"),
        workspace_root.join("target/debug/lottery-service"),
        workspace_root.join("target/release/lottery-service"),
    ];
    for cand in candidates.iter() {
        if Path::new(&cand).exists() {
            return cand.to_string_lossy().to_string();
        }
    }

    "lottery-service".to_string()
}

/// Poll /healthz until the server responds OK or timeout.
pub async fn wait_ready(base: &str, timeout_ms: u64) -> anyhow::Result<()> {
    let client = Client::new();
    let mut waited = 0u64;
    loop {
        if waited >= timeout_ms {
            anyhow::bail!("server not ready after {}ms", timeout_ms);
        }
        if let Ok(resp) = client.get(format!("{}/healthz", base)).send().await {
            if resp.status().is_success() {
                return Ok(());
            }
        }
        sleep(Duration::from_millis(50)).await;
        waited += 50;
    }
}

// Kills the child process and removes the scratch database on drop
pub struct ChildGuard {
    child: std::process::Child,
    db_path: PathBuf,
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = std::fs::remove_file(&self.db_path);
        // WAL sidecar files
        for suffix in ["-wal", "-shm"] {
            let mut side = self.db_path.as_os_str().to_owned();
            side.push(suffix);
            let _ = std::fs::remove_file(PathBuf::from(side));
        }
    }
}

pub async fn setup_server() -> anyhow::Result<(String, ChildGuard)> {
    // Resolve binary path from Cargo or fallbacks
    let bin = resolve_binary_path();
    let bin_path = Path::new(&bin);
    assert!(bin_path.exists(), "binary not found at {}", bin);

    // Test config
    let port = find_free_port();
    let base_url = format!("http://127.0.0.1:{}", port);
    let db_path = std::env::temp_dir().join(format!(
        "lottery_e2e_{}_{}.db",
        std::process::id(),
        port
    ));

    // Start the binary; the timer is armed for 23:59 and never fires during
    // a test run, cycles come from /admin/trigger.
    let child = Command::new(&bin)
        .env("DB_PATH", &db_path)
        .env("PORT", port.to_string())
        .env("ADMIN_AUTH_TOKEN", ADMIN_TOKEN)
        .env("SELECTION_TIME", "23:59")
        .env("RATE_LIMIT_REPLENISH_MS", "0")
        .env("RUST_LOG", "info")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // Ensure we always try to kill the child on exit
    let guard = ChildGuard { child, db_path };

    // Wait until server is ready
    wait_ready(&base_url, 10_000).await?;

    Ok((base_url, guard))
}

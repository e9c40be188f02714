use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::{Duration, Instant, sleep};
use tracing::info;

use cooldown_core::apis::{TwitterClassifier, TwitterError};
use cooldown_core::{CooldownBuilder, CooldownConfig, JobError, JobHandler, observability};

const ADAPTER: &str = "Demo::Apis::Twitter";
const HANDLER: &str = "Demo::Jobs::FetchTimeline";

#[derive(Debug, Deserialize)]
struct FetchArgs {
    user: String,
}

/// Pretends to call Twitter; the first `limited` calls hit the rate limit.
struct FetchTimeline {
    limited: AtomicU32,
    done: AtomicU32,
}

impl FetchTimeline {
    fn new(limited: u32) -> Self {
        Self {
            limited: AtomicU32::new(limited),
            done: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl JobHandler for FetchTimeline {
    async fn perform(&self, args: &[Value]) -> Result<(), JobError> {
        let payload = args.first().cloned().unwrap_or(Value::Null);
        let args: FetchArgs = serde_json::from_value(payload)
            .map_err(|e| JobError::InvalidArguments(format!("json decode: {e}")))?;

        let left = self.limited.load(Ordering::SeqCst);
        if left > 0 {
            self.limited.fetch_sub(1, Ordering::SeqCst);
            return Err(JobError::upstream(TwitterError::TooManyRequests {
                reset_in: Some(Duration::from_secs(2)),
            }));
        }

        println!("fetched timeline of @{}", args.user);
        self.done.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn load_config() -> Result<CooldownConfig, Box<dyn Error>> {
    if let Some(path) = std::env::args().nth(1) {
        return Ok(CooldownConfig::from_path(path)?);
    }
    Ok(CooldownConfig::from_json_str(
        r#"{
            "resume_queue": "unpause",
            "worker": { "poll_interval_ms": 20 },
            "scheduler": { "poll_interval_ms": 100 }
        }"#,
    )?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    observability::init();

    // (A) in-memory の構成を組み立てる
    let config = load_config()?;
    let body = Arc::new(FetchTimeline::new(1));
    let app = CooldownBuilder::new(config)
        .register(HANDLER, body.clone())?
        .adapter(ADAPTER, TwitterClassifier)
        .expect_handlers(&[HANDLER])
        .build()?;

    // (B) worker と resume poller を起動
    let workers = app.spawn_workers(2);
    let poller = app.spawn_poller();

    // (C) ジョブ投入。最初の 1 件が rate limit に当たり、キューごと止まる
    let users = ["rustlang", "tokio_rs", "serde_rs"];
    for user in users {
        let id = app.enqueue(ADAPTER, HANDLER, vec![json!({ "user": user })]).await?;
        info!(job = %id, user, "enqueued");
    }

    // (D) 全件終わるか、タイムアウトまで待つ
    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        if body.done.load(Ordering::SeqCst) as usize == users.len() {
            break;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = sleep(Duration::from_millis(200)) => {}
        }
        if Instant::now() >= deadline {
            info!("timed out waiting for jobs");
            break;
        }
        for snapshot in app.snapshots().await? {
            info!(queue = %snapshot.queue, state = ?snapshot.state, live = snapshot.live_len, paused = snapshot.paused_len, "status");
        }
    }

    // (E) graceful shutdown
    workers.shutdown_and_join().await;
    poller.shutdown_and_join().await;

    println!("{}", serde_json::to_string_pretty(&app.snapshots().await?)?);
    Ok(())
}

//! # Example: retry_with_backoff
//!
//! A listener fails twice before succeeding. The pool-wide retry policy
//! (from [`Config::max_attempts`] and [`Config::backoff`]) retries it with
//! exponential backoff and jitter; a second listener returns a fatal error
//! and is never retried.
//!
//! ## Flow
//! ```text
//! emit("payment.captured")
//!   ├─► flaky: attempt 1 → Err(fail) → RetryScheduled(~100ms)
//!   │          attempt 2 → Err(fail) → RetryScheduled(~200ms)
//!   │          attempt 3 → Ok         → ListenerSucceeded
//!   └─► strict: attempt 1 → Err(fatal) → ListenerFailed (no retry)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=eventpool=debug cargo run --example retry_with_backoff
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use eventpool::{
    BackoffPolicy, Config, Event, EventPool, JitterPolicy, ListenerError, ListenerFn, LogWriter,
    Subscribe,
};
use tracing_subscriber::EnvFilter;

static ATTEMPTS: AtomicU32 = AtomicU32::new(0);

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("eventpool=debug")),
        )
        .init();

    // 1. Three attempts, exponential backoff with equal jitter.
    let mut cfg = Config::default();
    cfg.pool_name = "payments".into();
    cfg.max_attempts = 3;
    cfg.backoff = BackoffPolicy {
        first: Duration::from_millis(100),
        max: Duration::from_secs(2),
        factor: 2.0,
        jitter: JitterPolicy::Equal,
    };

    // 2. LogWriter renders retries and failures through tracing.
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let pool = EventPool::builder(cfg).with_subscribers(subs).build();

    // 3. Fails twice, then succeeds.
    pool.on(
        "payment.*",
        ListenerFn::arc(|ev: Event| async move {
            let attempt = ATTEMPTS.fetch_add(1, Ordering::Relaxed) + 1;
            let amount = ev.payload::<u64>().copied().unwrap_or_default();
            if attempt <= 2 {
                println!("[flaky] attempt {attempt}: gateway timeout");
                return Err(ListenerError::fail(format!("gateway timeout #{attempt}")));
            }
            println!("[flaky] attempt {attempt}: captured {amount}");
            Ok(())
        }),
    )?;

    // 4. Fatal errors skip the retry policy.
    pool.on(
        "payment.captured",
        ListenerFn::arc(|_ev: Event| async { Err(ListenerError::fatal("ledger rejected")) }),
    )?;

    // 5. Wait for both listeners.
    for err in pool.emit_sync("payment.captured", 4200u64).await {
        println!("[main] failed: {err}");
    }

    eventpool::shutdown_all().await;
    Ok(())
}

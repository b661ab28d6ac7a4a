//! # Example: wildcards
//!
//! Registers listeners under exact and wildcard patterns and shows which of
//! them an emission reaches.
//!
//! ## Routing
//! ```text
//! emit("event.some.thing.run")
//!   ├─► event.some.thing.run   (exact)
//!   ├─► event.some.*.run       (* = one segment)
//!   ├─► event.some.**          (** = zero or more segments)
//!   └─► **.thing.run
//!
//! emit("event.some")
//!   └─► event.some.**          (** may match nothing)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=eventpool=debug cargo run --example wildcards
//! ```

use std::sync::Arc;

use eventpool::{Config, Event, EventPool, ListenerFn, ListenerRef, LogWriter, Subscribe};
use tracing_subscriber::EnvFilter;

fn printer(pattern: &'static str) -> ListenerRef {
    ListenerFn::arc(move |ev: Event| async move {
        println!("  {pattern:<22} <- {}", ev.topic());
        Ok(())
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut cfg = Config::default();
    cfg.pool_name = "wildcards".into();

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let pool = EventPool::builder(cfg).with_subscribers(subs).build();

    for pattern in [
        "event.some.thing.run",
        "event.some.*.run",
        "event.some.*.*",
        "event.some.**",
        "**.thing.run",
    ] {
        pool.on(pattern, printer(pattern))?;
    }

    for name in [
        "event.some.thing.run",
        "event.some.thing.do",
        "event.some",
        "event.other.thing.run",
        "nothing.here",
    ] {
        println!("emit {name} (interested: {})", pool.interested_in(name));
        let errors = pool.emit_sync(name, ()).await;
        assert!(errors.is_empty());
    }

    pool.close().await?;
    Ok(())
}

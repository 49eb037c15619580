//! # Example: Agent Fleet
//!
//! Launches three shell "agents", forwards supervisor notifications onto the
//! bus and reacts to their status markers.
//!
//! - `manager` reports READY, then idles until stopped (graceful stop)
//! - `impl-1` reports COMPLETE and exits 0
//! - `impl-2` ignores SIGTERM (force kill after the timeout)
//!
//! Run with:
//! ```text
//! RUST_LOG=info cargo run --example agent_fleet --features logging
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use agentvisor::{
    Dispatch, EmitMode, EventBridge, EventBus, ListenerFn, LogWriter, ProcessHandle,
    ProcessSupervisor, SupervisorConfig,
};

fn shell(script: &str) -> anyhow::Result<ProcessHandle> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(script).kill_on_drop(true);
    Ok(ProcessHandle::spawn(&mut cmd)?)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let bus = EventBus::default();
    bus.set_topic_mode("process:**", EmitMode::Sync);
    bus.on("**", Arc::new(LogWriter::new()));

    let completed = Arc::new(AtomicUsize::new(0));
    let counter = completed.clone();
    bus.on(
        "process:status:*",
        ListenerFn::arc("status-watch", move |env| {
            let counter = counter.clone();
            async move {
                if env.topic() == "process:status:complete" {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
                Ok(Dispatch::Continue)
            }
        }),
    );

    let sup = ProcessSupervisor::new(SupervisorConfig {
        purge_grace: Duration::from_millis(500),
        ..SupervisorConfig::default()
    });
    let token = CancellationToken::new();
    let bridge = EventBridge::spawn(&sup, bus.clone(), token.clone());

    sup.register_process(
        "manager",
        shell("echo '[APM_STATUS:READY] manager up'; exec sleep 30")?,
    )?;
    sup.register_process(
        "impl-1",
        shell("echo working; echo '[APM_STATUS:COMPLETE] done'; exit 0")?,
    )?;
    sup.register_process(
        "impl-2",
        shell("trap '' TERM; echo '[APM_STATUS:BLOCKED] stuck' >&2; while :; do sleep 1; done")?,
    )?;

    tokio::time::sleep(Duration::from_millis(300)).await;
    for rec in sup.get_active_processes() {
        println!("active: {} (pid {})", rec.agent_id, rec.pid);
    }
    if let Some(out) = sup.get_output("impl-2") {
        println!("impl-2 stderr: {:?}", out.stderr);
    }

    let stopped = sup.terminate_all(Duration::from_millis(500)).await;
    println!("stopped {stopped} agent(s)");
    for id in ["manager", "impl-1", "impl-2"] {
        if let Some(rec) = sup.get_process_info(id) {
            println!(
                "{id}: {} code={:?} signal={:?}",
                rec.status.as_str(),
                rec.exit_code,
                rec.exit_signal
            );
        }
    }

    let stats = bus.stats();
    println!(
        "bus: published={} delivered={} completed_markers={}",
        stats.total_published,
        stats.total_delivered,
        completed.load(Ordering::SeqCst)
    );

    token.cancel();
    bridge.await?;
    bus.shutdown();
    Ok(())
}

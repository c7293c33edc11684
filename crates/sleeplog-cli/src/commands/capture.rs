//! Capture command: runs the state machine against stdin hardware signals.
//!
//! Each stdin line names one hardware signal. The loop runs until stdin
//! closes, writing captured events straight into the store.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::AsyncBufReadExt;

use sleeplog_capture::machine::{self, CaptureConfig, CaptureMachine, EventSink, Input, SinkError};
use sleeplog_capture::{HardwareSignal, Signaler, TracingLed};
use sleeplog_core::Event;
use sleeplog_db::Database;

use crate::Config;

/// Event sink backed by the store.
struct DatabaseSink {
    db: Database,
}

impl EventSink for DatabaseSink {
    fn record(&mut self, event: &Event) -> Result<(), SinkError> {
        self.db.insert_event(event)?;
        Ok(())
    }
}

/// Runs the capture loop on a single-threaded runtime until stdin closes.
pub fn run(db: Database, config: &Config) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start capture runtime")?;
    runtime.block_on(capture_loop(db, config))
}

async fn capture_loop(db: Database, config: &Config) -> Result<()> {
    let (tx, rx) = machine::channel();
    let signaler = Signaler::new(Arc::new(TracingLed), config.flash_pulse());
    let machine = CaptureMachine::new(
        DatabaseSink { db },
        signaler,
        CaptureConfig {
            cooldown: config.cooldown(),
            blink_interval: config.blink_interval(),
        },
        tx.clone(),
    );
    let machine_task = tokio::spawn(machine.run(rx));
    tracing::info!("capture loop started, reading signals from stdin");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .context("failed to read hardware signal")?
    {
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<HardwareSignal>() {
            Ok(signal) => {
                if tx.send(Input::Signal(signal)).await.is_err() {
                    break;
                }
            }
            Err(err) => tracing::warn!(error = %err, "ignoring unrecognized signal"),
        }
    }

    let _ = tx.send(Input::Shutdown).await;
    machine_task.await.context("capture loop panicked")?;
    Ok(())
}

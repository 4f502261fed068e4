//! Event loop feeding a [`BufferController`].
//!
//! Events arrive over an mpsc channel. A periodic tick forces a flush so a
//! quiet session still reaches the sink. When the channel closes the
//! controller is drained.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::core::EventRecord;
use crate::error::{BufferError, Error, Result};
use crate::pipeline::controller::BufferController;
use crate::pipeline::flushable::FlushOutcome;

/// Totals for one driver run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Events buffered.
    pub accepted: usize,
    /// Events dropped because they could not be serialized.
    pub dropped: usize,
    /// Events refused because overflow stayed full.
    pub rejected: usize,
    /// Batches the sink stored.
    pub flushed_batches: usize,
    /// Events contained in stored batches.
    pub flushed_events: usize,
    /// Flush attempts the sink failed.
    pub failed_flushes: usize,
    /// Whether both buffers were empty at the end.
    pub drained: bool,
}

impl RunSummary {
    fn record(&mut self, outcome: &FlushOutcome) {
        match outcome {
            FlushOutcome::Flushed(report) => {
                self.flushed_batches += 1;
                self.flushed_events += report.events;
            }
            FlushOutcome::Retained { .. } => self.failed_flushes += 1,
            FlushOutcome::Empty | FlushOutcome::InFlight => {}
        }
    }
}

/// Runs until `events` closes, then drains the controller.
///
/// `flush_interval` enables the periodic forced flush.
///
/// # Errors
///
/// Returns an error only if buffered content cannot be encoded. Sink
/// failures, unserializable events and overflow rejections are counted in
/// the [`RunSummary`].
pub async fn run<E: EventRecord + Send>(
    controller: &BufferController,
    mut events: mpsc::Receiver<E>,
    flush_interval: Option<Duration>,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    let mut ticker = flush_interval.map(|period| {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    info!(session_id = controller.session_id(), "pipeline started");

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                push(controller, &event, &mut summary).await?;
            }
            () = tick(&mut ticker) => {
                debug!("periodic flush");
                let outcome = controller.flush().await?;
                summary.record(&outcome);
            }
        }
    }

    let outcome = controller.drain().await?;
    summary.record(&outcome);
    summary.drained = controller.status().is_drained();

    info!(
        accepted = summary.accepted,
        dropped = summary.dropped,
        rejected = summary.rejected,
        batches = summary.flushed_batches,
        failed = summary.failed_flushes,
        drained = summary.drained,
        "pipeline stopped"
    );
    Ok(summary)
}

async fn push<E: EventRecord + Send>(
    controller: &BufferController,
    event: &E,
    summary: &mut RunSummary,
) -> Result<()> {
    let result = match controller.add(event).await {
        Err(Error::Buffer(BufferError::OverflowFull { .. })) => {
            // Back-pressure: settle the in-flight batch, then try once more.
            let outcome = controller.flush().await?;
            summary.record(&outcome);
            controller.add(event).await
        }
        other => other,
    };

    match result {
        Ok(added) => {
            summary.accepted += 1;
            if let Some(outcome) = &added.flush {
                summary.record(outcome);
            }
            Ok(())
        }
        Err(Error::Codec(_)) => {
            summary.dropped += 1;
            Ok(())
        }
        Err(err @ Error::Buffer(_)) => {
            warn!(error = %err, "event rejected");
            summary.rejected += 1;
            Ok(())
        }
        Err(err) => Err(err),
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::PipelineConfig;
    use crate::pipeline::FlushableBuffer;
    use crate::sink::{MemorySink, RemoteSink};

    fn controller(sink: &Arc<MemorySink>, config: &PipelineConfig) -> BufferController {
        BufferController::new(
            FlushableBuffer::new(Arc::clone(sink) as Arc<dyn RemoteSink>, "session"),
            config,
        )
    }

    #[tokio::test]
    async fn test_run_drains_on_close() {
        let sink = Arc::new(MemorySink::new());
        let config = PipelineConfig::default().with_flush_threshold(10);
        let controller = controller(&sink, &config);

        let (tx, rx) = mpsc::channel(16);
        for event in ["aaaaa", "bbbbb", "ccccc", "ddddd"] {
            tx.send(event.to_string()).await.unwrap();
        }
        drop(tx);

        let summary = run(&controller, rx, None).await.unwrap();
        assert_eq!(summary.accepted, 4);
        assert_eq!(summary.flushed_events, 4);
        assert_eq!(summary.flushed_batches, 2);
        assert!(summary.drained);
        assert_eq!(sink.records().unwrap(), ["aaaaa", "bbbbb", "ccccc", "ddddd"]);
    }

    #[tokio::test]
    async fn test_run_counts_dropped_events() {
        let sink = Arc::new(MemorySink::new());
        let controller = controller(&sink, &PipelineConfig::default());

        let (tx, rx) = mpsc::channel(4);
        tx.send("good".to_string()).await.unwrap();
        tx.send("bad\u{1e}record".to_string()).await.unwrap();
        tx.send(String::new()).await.unwrap();
        drop(tx);

        let summary = run(&controller, rx, None).await.unwrap();
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.dropped, 2);
        assert_eq!(sink.records().unwrap(), ["good"]);
    }

    #[tokio::test]
    async fn test_run_reports_undrained_after_failure() {
        let sink = Arc::new(MemorySink::new());
        let controller = controller(&sink, &PipelineConfig::default());
        sink.fail_next(1);

        let (tx, rx) = mpsc::channel(4);
        tx.send("only".to_string()).await.unwrap();
        drop(tx);

        let summary = run(&controller, rx, None).await.unwrap();
        assert_eq!(summary.failed_flushes, 1);
        assert!(!summary.drained);
        assert_eq!(controller.status().primary_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_flush() {
        let sink = Arc::new(MemorySink::new());
        let controller = controller(&sink, &PipelineConfig::default());

        let (tx, rx) = mpsc::channel(4);
        let period = Some(Duration::from_secs(30));
        let (summary, ()) = tokio::join!(run(&controller, rx, period), async {
            tx.send("quiet".to_string()).await.unwrap();
            tokio::time::sleep(Duration::from_secs(31)).await;
            assert_eq!(sink.writes().len(), 1);
            drop(tx);
        });

        let summary = summary.unwrap();
        assert_eq!(summary.flushed_batches, 1);
        assert!(summary.drained);
    }

    #[tokio::test]
    async fn test_overflow_full_rejected_when_flush_fails() {
        let sink = Arc::new(MemorySink::new());
        let config = PipelineConfig::default()
            .with_flush_threshold(1)
            .with_overflow_limit(Some(4));
        let controller = controller(&sink, &config);
        sink.fail_next(1);

        let (tx, rx) = mpsc::channel(4);
        tx.send("a".to_string()).await.unwrap();
        tx.send("toolong".to_string()).await.unwrap();
        tx.send("b".to_string()).await.unwrap();
        drop(tx);

        let summary = run(&controller, rx, None).await.unwrap();
        // The forced flush fails, so primary stays full and the retry is refused.
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.failed_flushes, 1);
        assert_eq!(sink.records().unwrap(), ["a", "b"]);
    }
}

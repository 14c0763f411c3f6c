//! Interval-driven polling
//!
//! The scheduler paces [`PollLoop::run_cycle`] and delivers every outcome
//! to a [`RecordConsumer`]. A stop request is only honoured while waiting
//! for the next tick, so a cycle in flight always completes.

use crate::consumer::{RecordConsumer, SensorMap};
use crate::poll::PollLoop;
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracer_core::{TracerError, TracerResult};
use tracer_transport::StreamAccessor;

/// How long the link must be quiet before it is closed on stop
pub const DEFAULT_DRAIN_QUIET: Duration = Duration::from_millis(200);

/// Counters of a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub records: u64,
    pub failures: u64,
}

/// Drives a poll loop at a fixed interval
#[derive(Debug)]
pub struct Scheduler<T: StreamAccessor, C: RecordConsumer> {
    poll: PollLoop<T>,
    consumer: C,
    sensor_map: SensorMap,
    interval: Duration,
    drain_quiet: Duration,
    summary: RunSummary,
}

impl<T: StreamAccessor, C: RecordConsumer> Scheduler<T, C> {
    /// Create a scheduler
    ///
    /// # Errors
    /// Returns `TracerError::Config` if `interval` is zero.
    pub fn new(
        poll: PollLoop<T>,
        consumer: C,
        sensor_map: SensorMap,
        interval: Duration,
    ) -> TracerResult<Self> {
        if interval.is_zero() {
            return Err(TracerError::Config(
                "poll interval must be longer than zero".to_string(),
            ));
        }
        Ok(Self {
            poll,
            consumer,
            sensor_map,
            interval,
            drain_quiet: DEFAULT_DRAIN_QUIET,
            summary: RunSummary::default(),
        })
    }

    pub fn with_drain_quiet(mut self, quiet: Duration) -> Self {
        self.drain_quiet = quiet;
        self
    }

    /// Run one cycle and hand its outcome to the consumer
    pub async fn tick(&mut self) {
        self.summary.cycles += 1;
        match self.poll.run_cycle().await {
            Ok(reading) => {
                self.summary.records += 1;
                let record = self.sensor_map.build_record(&reading, Utc::now());
                self.consumer.accept(record);
            }
            Err(failure) => {
                self.summary.failures += 1;
                self.consumer.missed(&failure);
            }
        }
    }

    /// Poll until `stop` resolves, then drain and close the link
    ///
    /// The first cycle starts immediately. If a cycle overruns the interval
    /// the next one starts as soon as it finishes.
    pub async fn run<F>(mut self, stop: F) -> TracerResult<(RunSummary, C)>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(stop);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!("polling every {:?}", self.interval);
        loop {
            tokio::select! {
                biased;
                _ = &mut stop => break,
                _ = ticker.tick() => {}
            }
            self.tick().await;
        }

        log::info!(
            "stopping after {} cycle(s): {} record(s), {} failure(s)",
            self.summary.cycles,
            self.summary.records,
            self.summary.failures
        );
        self.poll.shutdown(self.drain_quiet).await?;
        Ok((self.summary, self.consumer))
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    pub fn poll_loop(&self) -> &PollLoop<T> {
        &self.poll
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::MockRecordConsumer;
    use crate::poll::{FailureReason, RetryPolicy};
    use tracer_core::FunctionCode;
    use tracer_session::{Frame, LinkSession};
    use tracer_transport::{ReadEvent, ScriptedTransport};

    fn answer() -> ReadEvent {
        let mut payload = [0u8; 24];
        payload[0..2].copy_from_slice(&1340u16.to_le_bytes());
        ReadEvent::Data(
            Frame::encode_response(0x01, FunctionCode::RealTimeData, &payload)
                .unwrap()
                .to_bytes(),
        )
    }

    fn poll_loop(events: Vec<ReadEvent>) -> PollLoop<ScriptedTransport> {
        PollLoop::new(
            LinkSession::new(ScriptedTransport::with_reads(events)),
            0x01,
            Duration::from_secs(1),
            RetryPolicy::new(1, Duration::ZERO),
        )
    }

    #[tokio::test]
    async fn test_tick_delivers_record_or_failure() {
        let mut consumer = MockRecordConsumer::new();
        consumer
            .expect_accept()
            .withf(|record| record.get("battery_voltage") == Some(13.4))
            .times(1)
            .return_const(());
        consumer
            .expect_missed()
            .withf(|failure| failure.reason == FailureReason::Timeout && failure.attempts == 1)
            .times(1)
            .return_const(());

        let mut scheduler = Scheduler::new(
            poll_loop(vec![answer(), ReadEvent::Silence]),
            consumer,
            SensorMap::identity(),
            Duration::from_secs(10),
        )
        .unwrap();
        scheduler.tick().await;
        scheduler.tick().await;
        assert_eq!(
            scheduler.summary(),
            RunSummary {
                cycles: 2,
                records: 1,
                failures: 1
            }
        );
    }

    #[tokio::test]
    async fn test_stop_before_first_tick_closes_link() {
        let mut consumer = MockRecordConsumer::new();
        consumer.expect_accept().never();
        consumer.expect_missed().never();

        let scheduler = Scheduler::new(
            poll_loop(vec![]),
            consumer,
            SensorMap::identity(),
            Duration::from_secs(10),
        )
        .unwrap()
        .with_drain_quiet(Duration::from_millis(1));

        let (summary, _) = scheduler.run(async {}).await.unwrap();
        assert_eq!(summary.cycles, 0);
    }

    #[test]
    fn test_zero_interval_is_refused() {
        let result = Scheduler::new(
            poll_loop(vec![]),
            MockRecordConsumer::new(),
            SensorMap::identity(),
            Duration::ZERO,
        );
        assert!(matches!(result, Err(TracerError::Config(_))));
    }

    #[tokio::test]
    async fn test_runs_cycles_until_stopped() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<()>();
        let mut seen = 0;
        let mut consumer = MockRecordConsumer::new();
        consumer.expect_accept().times(2).returning(move |_| {
            seen += 1;
            if seen == 2 {
                let _ = tx.send(());
            }
        });
        consumer.expect_missed().never();

        let scheduler = Scheduler::new(
            poll_loop(vec![answer(), answer()]),
            consumer,
            SensorMap::identity(),
            Duration::from_millis(1),
        )
        .unwrap()
        .with_drain_quiet(Duration::from_millis(1));

        let (summary, _) = scheduler
            .run(async move {
                let _ = rx.recv().await;
            })
            .await
            .unwrap();

        assert_eq!(summary.cycles, 2);
        assert_eq!(summary.records, 2);
    }
}

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use link::{LinkBound, LinkState};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use crate::source::{PollOutput, PollTarget, TelemetrySource, fetch};

pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_secs(1);

/// Receives every response that survives the staleness check.
pub trait PollSink: Send + Sync {
    fn deliver(&self, generation: u64, output: PollOutput);
}

impl<F> PollSink for F
where
    F: Fn(u64, PollOutput) + Send + Sync,
{
    fn deliver(&self, generation: u64, output: PollOutput) {
        self(generation, output)
    }
}

/// Monotonic request generations.
///
/// A response may be applied only if its generation is still the latest one
/// issued when it completes.
#[derive(Debug, Default)]
pub struct PollGate {
    latest: AtomicU64,
}

impl PollGate {
    pub fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.latest.load(Ordering::Acquire) == generation
    }

    /// Outdates every generation issued so far.
    pub fn invalidate(&self) {
        self.latest.fetch_add(1, Ordering::AcqRel);
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::Acquire)
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PollStats {
    pub issued: u64,
    pub delivered: u64,
    /// Completed after a newer request was issued; discarded.
    pub stale: u64,
    /// Aborted by a newer tick before completing.
    pub superseded: u64,
    pub failed: u64,
    /// Ticks skipped because the link was not connected.
    pub skipped: u64,
}

#[derive(Default)]
struct Counters {
    issued: AtomicU64,
    delivered: AtomicU64,
    stale: AtomicU64,
    superseded: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PollStats {
        PollStats {
            issued: self.issued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Default)]
struct Tasks {
    ticker: Option<JoinHandle<()>>,
    in_flight: Option<JoinHandle<()>>,
    stopped: bool,
}

struct Shared {
    target: PollTarget,
    source: Arc<dyn TelemetrySource>,
    sink: Arc<dyn PollSink>,
    link: watch::Receiver<LinkState>,
    gate: PollGate,
    // Serializes the currency check with delivery.
    deliver_lock: Mutex<()>,
    counters: Counters,
    tasks: Mutex<Tasks>,
}

impl Shared {
    fn tick(self: &Arc<Self>) -> bool {
        if *self.link.borrow() != LinkState::Connected {
            Counters::bump(&self.counters.skipped);
            trace!(target_kind = ?self.target, "link not connected; tick skipped");
            return false;
        }

        let mut tasks = self.tasks.lock();
        if tasks.stopped {
            return false;
        }
        let generation = self.gate.issue();
        if let Some(previous) = tasks.in_flight.take()
            && !previous.is_finished()
        {
            previous.abort();
            Counters::bump(&self.counters.superseded);
            debug!(generation, "previous poll still in flight; cancelled");
        }
        let shared = Arc::clone(self);
        tasks.in_flight = Some(tokio::spawn(async move {
            shared.run_request(generation).await;
        }));
        Counters::bump(&self.counters.issued);
        true
    }

    async fn run_request(&self, generation: u64) {
        match fetch(self.source.as_ref(), self.target).await {
            Ok(output) => {
                let _ordered = self.deliver_lock.lock();
                if !self.gate.is_current(generation) {
                    Counters::bump(&self.counters.stale);
                    debug!(generation, latest = self.gate.latest(), "discarding stale response");
                    return;
                }
                self.sink.deliver(generation, output);
                Counters::bump(&self.counters.delivered);
            }
            Err(err) if err.is_cancelled() => {
                trace!(generation, "poll cancelled");
            }
            Err(err) => {
                // Transient; the next tick retries.
                Counters::bump(&self.counters.failed);
                warn!(target_kind = ?self.target, generation, error = %err, "telemetry poll failed");
            }
        }
    }

    fn stop(&self) -> bool {
        let (ticker, in_flight) = {
            let mut tasks = self.tasks.lock();
            if tasks.stopped {
                return false;
            }
            tasks.stopped = true;
            (tasks.ticker.take(), tasks.in_flight.take())
        };
        self.gate.invalidate();
        for handle in [ticker, in_flight].into_iter().flatten() {
            handle.abort();
        }
        true
    }
}

/// Periodic telemetry poller bound to one target.
///
/// Ticks only issue requests while the watched link is connected. Each tick
/// cancels the request still in flight from the previous one, and a response
/// that completes after a newer request was issued is discarded. Failures are
/// logged and polling continues. Dropping the poller stops it.
pub struct TelemetryPoller {
    shared: Arc<Shared>,
    period: Duration,
}

impl TelemetryPoller {
    pub fn new(
        target: PollTarget,
        source: Arc<dyn TelemetrySource>,
        sink: impl PollSink + 'static,
        link: watch::Receiver<LinkState>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                target,
                source,
                sink: Arc::new(sink),
                link,
                gate: PollGate::default(),
                deliver_lock: Mutex::new(()),
                counters: Counters::default(),
                tasks: Mutex::new(Tasks::default()),
            }),
            period: DEFAULT_POLL_PERIOD,
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period.max(Duration::from_millis(1));
        self
    }

    pub fn target(&self) -> PollTarget {
        self.shared.target
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Spawns the tick loop on the current tokio runtime; the first tick fires
    /// immediately. Returns false if already running or stopped.
    pub fn start(&self) -> bool {
        let mut tasks = self.shared.tasks.lock();
        if tasks.stopped || tasks.ticker.is_some() {
            return false;
        }
        let shared = Arc::clone(&self.shared);
        let period = self.period;
        tasks.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                shared.tick();
            }
        }));
        debug!(target_kind = ?self.shared.target, period_ms = period.as_millis() as u64, "poller started");
        true
    }

    /// Runs one tick outside the timer.
    pub fn poll_now(&self) -> bool {
        self.shared.tick()
    }

    /// Cancels the timer and any in-flight request. Idempotent.
    pub fn stop(&self) {
        if self.shared.stop() {
            debug!(target_kind = ?self.shared.target, "poller stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.tasks.lock().stopped
    }

    pub fn is_running(&self) -> bool {
        let tasks = self.shared.tasks.lock();
        !tasks.stopped && tasks.ticker.is_some()
    }

    pub fn stats(&self) -> PollStats {
        self.shared.counters.snapshot()
    }
}

impl LinkBound for TelemetryPoller {
    fn stop(&self) {
        TelemetryPoller::stop(self);
    }

    fn is_stopped(&self) -> bool {
        TelemetryPoller::is_stopped(self)
    }
}

impl Drop for TelemetryPoller {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

impl fmt::Debug for TelemetryPoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryPoller")
            .field("target", &self.shared.target)
            .field("period", &self.period)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{PollGate, TelemetryPoller};
    use crate::snapshot::{FleetSnapshot, TelemetrySnapshot, VehicleSummary};
    use crate::source::{PollOutput, PollTarget, TelemetryError, TelemetrySource};
    use foundation::{Timestamp, VehicleId};
    use link::LinkState;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use runtime::BoxFuture;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::watch;
    use tokio::time::sleep;

    type Step = (Duration, Result<TelemetrySnapshot, TelemetryError>);

    #[derive(Default)]
    struct FakeSource {
        script: Mutex<VecDeque<Step>>,
        calls: AtomicUsize,
        completed: AtomicUsize,
    }

    impl FakeSource {
        fn scripted(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(steps.into()),
                ..Self::default()
            })
        }
    }

    impl TelemetrySource for FakeSource {
        fn fleet_status(&self) -> BoxFuture<'_, Result<FleetSnapshot, TelemetryError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                let fleet = [1u8, 2]
                    .into_iter()
                    .map(|id| (VehicleId(id), VehicleSummary::default()))
                    .collect();
                self.completed.fetch_add(1, Ordering::SeqCst);
                Ok(fleet)
            })
        }

        fn telemetry(
            &self,
            _target: Option<VehicleId>,
        ) -> BoxFuture<'_, Result<TelemetrySnapshot, TelemetryError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self
                .script
                .lock()
                .pop_front()
                .unwrap_or((Duration::ZERO, Ok(snap("idle"))));
            Box::pin(async move {
                sleep(step.0).await;
                self.completed.fetch_add(1, Ordering::SeqCst);
                step.1
            })
        }
    }

    fn snap(mode: &str) -> TelemetrySnapshot {
        let mut s = TelemetrySnapshot::empty(Timestamp(0));
        s.mode = Some(mode.to_string());
        s
    }

    fn recording_poller(
        source: Arc<FakeSource>,
        link: watch::Receiver<LinkState>,
        period: Duration,
    ) -> (TelemetryPoller, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let poller = TelemetryPoller::new(
            PollTarget::Vehicle(Some(VehicleId(1))),
            source,
            move |_generation: u64, output: PollOutput| {
                if let PollOutput::Telemetry { snapshot, .. } = output {
                    sink_seen.lock().push(snapshot.mode.unwrap_or_default());
                }
            },
            link,
        )
        .with_period(period);
        (poller, seen)
    }

    #[test]
    fn gate_only_accepts_latest_generation() {
        let gate = PollGate::default();
        let first = gate.issue();
        let second = gate.issue();
        assert!(!gate.is_current(first));
        assert!(gate.is_current(second));
        gate.invalidate();
        assert!(!gate.is_current(second));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_response_never_overwrites_newer_one() {
        let (_tx, rx) = watch::channel(LinkState::Connected);
        let source = FakeSource::scripted(vec![
            (Duration::from_millis(1500), Ok(snap("first"))),
            (Duration::ZERO, Ok(snap("second"))),
        ]);
        let (poller, seen) = recording_poller(source.clone(), rx, Duration::from_secs(1));
        assert!(poller.start());

        sleep(Duration::from_millis(1600)).await;
        poller.stop();
        sleep(Duration::from_secs(2)).await;

        assert_eq!(*seen.lock(), vec!["second".to_string()]);
        assert_eq!(poller.stats().superseded, 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn response_completing_after_newer_issue_is_discarded() {
        let (_tx, rx) = watch::channel(LinkState::Connected);
        let source = FakeSource::scripted(vec![(Duration::from_millis(100), Ok(snap("old")))]);
        let (poller, seen) = recording_poller(source, rx, Duration::from_secs(3600));
        poller.start();
        sleep(Duration::from_millis(10)).await;

        // A newer generation exists by the time the response lands.
        poller.shared.gate.issue();
        sleep(Duration::from_millis(200)).await;

        assert!(seen.lock().is_empty());
        assert_eq!(poller.stats().stale, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_skipped_until_link_connects() {
        let (tx, rx) = watch::channel(LinkState::Disconnected);
        let source = FakeSource::scripted(Vec::new());
        let (poller, seen) = recording_poller(source.clone(), rx, Duration::from_secs(1));
        poller.start();

        sleep(Duration::from_millis(3500)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert!(poller.stats().skipped >= 3);

        tx.send_replace(LinkState::Connected);
        sleep(Duration::from_secs(1)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock(), vec!["idle".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_logged_and_polling_continues() {
        let (_tx, rx) = watch::channel(LinkState::Connected);
        let source = FakeSource::scripted(vec![
            (Duration::ZERO, Err(TelemetryError::Transport("refused".into()))),
            (Duration::ZERO, Ok(snap("recovered"))),
        ]);
        let (poller, seen) = recording_poller(source, rx, Duration::from_secs(1));
        poller.start();
        sleep(Duration::from_millis(1500)).await;

        assert_eq!(*seen.lock(), vec!["recovered".to_string()]);
        assert_eq!(poller.stats().failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_is_not_a_failure() {
        let (_tx, rx) = watch::channel(LinkState::Connected);
        let source = FakeSource::scripted(vec![(Duration::ZERO, Err(TelemetryError::Cancelled))]);
        let (poller, seen) = recording_poller(source, rx, Duration::from_secs(3600));
        poller.start();
        sleep(Duration::from_millis(500)).await;

        assert!(seen.lock().is_empty());
        assert_eq!(poller.stats().failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_in_flight_request() {
        let (_tx, rx) = watch::channel(LinkState::Connected);
        let source = FakeSource::scripted(vec![(Duration::from_secs(5), Ok(snap("late")))]);
        let (poller, seen) = recording_poller(source.clone(), rx, Duration::from_secs(1));
        poller.start();
        sleep(Duration::from_millis(100)).await;

        poller.stop();
        poller.stop();
        assert!(!poller.is_running());
        assert!(!poller.start());
        sleep(Duration::from_secs(10)).await;

        assert_eq!(source.completed.load(Ordering::SeqCst), 0);
        assert!(seen.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn fleet_target_delivers_fleet_snapshots() {
        let (_tx, rx) = watch::channel(LinkState::Connected);
        let source = FakeSource::scripted(Vec::new());
        let fleets = Arc::new(Mutex::new(Vec::new()));
        let sink = fleets.clone();
        let poller = TelemetryPoller::new(
            PollTarget::Fleet,
            source,
            move |_g: u64, output: PollOutput| {
                if let PollOutput::Fleet(fleet) = output {
                    sink.lock().push(fleet.len());
                }
            },
            rx,
        );
        assert!(poller.poll_now());
        sleep(Duration::from_millis(10)).await;
        assert_eq!(*fleets.lock(), vec![2]);
    }
}

//! Traffic-flow monitoring.
//!
//! Each `subscribe` call owns one producer task. The task sleeps on a timer
//! and wakes on three events only: a tick, the subscriber's token being
//! cancelled, or the receiving side going away. Cleanup lives in the
//! [`Registration`] drop guard so it runs on every exit path.
//!
//! ```text
//! subscribe ──► validate ──► register ──► spawn producer
//!                                              │
//!                  tick ──► sample ──► store ──► send
//!                                              │
//!       token cancelled / receiver dropped ──► Registration::drop
//! ```

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_stream::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::application::ports::TelemetrySampler;
use crate::domain::monitor::{LifecycleError, SubscriptionLifecycle, TerminationReason};
use crate::domain::subscription::{SubscriberId, SubscriptionRegistry};
use crate::domain::traffic::{IntersectionStore, TrafficUpdate};
use crate::error::{CityError, ResourceKind, require_id};
use crate::infrastructure::metrics;

/// Default time between two updates.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of updates buffered per subscriber.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Item yielded by a [`TrafficFlowStream`].
pub type FlowItem = Result<TrafficUpdate, CityError>;

/// Tuning for the flow monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Time between two updates.
    pub tick_interval: Duration,
    /// Updates buffered per subscriber before the producer waits.
    pub channel_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

struct Shared {
    intersections: Arc<IntersectionStore>,
    sampler: Arc<dyn TelemetrySampler>,
    registry: SubscriptionRegistry,
    tokens: Mutex<HashMap<SubscriberId, CancellationToken>>,
}

impl Shared {
    fn publish_gauge(&self) {
        metrics::set_active_subscriptions(self.registry.stats().subscriber_count);
    }
}

/// Owns every live traffic-flow subscription.
#[derive(Clone)]
pub struct FlowMonitor {
    shared: Arc<Shared>,
    config: MonitorConfig,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for FlowMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowMonitor")
            .field("config", &self.config)
            .field("active_subscriptions", &self.active_subscriptions())
            .field("shut_down", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl FlowMonitor {
    /// Create a monitor. Cancelling `shutdown` ends every subscription.
    #[must_use]
    pub fn new(
        intersections: Arc<IntersectionStore>,
        sampler: Arc<dyn TelemetrySampler>,
        config: MonitorConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                intersections,
                sampler,
                registry: SubscriptionRegistry::new(),
                tokens: Mutex::new(HashMap::new()),
            }),
            config,
            shutdown,
        }
    }

    /// Start streaming updates for `intersection_id`.
    ///
    /// Validation happens before anything is allocated: a rejected request
    /// leaves no task, timer or registry entry behind.
    ///
    /// # Errors
    ///
    /// `MissingField` for a blank id, `IntersectionNotFound` for an unknown
    /// one.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn subscribe(&self, intersection_id: &str) -> Result<TrafficFlowStream, CityError> {
        let mut lifecycle = SubscriptionLifecycle::new();
        lifecycle.begin_validation().map_err(lifecycle_fault)?;

        let intersection_id = require_id("intersection_id", intersection_id)?;
        if !self.shared.intersections.contains(intersection_id) {
            lifecycle.terminate(TerminationReason::UnknownIntersection);
            debug!(intersection_id, "Rejected subscription for unknown intersection");
            return Err(CityError::not_found(
                ResourceKind::Intersection,
                intersection_id,
            ));
        }
        lifecycle.accept().map_err(lifecycle_fault)?;

        let subscriber = self.register(intersection_id);
        let token = self.shutdown.child_token();
        self.shared.tokens.lock().insert(subscriber, token.clone());
        self.shared.publish_gauge();

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let producer = Producer {
            registration: Registration {
                shared: Arc::clone(&self.shared),
                subscriber,
                intersection_id: intersection_id.to_string(),
                lifecycle,
            },
            tx,
            token: token.clone(),
            period: self.config.tick_interval,
        };
        tokio::spawn(producer.run());

        info!(
            subscriber_id = subscriber,
            intersection_id,
            interval = ?self.config.tick_interval,
            "Traffic flow subscription started"
        );

        Ok(TrafficFlowStream {
            inner: ReceiverStream::new(rx),
            _guard: token.drop_guard(),
            subscriber,
        })
    }

    /// Stop one subscription. Returns `false` for an unknown subscriber.
    pub fn terminate(&self, subscriber: SubscriberId) -> bool {
        let token = self.shared.tokens.lock().get(&subscriber).cloned();
        token.is_some_and(|token| {
            token.cancel();
            true
        })
    }

    /// Stop every subscription, current and future.
    pub fn shutdown(&self) {
        info!(
            active = self.active_subscriptions(),
            "Stopping traffic flow subscriptions"
        );
        self.shutdown.cancel();
    }

    /// Number of running subscriptions.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.shared.registry.stats().subscriber_count
    }

    /// Number of subscriptions watching `intersection_id`.
    #[must_use]
    pub fn watchers(&self, intersection_id: &str) -> usize {
        self.shared.registry.watchers(intersection_id)
    }

    /// Monitor tuning.
    #[must_use]
    pub const fn config(&self) -> MonitorConfig {
        self.config
    }

    fn register(&self, intersection_id: &str) -> SubscriberId {
        loop {
            let candidate = Uuid::new_v4().as_u64_pair().0;
            if self.shared.registry.register(candidate, intersection_id) {
                return candidate;
            }
        }
    }
}

/// Updates for one subscription.
///
/// Dropping the stream closes the channel and cancels the subscription, so
/// the producer stops on its next wake-up.
#[derive(Debug)]
pub struct TrafficFlowStream {
    // Dropped before the guard so the producer sees a closed channel.
    inner: ReceiverStream<FlowItem>,
    _guard: DropGuard,
    subscriber: SubscriberId,
}

impl TrafficFlowStream {
    /// Id of the subscription behind this stream.
    #[must_use]
    pub const fn subscriber_id(&self) -> SubscriberId {
        self.subscriber
    }
}

impl Stream for TrafficFlowStream {
    type Item = FlowItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Registry entry of a running producer; releases it on drop.
struct Registration {
    shared: Arc<Shared>,
    subscriber: SubscriberId,
    intersection_id: String,
    lifecycle: SubscriptionLifecycle,
}

impl Registration {
    fn tick(&mut self) -> Result<TrafficUpdate, CityError> {
        let sample = self
            .shared
            .sampler
            .sample(&self.intersection_id)
            .map_err(|e| CityError::internal(e.to_string()))?;

        self.shared
            .intersections
            .update(&self.intersection_id, |telemetry| telemetry.apply(sample))?;

        let stamp = self
            .lifecycle
            .record_tick(Utc::now())
            .map_err(lifecycle_fault)?;
        metrics::record_monitor_tick();

        Ok(TrafficUpdate {
            intersection_id: self.intersection_id.clone(),
            vehicle_count: sample.vehicle_count,
            congestion_level: sample.congestion_level,
            timestamp: stamp.timestamp,
            sequence: stamp.sequence,
        })
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        // Task dropped by the runtime without finishing.
        self.lifecycle.terminate(TerminationReason::Shutdown);

        self.shared.registry.unregister(self.subscriber);
        self.shared.tokens.lock().remove(&self.subscriber);
        self.shared.publish_gauge();

        let reason = self
            .lifecycle
            .termination_reason()
            .unwrap_or(TerminationReason::Shutdown);
        info!(
            subscriber_id = self.subscriber,
            intersection_id = %self.intersection_id,
            reason = %reason,
            updates = self.lifecycle.ticks(),
            "Traffic flow subscription ended"
        );
    }
}

struct Producer {
    registration: Registration,
    tx: mpsc::Sender<FlowItem>,
    token: CancellationToken,
    period: Duration,
}

impl Producer {
    async fn run(self) {
        let Self {
            mut registration,
            tx,
            token,
            period,
        } = self;

        let outcome =
            AssertUnwindSafe(stream_updates(&mut registration, &tx, &token, period))
                .catch_unwind()
                .await;

        let reason = match outcome {
            Ok(Ok(reason)) => reason,
            Ok(Err(fault)) => {
                error!(
                    subscriber_id = registration.subscriber,
                    error = %fault,
                    "Traffic flow producer failed"
                );
                report_fault(&tx, &token, fault).await;
                TerminationReason::ProducerFault
            }
            Err(_) => {
                error!(
                    subscriber_id = registration.subscriber,
                    "Traffic flow producer panicked"
                );
                report_fault(&tx, &token, CityError::internal("Traffic flow producer failed"))
                    .await;
                TerminationReason::ProducerFault
            }
        };

        registration.lifecycle.terminate(reason);
    }
}

async fn stream_updates(
    registration: &mut Registration,
    tx: &mpsc::Sender<FlowItem>,
    token: &CancellationToken,
    period: Duration,
) -> Result<TerminationReason, CityError> {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => return Ok(stop_reason(tx)),
            () = tx.closed() => return Ok(TerminationReason::Cancelled),
            _ = ticker.tick() => {}
        }

        let update = registration.tick()?;

        tokio::select! {
            biased;
            () = token.cancelled() => return Ok(stop_reason(tx)),
            sent = tx.send(Ok(update)) => {
                if sent.is_err() {
                    return Ok(TerminationReason::Cancelled);
                }
            }
        }
    }
}

/// A closed channel means the client left; otherwise the server stopped us.
fn stop_reason(tx: &mpsc::Sender<FlowItem>) -> TerminationReason {
    if tx.is_closed() {
        TerminationReason::Cancelled
    } else {
        TerminationReason::Shutdown
    }
}

async fn report_fault(tx: &mpsc::Sender<FlowItem>, token: &CancellationToken, fault: CityError) {
    tokio::select! {
        biased;
        () = token.cancelled() => {}
        _ = tx.send(Err(fault)) => {}
    }
}

fn lifecycle_fault(error: LifecycleError) -> CityError {
    CityError::internal(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{MockTelemetrySampler, SamplerError};
    use crate::domain::traffic::{TelemetrySample, sample_intersections};
    use crate::error::ErrorCode;
    use tokio_stream::StreamExt;

    const TICK: Duration = Duration::from_millis(20);
    const WAIT: Duration = Duration::from_secs(2);

    fn fixed_sampler(count: u32, level: f64) -> MockTelemetrySampler {
        let mut sampler = MockTelemetrySampler::new();
        sampler
            .expect_sample()
            .returning(move |_| Ok(TelemetrySample::clamped(count, level)));
        sampler
    }

    fn monitor_with(sampler: MockTelemetrySampler) -> (FlowMonitor, Arc<IntersectionStore>) {
        let store = Arc::new(IntersectionStore::with_entities(sample_intersections()));
        let monitor = FlowMonitor::new(
            Arc::clone(&store),
            Arc::new(sampler),
            MonitorConfig {
                tick_interval: TICK,
                channel_capacity: 4,
            },
            CancellationToken::new(),
        );
        (monitor, store)
    }

    async fn wait_until_idle(monitor: &FlowMonitor) {
        time::timeout(WAIT, async {
            while monitor.active_subscriptions() > 0 {
                time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn unknown_intersection_allocates_nothing() {
        let mut sampler = MockTelemetrySampler::new();
        sampler.expect_sample().never();
        let (monitor, store) = monitor_with(sampler);
        let before = store.list();

        let error = monitor.subscribe("int-999").unwrap_err();

        assert_eq!(error.code(), ErrorCode::IntersectionNotFound);
        assert_eq!(error.message(), "Intersection not found");

        // Nothing may tick after a rejected subscribe.
        time::sleep(TICK * 3).await;
        assert_eq!(monitor.active_subscriptions(), 0);
        assert_eq!(monitor.watchers("int-999"), 0);
        assert_eq!(store.list(), before);
    }

    #[tokio::test]
    async fn blank_intersection_is_rejected() {
        let (monitor, _) = monitor_with(MockTelemetrySampler::new());
        let error = monitor.subscribe("  ").unwrap_err();
        assert_eq!(error.code(), ErrorCode::MissingField);
    }

    #[tokio::test]
    async fn updates_are_sequenced_and_stored() {
        let (monitor, store) = monitor_with(fixed_sampler(12, 0.45));
        let mut stream = monitor.subscribe("int-001").unwrap();
        assert_eq!(monitor.watchers("int-001"), 1);

        let mut updates = Vec::new();
        for _ in 0..3 {
            let item = time::timeout(WAIT, stream.next()).await.unwrap().unwrap();
            updates.push(item.unwrap());
        }

        let sequences: Vec<u64> = updates.iter().map(|u| u.sequence).collect();
        assert_eq!(sequences, [1, 2, 3]);
        assert!(updates.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert!(updates.iter().all(|u| u.intersection_id == "int-001"));

        let stored = store.get("int-001").unwrap();
        assert_eq!(stored.vehicle_count, 12);
        assert!((stored.congestion_level - 0.45).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn first_update_waits_one_interval() {
        let mut sampler = MockTelemetrySampler::new();
        sampler.expect_sample().never();
        let store = Arc::new(IntersectionStore::with_entities(sample_intersections()));
        let monitor = FlowMonitor::new(
            store,
            Arc::new(sampler),
            MonitorConfig {
                tick_interval: Duration::from_secs(60),
                channel_capacity: 1,
            },
            CancellationToken::new(),
        );

        let mut stream = tokio_test::task::spawn(monitor.subscribe("int-001").unwrap());
        tokio::task::yield_now().await;

        tokio_test::assert_pending!(stream.poll_next());
        assert_eq!(monitor.active_subscriptions(), 1);
    }

    #[tokio::test]
    async fn dropping_stream_releases_subscription() {
        let (monitor, _) = monitor_with(fixed_sampler(5, 0.1));
        let mut stream = monitor.subscribe("int-002").unwrap();
        time::timeout(WAIT, stream.next()).await.unwrap().unwrap().unwrap();

        drop(stream);
        wait_until_idle(&monitor).await;

        assert_eq!(monitor.watchers("int-002"), 0);
    }

    #[tokio::test]
    async fn terminate_ends_stream() {
        let (monitor, _) = monitor_with(fixed_sampler(5, 0.1));
        let mut stream = monitor.subscribe("int-001").unwrap();

        assert!(monitor.terminate(stream.subscriber_id()));
        assert!(!monitor.terminate(stream.subscriber_id().wrapping_add(1)));

        let mut remaining = 0;
        while let Some(item) = time::timeout(WAIT, stream.next()).await.unwrap() {
            item.unwrap();
            remaining += 1;
        }
        assert!(remaining <= 4);
        wait_until_idle(&monitor).await;
    }

    #[tokio::test]
    async fn shutdown_ends_every_stream() {
        let (monitor, _) = monitor_with(fixed_sampler(5, 0.1));
        let mut first = monitor.subscribe("int-001").unwrap();
        let mut second = monitor.subscribe("int-002").unwrap();
        assert_eq!(monitor.active_subscriptions(), 2);

        monitor.shutdown();

        for stream in [&mut first, &mut second] {
            while let Some(item) = time::timeout(WAIT, stream.next()).await.unwrap() {
                item.unwrap();
            }
        }
        wait_until_idle(&monitor).await;
    }

    #[tokio::test]
    async fn sampler_failure_is_reported_as_internal() {
        let mut sampler = MockTelemetrySampler::new();
        sampler.expect_sample().returning(|id| {
            Err(SamplerError {
                intersection_id: id.to_string(),
                reason: "sensor offline".to_string(),
            })
        });
        let (monitor, _) = monitor_with(sampler);
        let mut stream = monitor.subscribe("int-001").unwrap();

        let error = time::timeout(WAIT, stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap_err();
        assert_eq!(error.code(), ErrorCode::Internal);

        assert!(time::timeout(WAIT, stream.next()).await.unwrap().is_none());
        wait_until_idle(&monitor).await;
    }

    #[tokio::test]
    async fn producer_panic_is_contained() {
        let mut sampler = MockTelemetrySampler::new();
        sampler
            .expect_sample()
            .returning(|_| panic!("sensor driver crashed"));
        let (monitor, _) = monitor_with(sampler);
        let mut stream = monitor.subscribe("int-002").unwrap();

        let error = time::timeout(WAIT, stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap_err();
        assert_eq!(error.code(), ErrorCode::Internal);
        assert_eq!(error.message(), "Traffic flow producer failed");

        assert!(time::timeout(WAIT, stream.next()).await.unwrap().is_none());
        wait_until_idle(&monitor).await;
    }
}

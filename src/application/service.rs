use std::future::Future;
use std::sync::Arc;

use futures::Stream;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{info, warn};

use crate::domain::entities::{CaptureConfig, KnockEvent, KnockerSpec};
use crate::domain::errors::EngineError;
use crate::domain::ports::capture::EventSource;
use crate::domain::ports::trigger::Trigger;
use crate::domain::services::{EngineStats, KnockEngine};
use crate::infrastructure::fanout::EventFanout;

// ============================================================================
// KNOCK SERVICE
// ============================================================================

/// Wires one capture to every configured knocker.
///
/// Each knocker gets its own engine task. With more than one knocker the
/// capture is fanned out so every engine sees every event.
pub struct KnockService {
    source: Arc<dyn EventSource + Send + Sync>,
    capture: CaptureConfig,
    knockers: Vec<(KnockerSpec, Arc<dyn Trigger>)>,
}

/// How a session ended
#[derive(Debug, Default)]
pub struct SessionReport {
    /// Final statistics per knocker, in the order knockers finished
    pub engines: Vec<(String, EngineStats)>,
    /// Whether an engine saw the event stream end rather than being stopped
    pub stream_closed: bool,
}

type EngineOutcome = (String, Result<EngineStats, EngineError>, EngineStats);

impl KnockService {
    pub fn new(source: Arc<dyn EventSource + Send + Sync>, capture: CaptureConfig) -> Self {
        Self {
            source,
            capture,
            knockers: Vec::new(),
        }
    }

    pub fn with_knocker(mut self, spec: KnockerSpec, trigger: Arc<dyn Trigger>) -> Self {
        self.knockers.push((spec, trigger));
        self
    }

    pub fn knocker_count(&self) -> usize {
        self.knockers.len()
    }

    /// Run until Ctrl-C or until the event stream closes.
    pub async fn run(self) -> crate::Result<SessionReport> {
        self.run_until(ctrl_c()).await
    }

    /// Run until `shutdown` resolves or until the event stream closes.
    pub async fn run_until<F>(self, shutdown: F) -> crate::Result<SessionReport>
    where
        F: Future<Output = ()>,
    {
        if self.knockers.is_empty() {
            return Err("No knockers configured".into());
        }

        let mut handle = self.source.start_capture(&self.capture).await?;
        handle.wait_ready().await?;
        info!(
            capture = %handle.id,
            source = %self.capture.describe_source(),
            knockers = self.knockers.len(),
            "capture ready"
        );

        let events = handle
            .take_events()
            .ok_or("Capture events were already taken")?;

        let receivers = if self.knockers.len() == 1 {
            vec![events]
        } else {
            let mut fanout = EventFanout::new(self.capture.channel_capacity);
            let receivers: Vec<_> = self.knockers.iter().map(|_| fanout.subscribe()).collect();
            fanout.start(events);
            receivers
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut engines = JoinSet::new();

        for ((spec, trigger), events) in self.knockers.into_iter().zip(receivers) {
            info!(knocker = %spec.name, sequence = %spec.sequence, selector = %spec.selector, "engine started");
            engines.spawn(run_engine(spec, trigger, events, stop_rx.clone()));
        }

        let mut report = SessionReport::default();
        let mut stopping = false;

        // A closed source closes every engine queue, so engines drain what
        // is already queued and finish on their own. Only an explicit
        // shutdown cuts them short.
        futures::pin_mut!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown, if !stopping => {
                    info!("shutdown requested");
                    stopping = true;
                    let _ = stop_tx.send(true);
                }
                joined = engines.join_next() => match joined {
                    Some(joined) => record(&mut report, joined),
                    None => break,
                },
            }
        }

        handle.stop();
        Ok(report)
    }
}

async fn run_engine(
    spec: KnockerSpec,
    trigger: Arc<dyn Trigger>,
    events: mpsc::Receiver<KnockEvent>,
    mut stop: watch::Receiver<bool>,
) -> EngineOutcome {
    let name = spec.name.clone();
    let mut engine = KnockEngine::new(spec);

    let stopped = async move {
        loop {
            if *stop.borrow_and_update() {
                break;
            }
            // A dropped sender also means stop
            if stop.changed().await.is_err() {
                break;
            }
        }
    };

    let result = engine
        .run_until(receiver_stream(events), trigger.as_ref(), stopped)
        .await;
    (name, result, engine.stats())
}

fn receiver_stream(rx: mpsc::Receiver<KnockEvent>) -> impl Stream<Item = KnockEvent> {
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (event, rx))
    })
}

fn record(report: &mut SessionReport, joined: Result<EngineOutcome, JoinError>) {
    match joined {
        Ok((name, Ok(stats), _)) => {
            info!(knocker = %name, completions = stats.completions, events = stats.events_seen, "engine stopped");
            report.engines.push((name, stats));
        }
        Ok((name, Err(EngineError::StreamClosed), stats)) => {
            warn!(knocker = %name, completions = stats.completions, "event stream closed");
            report.stream_closed = true;
            report.engines.push((name, stats));
        }
        Err(e) => warn!(error = %e, "engine task failed"),
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "unable to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::{oneshot, Notify};

    use crate::domain::entities::{KnockerBuilder, PortSelector};
    use crate::domain::errors::CaptureError;
    use crate::domain::ports::capture::{CaptureHandle, CaptureTool};
    use crate::domain::ports::trigger::FnTrigger;

    /// Replays a fixed list of events, optionally keeping the stream open.
    struct ScriptedSource {
        events: Vec<KnockEvent>,
        failure: Mutex<Option<CaptureError>>,
        hold_open: bool,
    }

    impl ScriptedSource {
        fn new(events: Vec<KnockEvent>) -> Self {
            Self {
                events,
                failure: Mutex::new(None),
                hold_open: false,
            }
        }
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        async fn start_capture(&self, config: &CaptureConfig) -> crate::Result<CaptureHandle> {
            let (ready_tx, ready_rx) = oneshot::channel();
            let (tx, rx) = mpsc::channel(config.channel_capacity);
            let handle = CaptureHandle::new(config.capture_type.clone(), ready_rx, rx);

            if let Some(failure) = self.failure.lock().unwrap().take() {
                let _ = ready_tx.send(Err(failure));
                return Ok(handle);
            }

            let _ = ready_tx.send(Ok(()));
            let events = self.events.clone();
            let hold_open = self.hold_open;
            let task = tokio::spawn(async move {
                for event in events {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
                if hold_open {
                    std::future::pending::<()>().await;
                }
            });
            Ok(handle.with_task(task.abort_handle()))
        }

        fn check_availability(&self) -> crate::Result<CaptureTool> {
            Ok(CaptureTool {
                tshark_available: true,
                tshark_version: None,
            })
        }
    }

    fn host(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn capture() -> CaptureConfig {
        CaptureConfig::new("lo", Ipv4Addr::LOCALHOST, 1600, 8).unwrap()
    }

    fn counting_trigger(counter: Arc<AtomicUsize>) -> Arc<dyn Trigger> {
        Arc::new(FnTrigger::new(move |_: &KnockEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[tokio::test]
    async fn test_single_knocker_reports_stream_closed() {
        let events = vec![
            KnockEvent::new(host(1), 100, 5000),
            KnockEvent::new(host(1), 200, 5000),
            KnockEvent::new(host(1), 300, 5000),
        ];
        let fired = Arc::new(AtomicUsize::new(0));
        let spec = KnockerBuilder::new().name("ssh").sequence([100, 200, 300]).build().unwrap();

        let report = KnockService::new(Arc::new(ScriptedSource::new(events)), capture())
            .with_knocker(spec, counting_trigger(fired.clone()))
            .run_until(std::future::pending())
            .await
            .unwrap();

        assert!(report.stream_closed);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(report.engines.len(), 1);
        assert_eq!(report.engines[0].1.completions, 1);
    }

    #[tokio::test]
    async fn test_two_knockers_share_one_capture() {
        // dst sequence 100,200 and src sequence 7,8 arrive interleaved
        let events = vec![
            KnockEvent::new(host(1), 100, 1),
            KnockEvent::new(host(2), 9999, 7),
            KnockEvent::new(host(1), 200, 2),
            KnockEvent::new(host(2), 9999, 8),
        ];
        let dst_fired = Arc::new(AtomicUsize::new(0));
        let src_fired = Arc::new(AtomicUsize::new(0));
        let dst = KnockerBuilder::new().name("dst").sequence([100, 200]).build().unwrap();
        let src = KnockerBuilder::new()
            .name("src")
            .sequence([7, 8])
            .selector(PortSelector::Source)
            .build()
            .unwrap();

        let service = KnockService::new(Arc::new(ScriptedSource::new(events)), capture())
            .with_knocker(dst, counting_trigger(dst_fired.clone()))
            .with_knocker(src, counting_trigger(src_fired.clone()));
        assert_eq!(service.knocker_count(), 2);

        let report = service.run_until(std::future::pending()).await.unwrap();

        assert!(report.stream_closed);
        assert_eq!(report.engines.len(), 2);
        assert_eq!(dst_fired.load(Ordering::SeqCst), 1);
        assert_eq!(src_fired.load(Ordering::SeqCst), 1);
    }

    /// Sleeps before counting, so its engine lags behind the capture.
    struct SlowTrigger {
        fired: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Trigger for SlowTrigger {
        async fn invoke(&self, _event: &KnockEvent) {
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
            self.fired.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_lagging_engine_drains_after_capture_ends() {
        let events = (0..100u16)
            .map(|i| {
                if i % 2 == 0 {
                    KnockEvent::new(host(4), 100, 7)
                } else {
                    KnockEvent::new(host(4), 200, 8)
                }
            })
            .collect();
        let dst_fired = Arc::new(AtomicUsize::new(0));
        let src_fired = Arc::new(AtomicUsize::new(0));
        let dst = KnockerBuilder::new().name("dst").sequence([100, 200]).build().unwrap();
        let src = KnockerBuilder::new()
            .name("src")
            .sequence([7, 8])
            .selector(PortSelector::Source)
            .build()
            .unwrap();

        let report = KnockService::new(Arc::new(ScriptedSource::new(events)), capture())
            .with_knocker(dst, counting_trigger(dst_fired.clone()))
            .with_knocker(src, Arc::new(SlowTrigger { fired: src_fired.clone() }))
            .run_until(std::future::pending())
            .await
            .unwrap();

        assert!(report.stream_closed);
        assert_eq!(dst_fired.load(Ordering::SeqCst), 50);
        assert_eq!(src_fired.load(Ordering::SeqCst), 50);
        assert!(report.engines.iter().all(|(_, stats)| stats.events_seen == 100));
    }

    #[tokio::test]
    async fn test_readiness_failure_is_returned() {
        let source = ScriptedSource::new(Vec::new());
        *source.failure.lock().unwrap() = Some(CaptureError::ToolUnavailable("tshark".to_string()));
        let spec = KnockerBuilder::new().knock(1).build().unwrap();

        let err = KnockService::new(Arc::new(source), capture())
            .with_knocker(spec, counting_trigger(Arc::new(AtomicUsize::new(0))))
            .run_until(std::future::pending())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("tshark"));
    }

    #[tokio::test]
    async fn test_shutdown_stops_engines_on_open_stream() {
        let mut source = ScriptedSource::new(vec![
            KnockEvent::new(host(3), 1, 1),
            KnockEvent::new(host(3), 2, 1),
        ]);
        source.hold_open = true;

        let completed = Arc::new(Notify::new());
        let notify = completed.clone();
        let trigger: Arc<dyn Trigger> = Arc::new(FnTrigger::new(move |_: &KnockEvent| {
            notify.notify_one();
        }));
        let spec = KnockerBuilder::new().sequence([1, 2]).build().unwrap();

        let report = KnockService::new(Arc::new(source), capture())
            .with_knocker(spec, trigger)
            .run_until(async move { completed.notified().await })
            .await
            .unwrap();

        assert!(!report.stream_closed);
        assert_eq!(report.engines[0].1.completions, 1);
    }

    #[tokio::test]
    async fn test_no_knockers_is_an_error() {
        let result = KnockService::new(Arc::new(ScriptedSource::new(Vec::new())), capture())
            .run_until(std::future::pending())
            .await;
        assert!(result.is_err());
    }
}

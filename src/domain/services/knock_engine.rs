use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::future::Future;
use std::net::IpAddr;

use futures::{Stream, StreamExt};
use tracing::{debug, info, trace};

use crate::domain::entities::{HostProgress, KnockEvent, KnockerSpec};
use crate::domain::errors::EngineError;
use crate::domain::ports::Trigger;

// ============================================================================
// KNOCK DETECTION ENGINE
// ============================================================================

/// What a single event did to its host's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnockOutcome {
    /// The port matched and the host now has `matched` ports in a row.
    Advanced { matched: usize },
    /// The port finished the sequence. Progress is back at zero.
    Completed,
    /// The port did not match; `lost` ports of progress were discarded.
    Reset { lost: usize },
    /// The port did not match and the host had no progress to lose.
    Ignored,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub events_seen: u64,
    pub advances: u64,
    pub resets: u64,
    pub completions: u64,
    pub evictions: u64,
    pub tracked_hosts: usize,
}

#[derive(Debug, Clone, Copy)]
struct Progress {
    matched: usize,
    last_advanced: u64,
}

/// Per-source-address knock state machine for one expected sequence.
///
/// Each address sits somewhere in `0..sequence.len()`. A matching port moves
/// it forward, anything else sends it back to zero, and reaching the end
/// fires the trigger and starts over. The mismatching port itself is never
/// re-evaluated as a fresh first knock.
///
/// Only addresses with non-zero progress are stored, because an absent entry
/// behaves exactly like one at zero. The table is unbounded unless the knocker
/// sets `max_tracked_hosts`, in which case the host that advanced least
/// recently is evicted to make room.
///
/// The engine is single-writer: it owns its table and is driven from one
/// task. Running several engines over one capture needs an explicit fan-out
/// so each engine sees every event.
pub struct KnockEngine {
    spec: KnockerSpec,
    hosts: HashMap<IpAddr, Progress>,
    /// `last_advanced` -> address, oldest first; mirrors `hosts`
    by_age: BTreeMap<u64, IpAddr>,
    clock: u64,
    stats: EngineStats,
}

impl KnockEngine {
    pub fn new(spec: KnockerSpec) -> Self {
        Self {
            spec,
            hosts: HashMap::new(),
            by_age: BTreeMap::new(),
            clock: 0,
            stats: EngineStats::default(),
        }
    }

    pub fn spec(&self) -> &KnockerSpec {
        &self.spec
    }

    pub fn progress(&self, source_address: IpAddr) -> HostProgress {
        HostProgress {
            source_address,
            matched_count: self.hosts.get(&source_address).map_or(0, |p| p.matched),
        }
    }

    pub fn tracked_hosts(&self) -> usize {
        self.hosts.len()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            tracked_hosts: self.hosts.len(),
            ..self.stats.clone()
        }
    }

    /// Apply one event to the state machine without running any trigger.
    pub fn observe(&mut self, event: &KnockEvent) -> KnockOutcome {
        self.stats.events_seen += 1;

        let address = event.source_address;
        let observed = self.spec.selector.select(event);
        let matched = self.hosts.get(&address).map_or(0, |p| p.matched);

        match self.spec.sequence.port_at(matched) {
            Some(expected) if expected == observed => {
                let next = matched + 1;
                if next == self.spec.sequence.len() {
                    self.forget(address);
                    self.stats.completions += 1;
                    return KnockOutcome::Completed;
                }

                if matched == 0 {
                    self.make_room();
                }
                self.clock += 1;
                let previous = self.hosts.insert(
                    address,
                    Progress {
                        matched: next,
                        last_advanced: self.clock,
                    },
                );
                if let Some(previous) = previous {
                    self.by_age.remove(&previous.last_advanced);
                }
                self.by_age.insert(self.clock, address);
                self.stats.advances += 1;
                KnockOutcome::Advanced { matched: next }
            }
            _ => match self.forget(address) {
                Some(progress) => {
                    self.stats.resets += 1;
                    KnockOutcome::Reset {
                        lost: progress.matched,
                    }
                }
                None => KnockOutcome::Ignored,
            },
        }
    }

    /// Consume `events` until the stream ends.
    ///
    /// Never returns `Ok`: a closed stream is the only way out.
    pub async fn run<S, T>(&mut self, events: S, trigger: &T) -> Result<Infallible, EngineError>
    where
        S: Stream<Item = KnockEvent>,
        T: Trigger + ?Sized,
    {
        futures::pin_mut!(events);

        while let Some(event) = events.next().await {
            self.handle(event, trigger).await;
        }

        debug!(knocker = %self.spec.name, "event stream closed");
        Err(EngineError::StreamClosed)
    }

    /// Like [`run`](Self::run), but stops cleanly once `shutdown` resolves.
    ///
    /// A trigger that is already running is allowed to finish first.
    pub async fn run_until<S, T, F>(
        &mut self,
        events: S,
        trigger: &T,
        shutdown: F,
    ) -> Result<EngineStats, EngineError>
    where
        S: Stream<Item = KnockEvent>,
        T: Trigger + ?Sized,
        F: Future<Output = ()>,
    {
        futures::pin_mut!(events);
        futures::pin_mut!(shutdown);

        loop {
            let next = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    debug!(knocker = %self.spec.name, "engine stopped");
                    return Ok(self.stats());
                }
                next = events.next() => next,
            };

            match next {
                Some(event) => self.handle(event, trigger).await,
                None => {
                    debug!(knocker = %self.spec.name, "event stream closed");
                    return Err(EngineError::StreamClosed);
                }
            }
        }
    }

    async fn handle<T>(&mut self, event: KnockEvent, trigger: &T)
    where
        T: Trigger + ?Sized,
    {
        match self.observe(&event) {
            KnockOutcome::Completed => {
                info!(
                    knocker = %self.spec.name,
                    source = %event.source_address,
                    sequence = %self.spec.sequence,
                    "knock sequence completed"
                );
                trigger.invoke(&event).await;
            }
            KnockOutcome::Advanced { matched } => {
                trace!(
                    knocker = %self.spec.name,
                    source = %event.source_address,
                    matched,
                    "knock accepted"
                );
            }
            KnockOutcome::Reset { lost } => {
                debug!(
                    knocker = %self.spec.name,
                    source = %event.source_address,
                    lost,
                    "knock sequence broken"
                );
            }
            KnockOutcome::Ignored => {}
        }
    }

    fn forget(&mut self, address: IpAddr) -> Option<Progress> {
        let progress = self.hosts.remove(&address)?;
        self.by_age.remove(&progress.last_advanced);
        Some(progress)
    }

    fn make_room(&mut self) {
        let Some(limit) = self.spec.max_tracked_hosts else {
            return;
        };

        while self.hosts.len() >= limit.max(1) {
            let Some((_, addr)) = self.by_age.pop_first() else {
                break;
            };

            self.hosts.remove(&addr);
            self.stats.evictions += 1;
            debug!(knocker = %self.spec.name, evicted = %addr, "host table full");
        }
    }
}

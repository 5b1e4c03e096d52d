//! Engagement-driven chart rebuilds.
//!
//! Interactions ask for a rebuild through a cheap, cloneable
//! [`ChartRebuildTrigger`]. A single [`RebuildWorker`] owns the decision:
//! views always rebuild, other reasons wait for a per-category cooldown and
//! get one trailing build when it expires. At most one build per category
//! runs at a time; later requests fold into one pending rebuild.

use super::builder::ChartBuilder;
use super::models::ChartQuery;
use crate::catalog::ChartCategory;
use crate::server::metrics;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const REQUEST_QUEUE_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildReason {
    View,
    Engagement,
    CatalogChange,
}

/// Cooldown bookkeeping per category.
#[derive(Debug)]
pub struct RebuildGate {
    cooldown: Duration,
    last_started: HashMap<ChartCategory, Instant>,
}

impl RebuildGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_started: HashMap::new(),
        }
    }

    pub fn admit(&self, category: ChartCategory, reason: RebuildReason, now: Instant) -> bool {
        if reason == RebuildReason::View {
            return true;
        }
        self.last_started
            .get(&category)
            .map_or(true, |started| now.duration_since(*started) >= self.cooldown)
    }

    /// When a non-view request for `category` would next be admitted.
    pub fn ready_at(&self, category: ChartCategory, now: Instant) -> Instant {
        self.last_started
            .get(&category)
            .map_or(now, |started| (*started + self.cooldown).max(now))
    }

    pub fn mark_started(&mut self, category: ChartCategory, now: Instant) {
        self.last_started.insert(category, now);
    }
}

#[derive(Debug, Clone, Copy)]
struct RebuildRequest {
    category: ChartCategory,
    reason: RebuildReason,
}

#[derive(Clone)]
pub struct ChartRebuildTrigger {
    sender: mpsc::Sender<RebuildRequest>,
}

impl ChartRebuildTrigger {
    /// Never waits. A full queue already holds enough work to cover this request.
    pub fn request(&self, category: ChartCategory, reason: RebuildReason) {
        match self.sender.try_send(RebuildRequest { category, reason }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                metrics::record_rebuild_coalesced();
                debug!("Rebuild queue full, dropping {:?} request for {}", reason, category);
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Rebuild worker stopped, ignoring request for {}", category);
            }
        }
    }
}

pub struct RebuildWorker {
    builder: Arc<ChartBuilder>,
    receiver: mpsc::Receiver<RebuildRequest>,
    gate: RebuildGate,
    in_flight: HashSet<ChartCategory>,
    pending: HashSet<ChartCategory>,
    /// Categories owed a build once their cooldown expires.
    deferred: HashMap<ChartCategory, Instant>,
    done_tx: mpsc::UnboundedSender<ChartCategory>,
    done_rx: mpsc::UnboundedReceiver<ChartCategory>,
    shutdown: CancellationToken,
}

pub fn rebuild_channel(
    builder: Arc<ChartBuilder>,
    cooldown: Duration,
    shutdown: CancellationToken,
) -> (ChartRebuildTrigger, RebuildWorker) {
    let (sender, receiver) = mpsc::channel(REQUEST_QUEUE_SIZE);
    let (done_tx, done_rx) = mpsc::unbounded_channel();
    (
        ChartRebuildTrigger { sender },
        RebuildWorker {
            builder,
            receiver,
            gate: RebuildGate::new(cooldown),
            in_flight: HashSet::new(),
            pending: HashSet::new(),
            deferred: HashMap::new(),
            done_tx,
            done_rx,
            shutdown,
        },
    )
}

impl RebuildWorker {
    pub async fn run(mut self) {
        info!("Chart rebuild worker started");
        loop {
            let next_deferred = self.deferred.values().min().copied();
            let wake_at =
                tokio::time::Instant::from_std(next_deferred.unwrap_or_else(Instant::now));
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                Some(category) = self.done_rx.recv() => self.on_build_finished(category),
                _ = tokio::time::sleep_until(wake_at), if next_deferred.is_some() => {
                    self.run_deferred(Instant::now());
                }
                request = self.receiver.recv() => match request {
                    Some(request) => self.on_request(request),
                    None => break,
                },
            }
        }
        info!("Chart rebuild worker stopped");
    }

    fn on_request(&mut self, request: RebuildRequest) {
        let category = request.category;
        let now = Instant::now();
        if !self.gate.admit(category, request.reason, now) {
            metrics::record_rebuild_coalesced();
            let due = self.gate.ready_at(category, now);
            if self.deferred.insert(category, due).is_none() {
                debug!("{} rebuild within cooldown, deferred", category);
            }
            return;
        }
        self.deferred.remove(&category);
        if self.in_flight.contains(&category) {
            metrics::record_rebuild_coalesced();
            self.pending.insert(category);
            return;
        }
        self.spawn_build(category);
    }

    fn run_deferred(&mut self, now: Instant) {
        let due: Vec<ChartCategory> = self
            .deferred
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(category, _)| *category)
            .collect();
        for category in due {
            self.deferred.remove(&category);
            if self.in_flight.contains(&category) {
                self.pending.insert(category);
            } else {
                self.spawn_build(category);
            }
        }
    }

    fn on_build_finished(&mut self, category: ChartCategory) {
        self.in_flight.remove(&category);
        if self.pending.remove(&category) {
            self.spawn_build(category);
        }
    }

    fn spawn_build(&mut self, category: ChartCategory) {
        self.gate.mark_started(category, Instant::now());
        self.in_flight.insert(category);

        let builder = self.builder.clone();
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            let query = ChartQuery::new(category, builder.settings().default_limit);
            let items = builder.build_chart(&query).await;
            debug!("Rebuilt {} chart, {} items", category, items.len());
            if done.send(category).is_err() {
                warn!("Rebuild worker gone before {} build finished", category);
            }
        });
    }
}

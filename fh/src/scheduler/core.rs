//! Engine - the bounded-concurrency scheduling loop

use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;

use eyre::{Result, eyre};
use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::progress::UnitProgress;
use crate::workflow::{Step, Workflow};

use super::config::EngineConfig;
use super::gate::ConcurrencyGate;
use super::table::{UnitPhase, UnitTable};

/// Statistics for one engine run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EngineStats {
    pub total_scheduled: u64,
    pub total_forwarded: u64,
    pub total_exhausted: u64,
    pub peak_concurrent: usize,
}

type AdvanceOutput<W> = (W, Result<Step>);

/// Drives one workflow per entity under a hard concurrency ceiling
///
/// Each pass admits idle units while the gate has room, waits for the first
/// in-flight advance to finish, then handles every advance that finished by
/// that point in unit-table order. Successful advances are forwarded with
/// fresh [`AggregateCounters`](crate::progress::AggregateCounters); exhausted
/// units are retired; any error ends the run.
///
/// An engine runs once. After it returns `None` build a new one.
pub struct Engine<K, W> {
    table: UnitTable<K, W>,
    gate: ConcurrencyGate,
    tasks: JoinSet<AdvanceOutput<W>>,
    task_units: HashMap<Id, usize>,
    ready: VecDeque<Result<UnitProgress<K>>>,
    stats: EngineStats,
    finished: bool,
}

impl<K, W> Engine<K, W>
where
    K: Clone + Eq + Hash + Debug + Send + 'static,
    W: Workflow,
{
    /// Build an engine, creating one workflow per identifier
    ///
    /// Identifiers keep the caller's order (reversed if configured). A repeated
    /// identifier is ignored after its first occurrence.
    pub fn new(ids: impl IntoIterator<Item = K>, mut factory: impl FnMut(&K) -> W, config: EngineConfig) -> Result<Self> {
        Self::try_new(ids, |key| Ok(factory(key)), config)
    }

    /// Like [`new`](Self::new) with a factory that can fail
    pub fn try_new(
        ids: impl IntoIterator<Item = K>,
        mut factory: impl FnMut(&K) -> Result<W>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        debug!(?config, "Engine::try_new: called");

        let mut ids: Vec<K> = ids.into_iter().collect();
        if config.reverse {
            ids.reverse();
        }

        let mut table = UnitTable::new();
        for key in ids {
            if table.position(&key).is_some() {
                warn!(unit = ?key, "Duplicate unit ignored");
                continue;
            }
            let workflow = factory(&key)?;
            let outstanding = workflow.remaining_work();
            table.insert(key, workflow, outstanding);
        }
        if table.is_empty() {
            info!("Engine created without units");
        }
        info!(
            units = table.len(),
            max_concurrency = config.max_concurrency,
            outstanding = table.total_outstanding(),
            "Engine created"
        );

        Ok(Self {
            gate: ConcurrencyGate::new(config.max_concurrency),
            table,
            tasks: JoinSet::new(),
            task_units: HashMap::new(),
            ready: VecDeque::new(),
            stats: EngineStats::default(),
            finished: false,
        })
    }

    /// Produce the next forwarded snapshot
    ///
    /// Returns `None` once every unit is exhausted, or after a fatal error has
    /// been returned.
    pub async fn next(&mut self) -> Option<Result<UnitProgress<K>>> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Some(item);
            }
            if self.finished {
                return None;
            }

            self.admit();

            if self.tasks.is_empty() {
                debug!("Engine::next: nothing scheduled, finishing");
                self.finished = true;
                info!(?self.stats, "Engine finished");
                return None;
            }

            let mut batch = Vec::new();
            if let Some(first) = self.tasks.join_next_with_id().await {
                batch.push(first);
            }
            while let Some(more) = self.tasks.try_join_next_with_id() {
                batch.push(more);
            }
            debug!(completed = batch.len(), "Engine::next: advances finished");
            self.complete(batch);
        }
    }

    /// Admit idle units while the gate has free slots
    fn admit(&mut self) {
        for pos in self.table.idle_positions() {
            if self.gate.is_full() || !self.gate.try_acquire() {
                debug!(held = self.gate.held(), "Engine::admit: gate full, stop admitting");
                break;
            }
            let Some(mut workflow) = self.table.schedule(pos) else {
                self.gate.release();
                continue;
            };
            let handle = self.tasks.spawn(async move {
                let result = workflow.advance().await;
                (workflow, result)
            });
            self.task_units.insert(handle.id(), pos);

            self.stats.total_scheduled += 1;
            self.stats.peak_concurrent = self.stats.peak_concurrent.max(self.gate.held());
            debug!(unit = ?self.table.key(pos), held = self.gate.held(), "Engine::admit: scheduled");
        }
    }

    /// Handle finished advances in unit-table order
    fn complete(&mut self, batch: Vec<Result<(Id, AdvanceOutput<W>), JoinError>>) {
        let mut finished: Vec<(usize, Result<AdvanceOutput<W>, JoinError>)> = batch
            .into_iter()
            .filter_map(|joined| {
                let (id, outcome) = match joined {
                    Ok((id, output)) => (id, Ok(output)),
                    Err(err) => (err.id(), Err(err)),
                };
                self.task_units.remove(&id).map(|pos| (pos, outcome))
            })
            .collect();
        finished.sort_by_key(|(pos, _)| *pos);

        let mut pending = finished.into_iter();
        while let Some((pos, outcome)) = pending.next() {
            self.gate.release();
            let unit = self.table.key(pos).clone();

            match outcome {
                Ok((_, Ok(Step::Exhausted))) => {
                    self.table.exhaust(pos);
                    self.stats.total_exhausted += 1;
                    info!(unit = ?unit, remaining = self.table.remaining_count(), "Unit exhausted");
                }
                Ok((workflow, Ok(Step::Yield(snapshot)))) => {
                    let outstanding = workflow.remaining_work();
                    self.table.restore(pos, workflow, outstanding);
                    let counters = self.table.counters(self.gate.held());
                    self.stats.total_forwarded += 1;
                    debug!(unit = ?unit, ?counters, "Engine::complete: forwarding snapshot");
                    self.ready.push_back(Ok(UnitProgress {
                        unit,
                        snapshot,
                        counters,
                    }));
                }
                Ok((_, Err(err))) => {
                    error!(unit = ?unit, error = %err, "Workflow failed, stopping engine");
                    self.table.abandon(pos);
                    // Slots of advances finished in this batch but not handled yet
                    for (rest, _) in pending.by_ref() {
                        self.gate.release();
                        self.table.abandon(rest);
                    }
                    self.fail(err);
                    return;
                }
                Err(join_err) => {
                    error!(unit = ?unit, error = %join_err, "Workflow task died, stopping engine");
                    self.table.abandon(pos);
                    for (rest, _) in pending.by_ref() {
                        self.gate.release();
                        self.table.abandon(rest);
                    }
                    self.fail(eyre!("advance of unit {:?} did not finish: {}", unit, join_err));
                    return;
                }
            }
        }
    }

    /// Abort sibling advances, release their slots and queue the error
    fn fail(&mut self, err: eyre::Report) {
        self.abort_in_flight();
        self.ready.push_back(Err(err));
    }

    /// Stop scheduling for good, abandoning every advance still in flight
    fn abort_in_flight(&mut self) {
        debug!(in_flight = self.task_units.len(), "Engine::abort_in_flight: called");
        self.tasks.abort_all();
        for (_, pos) in self.task_units.drain() {
            self.gate.release();
            self.table.abandon(pos);
        }
        self.finished = true;
    }

    /// Drive the engine to completion, pushing every snapshot to `tx`
    pub async fn run(mut self, tx: mpsc::Sender<UnitProgress<K>>) -> Result<EngineStats> {
        debug!("Engine::run: called");
        while let Some(item) = self.next().await {
            let progress = item?;
            if tx.send(progress).await.is_err() {
                warn!("Consumer went away, aborting engine");
                self.abort_in_flight();
                return Err(eyre!("Consumer channel closed"));
            }
        }
        Ok(self.stats)
    }

    /// Adapt the engine into a stream of forwarded snapshots
    pub fn into_stream(self) -> impl Stream<Item = Result<UnitProgress<K>>> {
        futures::stream::unfold(self, |mut engine| async move {
            let item = engine.next().await?;
            Some((item, engine))
        })
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Number of units being advanced right now
    pub fn running_count(&self) -> usize {
        self.table.scheduled_count()
    }

    pub fn unit_phase(&self, key: &K) -> Option<UnitPhase> {
        self.table.phase(key)
    }

    /// Completed advances of a unit that were forwarded
    pub fn unit_advances(&self, key: &K) -> Option<u64> {
        self.table.advances(key)
    }

    pub fn is_finished(&self) -> bool {
        self.finished && self.ready.is_empty()
    }
}

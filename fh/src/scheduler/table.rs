//! UnitTable - authoritative per-entity scheduling state

use std::collections::HashMap;
use std::hash::Hash;

use tracing::debug;

use crate::progress::AggregateCounters;

/// Scheduling phase of a unit, without the workflow it owns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitPhase {
    Idle,
    Scheduled,
    Exhausted,
    /// Advance aborted when the engine stopped on a fatal error
    Abandoned,
}

/// Unit state; an idle unit holds its workflow, a scheduled one has lent it to a task
#[derive(Debug)]
enum UnitState<W> {
    Idle(W),
    Scheduled,
    Exhausted,
    Abandoned,
}

impl<W> UnitState<W> {
    fn phase(&self) -> UnitPhase {
        match self {
            UnitState::Idle(_) => UnitPhase::Idle,
            UnitState::Scheduled => UnitPhase::Scheduled,
            UnitState::Exhausted => UnitPhase::Exhausted,
            UnitState::Abandoned => UnitPhase::Abandoned,
        }
    }
}

#[derive(Debug)]
struct Unit<K, W> {
    key: K,
    state: UnitState<W>,
    outstanding: u64,
    advances: u64,
}

/// Ordered mapping from entity key to its scheduling state
///
/// Iteration order is insertion order and is the order used both for admission
/// and for breaking ties between advances that finish together.
#[derive(Debug)]
pub struct UnitTable<K, W> {
    units: Vec<Unit<K, W>>,
    index: HashMap<K, usize>,
}

impl<K, W> UnitTable<K, W>
where
    K: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            units: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Add an idle unit; returns false if the key is already present
    pub fn insert(&mut self, key: K, workflow: W, outstanding: u64) -> bool {
        if self.index.contains_key(&key) {
            debug!("UnitTable::insert: duplicate key rejected");
            return false;
        }
        self.index.insert(key.clone(), self.units.len());
        self.units.push(Unit {
            key,
            state: UnitState::Idle(workflow),
            outstanding,
            advances: 0,
        });
        true
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Table position of a key
    pub fn position(&self, key: &K) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn key(&self, pos: usize) -> &K {
        &self.units[pos].key
    }

    pub fn phase(&self, key: &K) -> Option<UnitPhase> {
        self.position(key).map(|pos| self.units[pos].state.phase())
    }

    /// Number of advances completed by a unit
    pub fn advances(&self, key: &K) -> Option<u64> {
        self.position(key).map(|pos| self.units[pos].advances)
    }

    /// Positions of idle units, in table order
    pub fn idle_positions(&self) -> Vec<usize> {
        self.units
            .iter()
            .enumerate()
            .filter(|(_, unit)| matches!(unit.state, UnitState::Idle(_)))
            .map(|(pos, _)| pos)
            .collect()
    }

    /// Move an idle unit to `Scheduled`, handing out its workflow
    pub fn schedule(&mut self, pos: usize) -> Option<W> {
        let unit = &mut self.units[pos];
        match std::mem::replace(&mut unit.state, UnitState::Scheduled) {
            UnitState::Idle(workflow) => Some(workflow),
            other => {
                unit.state = other;
                None
            }
        }
    }

    /// Return a workflow after a successful advance, making the unit idle again
    ///
    /// Outstanding work only ever goes down; a higher report is ignored.
    pub fn restore(&mut self, pos: usize, workflow: W, reported_outstanding: u64) {
        let unit = &mut self.units[pos];
        debug_assert_eq!(unit.state.phase(), UnitPhase::Scheduled);
        unit.state = UnitState::Idle(workflow);
        unit.outstanding = unit.outstanding.min(reported_outstanding);
        unit.advances += 1;
    }

    /// Mark a unit as permanently finished
    pub fn exhaust(&mut self, pos: usize) {
        let unit = &mut self.units[pos];
        unit.state = UnitState::Exhausted;
        unit.outstanding = 0;
    }

    /// Retire a scheduled unit whose workflow was lost to a fatal error
    ///
    /// Its outstanding work stays as last reported; nothing finished it.
    pub fn abandon(&mut self, pos: usize) {
        let unit = &mut self.units[pos];
        if unit.state.phase() == UnitPhase::Scheduled {
            unit.state = UnitState::Abandoned;
        }
    }

    pub fn scheduled_count(&self) -> usize {
        self.count(UnitPhase::Scheduled)
    }

    /// Units that can still be scheduled or are in flight
    pub fn remaining_count(&self) -> usize {
        self.units.len() - self.count(UnitPhase::Exhausted) - self.count(UnitPhase::Abandoned)
    }

    pub fn total_outstanding(&self) -> u64 {
        self.units.iter().map(|unit| unit.outstanding).sum()
    }

    /// Aggregate counters as of now, given the number of advances in flight
    pub fn counters(&self, running_count: usize) -> AggregateCounters {
        AggregateCounters {
            running_count,
            remaining_count: self.remaining_count(),
            total_outstanding_work: self.total_outstanding(),
        }
    }

    fn count(&self, phase: UnitPhase) -> usize {
        self.units.iter().filter(|unit| unit.state.phase() == phase).count()
    }
}

impl<K, W> Default for UnitTable<K, W>
where
    K: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

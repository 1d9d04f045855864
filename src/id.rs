//! Item identifiers and the clock bookkeeping built on top of them.
//!
//! Every replica owns a `ClientId` and a monotonically increasing
//! `Clock`. The pair is an `ItemId`, unique across all replicas.
//! A `StateVector` summarizes which ids a replica has seen and a
//! `DeleteSet` summarizes which of them have been deleted.

use crate::map_tuple_vec;
use std::cmp::{max, min};
use std::collections::BTreeMap;
use std::fmt;

pub type ClientId = u64;
pub type Clock = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId {
    pub client: ClientId,
    pub clock: Clock,
}

/// Maps each known client to the next clock value expected from it,
/// which is also the number of clock units seen from that client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateVector(#[serde(with = "map_tuple_vec")] BTreeMap<ClientId, Clock>);

/// Per-client sorted, non-overlapping `(clock, len)` ranges of deleted ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSet(#[serde(with = "map_tuple_vec")] BTreeMap<ClientId, Vec<(Clock, u32)>>);

impl ItemId {
    pub fn new(client: ClientId, clock: Clock) -> Self {
        ItemId{client, clock}
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{}#{}>", self.client, self.clock)
    }
}

impl StateVector {
    pub fn new() -> Self {
        StateVector(BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, client: ClientId) -> Clock {
        *self.0.get(&client).unwrap_or(&0)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        id.clock < self.get(id.client)
    }

    /// Reserves `count` consecutive clock values for `client` and
    /// returns the id of the first one.
    pub fn next_id(&mut self, client: ClientId, count: u32) -> ItemId {
        let entry = self.0.entry(client).or_insert(0);
        let clock = *entry;
        *entry += count;
        ItemId{client, clock}
    }

    /// Records that every clock of `id.client` up to `id.clock + len`
    /// is known. Never lowers an entry.
    pub fn observe(&mut self, id: &ItemId, len: u32) {
        let entry = self.0.entry(id.client).or_insert(0);
        *entry = max(*entry, id.clock + len);
    }

    pub fn set_max(&mut self, client: ClientId, clock: Clock) {
        let entry = self.0.entry(client).or_insert(clock);
        *entry = max(*entry, clock);
    }

    pub fn merge(&mut self, other: &StateVector) {
        for (client, clock) in other.iter() {
            self.set_max(client, clock);
        }
    }

    pub fn iter<'a>(&'a self) -> impl Iterator<Item=(ClientId, Clock)> + 'a {
        self.0.iter().map(|(client, clock)| (*client, *clock))
    }
}

impl DeleteSet {
    pub fn new() -> Self {
        DeleteSet(BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, id: &ItemId, len: u32) {
        if len == 0 { return }
        let ranges = self.0.entry(id.client).or_insert_with(Vec::new);
        let index = match ranges.binary_search_by(|&(clock, _)| clock.cmp(&id.clock)) {
            Ok(index) | Err(index) => index,
        };
        ranges.insert(index, (id.clock, len));
        squash_ranges(ranges);
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        match self.0.get(&id.client) {
            Some(ranges) => ranges.iter().any(|&(clock, len)| clock <= id.clock && id.clock < clock + len),
            None => false,
        }
    }

    pub fn merge(&mut self, other: &DeleteSet) {
        for (client, ranges) in other.iter() {
            let entry = self.0.entry(client).or_insert_with(Vec::new);
            entry.extend_from_slice(ranges);
        }
        self.squash();
    }

    /// Sorts every client's ranges and coalesces the ones that
    /// overlap or touch.
    pub fn squash(&mut self) {
        for ranges in self.0.values_mut() {
            ranges.sort();
            squash_ranges(ranges);
        }
        self.0.retain(|_, ranges| !ranges.is_empty());
    }

    pub fn iter<'a>(&'a self) -> impl Iterator<Item=(ClientId, &'a [(Clock, u32)])> + 'a {
        self.0.iter().map(|(client, ranges)| (*client, ranges.as_slice()))
    }

    /// Clock ranges of `client` clipped to `[from, to)`.
    pub fn ranges_within(&self, client: ClientId, from: Clock, to: Clock) -> Vec<(Clock, Clock)> {
        let ranges = match self.0.get(&client) {
            Some(ranges) => ranges,
            None => return vec![],
        };
        ranges.iter()
            .map(|&(clock, len)| (max(clock, from), min(clock + len, to)))
            .filter(|&(start, end)| start < end)
            .collect()
    }
}

fn squash_ranges(ranges: &mut Vec<(Clock, u32)>) {
    let mut squashed: Vec<(Clock, u32)> = Vec::with_capacity(ranges.len());
    for &(clock, len) in ranges.iter() {
        if len == 0 { continue }
        if let Some(last) = squashed.last_mut() {
            let last_end = last.0 + last.1;
            if clock <= last_end {
                last.1 = max(last_end, clock + len) - last.0;
                continue;
            }
        }
        squashed.push((clock, len));
    }
    *ranges = squashed;
}

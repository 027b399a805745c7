//! Replicated document seam. The game core only ever talks to
//! [`ReplicatedDoc`]; the real transport (a CRDT document synchronized over
//! a peer mesh) lives outside this crate. [`MemoryDoc`] implements the same
//! merge semantics in memory so tests and the simulate binary can wire
//! several peers together without a network.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

/// Named last-writer-wins maps plus named append-only lists, the two shared
/// containers the game state needs. A lookup of a key no peer has written
/// yet returns `None`; absent data is a valid state, never an error.
pub trait ReplicatedDoc {
    fn map_get(&self, map: &str, key: &str) -> Option<Value>;
    fn map_set(&mut self, map: &str, key: &str, value: Value);
    fn map_len(&self, map: &str) -> usize;
    fn map_for_each<F: FnMut(&str, &Value)>(&self, map: &str, f: F);

    fn list_push(&mut self, list: &str, value: Value);
    fn list_len(&self, list: &str) -> usize;
    fn list_for_each<F: FnMut(&Value)>(&self, list: &str, f: F);

    /// Groups writes so other peers observe them together. Within one peer
    /// everything is single-threaded, so the default implementation simply
    /// runs the closure; transports with real transactions override this.
    fn transact<F: FnOnce(&mut Self)>(&mut self, f: F)
    where
        Self: Sized,
    {
        f(self);
    }
}

#[derive(Clone, Debug)]
struct MapEntry {
    value: Value,
    clock: u64,
    site: u64,
}

#[derive(Clone, Debug)]
struct ListEntry {
    value: Value,
    clock: u64,
    site: u64,
    seq: u64,
}

/// In-memory replicated document. Map keys resolve conflicts by
/// (lamport clock, site id) so concurrent writers converge to one value;
/// list entries carry a unique (site, seq) identity so merging is a union
/// and no append is ever lost.
#[derive(Clone, Debug)]
pub struct MemoryDoc {
    site: u64,
    clock: u64,
    next_seq: u64,
    maps: HashMap<String, BTreeMap<String, MapEntry>>,
    lists: HashMap<String, Vec<ListEntry>>,
}

impl MemoryDoc {
    pub fn new(site: u64) -> Self {
        Self {
            site,
            clock: 0,
            next_seq: 0,
            maps: HashMap::new(),
            lists: HashMap::new(),
        }
    }

    pub fn site(&self) -> u64 {
        self.site
    }

    /// Pulls every update the other document has seen into this one.
    /// Commutative and idempotent: any gossip schedule that eventually
    /// exchanges all pairs converges every replica to the same state.
    pub fn merge_from(&mut self, other: &MemoryDoc) {
        self.clock = self.clock.max(other.clock);

        for (name, other_map) in &other.maps {
            let map = self.maps.entry(name.clone()).or_default();
            for (key, entry) in other_map {
                let keep_other = match map.get(key) {
                    Some(existing) => {
                        (entry.clock, entry.site) > (existing.clock, existing.site)
                    }
                    None => true,
                };
                if keep_other {
                    map.insert(key.clone(), entry.clone());
                }
            }
        }

        for (name, other_list) in &other.lists {
            let list = self.lists.entry(name.clone()).or_default();
            for entry in other_list {
                let known = list
                    .iter()
                    .any(|e| e.site == entry.site && e.seq == entry.seq);
                if !known {
                    list.push(entry.clone());
                }
            }
            list.sort_by_key(|e| (e.clock, e.site, e.seq));
        }
    }
}

impl ReplicatedDoc for MemoryDoc {
    fn map_get(&self, map: &str, key: &str) -> Option<Value> {
        self.maps
            .get(map)
            .and_then(|m| m.get(key))
            .map(|entry| entry.value.clone())
    }

    fn map_set(&mut self, map: &str, key: &str, value: Value) {
        self.clock += 1;
        let entry = MapEntry {
            value,
            clock: self.clock,
            site: self.site,
        };
        self.maps
            .entry(map.to_string())
            .or_default()
            .insert(key.to_string(), entry);
    }

    fn map_len(&self, map: &str) -> usize {
        self.maps.get(map).map_or(0, |m| m.len())
    }

    fn map_for_each<F: FnMut(&str, &Value)>(&self, map: &str, mut f: F) {
        if let Some(m) = self.maps.get(map) {
            for (key, entry) in m {
                f(key, &entry.value);
            }
        }
    }

    fn list_push(&mut self, list: &str, value: Value) {
        self.clock += 1;
        self.next_seq += 1;
        let entry = ListEntry {
            value,
            clock: self.clock,
            site: self.site,
            seq: self.next_seq,
        };
        self.lists.entry(list.to_string()).or_default().push(entry);
    }

    fn list_len(&self, list: &str) -> usize {
        self.lists.get(list).map_or(0, |l| l.len())
    }

    fn list_for_each<F: FnMut(&Value)>(&self, list: &str, mut f: F) {
        if let Some(l) = self.lists.get(list) {
            for entry in l {
                f(&entry.value);
            }
        }
    }
}

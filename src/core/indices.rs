use std::collections::BTreeSet;

use hashbrown::HashMap;

use crate::{
    mutation::MutationRecord,
    types::{MutationId, MutationStatus, QueueSeq, TimestampMs},
};

/// FIFO position of a record: creation time, then insertion sequence.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderKey {
    pub created_at: TimestampMs,
    pub seq: QueueSeq,
    pub id: MutationId,
}

impl OrderKey {
    pub fn of(rec: &MutationRecord) -> Self {
        Self {
            created_at: rec.created_at,
            seq: rec.seq,
            id: rec.id.clone(),
        }
    }
}

/// Ordered id sets per status, plus one over every record.
#[derive(Debug, Default)]
pub struct StatusIndex {
    all: BTreeSet<OrderKey>,
    by_status: HashMap<MutationStatus, BTreeSet<OrderKey>>,
}

impl StatusIndex {
    pub fn insert(&mut self, rec: &MutationRecord) {
        let key = OrderKey::of(rec);
        self.by_status
            .entry(rec.status)
            .or_default()
            .insert(key.clone());
        self.all.insert(key);
    }

    pub fn remove(&mut self, rec: &MutationRecord) {
        let key = OrderKey::of(rec);
        if let Some(set) = self.by_status.get_mut(&rec.status) {
            set.remove(&key);
        }
        self.all.remove(&key);
    }

    pub fn clear(&mut self) {
        self.all.clear();
        self.by_status.clear();
    }

    pub fn ordered(&self) -> impl Iterator<Item = &MutationId> {
        self.all.iter().map(|k| &k.id)
    }

    pub fn ordered_with(&self, status: MutationStatus) -> impl Iterator<Item = &MutationId> {
        self.by_status
            .get(&status)
            .into_iter()
            .flat_map(|set| set.iter())
            .map(|k| &k.id)
    }

    pub fn count(&self, status: MutationStatus) -> usize {
        self.by_status.get(&status).map_or(0, BTreeSet::len)
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }
}

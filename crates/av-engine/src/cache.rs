//! Per-instance cache of merged datasets and envelopes.
//!
//! Keeps the most recently used instances up to a fixed capacity and evicts
//! the least recently used one beyond it. Values are immutable and `Arc`
//! shared, so a cache hit never copies record data.

use std::collections::VecDeque;
use std::sync::Arc;

use av_core::InstanceId;
use av_results::MergedInstance;
use tracing::debug;

use crate::aggregate::{Envelope, MetricSet};

pub const DEFAULT_CACHE_CAPACITY: usize = 8;

#[derive(Debug, Clone)]
struct CacheEntry {
    instance: InstanceId,
    dataset: Arc<MergedInstance>,
    envelope: Option<Arc<Envelope>>,
}

#[derive(Debug, Clone)]
pub struct EnvelopeCache {
    capacity: usize,
    /// Most recently used first.
    entries: VecDeque<CacheEntry>,
}

impl Default for EnvelopeCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl EnvelopeCache {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, instance: &InstanceId) -> bool {
        self.entries.iter().any(|e| &e.instance == instance)
    }

    /// Moves the entry of `instance` to the front and returns it.
    fn touch(&mut self, instance: &InstanceId) -> Option<&mut CacheEntry> {
        let pos = self.entries.iter().position(|e| &e.instance == instance)?;
        if pos != 0 {
            let entry = self.entries.remove(pos)?;
            self.entries.push_front(entry);
        }
        self.entries.front_mut()
    }

    pub fn dataset(&mut self, instance: &InstanceId) -> Option<Arc<MergedInstance>> {
        self.touch(instance).map(|e| Arc::clone(&e.dataset))
    }

    /// Cached envelope of `instance`, if it was computed for `metric_set`.
    pub fn envelope(
        &mut self,
        instance: &InstanceId,
        metric_set: &MetricSet,
    ) -> Option<Arc<Envelope>> {
        self.touch(instance)?
            .envelope
            .as_ref()
            .filter(|env| env.metric_set() == metric_set)
            .map(Arc::clone)
    }

    /// Stores a freshly loaded dataset, dropping any envelope of the old one.
    pub fn insert_dataset(&mut self, dataset: Arc<MergedInstance>) {
        let instance = dataset.instance.clone();
        self.entries.retain(|e| e.instance != instance);
        self.entries.push_front(CacheEntry {
            instance,
            dataset,
            envelope: None,
        });
        while self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_back() {
                debug!(instance = %evicted.instance, "evicted from envelope cache");
            }
        }
    }

    /// Attaches an envelope to its instance's entry. Ignored if the instance
    /// is not cached.
    pub fn insert_envelope(&mut self, envelope: Arc<Envelope>) -> bool {
        match self.touch(envelope.instance()) {
            Some(entry) => {
                entry.envelope = Some(envelope);
                true
            }
            None => false,
        }
    }

    pub fn evict(&mut self, instance: &InstanceId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.instance != instance);
        before != self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;

    fn dataset(name: &str) -> Arc<MergedInstance> {
        Arc::new(MergedInstance::new(InstanceId::from(name)))
    }

    #[test]
    fn least_recently_used_is_evicted() {
        let mut cache = EnvelopeCache::new(2);
        cache.insert_dataset(dataset("A"));
        cache.insert_dataset(dataset("B"));
        assert!(cache.dataset(&InstanceId::from("A")).is_some());
        cache.insert_dataset(dataset("C"));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&InstanceId::from("A")));
        assert!(!cache.contains(&InstanceId::from("B")));
        assert!(cache.contains(&InstanceId::from("C")));
    }

    #[test]
    fn envelope_lookup_checks_metric_set() {
        let mut cache = EnvelopeCache::default();
        let ds = dataset("A");
        cache.insert_dataset(Arc::clone(&ds));
        assert!(cache.insert_envelope(Arc::new(aggregate(&ds, &MetricSet::costs()))));

        let a = InstanceId::from("A");
        assert!(cache.envelope(&a, &MetricSet::costs()).is_some());
        assert!(cache.envelope(&a, &MetricSet::summary()).is_none());
    }

    #[test]
    fn envelope_for_uncached_instance_is_dropped() {
        let mut cache = EnvelopeCache::default();
        let env = aggregate(&dataset("Z"), &MetricSet::costs());
        assert!(!cache.insert_envelope(Arc::new(env)));
        assert!(cache.is_empty());
    }

    #[test]
    fn reinserting_dataset_clears_envelope() {
        let mut cache = EnvelopeCache::default();
        let ds = dataset("A");
        cache.insert_dataset(Arc::clone(&ds));
        cache.insert_envelope(Arc::new(aggregate(&ds, &MetricSet::costs())));
        cache.insert_dataset(dataset("A"));
        assert_eq!(cache.len(), 1);
        assert!(
            cache
                .envelope(&InstanceId::from("A"), &MetricSet::costs())
                .is_none()
        );
    }

    #[test]
    fn zero_capacity_keeps_one() {
        let mut cache = EnvelopeCache::new(0);
        cache.insert_dataset(dataset("A"));
        cache.insert_dataset(dataset("B"));
        assert_eq!(cache.capacity(), 1);
        assert!(cache.contains(&InstanceId::from("B")));
        assert!(cache.evict(&InstanceId::from("B")));
        assert!(!cache.evict(&InstanceId::from("B")));
    }
}

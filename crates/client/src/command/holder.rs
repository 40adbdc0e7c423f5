use crate::command::{Activity, ActivitySet};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

struct Entry<C> {
    refs: usize,
    consumer: Arc<C>,
}

/// Maps activity keys of one command to the consumers serving them.
///
/// A consumer registered for a set occupies every key of that set. The most
/// recent registration for a key wins; a consumer is handed back for release
/// once no key refers to it any more.
pub struct ActivityHolder<C> {
    consumers: HashMap<u64, Entry<C>>,
    keys: HashMap<Activity, u64>,
    next_id: u64,
}

impl<C> Default for ActivityHolder<C> {
    fn default() -> Self {
        Self {
            consumers: HashMap::new(),
            keys: HashMap::new(),
            next_id: 0,
        }
    }
}

impl<C> fmt::Debug for ActivityHolder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityHolder")
            .field("keys", &self.keys)
            .field("consumers", &self.consumers.len())
            .finish()
    }
}

impl<C> ActivityHolder<C> {
    /// Binds `consumer` to the keys of `set`.
    ///
    /// Returns the consumers no longer referenced by any key.
    pub fn register_consumer(&mut self, set: ActivitySet, consumer: Arc<C>) -> Vec<Arc<C>> {
        let id = self.next_id;
        self.next_id += 1;

        self.consumers.insert(id, Entry { refs: 0, consumer });

        let mut released = Vec::new();
        for key in set.holder_keys() {
            if let Some(previous) = self.keys.insert(*key, id) {
                released.extend(self.drop_ref(previous));
            }
            if let Some(entry) = self.consumers.get_mut(&id) {
                entry.refs += 1;
            }
        }
        released
    }

    /// Unbinds the keys of `set`.
    ///
    /// Returns the consumers no longer referenced by any key.
    pub fn unregister_consumer(&mut self, set: ActivitySet) -> Vec<Arc<C>> {
        let mut released = Vec::new();
        for key in set.holder_keys() {
            if let Some(previous) = self.keys.remove(key) {
                released.extend(self.drop_ref(previous));
            }
        }
        released
    }

    fn drop_ref(&mut self, id: u64) -> Option<Arc<C>> {
        let entry = self.consumers.get_mut(&id)?;
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs > 0 {
            return None;
        }
        self.consumers.remove(&id).map(|entry| entry.consumer)
    }

    /// The consumer bound to `activity`.
    #[must_use]
    pub fn consumer(&self, activity: Activity) -> Option<Arc<C>> {
        let id = self.keys.get(&activity)?;
        self.consumers.get(id).map(|entry| entry.consumer.clone())
    }

    /// Every live consumer, once each.
    #[must_use]
    pub fn consumers(&self) -> Vec<Arc<C>> {
        self.consumers
            .values()
            .map(|entry| entry.consumer.clone())
            .collect()
    }

    /// Whether no key is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Unbinds everything and returns every consumer.
    pub fn drain(&mut self) -> Vec<Arc<C>> {
        self.keys.clear();
        self.consumers.drain().map(|(_, entry)| entry.consumer).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Named(&'static str);

    #[test]
    fn test_newer_registration_keeps_shared_consumer_alive() {
        let mut holder = ActivityHolder::default();
        let c1 = Arc::new(Named("c1"));
        let c2 = Arc::new(Named("c2"));

        assert!(holder
            .register_consumer(ActivitySet::SetPresetStartCancel, c1.clone())
            .is_empty());
        let released = holder.register_consumer(ActivitySet::SetPreset, c2.clone());

        assert!(released.is_empty());
        assert!(Arc::ptr_eq(&holder.consumer(Activity::Start).unwrap(), &c1));
        assert!(Arc::ptr_eq(&holder.consumer(Activity::Cancel).unwrap(), &c1));
        assert!(Arc::ptr_eq(&holder.consumer(Activity::Preset).unwrap(), &c2));
        assert_eq!(holder.consumers().len(), 2);
    }

    #[test]
    fn test_consumer_released_when_last_key_is_replaced() {
        let mut holder = ActivityHolder::default();
        let c1 = Arc::new(Named("c1"));
        let c2 = Arc::new(Named("c2"));

        holder.register_consumer(ActivitySet::SetStartCancel, c1.clone());
        assert!(holder.register_consumer(ActivitySet::SetStart, c2.clone()).is_empty());
        let released = holder.register_consumer(ActivitySet::SetCancel, c2);

        assert_eq!(released.len(), 1);
        assert!(Arc::ptr_eq(&released[0], &c1));
        assert_eq!(holder.consumers().len(), 2);
    }

    #[test]
    fn test_preset_start_occupies_its_own_key() {
        let mut holder = ActivityHolder::default();
        holder.register_consumer(ActivitySet::SetPresetStart, Arc::new(Named("c")));

        assert!(holder.consumer(Activity::PresetStart).is_some());
        assert!(holder.consumer(Activity::Preset).is_none());
        assert!(holder.consumer(Activity::Start).is_none());
    }

    #[test]
    fn test_unregister_releases_once_unreferenced() {
        let mut holder = ActivityHolder::default();
        let c1 = Arc::new(Named("c1"));
        holder.register_consumer(ActivitySet::SetPresetCancel, c1);

        assert!(holder.unregister_consumer(ActivitySet::SetPreset).is_empty());
        assert_eq!(holder.unregister_consumer(ActivitySet::SetCancel).len(), 1);
        assert!(holder.is_empty());
        assert!(holder.unregister_consumer(ActivitySet::SetCancel).is_empty());
    }

    #[test]
    fn test_reregistering_same_set_replaces_consumer() {
        let mut holder = ActivityHolder::default();
        let c1 = Arc::new(Named("c1"));
        holder.register_consumer(ActivitySet::SetPresetStartCancel, c1.clone());

        let released =
            holder.register_consumer(ActivitySet::SetPresetStartCancel, Arc::new(Named("c2")));

        assert_eq!(released.len(), 1);
        assert!(Arc::ptr_eq(&released[0], &c1));
        assert_eq!(holder.drain().len(), 1);
    }
}

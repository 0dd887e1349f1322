//! Registry of discovered databases.
//!
//! The registry is the only authority on which databases are tracked. When a
//! fresh inventory arrives it computes the delta against the current set and
//! notifies an [`EntityObserver`] for every added and removed name.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

/// A tracked database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub name: String,
    pub discovered_at: DateTime<Utc>,
}

/// Receives registry changes.
pub trait EntityObserver {
    fn materialize(&mut self, name: &str);
    fn retire(&mut self, name: &str);
}

/// Names added and removed by one reconciliation, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryDelta {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl InventoryDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Set of known databases keyed by exact name.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: HashMap<String, Entity>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    /// Returns the tracked names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Replaces the tracked set with `fresh`.
    ///
    /// New names are inserted with `discovered_at = now` and passed to
    /// `observer.materialize`; vanished names are dropped and passed to
    /// `observer.retire`. Names are compared byte for byte.
    pub fn reconcile_inventory<I, S, O>(
        &mut self,
        fresh: I,
        now: DateTime<Utc>,
        observer: &mut O,
    ) -> InventoryDelta
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        O: EntityObserver + ?Sized,
    {
        let fresh: BTreeSet<String> = fresh.into_iter().map(Into::into).collect();

        let mut removed: Vec<String> = self
            .entities
            .keys()
            .filter(|name| !fresh.contains(*name))
            .cloned()
            .collect();
        removed.sort_unstable();

        let added: Vec<String> = fresh
            .into_iter()
            .filter(|name| !self.entities.contains_key(name))
            .collect();

        for name in &added {
            self.entities.insert(
                name.clone(),
                Entity {
                    name: name.clone(),
                    discovered_at: now,
                },
            );
            observer.materialize(name);
        }

        for name in &removed {
            self.entities.remove(name);
            observer.retire(name);
        }

        InventoryDelta { added, removed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::btree_set;
    use proptest::prelude::*;

    #[derive(Default)]
    struct Recorder {
        materialized: BTreeSet<String>,
        retired: BTreeSet<String>,
    }

    impl EntityObserver for Recorder {
        fn materialize(&mut self, name: &str) {
            assert!(self.materialized.insert(name.to_string()));
        }

        fn retire(&mut self, name: &str) {
            assert!(self.retired.insert(name.to_string()));
        }
    }

    #[test]
    fn reconcile_reports_added_and_removed() {
        let mut registry = EntityRegistry::new();
        let mut recorder = Recorder::default();
        let now = Utc::now();

        let delta = registry.reconcile_inventory(["postgres", "production"], now, &mut recorder);
        assert_eq!(delta.added, vec!["postgres", "production"]);
        assert!(delta.removed.is_empty());

        let delta = registry.reconcile_inventory(["postgres", "staging"], now, &mut recorder);
        assert_eq!(delta.added, vec!["staging"]);
        assert_eq!(delta.removed, vec!["production"]);
        assert_eq!(registry.names(), vec!["postgres", "staging"]);
    }

    #[test]
    fn discovered_at_is_kept_for_existing_entities() {
        let mut registry = EntityRegistry::new();
        let mut recorder = Recorder::default();
        let first = Utc::now();
        let later = first + chrono::Duration::seconds(60);

        registry.reconcile_inventory(["postgres"], first, &mut recorder);
        registry.reconcile_inventory(["postgres", "sales"], later, &mut recorder);

        assert_eq!(registry.get("postgres").unwrap().discovered_at, first);
        assert_eq!(registry.get("sales").unwrap().discovered_at, later);
    }

    #[test]
    fn names_are_case_sensitive() {
        let mut registry = EntityRegistry::new();
        let mut recorder = Recorder::default();
        registry.reconcile_inventory(["Sales", "sales"], Utc::now(), &mut recorder);
        assert_eq!(registry.len(), 2);
    }

    proptest! {
        #[test]
        fn reconcile_is_idempotent(names in btree_set("[a-z_]{1,12}", 1..8)) {
            let mut registry = EntityRegistry::new();
            let mut recorder = Recorder::default();
            registry.reconcile_inventory(names.clone(), Utc::now(), &mut recorder);
            let delta = registry.reconcile_inventory(names, Utc::now(), &mut recorder);
            prop_assert!(delta.is_empty());
        }

        #[test]
        fn reconcile_applies_set_difference(
            a in btree_set("[a-z]{1,6}", 0..8),
            b in btree_set("[a-z]{1,6}", 0..8),
        ) {
            let mut registry = EntityRegistry::new();
            registry.reconcile_inventory(a.clone(), Utc::now(), &mut Recorder::default());

            let mut recorder = Recorder::default();
            registry.reconcile_inventory(b.clone(), Utc::now(), &mut recorder);

            let current: BTreeSet<String> =
                registry.names().into_iter().map(str::to_string).collect();
            prop_assert_eq!(&current, &b);
            prop_assert_eq!(
                recorder.materialized,
                b.difference(&a).cloned().collect::<BTreeSet<_>>()
            );
            prop_assert_eq!(
                recorder.retired,
                a.difference(&b).cloned().collect::<BTreeSet<_>>()
            );
        }
    }
}

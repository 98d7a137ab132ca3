use std::collections::HashMap;

use crate::iri::Iri;
use crate::resource::Resource;

/// The identity map of a client.
///
/// Guarantees at most one live [`Resource`] per reference: every lookup of a
/// known reference returns the instance registered first. Entries are only
/// removed when the remote resource is deleted.
#[derive(Default)]
pub struct IdentityMap {
    resources: HashMap<Iri, Resource>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, iri: &Iri) -> Option<Resource> {
        self.resources.get(iri).cloned()
    }

    /// Registers `resource` under `iri`, returning the instance that is now
    /// canonical for it.
    ///
    /// If the reference is already known the existing instance wins and
    /// `resource` is discarded.
    pub fn insert(&mut self, iri: Iri, resource: Resource) -> Resource {
        self.resources.entry(iri).or_insert(resource).clone()
    }

    /// Replaces whatever is registered under `iri`.
    pub fn replace(&mut self, iri: Iri, resource: Resource) -> Option<Resource> {
        self.resources.insert(iri, resource)
    }

    pub fn remove(&mut self, iri: &Iri) -> Option<Resource> {
        self.resources.remove(iri)
    }

    pub fn contains_key(&self, iri: &Iri) -> bool {
        self.resources.contains_key(iri)
    }

    /// Checks that this exact instance is the one registered under `iri`.
    pub fn is_registered(&self, iri: &Iri, resource: &Resource) -> bool {
        self.resources.get(iri).is_some_and(|known| known == resource)
    }

    /// Checks whether this exact instance is registered under any reference.
    pub fn contains(&self, resource: &Resource) -> bool {
        self.resources.values().any(|known| known == resource)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ClassMetadata;
    use std::rc::{Rc, Weak};

    fn detached(class: &str) -> Resource {
        Resource::new(Rc::new(ClassMetadata::new(class)), Weak::new())
    }

    #[test]
    fn first_registration_wins() {
        let mut map = IdentityMap::new();
        let iri = Iri::from("/things/1");
        let first = detached("Thing");
        let second = detached("Thing");

        let canonical = map.insert(iri.clone(), first.clone());
        assert_eq!(canonical, first);
        let canonical = map.insert(iri.clone(), second.clone());
        assert_eq!(canonical, first);
        assert_ne!(canonical, second);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn registration_is_by_instance() {
        let mut map = IdentityMap::new();
        let iri = Iri::from("/things/1");
        let registered = detached("Thing");
        let stranger = detached("Thing");
        map.insert(iri.clone(), registered.clone());

        assert!(map.is_registered(&iri, &registered));
        assert!(!map.is_registered(&iri, &stranger));
        assert!(map.contains(&registered));
        assert!(!map.contains(&stranger));
    }

    #[test]
    fn remove_forgets_the_instance() {
        let mut map = IdentityMap::new();
        let iri = Iri::from("/things/1");
        map.insert(iri.clone(), detached("Thing"));
        assert!(map.remove(&iri).is_some());
        assert!(map.is_empty());
        assert!(map.get(&iri).is_none());
    }
}

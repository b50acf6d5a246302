//! In-memory person id → name lookup for one person group.

use crate::client::{FaceApi, FaceApiError};
use crate::types::Person;
use std::collections::HashMap;

/// Snapshot of the persons enrolled in a group.
///
/// Loaded in bulk; it does not follow changes made to the group on the
/// service side until it is loaded again.
#[derive(Debug, Clone, Default)]
pub struct IdentityStore {
    group: String,
    persons: HashMap<String, Person>,
}

impl IdentityStore {
    /// List every person in `group` and index them by person id.
    pub fn load<A: FaceApi + ?Sized>(api: &A, group: &str) -> Result<Self, FaceApiError> {
        let persons = api.list_persons(group)?;
        tracing::info!(group, count = persons.len(), "identity store loaded");
        Ok(Self::from_persons(group, persons))
    }

    pub fn from_persons(group: &str, persons: impl IntoIterator<Item = Person>) -> Self {
        Self {
            group: group.to_string(),
            persons: persons
                .into_iter()
                .map(|p| (p.person_id.clone(), p))
                .collect(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Name stored for `person_id`, if the person is known.
    pub fn resolve(&self, person_id: &str) -> Option<&str> {
        self.persons.get(person_id).map(|p| p.name.as_str())
    }

    /// Name stored for `person_id`, or an empty string for unknown ids.
    pub fn name_or_empty(&self, person_id: &str) -> String {
        self.resolve(person_id).unwrap_or_default().to_string()
    }

    pub fn persons(&self) -> impl Iterator<Item = &Person> {
        self.persons.values()
    }

    /// Names of all known persons, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.persons().map(|p| p.name.clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DetectedFace, IdentifyResult};
    use reqwest::StatusCode;

    fn person(id: &str, name: &str) -> Person {
        Person {
            person_id: id.into(),
            name: name.into(),
            user_data: None,
        }
    }

    struct PersonsApi(Result<Vec<Person>, StatusCode>);

    impl FaceApi for PersonsApi {
        fn detect(&self, _image: &[u8]) -> Result<Vec<DetectedFace>, FaceApiError> {
            unreachable!()
        }
        fn identify(
            &self,
            _face_ids: &[String],
            _group: &str,
            _confidence_pct: f64,
        ) -> Result<Vec<IdentifyResult>, FaceApiError> {
            unreachable!()
        }
        fn list_persons(&self, _group: &str) -> Result<Vec<Person>, FaceApiError> {
            self.0.clone().map_err(|status| FaceApiError::Status {
                status,
                body: String::new(),
            })
        }
        fn create_group(&self, _name: &str, _model: &str) -> Result<(), FaceApiError> {
            unreachable!()
        }
    }

    #[test]
    fn test_resolve_known_person() {
        let store = IdentityStore::from_persons("g", vec![person("p1", "Alice")]);
        assert_eq!(store.resolve("p1"), Some("Alice"));
        assert_eq!(store.name_or_empty("p1"), "Alice");
    }

    #[test]
    fn test_unknown_person_resolves_to_empty_name() {
        let store = IdentityStore::from_persons("g", vec![person("p1", "Alice")]);
        assert_eq!(store.resolve("p9"), None);
        assert_eq!(store.name_or_empty("p9"), "");
    }

    #[test]
    fn test_empty_store() {
        let store = IdentityStore::default();
        assert!(store.is_empty());
        assert_eq!(store.name_or_empty("anything"), "");
    }

    #[test]
    fn test_load_indexes_by_person_id() {
        let api = PersonsApi(Ok(vec![person("p1", "Alice"), person("p2", "Bob")]));
        let store = IdentityStore::load(&api, "family").unwrap();
        assert_eq!(store.group(), "family");
        assert_eq!(store.len(), 2);
        assert_eq!(store.resolve("p2"), Some("Bob"));
    }

    #[test]
    fn test_names_sorted() {
        let store = IdentityStore::from_persons(
            "g",
            vec![person("p2", "Bob"), person("p1", "Alice"), person("p3", "Carol")],
        );
        assert_eq!(store.names(), vec!["Alice", "Bob", "Carol"]);
        assert!(IdentityStore::default().names().is_empty());
    }

    #[test]
    fn test_load_propagates_api_error() {
        let api = PersonsApi(Err(StatusCode::NOT_FOUND));
        assert!(IdentityStore::load(&api, "missing").is_err());
    }
}

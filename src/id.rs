//! Newtype IDs for the catalog entities.
//!
//! Every catalog (nodes, generators, storages, plants, ...) is keyed by a
//! cheap clonable ID wrapping an `Rc<str>`. Identifiers must match exactly
//! across input tables, so surrounding whitespace is stripped on ingestion
//! (see [`crate::input`]).
use anyhow::{Context, Result};
use indexmap::IndexSet;
use std::collections::HashSet;

/// A trait alias for ID types
pub trait IdLike:
    Eq + std::hash::Hash + std::borrow::Borrow<str> + Clone + std::fmt::Display + From<String>
{
}
impl<T> IdLike for T where
    T: Eq + std::hash::Hash + std::borrow::Borrow<str> + Clone + std::fmt::Display + From<String>
{
}

macro_rules! define_id_type {
    ($name:ident) => {
        /// An identifier for one catalog entity
        #[derive(
            Clone,
            std::hash::Hash,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            serde::Deserialize,
            Debug,
            serde::Serialize,
        )]
        pub struct $name(pub std::rc::Rc<str>);

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(std::rc::Rc::from(s.trim()))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(std::rc::Rc::from(s.trim()))
            }
        }
    };
}
pub(crate) use define_id_type;

define_id_type! {NodeID}
define_id_type! {GeneratorID}
define_id_type! {TechnologyID}
define_id_type! {StorageID}
define_id_type! {ConverterID}
define_id_type! {LineTypeID}
define_id_type! {TerminalID}
define_id_type! {PlantID}

/// A data structure containing a set of IDs
pub trait IdCollection<ID: IdLike> {
    /// Look an ID up by its string representation, returning a copy of the
    /// stored ID or an error if it is unknown.
    fn get_id_by_str(&self, id: &str) -> Result<ID>;
}

macro_rules! define_id_methods {
    () => {
        fn get_id_by_str(&self, id: &str) -> Result<ID> {
            let found = self
                .get(id)
                .with_context(|| format!("Unknown ID {id} found"))?;
            Ok(found.clone())
        }
    };
}

impl<ID: IdLike> IdCollection<ID> for HashSet<ID> {
    define_id_methods!();
}

impl<ID: IdLike> IdCollection<ID> for IndexSet<ID> {
    define_id_methods!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_from_string_trims() {
        let id = NodeID::from(" Germany ".to_string());
        assert_eq!(id.0.as_ref(), "Germany");
    }

    #[test]
    fn test_get_id_by_str() {
        let ids: IndexSet<NodeID> = ["Norway", "Sweden"].map(NodeID::from).into_iter().collect();
        assert_eq!(ids.get_id_by_str("Norway").unwrap(), NodeID::from("Norway"));
        assert!(ids.get_id_by_str("Finland").is_err());
    }
}

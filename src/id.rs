//! Code for handling IDs
use anyhow::{Context, Result};
use indexmap::IndexSet;
use std::borrow::Borrow;
use std::hash::Hash;

/// Define an interned string ID type (e.g. `RegionID`, `TechnologyID`).
///
/// IDs are cheap to clone and can be looked up in maps and sets by `&str`.
macro_rules! define_id_type {
    ($name:ident) => {
        /// An interned identifier
        #[derive(
            Clone,
            std::hash::Hash,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            serde::Deserialize,
            serde::Serialize,
            Debug,
        )]
        pub struct $name(pub std::rc::Rc<str>);

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(std::rc::Rc::from(s))
            }
        }

        impl $name {
            /// Create a new ID from a string slice
            pub fn new(id: &str) -> Self {
                $name(std::rc::Rc::from(id))
            }

            /// The ID as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}
pub(crate) use define_id_type;

#[cfg(test)]
define_id_type!(GenericID);

/// A set of IDs which can be looked up by name
pub trait IDCollection<ID> {
    /// Get the ID whose string representation is `id`, or an error if there isn't one
    fn get_id_by_str(&self, id: &str) -> Result<ID>;
}

impl<ID> IDCollection<ID> for IndexSet<ID>
where
    ID: Clone + Eq + Hash + Borrow<str>,
{
    fn get_id_by_str(&self, id: &str) -> Result<ID> {
        self.get(id)
            .cloned()
            .with_context(|| format!("Unknown ID {id} found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;

    #[test]
    fn test_get_id_by_str() {
        let ids: IndexSet<GenericID> = ["a".into(), "b".into()].into_iter().collect();
        assert_eq!(ids.get_id_by_str("b").unwrap(), GenericID::new("b"));
        assert_error!(ids.get_id_by_str("c"), "Unknown ID c found");
    }

    #[test]
    fn test_id_display() {
        let id = GenericID::from("reg1".to_string());
        assert_eq!(id.to_string(), "reg1");
        assert_eq!(id.as_str(), "reg1");
    }
}

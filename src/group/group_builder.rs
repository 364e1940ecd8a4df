use std::sync::Arc;

use crate::node::NodePath;

use super::{Attributes, Group, GroupMetadata};

/// A [`Group`] builder.
#[derive(Debug, Clone, Default)]
pub struct GroupBuilder {
    metadata: GroupMetadata,
}

impl GroupBuilder {
    /// Create a new group builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the attributes.
    #[must_use]
    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.metadata.attributes = attributes;
        self
    }

    /// Set a single attribute.
    #[must_use]
    pub fn attribute(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.attributes.insert(name.to_string(), value.into());
        self
    }

    /// Build into a [`Group`].
    ///
    /// This does **not** write to the store, use [`Group::store_metadata`] to write the metadata.
    #[must_use]
    pub fn build<TStorage: ?Sized>(self, storage: Arc<TStorage>, path: NodePath) -> Group<TStorage> {
        Group::new_with_metadata(storage, path, self.metadata)
    }
}

use crate::{CollectionConfig, Field, FieldType, GlobalConfig, Tab};
use std::collections::HashSet;
use thiserror::Error;

/// Structural problems detected by [`Schema::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("collection slug must not be empty")]
    EmptySlug,

    #[error("duplicate collection slug: {0}")]
    DuplicateCollection(String),

    #[error("duplicate global slug: {0}")]
    DuplicateGlobal(String),

    #[error("duplicate block '{block}' in field '{field}' of '{collection}'")]
    DuplicateBlock {
        collection: String,
        field: String,
        block: String,
    },

    #[error("field '{field}' of '{collection}' relates to unknown collection '{target}'")]
    UnknownRelationTarget {
        collection: String,
        field: String,
        target: String,
    },

    #[error("field '{field}' of '{collection}' has an invalid pattern: {reason}")]
    InvalidPattern {
        collection: String,
        field: String,
        reason: String,
    },
}

/// The registry of every collection and global known to an engine.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    collections: Vec<CollectionConfig>,
    globals: Vec<GlobalConfig>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(mut self, collection: CollectionConfig) -> Self {
        self.collections.push(collection);
        self
    }

    pub fn global(mut self, global: GlobalConfig) -> Self {
        self.globals.push(global);
        self
    }

    pub fn add_collection(&mut self, collection: CollectionConfig) {
        self.collections.push(collection);
    }

    pub fn add_global(&mut self, global: GlobalConfig) {
        self.globals.push(global);
    }

    pub fn get_collection(&self, slug: &str) -> Option<&CollectionConfig> {
        self.collections.iter().find(|c| c.slug == slug)
    }

    /// Mutable access for init-time plugins.
    pub fn get_collection_mut(&mut self, slug: &str) -> Option<&mut CollectionConfig> {
        self.collections.iter_mut().find(|c| c.slug == slug)
    }

    pub fn get_global(&self, slug: &str) -> Option<&GlobalConfig> {
        self.globals.iter().find(|g| g.slug == slug)
    }

    pub fn collections(&self) -> &[CollectionConfig] {
        &self.collections
    }

    pub fn globals(&self) -> &[GlobalConfig] {
        &self.globals
    }

    pub fn versioned_collections(&self) -> impl Iterator<Item = &CollectionConfig> {
        self.collections.iter().filter(|c| c.versions)
    }

    /// Checks slugs are unique, every relationship targets a known
    /// collection and every text pattern compiles.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();
        for collection in &self.collections {
            if collection.slug.is_empty() {
                return Err(SchemaError::EmptySlug);
            }
            if !seen.insert(collection.slug.as_str()) {
                return Err(SchemaError::DuplicateCollection(collection.slug.clone()));
            }
        }

        let mut seen_globals = HashSet::new();
        for global in &self.globals {
            if global.slug.is_empty() {
                return Err(SchemaError::EmptySlug);
            }
            if !seen_globals.insert(global.slug.as_str()) {
                return Err(SchemaError::DuplicateGlobal(global.slug.clone()));
            }
        }

        for collection in &self.collections {
            self.check_fields(&collection.slug, &collection.fields, &seen)?;
        }
        for global in &self.globals {
            self.check_fields(&global.slug, &global.fields, &seen)?;
        }
        Ok(())
    }

    fn check_fields(
        &self,
        owner: &str,
        fields: &[Field],
        slugs: &HashSet<&str>,
    ) -> Result<(), SchemaError> {
        for field in fields {
            match field {
                Field::Data(data) => match &data.field_type {
                    FieldType::Relationship(opts) => {
                        for target in opts.relation_to.targets() {
                            if !slugs.contains(target) {
                                return Err(SchemaError::UnknownRelationTarget {
                                    collection: owner.to_string(),
                                    field: data.base.name.clone(),
                                    target: target.to_string(),
                                });
                            }
                        }
                    }
                    FieldType::Text(opts) => {
                        if let Some(e) = opts.pattern.as_ref().and_then(|p| p.error()) {
                            return Err(SchemaError::InvalidPattern {
                                collection: owner.to_string(),
                                field: data.base.name.clone(),
                                reason: e.to_string(),
                            });
                        }
                    }
                    _ => {}
                },
                Field::Group(group) => self.check_fields(owner, &group.fields, slugs)?,
                Field::Array(array) => self.check_fields(owner, &array.fields, slugs)?,
                Field::Blocks(blocks) => {
                    let mut block_slugs = HashSet::new();
                    for block in &blocks.blocks {
                        if !block_slugs.insert(block.slug.as_str()) {
                            return Err(SchemaError::DuplicateBlock {
                                collection: owner.to_string(),
                                field: blocks.base.name.clone(),
                                block: block.slug.clone(),
                            });
                        }
                        self.check_fields(owner, &block.fields, slugs)?;
                    }
                }
                Field::Tabs(tabs) => {
                    for tab in &tabs.tabs {
                        match tab {
                            Tab::Named(group) => self.check_fields(owner, &group.fields, slugs)?,
                            Tab::Unnamed { fields, .. } => self.check_fields(owner, fields, slugs)?,
                        }
                    }
                }
                Field::Collapsible(layout) | Field::Row(layout) => {
                    self.check_fields(owner, &layout.fields, slugs)?
                }
            }
        }
        Ok(())
    }
}

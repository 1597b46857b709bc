//! The `Folio` facade.
//!
//! A [`Folio`] is a cheap, cloneable handle over the immutable schema, the
//! storage backend and the engine config, bound to one [`RequestContext`].
//! Deriving a facade for another caller never mutates the original:
//!
//! ```ignore
//! let folio = Folio::builder(schema, Arc::new(MemoryStore::new())).build().await?;
//! let alice = folio.with_context(RequestContext::authenticated(Principal::new("alice")));
//! let posts = alice.collection("posts")?.find(FindOptions::new()).await?;
//! ```

use crate::access::{allows, filter_fields, require};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::globals::GlobalOperations;
use crate::operations::CollectionOperations;
use crate::populate::populate;
use crate::scheduler::{PublishScheduler, SchedulerHandle};
use crate::versions::VersionManager;
use async_trait::async_trait;
use folio_model::{
    AccessArgs, CollectionAccess, CollectionConfig, Document, Field, FieldOperation, Operation,
    RequestContext, Schema, Where,
};
use folio_storage::StorageBackend;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Extension point run while a [`Folio`] is being built.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin name used in logs.
    fn name(&self) -> &str;

    /// Called before the schema is validated; may add collections or fields.
    fn before_init(&self, _schema: &mut Schema) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once the facade exists. Receives a facade with access
    /// overridden.
    async fn after_init(&self, _folio: &Folio) -> anyhow::Result<()> {
        Ok(())
    }
}

struct Shared {
    schema: Schema,
    config: EngineConfig,
}

/// The document engine bound to one request context.
#[derive(Clone)]
pub struct Folio {
    shared: Arc<Shared>,
    storage: Arc<dyn StorageBackend>,
    context: RequestContext,
    override_access: bool,
}

impl fmt::Debug for Folio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Folio")
            .field("backend", &self.storage.name())
            .field("collections", &self.shared.schema.collections().len())
            .field("context", &self.context)
            .field("override_access", &self.override_access)
            .finish()
    }
}

impl Folio {
    pub fn builder(schema: Schema, storage: Arc<dyn StorageBackend>) -> FolioBuilder {
        FolioBuilder::new(schema, storage)
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn schema(&self) -> &Schema {
        &self.shared.schema
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    /// Returns a facade bound to `context`; `self` is left untouched.
    pub fn with_context(&self, context: RequestContext) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            storage: Arc::clone(&self.storage),
            context,
            override_access: self.override_access,
        }
    }

    /// Returns a facade that skips collection access, field access filtering
    /// and default scopes. Meant for trusted subsystems.
    pub fn overriding_access(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            storage: Arc::clone(&self.storage),
            context: self.context.clone(),
            override_access: true,
        }
    }

    /// The same facade reading and writing through `storage`, e.g. an open
    /// transaction.
    pub(crate) fn with_storage(&self, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            storage,
            context: self.context.clone(),
            override_access: self.override_access,
        }
    }

    pub fn is_overriding_access(&self) -> bool {
        self.override_access
    }

    /// CRUD operations on one collection.
    pub fn collection(&self, slug: &str) -> EngineResult<CollectionOperations<'_>> {
        Ok(CollectionOperations::new(self, self.collection_config(slug)?))
    }

    /// Draft/publish operations on one versioned collection.
    pub fn versions(&self, slug: &str) -> EngineResult<VersionManager<'_>> {
        let config = self.collection_config(slug)?;
        if !config.versions {
            return Err(EngineError::InvalidOperation(format!(
                "collection '{slug}' is not versioned"
            )));
        }
        Ok(VersionManager::new(CollectionOperations::new(self, config)))
    }

    /// Read/update operations on one global.
    pub fn global(&self, slug: &str) -> EngineResult<GlobalOperations<'_>> {
        let config = self
            .shared
            .schema
            .get_global(slug)
            .ok_or_else(|| EngineError::GlobalNotFound(slug.to_string()))?;
        Ok(GlobalOperations::new(self, config))
    }

    pub fn scheduler(&self) -> PublishScheduler {
        PublishScheduler::new(self)
    }

    /// Spawns the scheduled-publish poller when enabled in config.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_scheduler(&self) -> Option<SchedulerHandle> {
        let settings = &self.shared.config.scheduler;
        if !settings.enabled {
            debug!("publish scheduler disabled");
            return None;
        }
        Some(self.scheduler().spawn(settings.poll_interval()))
    }

    // ── Shared pipeline steps ───────────────────────────────────

    pub(crate) fn collection_config(&self, slug: &str) -> EngineResult<&CollectionConfig> {
        self.shared
            .schema
            .get_collection(slug)
            .ok_or_else(|| EngineError::CollectionNotFound(slug.to_string()))
    }

    fn access_args(&self, id: Option<&str>, data: Option<&Document>) -> AccessArgs {
        AccessArgs {
            context: self.context.clone(),
            id: id.map(str::to_string),
            data: data.cloned(),
        }
    }

    pub(crate) async fn require_access(
        &self,
        access: &CollectionAccess,
        operation: Operation,
        collection: &str,
        id: Option<&str>,
        data: Option<&Document>,
    ) -> EngineResult<()> {
        if self.override_access {
            return Ok(());
        }
        require(access, operation, collection, self.access_args(id, data)).await
    }

    pub(crate) async fn has_access(
        &self,
        access: &CollectionAccess,
        operation: Operation,
        id: Option<&str>,
    ) -> EngineResult<bool> {
        if self.override_access {
            return Ok(true);
        }
        allows(access, operation, self.access_args(id, None)).await
    }

    /// The caller's default scope for `config`, if any.
    pub(crate) fn scope_filter(&self, config: &CollectionConfig) -> Option<Where> {
        if self.override_access {
            return None;
        }
        config
            .default_filter
            .as_ref()
            .and_then(|filter| filter.resolve(&self.context))
    }

    /// Re-checks a fetched document against the caller's default scope.
    pub(crate) fn in_scope(&self, config: &CollectionConfig, doc: &Document) -> bool {
        self.scope_filter(config)
            .is_none_or(|filter| filter.matches(doc))
    }

    /// Removes fields the caller may not read.
    pub(crate) async fn filter_read(
        &self,
        fields: &[Field],
        doc: &mut Document,
        id: Option<&str>,
    ) -> EngineResult<()> {
        if self.override_access {
            return Ok(());
        }
        let whole = doc.clone();
        filter_fields(fields, doc, FieldOperation::Read, &self.context, id, Some(&whole)).await
    }

    /// Drops fields the caller may not write from an incoming payload.
    pub(crate) async fn filter_write(
        &self,
        fields: &[Field],
        data: &mut Document,
        operation: FieldOperation,
        id: Option<&str>,
        existing: Option<&Document>,
    ) -> EngineResult<()> {
        if self.override_access {
            return Ok(());
        }
        filter_fields(fields, data, operation, &self.context, id, existing).await
    }

    pub(crate) async fn populate(
        &self,
        fields: &[Field],
        doc: &mut Document,
        depth: u32,
    ) -> EngineResult<()> {
        populate(self, fields, doc, depth).await
    }
}

/// Builds a [`Folio`], running plugins and schema checks.
pub struct FolioBuilder {
    schema: Schema,
    storage: Arc<dyn StorageBackend>,
    config: EngineConfig,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl FolioBuilder {
    pub fn new(schema: Schema, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            schema,
            storage,
            config: EngineConfig::default(),
            plugins: Vec::new(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Runs `before_init` hooks, validates the schema, then runs
    /// `after_init` hooks. The returned facade has an anonymous context.
    pub async fn build(self) -> EngineResult<Folio> {
        let Self {
            mut schema,
            storage,
            config,
            plugins,
        } = self;

        for plugin in &plugins {
            debug!(plugin = plugin.name(), "running before_init");
            plugin
                .before_init(&mut schema)
                .map_err(EngineError::Callback)?;
        }
        schema.validate()?;

        let folio = Folio {
            shared: Arc::new(Shared { schema, config }),
            storage,
            context: RequestContext::anonymous(),
            override_access: false,
        };

        let trusted = folio.overriding_access();
        for plugin in &plugins {
            debug!(plugin = plugin.name(), "running after_init");
            plugin
                .after_init(&trusted)
                .await
                .map_err(EngineError::Callback)?;
        }

        info!(
            backend = folio.storage().name(),
            collections = folio.schema().collections().len(),
            globals = folio.schema().globals().len(),
            "folio initialized"
        );
        Ok(folio)
    }
}

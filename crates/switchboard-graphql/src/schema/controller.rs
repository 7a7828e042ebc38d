//! Schema lifecycle control.
//!
//! The compiled schema lives behind a dirty flag: topology changes and
//! explicit invalidation mark it stale, and the next access regenerates it
//! lazily. Regeneration is single-flight: exactly one build runs at a time
//! and every concurrent caller awaits that build's outcome instead of
//! starting its own. A failed build leaves the state stale and propagates to
//! the caller that requested access; the next access retries.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::json;
use switchboard_broker::{ServiceBus, topics};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::error::GatewayError;
use crate::schema::generator::{CompiledSchema, SchemaGenerator};

/// Lazily regenerated schema holder with single-flight rebuilds.
pub struct SchemaController {
    /// The current compiled schema, swapped atomically on regeneration.
    current: RwLock<Option<Arc<CompiledSchema>>>,

    /// Dirty flag: when set, the next access must regenerate.
    stale: AtomicBool,

    /// Serializes regeneration; concurrent callers queue here.
    build_lock: Mutex<()>,

    generator: SchemaGenerator,

    /// Announces successful regenerations.
    bus: ServiceBus,
}

impl SchemaController {
    /// Creates a controller in the stale state; the first access builds.
    #[must_use]
    pub fn new(generator: SchemaGenerator, bus: ServiceBus) -> Self {
        Self {
            current: RwLock::new(None),
            stale: AtomicBool::new(true),
            build_lock: Mutex::new(()),
            generator,
            bus,
        }
    }

    /// Marks the schema stale. The next access regenerates.
    pub fn invalidate(&self) {
        self.stale.store(true, Ordering::SeqCst);
    }

    /// Returns whether the next access will regenerate.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    /// Returns the compiled schema if one exists, without building.
    pub async fn peek(&self) -> Option<Arc<CompiledSchema>> {
        self.current.read().await.clone()
    }

    /// Returns the current compiled schema, regenerating first if stale.
    ///
    /// # Errors
    ///
    /// Propagates the regeneration failure to every caller awaiting this
    /// build; the schema stays stale and the previous compiled schema (if
    /// any) remains untouched.
    pub async fn current(&self) -> Result<Arc<CompiledSchema>, GatewayError> {
        // Fast path: fresh schema already compiled.
        if !self.is_stale()
            && let Some(schema) = self.peek().await
        {
            return Ok(schema);
        }

        let _guard = self.build_lock.lock().await;

        // Double-check: a concurrent caller may have rebuilt while this one
        // waited on the lock.
        if !self.is_stale()
            && let Some(schema) = self.peek().await
        {
            return Ok(schema);
        }

        info!("regenerating aggregated GraphQL schema");
        let compiled = match self.generator.generate().await {
            Ok(compiled) => Arc::new(compiled),
            Err(err) => {
                warn!(error = %err, "schema regeneration failed, staying stale");
                return Err(err);
            }
        };

        *self.current.write().await = Some(Arc::clone(&compiled));
        self.stale.store(false, Ordering::SeqCst);

        info!(executable = compiled.schema.is_some(), "schema regenerated");
        self.bus
            .publish(topics::SCHEMA_UPDATED, json!({ "schema": compiled.sdl }));

        Ok(compiled)
    }
}

impl std::fmt::Debug for SchemaController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaController")
            .field("stale", &self.is_stale())
            .finish_non_exhaustive()
    }
}

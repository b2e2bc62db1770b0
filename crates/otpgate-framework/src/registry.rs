//! Handler registry.
//!
//! Handlers are registered from an explicit startup-time list and validated
//! for duplicate patterns at build time. The registry is process-wide and
//! read-only during dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::RegistryError;
use crate::handler::{HandlerSpec, Trigger};

/// The read-only set of registered handlers.
pub struct HandlerRegistry {
    specs: Vec<Arc<HandlerSpec>>,
    by_pattern: HashMap<String, Arc<HandlerSpec>>,
    by_alias: HashMap<String, Arc<HandlerSpec>>,
}

impl HandlerRegistry {
    /// Builds a registry from a registration list.
    ///
    /// Fails on empty patterns, duplicate patterns, and aliases that collide
    /// with an existing pattern or alias.
    pub fn build(specs: Vec<HandlerSpec>) -> Result<Self, RegistryError> {
        let mut by_pattern: HashMap<String, Arc<HandlerSpec>> = HashMap::new();
        let mut by_alias: HashMap<String, Arc<HandlerSpec>> = HashMap::new();
        let mut all = Vec::with_capacity(specs.len());

        for spec in specs {
            if spec.pattern.is_empty() {
                return Err(RegistryError::EmptyPattern);
            }
            let spec = Arc::new(spec);
            if by_pattern
                .insert(spec.pattern.clone(), Arc::clone(&spec))
                .is_some()
            {
                return Err(RegistryError::DuplicatePattern(spec.pattern.clone()));
            }
            for alias in &spec.aliases {
                if by_pattern.contains_key(alias)
                    || by_alias.insert(alias.clone(), Arc::clone(&spec)).is_some()
                {
                    return Err(RegistryError::DuplicateAlias(alias.clone()));
                }
            }
            all.push(spec);
        }

        debug!(handlers = all.len(), "Handler registry built");

        Ok(Self {
            specs: all,
            by_pattern,
            by_alias,
        })
    }

    /// Resolves a command token: exact pattern match first, then the alias
    /// set. Only command-trigger handlers participate.
    pub fn lookup_command(&self, name: &str) -> Option<&Arc<HandlerSpec>> {
        self.by_pattern
            .get(name)
            .or_else(|| self.by_alias.get(name))
            .filter(|spec| spec.trigger == Trigger::Command)
    }

    /// Iterates every registered handler, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<HandlerSpec>> {
        self.specs.iter()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.specs.len())
            .finish()
    }
}

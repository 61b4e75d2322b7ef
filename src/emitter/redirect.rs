//! The call-redirection capability: "at this source location, use this
//! implementation instead".
//!
//! Any host mechanism able to substitute a call expression at a given
//! location satisfies the contract — macro expansion, AST rewrite or
//! build-time injection. The in-memory registry here is what the pipeline
//! and the CLI use.

use crate::core::{ShapeVariant, SourceLocation};
use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One synthesized replacement implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedWrapper {
    pub location: SourceLocation,
    pub wrapper_name: String,
    pub declaration_key: String,
    pub variant: ShapeVariant,
    /// Rendered wrapper source.
    pub source: String,
}

/// Registers replacement implementations keyed by source location.
pub trait CallRedirector {
    fn register(&mut self, wrapper: GeneratedWrapper) -> Result<()>;
}

/// In-memory registry, ordered by location for deterministic output.
#[derive(Debug, Default)]
pub struct InMemoryRedirector {
    wrappers: BTreeMap<SourceLocation, GeneratedWrapper>,
}

impl InMemoryRedirector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, location: &SourceLocation) -> Option<&GeneratedWrapper> {
        self.wrappers.get(location)
    }

    pub fn wrappers(&self) -> impl Iterator<Item = &GeneratedWrapper> {
        self.wrappers.values()
    }

    pub fn into_wrappers(self) -> Vec<GeneratedWrapper> {
        self.wrappers.into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.wrappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wrappers.is_empty()
    }
}

impl CallRedirector for InMemoryRedirector {
    fn register(&mut self, wrapper: GeneratedWrapper) -> Result<()> {
        let location = wrapper.location.clone();
        // The deduplicator guarantees one record per location; a second
        // registration means an upstream invariant broke.
        if self.wrappers.contains_key(&location) {
            return Err(Error::Redirection {
                location,
                message: "a wrapper is already registered at this location".to_string(),
            });
        }
        self.wrappers.insert(location, wrapper);
        Ok(())
    }
}

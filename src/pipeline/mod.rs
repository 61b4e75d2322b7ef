//! Pipeline orchestration: scan, locate, validate, deduplicate, classify,
//! emit.
//!
//! Every analysis pass is a pure function over an immutable snapshot, so
//! the per-file stages run on the rayon pool with no shared mutable state;
//! results merge in file order afterwards, keeping output deterministic.
//! Parsed token streams are single-threaded, so the snapshot holds source
//! text and each worker parses the file it consumes. No condition
//! encountered while weaving aborts the run: unsupported sites degrade
//! individually through the diagnostic stream.

use crate::analyzers::{
    classify, deduplicate, locate_call_sites, scan_file, validate, ScanResult,
};
use crate::cache::{structural_hash, PassCache};
use crate::config::WeaverConfig;
use crate::core::Diagnostic;
use crate::emitter::{CallRedirector, GeneratedWrapper, InMemoryRedirector, WrapperEmitter};
use crate::errors::{Error, Result};
use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;

/// One source file of the program under analysis.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub source: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Parse the stored source. Token streams cannot cross threads, so
    /// every pass parses on the worker that consumes the AST.
    pub fn parse(&self) -> Result<syn::File> {
        syn::parse_file(&self.source).map_err(|err| Error::from_syn(&self.path, &err))
    }
}

/// Immutable snapshot of the program under analysis.
#[derive(Debug, Clone, Default)]
pub struct ProgramSnapshot {
    pub files: Vec<SourceFile>,
}

impl ProgramSnapshot {
    pub fn new(files: Vec<SourceFile>) -> Self {
        Self { files }
    }

    /// Build a snapshot from `(path, content)` pairs, surfacing parse
    /// errors with their position up front.
    pub fn parse_files(pairs: Vec<(PathBuf, String)>) -> Result<Self> {
        let files: Vec<SourceFile> = pairs
            .into_iter()
            .map(|(path, source)| SourceFile::new(path, source))
            .collect();
        for file in &files {
            file.parse()?;
        }
        Ok(Self { files })
    }
}

/// Generated wrappers plus the diagnostic stream for one pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WeaveOutput {
    pub wrappers: Vec<GeneratedWrapper>,
    pub diagnostics: Vec<Diagnostic>,
}

/// The weaver: owns configuration and the optional pass cache. Entities
/// never persist across passes except through that cache.
pub struct Weaver {
    config: WeaverConfig,
    cache: PassCache,
}

impl Default for Weaver {
    fn default() -> Self {
        Self::new(WeaverConfig::default())
    }
}

impl Weaver {
    pub fn new(config: WeaverConfig) -> Self {
        Self {
            config,
            cache: PassCache::new(),
        }
    }

    /// Run the full pipeline, collecting wrappers into an in-memory
    /// redirection registry.
    pub fn weave(&mut self, snapshot: &ProgramSnapshot) -> Result<WeaveOutput> {
        let mut redirector = InMemoryRedirector::new();
        let diagnostics = self.weave_into(snapshot, &mut redirector)?;
        Ok(WeaveOutput {
            wrappers: redirector.into_wrappers(),
            diagnostics,
        })
    }

    /// Run the full pipeline against a caller-supplied redirection
    /// capability. Returns the diagnostic stream.
    pub fn weave_into(
        &mut self,
        snapshot: &ProgramSnapshot,
        redirector: &mut dyn CallRedirector,
    ) -> Result<Vec<Diagnostic>> {
        let scan = self.scan_snapshot(snapshot)?;
        debug!(
            "snapshot: {} files, {} annotated declarations",
            snapshot.files.len(),
            scan.annotations.len()
        );

        let per_file: Vec<Vec<_>> = if self.config.parallel {
            snapshot
                .files
                .par_iter()
                .map(|file| Ok(locate_call_sites(&file.parse()?, &file.path, &scan)))
                .collect::<Result<_>>()?
        } else {
            snapshot
                .files
                .iter()
                .map(|file| Ok(locate_call_sites(&file.parse()?, &file.path, &scan)))
                .collect::<Result<_>>()?
        };
        let candidates: Vec<_> = per_file.into_iter().flatten().collect();

        let outcome = validate(candidates, &scan.index);
        let surviving = deduplicate(outcome.accepted);

        let emitter = WrapperEmitter::new(&self.config)?;
        for site in &surviving {
            let variant = classify(&site.record);
            let wrapper = emitter.emit(site, &variant)?;
            redirector.register(wrapper)?;
        }

        info!(
            "wove {} call sites, {} diagnostics",
            surviving.len(),
            outcome.diagnostics.len()
        );
        Ok(outcome.diagnostics)
    }

    /// Cache hit/miss counters for the scan pass.
    pub fn cache_stats(&self) -> (usize, usize) {
        self.cache.stats()
    }

    fn scan_snapshot(&mut self, snapshot: &ProgramSnapshot) -> Result<ScanResult> {
        let mut merged = ScanResult::default();
        if self.config.cache_enabled {
            for file in &snapshot.files {
                let hash = structural_hash(&file.source);
                let result = self
                    .cache
                    .get_or_scan(&hash, || Ok(scan_file(&file.parse()?)))?;
                merged.merge(result);
            }
        } else {
            let results: Vec<ScanResult> = if self.config.parallel {
                snapshot
                    .files
                    .par_iter()
                    .map(|file| Ok(scan_file(&file.parse()?)))
                    .collect::<Result<_>>()?
            } else {
                snapshot
                    .files
                    .iter()
                    .map(|file| Ok(scan_file(&file.parse()?)))
                    .collect::<Result<_>>()?
            };
            for result in results {
                merged.merge(result);
            }
        }
        Ok(merged)
    }
}

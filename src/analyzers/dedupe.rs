//! Deduplication of rediscovered call sites.
//!
//! The two annotation kinds are located by independent passes, so one
//! physical call site can arrive here twice. Grouping is by source location
//! only; the first record seen wins. Duplicate discovery is not an error.
//!
//! Known limit, preserved deliberately: two syntactically distinct call
//! expressions at the exact same `(file, line, column)` would be merged
//! into one wrapper.

use crate::analyzers::validator::ValidatedCallSite;
use crate::core::SourceLocation;
use log::debug;
use std::collections::HashSet;

/// Keep exactly one representative per location, first seen.
pub fn deduplicate(sites: Vec<ValidatedCallSite>) -> Vec<ValidatedCallSite> {
    let total = sites.len();
    let mut seen: HashSet<SourceLocation> = HashSet::new();
    let surviving: Vec<ValidatedCallSite> = sites
        .into_iter()
        .filter(|site| seen.insert(site.record.location.clone()))
        .collect();
    if surviving.len() < total {
        debug!(
            "deduplicated {} call-site records down to {}",
            total,
            surviving.len()
        );
    }
    surviving
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AnnotationConfig, CallSiteRecord, ReturnKind};

    fn site(line: usize, key: &str) -> ValidatedCallSite {
        ValidatedCallSite {
            record: CallSiteRecord {
                location: SourceLocation::new("src/demo.rs", line, 4),
                declaration_key: key.to_string(),
                declaration_name: key.to_string(),
                containing_type: "demo".to_string(),
                is_static: true,
                is_generic_declaration: false,
                receiver: None,
                parameters: Vec::new(),
                has_ref_struct_parameter: false,
                is_async: false,
                return_kind: ReturnKind::Unit,
                config: AnnotationConfig::default(),
            },
            predicate: None,
        }
    }

    #[test]
    fn identical_locations_collapse_to_the_first_record() {
        let surviving = deduplicate(vec![site(5, "first"), site(5, "second"), site(9, "third")]);
        assert_eq!(surviving.len(), 2);
        assert_eq!(surviving[0].record.declaration_key, "first");
        assert_eq!(surviving[1].record.declaration_key, "third");
    }

    #[test]
    fn distinct_locations_all_survive() {
        let surviving = deduplicate(vec![site(1, "a"), site(2, "a"), site(3, "a")]);
        assert_eq!(surviving.len(), 3);
    }
}

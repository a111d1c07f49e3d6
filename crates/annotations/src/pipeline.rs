use crate::error::Result;
use crate::intervals::disjunct;
use crate::lines::by_lines;
use crate::tree::AnnotatedJson;
use crate::types::GroupedAnnotation;
use lru::LruCache;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

type Fingerprint = [u8; 32];

/// Capacities for the pipeline memo
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Annotation trees kept per distinct flat mapping
    pub tree_capacity: usize,
    /// Per-line segment results kept per (mapping, path, document) triple
    pub lines_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tree_capacity: 16,
            lines_capacity: 64,
        }
    }
}

/// Memoized end-to-end pipeline: flat mapping + scope path + document text
/// in, per-line disjoint segments out.
///
/// Inputs are fingerprinted with SHA-256 so re-renders with unchanged inputs
/// hit the cache and get back the *same* `Arc`, which callers can use as a
/// no-op-change check. This is a pure function cache; recomputation after
/// eviction yields structurally equal results.
///
/// An unparsable document degrades to unannotated lines of the raw text.
/// Malformed mapping keys still fail loudly.
pub struct PipelineCache {
    trees: Mutex<LruCache<Fingerprint, AnnotatedJson>>,
    lines: Mutex<LruCache<(Fingerprint, String, Fingerprint), Arc<Vec<Vec<GroupedAnnotation>>>>>,
}

impl PipelineCache {
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            trees: Mutex::new(LruCache::new(capacity(config.tree_capacity))),
            lines: Mutex::new(LruCache::new(capacity(config.lines_capacity))),
        }
    }

    /// Annotation tree for a flat mapping, memoized by content fingerprint
    pub fn tree(&self, mappings: &Map<String, Value>) -> Result<AnnotatedJson> {
        let key = fingerprint_mappings(mappings)?;
        if let Ok(mut cache) = self.trees.lock() {
            if let Some(hit) = cache.get(&key) {
                return Ok(hit.clone());
            }
        }
        let tree = AnnotatedJson::from_mappings(mappings)?;
        if let Ok(mut cache) = self.trees.lock() {
            cache.put(key, tree.clone());
        }
        Ok(tree)
    }

    /// Per-line disjoint segments for the document text, with annotations
    /// scoped to `path` first (empty path = whole tree)
    pub fn line_segments(
        &self,
        mappings: &Map<String, Value>,
        path: &str,
        text: &str,
    ) -> Result<Arc<Vec<Vec<GroupedAnnotation>>>> {
        let key = (
            fingerprint_mappings(mappings)?,
            path.to_string(),
            fingerprint(text.as_bytes()),
        );
        if let Ok(mut cache) = self.lines.lock() {
            if let Some(hit) = cache.get(&key) {
                return Ok(Arc::clone(hit));
            }
        }

        let tree = self.tree(mappings)?;
        let scoped = if path.is_empty() {
            tree
        } else {
            tree.for_path(path)
        };
        let resolved = scoped.in_text(text);
        let segments = Arc::new(by_lines(&disjunct(&resolved), text));

        if let Ok(mut cache) = self.lines.lock() {
            cache.put(key, Arc::clone(&segments));
        }
        Ok(segments)
    }
}

impl Default for PipelineCache {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

fn capacity(requested: usize) -> NonZeroUsize {
    NonZeroUsize::new(requested).unwrap_or(NonZeroUsize::MIN)
}

fn fingerprint(bytes: &[u8]) -> Fingerprint {
    Sha256::digest(bytes).into()
}

fn fingerprint_mappings(mappings: &Map<String, Value>) -> Result<Fingerprint> {
    Ok(fingerprint(&serde_json::to_vec(mappings)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn mappings() -> Map<String, Value> {
        json!({ "msg:1-3": "e-l" }).as_object().unwrap().clone()
    }

    const TEXT: &str = "{\"msg\":\n\"hello\"}";

    #[test]
    fn identical_inputs_return_the_same_arc() {
        let cache = PipelineCache::default();
        let first = cache.line_segments(&mappings(), "", TEXT).unwrap();
        let second = cache.line_segments(&mappings(), "", TEXT).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn changed_text_recomputes() {
        let cache = PipelineCache::default();
        let first = cache.line_segments(&mappings(), "", TEXT).unwrap();
        let other = cache
            .line_segments(&mappings(), "", "{\"msg\": \"hello\"}")
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn segments_match_the_unmemoized_pipeline() {
        let cache = PipelineCache::default();
        let cached = cache.line_segments(&mappings(), "", TEXT).unwrap();

        let tree = AnnotatedJson::from_mappings(&mappings()).unwrap();
        let direct = by_lines(&disjunct(&tree.in_text(TEXT)), TEXT);
        assert_eq!(*cached, direct);
        assert_eq!(cached.len(), 2);
    }

    #[test]
    fn scoping_by_path_narrows_the_annotation_set() {
        let cache = PipelineCache::default();
        let map = json!({ "msg:1-3": "x" }).as_object().unwrap().clone();
        let scoped = cache.line_segments(&map, "absent", TEXT).unwrap();
        // nothing resolves, but the text still segments into plain lines
        assert!(scoped
            .iter()
            .flatten()
            .all(|cell| cell.content.is_none()));
    }

    #[test]
    fn unparsable_document_degrades_to_plain_lines() {
        let cache = PipelineCache::default();
        let lines = cache.line_segments(&mappings(), "", "a\nb").unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().flatten().all(|cell| cell.content.is_none()));
    }

    #[test]
    fn malformed_keys_still_fail() {
        let cache = PipelineCache::default();
        let bad = json!({ "a:x-1": "x" }).as_object().unwrap().clone();
        assert!(cache.line_segments(&bad, "", TEXT).is_err());
    }

    #[test]
    fn trees_are_shared_per_mapping_fingerprint() {
        let cache = PipelineCache::default();
        let a = cache.tree(&mappings()).unwrap();
        let b = cache.tree(&mappings()).unwrap();
        assert!(AnnotatedJson::same_tree(&a, &b));
    }
}

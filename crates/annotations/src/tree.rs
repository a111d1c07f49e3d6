use crate::error::{AnnotationError, Result};
use crate::resolve::to_text_offsets;
use crate::source_map;
use crate::types::{Annotation, ResolvedAnnotation};
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};

/// One node of the annotation tree: the annotations local to this path plus
/// one subtree per child segment. Nodes are immutable after construction;
/// every node either carries annotations, has children, or both (all-empty
/// subtrees are never built, except for the shared empty root).
#[derive(Debug, Default)]
pub(crate) struct AnnotationNode {
    pub(crate) annotations: Vec<Annotation>,
    pub(crate) children: BTreeMap<String, Arc<AnnotationNode>>,
}

impl AnnotationNode {
    fn is_empty(&self) -> bool {
        self.annotations.is_empty() && self.children.is_empty()
    }
}

static EMPTY: Lazy<AnnotatedJson> = Lazy::new(|| AnnotatedJson {
    node: Arc::new(AnnotationNode::default()),
    subs: Arc::new(Mutex::new(HashMap::new())),
});

/// Tracks annotations of an arbitrary JSON document, organized by dotted
/// path, and scopes them to sub-paths via [`AnnotatedJson::for_path`].
///
/// A handle is cheap to clone and shares its tree and its `for_path` memo
/// table with all clones: looking up the same path twice returns a handle
/// over the *same* node, so renderers can use [`AnnotatedJson::same_tree`]
/// to skip work when nothing changed.
#[derive(Clone)]
pub struct AnnotatedJson {
    node: Arc<AnnotationNode>,
    // path string -> subtree handle; a lookup cache, not semantic state
    subs: Arc<Mutex<HashMap<String, AnnotatedJson>>>,
}

impl AnnotatedJson {
    /// The canonical shared empty tree. All empty results alias this
    /// instance, so emptiness checks stay identity-stable.
    #[must_use]
    pub fn empty() -> AnnotatedJson {
        EMPTY.clone()
    }

    /// Build a tree from a flat mapping of `"seg1.seg2[:start-end]"` keys to
    /// opaque content values.
    ///
    /// The optional `:start-end` suffix may appear only on the last segment;
    /// a malformed suffix fails with [`AnnotationError::MalformedKey`].
    /// An empty mapping yields the shared empty instance.
    pub fn from_mappings(mappings: &Map<String, Value>) -> Result<AnnotatedJson> {
        if mappings.is_empty() {
            return Ok(Self::empty());
        }
        let entries: Vec<(&str, &Value)> =
            mappings.iter().map(|(k, v)| (k.as_str(), v)).collect();
        let node = build_node(&entries, "")?;
        Ok(Self::with_node(Arc::new(node)))
    }

    fn with_node(node: Arc<AnnotationNode>) -> AnnotatedJson {
        AnnotatedJson {
            node,
            subs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.node.is_empty()
    }

    /// `true` when both handles view the same underlying node
    #[must_use]
    pub fn same_tree(a: &AnnotatedJson, b: &AnnotatedJson) -> bool {
        Arc::ptr_eq(&a.node, &b.node)
    }

    /// Scope to the subtree at the given dotted path.
    ///
    /// Returns the shared empty instance as soon as any segment is missing.
    /// Non-empty results are memoized per handle per path string, so
    /// repeated lookups return an identical subtree handle.
    #[must_use]
    pub fn for_path(&self, path: &str) -> AnnotatedJson {
        if self.node.is_empty() {
            return Self::empty();
        }
        if let Ok(cache) = self.subs.lock() {
            if let Some(hit) = cache.get(path) {
                return hit.clone();
            }
        }

        let mut node = &self.node;
        for segment in path.split('.') {
            match node.children.get(segment) {
                Some(child) => node = child,
                None => return Self::empty(),
            }
        }
        if node.is_empty() {
            return Self::empty();
        }

        let sub = Self::with_node(Arc::clone(node));
        if let Ok(mut cache) = self.subs.lock() {
            cache.insert(path.to_string(), sub.clone());
        }
        sub
    }

    /// Annotations attached directly to this node
    #[must_use]
    pub fn root_annotations(&self) -> &[Annotation] {
        &self.node.annotations
    }

    /// Every annotation in this subtree, collected breadth-first
    #[must_use]
    pub fn all_annotations(&self) -> Vec<&Annotation> {
        let mut queue: VecDeque<&AnnotationNode> = VecDeque::from([self.node.as_ref()]);
        let mut out = Vec::new();
        while let Some(node) = queue.pop_front() {
            out.extend(node.annotations.iter());
            queue.extend(node.children.values().map(Arc::as_ref));
        }
        out
    }

    /// Resolve this subtree's annotations to absolute byte offsets within
    /// the given JSON serialization of the annotated value.
    ///
    /// Annotation paths that do not exist in the document are skipped
    /// silently; they are expected when annotation sets were computed
    /// against a different document version. Fails only when the document
    /// itself is not valid JSON.
    pub fn try_in_text(&self, text: &str) -> Result<Vec<ResolvedAnnotation>> {
        if self.node.is_empty() {
            return Ok(Vec::new());
        }
        let source = source_map::locate(text)?;
        let mut out = Vec::new();
        to_text_offsets(&self.node, &source, &mut out);
        Ok(out)
    }

    /// Lenient variant of [`AnnotatedJson::try_in_text`]: an unparsable
    /// document degrades to "no annotations" instead of an error, so the
    /// surrounding render can proceed.
    #[must_use]
    pub fn in_text(&self, text: &str) -> Vec<ResolvedAnnotation> {
        match self.try_in_text(text) {
            Ok(resolved) => resolved,
            Err(e) => {
                log::warn!("could not map annotations into document text: {e}");
                Vec::new()
            }
        }
    }
}

impl fmt::Debug for AnnotatedJson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("AnnotatedJson::empty")
        } else {
            f.debug_struct("AnnotatedJson")
                .field("node", &self.node)
                .finish()
        }
    }
}

/// Recursive construction: group entries by first path segment, build one
/// subtree per distinct segment, then attach direct (last-segment)
/// annotations to their child nodes.
fn build_node(entries: &[(&str, &Value)], prefix: &str) -> Result<AnnotationNode> {
    let mut per_child: BTreeMap<&str, Vec<(&str, &Value)>> = BTreeMap::new();
    let mut direct: Vec<(&str, Option<(usize, usize)>, &Value)> = Vec::new();

    for &(key, content) in entries {
        let (first, rest) = match key.split_once('.') {
            Some((first, rest)) => (first, Some(rest)),
            None => (key, None),
        };

        if let Some((prop, range)) = first.split_once(':') {
            // a range suffix is only valid on the final segment
            if rest.is_some() {
                return Err(AnnotationError::malformed_key(format!("{prefix}{key}")));
            }
            let (start, end) = parse_range(range)
                .ok_or_else(|| AnnotationError::malformed_key(format!("{prefix}{key}")))?;
            direct.push((prop, Some((start, end)), content));
        } else if let Some(rest) = rest {
            per_child.entry(first).or_default().push((rest, content));
        } else {
            direct.push((first, None, content));
        }
    }

    let mut children: BTreeMap<String, AnnotationNode> = BTreeMap::new();
    for (segment, child_entries) in per_child {
        let child = build_node(&child_entries, &format!("{prefix}{segment}."))?;
        children.insert(segment.to_string(), child);
    }

    for (prop, range, content) in direct {
        let child = children.entry(prop.to_string()).or_default();
        child.annotations.push(match range {
            Some((start, end)) => Annotation::ranged(start, end, content.clone()),
            None => Annotation::whole_node(content.clone()),
        });
    }

    Ok(AnnotationNode {
        annotations: Vec::new(),
        children: children
            .into_iter()
            .map(|(segment, node)| (segment, Arc::new(node)))
            .collect(),
    })
}

fn parse_range(range: &str) -> Option<(usize, usize)> {
    let (start, end) = range.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn tree(mappings: Value) -> AnnotatedJson {
        AnnotatedJson::from_mappings(mappings.as_object().unwrap()).unwrap()
    }

    #[test]
    fn round_trip_through_nested_paths() {
        let t = tree(json!({
            "a.b:0-5": "x",
            "a.b.c:2-3": "y",
            "a:0-0": "z",
        }));

        let ab = t.for_path("a.b");
        assert_eq!(
            ab.root_annotations(),
            &[Annotation::ranged(0, 5, json!("x"))]
        );
        assert_eq!(
            ab.for_path("c").root_annotations(),
            &[Annotation::ranged(2, 3, json!("y"))]
        );
        assert_eq!(
            t.for_path("a").root_annotations(),
            &[Annotation::ranged(0, 0, json!("z"))]
        );
    }

    #[test]
    fn whole_node_annotations_have_no_offsets() {
        let t = tree(json!({
            "message.0.text": "no range",
            "message.0.text:0-5": "hello",
            "message.0.text:7-12": "world",
            "message.2.content:0-5": "foo",
            "message.2.content.type:0-50": "bar",
        }));

        let text = t.for_path("message.0.text");
        assert_eq!(
            text.root_annotations(),
            &[
                Annotation::whole_node(json!("no range")),
                Annotation::ranged(0, 5, json!("hello")),
                Annotation::ranged(7, 12, json!("world")),
            ]
        );

        let content = t.for_path("message.2.content");
        assert_eq!(
            content.root_annotations(),
            &[Annotation::ranged(0, 5, json!("foo"))]
        );
        assert_eq!(
            content.for_path("type").root_annotations(),
            &[Annotation::ranged(0, 50, json!("bar"))]
        );

        assert_eq!(t.all_annotations().len(), 5);
    }

    #[test]
    fn malformed_range_suffix_is_rejected() {
        let mappings = json!({ "a.b:abc-5": "x" });
        let err = AnnotatedJson::from_mappings(mappings.as_object().unwrap()).unwrap_err();
        match err {
            AnnotationError::MalformedKey { key } => assert_eq!(key, "a.b:abc-5"),
            other => panic!("expected MalformedKey, got {other:?}"),
        }
    }

    #[test]
    fn incomplete_range_suffix_is_rejected() {
        for key in ["a:5", "a:5-", "a:-5", "a:"] {
            let mappings = json!({ key: "x" });
            assert!(
                AnnotatedJson::from_mappings(mappings.as_object().unwrap()).is_err(),
                "key {key:?} should be rejected"
            );
        }
    }

    #[test]
    fn range_suffix_on_inner_segment_is_rejected() {
        let mappings = json!({ "a:0-5.b": "x" });
        assert!(AnnotatedJson::from_mappings(mappings.as_object().unwrap()).is_err());
    }

    #[test]
    fn empty_mapping_yields_shared_singleton() {
        let t = AnnotatedJson::from_mappings(&Map::new()).unwrap();
        assert!(t.is_empty());
        assert!(AnnotatedJson::same_tree(&t, &AnnotatedJson::empty()));
        // any lookup on the empty tree returns the singleton itself
        assert!(AnnotatedJson::same_tree(
            &t.for_path("a.b.c"),
            &AnnotatedJson::empty()
        ));
    }

    #[test]
    fn missing_path_returns_empty_singleton() {
        let t = tree(json!({ "a.b:0-5": "x" }));
        assert!(AnnotatedJson::same_tree(
            &t.for_path("a.nope"),
            &AnnotatedJson::empty()
        ));
        assert!(AnnotatedJson::same_tree(
            &t.for_path("unrelated"),
            &AnnotatedJson::empty()
        ));
    }

    #[test]
    fn repeated_lookups_return_identical_subtrees() {
        let t = tree(json!({ "a.b:0-5": "x" }));
        let first = t.for_path("a");
        let second = t.for_path("a");
        assert!(AnnotatedJson::same_tree(&first, &second));
        // a clone shares the memo table with the original
        assert!(AnnotatedJson::same_tree(&t.clone().for_path("a"), &first));
    }
}

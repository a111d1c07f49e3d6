use crate::source_map::SourceRangeTree;
use crate::tree::AnnotationNode;
use crate::types::ResolvedAnnotation;

/// Walk the annotation tree and the source-range tree in lock-step,
/// translating path-relative offsets into absolute byte offsets.
///
/// Whole-node offsets (`None`) fall back to the node's own source range.
/// Branches missing from the source tree are dropped silently: the
/// annotation set was computed against a document that no longer has that
/// path. Offsets are not validated; the addition saturates, so a relative
/// offset beyond its node's range yields an out-of-bounds result that
/// renders unreliably but never panics.
pub(crate) fn to_text_offsets(
    node: &AnnotationNode,
    source: &SourceRangeTree,
    out: &mut Vec<ResolvedAnnotation>,
) {
    if let Some(range) = source.range() {
        for annotation in &node.annotations {
            let start = match annotation.start {
                Some(rel) => range.start.saturating_add(rel),
                None => range.start,
            };
            let end = match annotation.end {
                Some(rel) => range.start.saturating_add(rel),
                None => range.end,
            };
            out.push(ResolvedAnnotation::new(
                start,
                end,
                annotation.content.clone(),
                !annotation.is_whole_node(),
            ));
        }
    } else if !node.annotations.is_empty() {
        log::debug!(
            "node carries {} annotations but no source range; dropping",
            node.annotations.len()
        );
    }

    for (segment, child) in &node.children {
        match source.child(segment) {
            Some(source_child) => to_text_offsets(child, source_child, out),
            None => {
                log::debug!("annotation path segment {segment:?} not in document; skipping subtree");
            }
        }
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Open-ended right boundary used for the tail cell of a disjoint partition.
///
/// The partition conceptually covers `[0, +inf)`; callers clamp to the
/// document length before slicing.
pub const UNBOUNDED: usize = usize::MAX;

/// A single annotation attached to a node of the annotation tree.
///
/// `start`/`end` are byte offsets relative to the substring matched by the
/// owning path; `None` means the annotation applies to the whole node.
/// `content` is opaque and only carried through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub start: Option<usize>,
    pub end: Option<usize>,
    pub content: Value,
}

impl Annotation {
    /// Annotation with explicit relative offsets
    #[must_use]
    pub fn ranged(start: usize, end: usize, content: Value) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            content,
        }
    }

    /// Annotation covering the entirety of whatever range its path resolves to
    #[must_use]
    pub fn whole_node(content: Value) -> Self {
        Self {
            start: None,
            end: None,
            content,
        }
    }

    #[must_use]
    pub fn is_whole_node(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// An annotation with absolute byte offsets into a specific document string.
///
/// `specific` is `true` when the source annotation carried explicit relative
/// offsets, `false` for whole-node annotations that fell back to the range of
/// their path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAnnotation {
    pub start: usize,
    pub end: usize,
    pub content: Value,
    pub specific: bool,
}

impl ResolvedAnnotation {
    #[must_use]
    pub fn new(start: usize, end: usize, content: Value, specific: bool) -> Self {
        Self {
            start,
            end,
            content,
            specific,
        }
    }
}

/// One cell of a disjoint partition: a half-open range plus the annotations
/// covering it. `content == None` means no annotation touches this range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedAnnotation {
    pub start: usize,
    pub end: usize,
    pub content: Option<Vec<ResolvedAnnotation>>,
}

impl GroupedAnnotation {
    #[must_use]
    pub fn is_covered(&self) -> bool {
        self.content.is_some()
    }

    /// Extract the cell's substring, clamping to the text and rounding bad
    /// offsets down to char boundaries. Never panics; mismatched offsets
    /// degrade to a shorter (possibly empty) slice.
    #[must_use]
    pub fn slice_of<'a>(&self, text: &'a str) -> &'a str {
        let mut start = self.start.min(text.len());
        let mut end = self.end.min(text.len());
        while start > 0 && !text.is_char_boundary(start) {
            start -= 1;
        }
        while end > 0 && !text.is_char_boundary(end) {
            end -= 1;
        }
        if start >= end {
            ""
        } else {
            &text[start..end]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn whole_node_has_no_offsets() {
        let a = Annotation::whole_node(json!("x"));
        assert!(a.is_whole_node());
        assert!(!Annotation::ranged(0, 3, json!("x")).is_whole_node());
    }

    #[test]
    fn slice_of_clamps_out_of_range_offsets() {
        let cell = GroupedAnnotation {
            start: 3,
            end: UNBOUNDED,
            content: None,
        };
        assert_eq!(cell.slice_of("ab\ncd"), "cd");

        let bogus = GroupedAnnotation {
            start: 40,
            end: 50,
            content: None,
        };
        assert_eq!(bogus.slice_of("ab"), "");
    }

    #[test]
    fn slice_of_rounds_to_char_boundaries() {
        // 'é' occupies bytes 1..3; offsets cutting through it must not panic
        let cell = GroupedAnnotation {
            start: 0,
            end: 2,
            content: None,
        };
        assert_eq!(cell.slice_of("aéb"), "a");
    }
}

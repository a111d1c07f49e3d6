//! # Traceview Annotations
//!
//! Maps flat, path-addressed annotations onto the exact character ranges of a
//! serialized JSON trace document, so a renderer can highlight the substrings
//! that triggered them.
//!
//! ## Architecture
//!
//! ```text
//! flat mapping { "messages.4.function.arguments.command:0-4": <content> }
//!     │
//!     ├──> AnnotatedJson           (path-keyed annotation tree, `for_path` scoping)
//!     │
//!     ├──> source_map::locate      (document text → byte ranges per structural path)
//!     │
//!     ├──> offset resolution       (`in_text`: relative offsets → absolute offsets)
//!     │
//!     ├──> disjunct                (overlapping ranges → disjoint partition)
//!     │
//!     └──> by_lines                (partition → per-line segments for rendering)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use traceview_annotations::{disjunct, by_lines, AnnotatedJson};
//!
//! let mappings = serde_json::json!({
//!     "msg:1-3": "policy violation",
//! });
//! let tree = AnnotatedJson::from_mappings(mappings.as_object().unwrap()).unwrap();
//!
//! let text = r#"{"msg":"hello"}"#;
//! let resolved = tree.in_text(text);
//! assert_eq!((resolved[0].start, resolved[0].end), (9, 11));
//!
//! let lines = by_lines(&disjunct(&resolved), text);
//! assert_eq!(lines.len(), 1);
//! ```
//!
//! Annotation content is opaque: it is carried through every stage untouched.
//! Annotation sets computed against a stale version of the document are
//! expected; paths that no longer resolve are skipped silently.

mod error;
mod intervals;
mod lines;
mod pipeline;
mod resolve;
mod source_map;
mod tree;
mod types;

pub use error::{AnnotationError, Result};
pub use intervals::disjunct;
pub use lines::by_lines;
pub use pipeline::{PipelineCache, PipelineConfig};
pub use source_map::{locate, SourceRange, SourceRangeTree};
pub use tree::AnnotatedJson;
pub use types::{Annotation, GroupedAnnotation, ResolvedAnnotation, UNBOUNDED};

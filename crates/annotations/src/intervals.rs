use crate::types::{GroupedAnnotation, ResolvedAnnotation, UNBOUNDED};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

/// Partition a list of possibly-overlapping annotations into fully disjoint
/// cells, where each cell's `content` lists the annotations covering it (in
/// input order, duplicates preserved) or `None` when nothing does.
///
/// ```text
/// |--A-----|
///    |--B------|
/// |----C----------|
///
/// becomes
///
/// |AC|-ABC-|BC-|-C|
/// ```
///
/// The boundary sentinels `0` and [`UNBOUNDED`] are always included, so the
/// output covers `[0, +inf)`; callers filter to the range they display.
/// A single sweep with an expiry heap keeps this `O(n log n)` plus output
/// size; annotations join a cell only when their true overlap with it is
/// nonzero, so zero-length annotations and adjacency-only boundary matches
/// never appear.
#[must_use]
pub fn disjunct(items: &[ResolvedAnnotation]) -> Vec<GroupedAnnotation> {
    let mut boundaries: BTreeSet<usize> = BTreeSet::from([0, UNBOUNDED]);
    for item in items {
        boundaries.insert(item.start);
        boundaries.insert(item.end);
    }

    let mut by_start: Vec<(usize, &ResolvedAnnotation)> = items.iter().enumerate().collect();
    by_start.sort_by_key(|(_, item)| item.start);
    let mut upcoming = by_start.into_iter().peekable();

    // active annotations keyed by input position; expiry ordered by end offset
    let mut active: BTreeMap<usize, &ResolvedAnnotation> = BTreeMap::new();
    let mut expiry: BinaryHeap<Reverse<(usize, usize)>> = BinaryHeap::new();

    let mut cells = Vec::with_capacity(boundaries.len().saturating_sub(1));
    let mut bounds = boundaries.into_iter().peekable();
    while let Some(start) = bounds.next() {
        let Some(&end) = bounds.peek() else { break };

        // admit annotations beginning at this cut point
        while let Some(&(position, item)) = upcoming.peek() {
            if item.start > start {
                break;
            }
            active.insert(position, item);
            expiry.push(Reverse((item.end, position)));
            upcoming.next();
        }
        // retire annotations that end at or before it (zero-length ones
        // retire in the same step they were admitted)
        while let Some(&Reverse((item_end, position))) = expiry.peek() {
            if item_end > start {
                break;
            }
            expiry.pop();
            active.remove(&position);
        }

        let content = if active.is_empty() {
            None
        } else {
            Some(active.values().map(|item| (*item).clone()).collect())
        };
        cells.push(GroupedAnnotation {
            start,
            end,
            content,
        });
    }
    cells
}

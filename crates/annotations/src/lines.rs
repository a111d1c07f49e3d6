use crate::types::GroupedAnnotation;
use std::collections::VecDeque;

/// Re-segment a disjoint partition by line: any cell spanning a `\n` is cut
/// at the newline, the first piece (newline included) staying on the current
/// line and the remainder re-queued for the next, both keeping the same
/// content. Returns one inner list per physical line of the text.
///
/// Newlines are found by byte search, so offsets beyond the text or inside
/// multi-byte characters degrade to shorter pieces instead of panicking.
#[must_use]
pub fn by_lines(cells: &[GroupedAnnotation], text: &str) -> Vec<Vec<GroupedAnnotation>> {
    let bytes = text.as_bytes();
    let mut result: Vec<Vec<GroupedAnnotation>> = Vec::new();
    let mut current: Vec<GroupedAnnotation> = Vec::new();
    let mut queue: VecDeque<GroupedAnnotation> = cells.iter().cloned().collect();

    while let Some(mut front) = queue.pop_front() {
        let lo = front.start.min(bytes.len());
        let hi = front.end.min(bytes.len()).max(lo);

        match bytes[lo..hi].iter().position(|&b| b == b'\n') {
            None => current.push(front),
            Some(offset) => {
                let cut = lo + offset + 1;
                current.push(GroupedAnnotation {
                    start: front.start,
                    end: cut,
                    content: front.content.clone(),
                });
                result.push(std::mem::take(&mut current));
                front.start = cut;
                queue.push_front(front);
            }
        }
    }
    result.push(current);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intervals::disjunct;
    use crate::types::{ResolvedAnnotation, UNBOUNDED};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn cell(start: usize, end: usize, tag: Option<&str>) -> GroupedAnnotation {
        GroupedAnnotation {
            start,
            end,
            content: tag.map(|t| vec![ResolvedAnnotation::new(start, end, json!(t), true)]),
        }
    }

    #[test]
    fn cells_spanning_a_newline_are_cut_after_it() {
        let text = "ab\ncd";
        let input = vec![GroupedAnnotation {
            start: 0,
            end: 5,
            content: Some(vec![ResolvedAnnotation::new(0, 5, json!("X"), true)]),
        }];
        let lines = by_lines(&input, text);

        assert_eq!(lines.len(), 2);
        assert_eq!((lines[0][0].start, lines[0][0].end), (0, 3));
        assert_eq!((lines[1][0].start, lines[1][0].end), (3, 5));
        // both pieces keep the same tag
        assert_eq!(lines[0][0].content, input[0].content);
        assert_eq!(lines[1][0].content, input[0].content);
    }

    #[test]
    fn multiple_newlines_produce_one_piece_per_line() {
        let text = "a\nb\nc";
        let lines = by_lines(&[cell(0, 5, Some("X"))], text);
        let spans: Vec<Vec<(usize, usize)>> = lines
            .iter()
            .map(|line| line.iter().map(|c| (c.start, c.end)).collect())
            .collect();
        assert_eq!(spans, vec![vec![(0, 2)], vec![(2, 4)], vec![(4, 5)]]);
    }

    #[test]
    fn cells_without_newlines_stay_on_one_line() {
        let text = "no newline here";
        let input = vec![cell(0, 3, Some("a")), cell(3, 15, None)];
        let lines = by_lines(&input, text);
        assert_eq!(lines, vec![input]);
    }

    #[test]
    fn unbounded_tail_is_split_like_any_other_cell() {
        let text = "x\ny";
        let lines = by_lines(&disjunct(&[]), text);

        assert_eq!(lines.len(), 2);
        assert_eq!((lines[0][0].start, lines[0][0].end), (0, 2));
        assert_eq!((lines[1][0].start, lines[1][0].end), (2, UNBOUNDED));
        assert_eq!(lines[1][0].slice_of(text), "y");
    }

    #[test]
    fn cell_ending_exactly_at_a_newline_leaves_an_empty_remainder() {
        // the remainder after the cut is zero-length and lands on the next
        // line, mirroring how an empty trailing split behaves
        let text = "ab\ncd";
        let lines = by_lines(&[cell(0, 3, Some("X"))], text);
        assert_eq!(lines.len(), 2);
        assert_eq!((lines[0][0].start, lines[0][0].end), (0, 3));
        assert_eq!((lines[1][0].start, lines[1][0].end), (3, 3));
    }

    #[test]
    fn empty_input_yields_a_single_empty_line() {
        assert_eq!(by_lines(&[], "anything"), vec![Vec::new()]);
    }
}

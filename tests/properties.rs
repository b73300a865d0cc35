//! Property tests for the replacement algebra.

use blockpatch::{FileEdit, Replacement};
use proptest::prelude::*;

fn snapshot_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z ]{0,8}", 0..24)
}

fn lines_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[A-Z]{0,6}", 0..6)
}

proptest! {
    /// Applying `Replacement(start, end, new)` to `L` yields exactly
    /// `L[..start] + new + L[end..]`; `start == end` inserts without
    /// removing.
    #[test]
    fn splice_matches_definition(
        snapshot in snapshot_strategy(),
        bounds in (0usize..25, 0usize..25),
        new_lines in lines_strategy(),
    ) {
        let len = snapshot.len();
        let (a, b) = bounds;
        let start = a.min(len);
        let end = start + (b % (len - start + 1));

        let replacement = Replacement::new(start, end, new_lines.clone()).unwrap();
        let applied = replacement.apply(&snapshot).unwrap();

        let mut expected = snapshot[..start].to_vec();
        expected.extend(new_lines);
        expected.extend_from_slice(&snapshot[end..]);
        prop_assert_eq!(applied, expected);
    }

    /// For two disjoint replacements, applying bottom-to-top (what the
    /// engine does) and top-to-bottom with offset tracking agree.
    #[test]
    fn disjoint_orderings_agree(
        snapshot in snapshot_strategy(),
        cuts in (0usize..25, 0usize..25, 0usize..25, 0usize..25),
        first_lines in lines_strategy(),
        second_lines in lines_strategy(),
    ) {
        let len = snapshot.len();
        let mut points = [cuts.0 % (len + 1), cuts.1 % (len + 1), cuts.2 % (len + 1), cuts.3 % (len + 1)];
        points.sort_unstable();
        let first = Replacement::new(points[0], points[1], first_lines.clone()).unwrap();
        let second = Replacement::new(points[2], points[3], second_lines.clone()).unwrap();

        let mut edit = FileEdit::update("f.txt");
        edit.replacements = vec![first.clone(), second.clone()];
        let bottom_up = edit.updated_lines(&snapshot).unwrap();

        // Ascending order: apply the earlier range first, then the later
        // one shifted by the length delta of the first.
        let after_first = first.apply(&snapshot).unwrap();
        let delta = first_lines.len() as isize - (first.end - first.start) as isize;
        let shifted = Replacement::new(
            (second.start as isize + delta) as usize,
            (second.end as isize + delta) as usize,
            second_lines,
        )
        .unwrap();
        let top_down = shifted.apply(&after_first).unwrap();

        prop_assert_eq!(bottom_up, top_down);
    }

    /// Overlap rejection is symmetric in list order.
    #[test]
    fn overlap_rejected_in_any_order(
        snapshot in snapshot_strategy(),
        start in 0usize..20,
        lines in lines_strategy(),
    ) {
        let len = snapshot.len().max(2);
        let snapshot: Vec<String> = (0..len).map(|i| format!("line{}", i)).collect();
        let start = start % (len - 1);
        let overlapping = vec![
            Replacement::new(start, start + 2, lines.clone()).unwrap(),
            Replacement::new(start + 1, start + 2, lines).unwrap(),
        ];

        for order in [overlapping.clone(), {
            let mut reversed = overlapping;
            reversed.reverse();
            reversed
        }] {
            let mut edit = FileEdit::update("f.txt");
            edit.replacements = order;
            prop_assert!(edit.updated_lines(&snapshot).is_err());
        }
    }
}

//! Matching by elimination: progressive narrowing of the candidate pool.
//!
//! Each comparator filters the remaining candidates in turn. A pool of
//! exactly one is accepted immediately; an emptied pool aborts the pass and
//! the comparator list is retried rotated (first comparator moved to the
//! end), at most once per comparator, so a field corrupted by hand-editing
//! cannot permanently block a row it happens to be evaluated first on.

use log::debug;

use crate::recon::comparators::COMPARATORS;
use crate::recon::sheet::SheetRow;
use crate::recon::{CommentRecord, MatchOutcome};

/// Finds the row for one comment among `candidates` (indices into `rows`).
pub(crate) fn eliminate_one(
    comment: &CommentRecord,
    candidates: &[usize],
    rows: &[SheetRow],
) -> Option<usize> {
    let n = COMPARATORS.len();
    for rotation in 0..n {
        let mut remaining: Vec<usize> = candidates.to_vec();
        let mut wiped = false;
        for k in 0..n {
            let (name, compare) = COMPARATORS[(k + rotation) % n];
            remaining.retain(|&ri| compare(comment, &rows[ri]));
            match remaining.len() {
                0 => {
                    debug!(
                        "eliminate: cid {}: rotation {}: {:?} emptied the pool",
                        comment.cid, rotation, name
                    );
                    wiped = true;
                    break;
                }
                1 => return Some(remaining[0]),
                _ => {}
            }
        }
        if !wiped {
            // Several equally plausible rows survived every comparator.
            // Take the first, stable by input order; ambiguity is resolved
            // deterministically, not reported as a failure.
            return remaining.first().copied();
        }
    }
    None
}

/// Matches the whole sheet against the whole comment set. Comments are
/// processed in ascending sequence-number order and consumed rows leave the
/// pool, so one row never serves two comments. The caller checks the row
/// count up front.
pub(crate) fn match_by_elimination(comments: &[CommentRecord], rows: &[SheetRow]) -> MatchOutcome {
    let mut order: Vec<usize> = (0..comments.len()).collect();
    order.sort_by_key(|&ci| comments[ci].cid);

    let mut pool: Vec<usize> = (0..rows.len()).collect();
    let mut matched: Vec<(usize, usize)> = Vec::new();
    let mut unmatched_db: Vec<usize> = Vec::new();
    for ci in order {
        match eliminate_one(&comments[ci], &pool, rows) {
            Some(ri) => {
                pool.retain(|&x| x != ri);
                matched.push((ci, ri));
            }
            None => unmatched_db.push(ci),
        }
    }

    MatchOutcome {
        matched,
        unmatched_db,
        unmatched_sheet: pool,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recon::testing::{comment, row_for};

    #[test]
    fn corrupted_category_is_recovered_by_rotation() {
        // The row's category was hand-edited from "T" to "G", so the
        // category-first pass empties the pool. The rotated pass starts at
        // clause instead and isolates the row before category is consulted.
        let comments = vec![comment(1, "T", "5.2", "10", "3")];
        let mut edited = row_for(&comments[0]);
        edited.category = Some("G".to_string());
        let mut decoy = row_for(&comments[0]);
        decoy.category = Some("E".to_string());
        decoy.clause = Some("12.1".to_string());
        decoy.page = Some("99".to_string());
        decoy.line = Some("1".to_string());
        decoy.comment = Some("unrelated remark".to_string());
        decoy.proposed_change = Some("unrelated change".to_string());
        let rows = vec![decoy, edited];
        let out = match_by_elimination(&comments, &rows);
        assert_eq!(out.matched, vec![(0, 1)]);
        assert!(out.unmatched_db.is_empty());
        assert_eq!(out.unmatched_sheet, vec![0]);
    }

    #[test]
    fn elimination_is_deterministic() {
        let comments: Vec<CommentRecord> = (1..=5)
            .map(|i| comment(i, "T", &format!("{i}.2"), "10", "3"))
            .collect();
        let rows: Vec<SheetRow> = comments.iter().map(row_for).collect();
        let first = match_by_elimination(&comments, &rows);
        for _ in 0..3 {
            let again = match_by_elimination(&comments, &rows);
            assert_eq!(first.matched, again.matched);
            assert_eq!(first.unmatched_db, again.unmatched_db);
            assert_eq!(first.unmatched_sheet, again.unmatched_sheet);
        }
    }

    #[test]
    fn ambiguity_takes_the_first_remaining_row() {
        // Two rows identical in every compared field: the earlier one wins.
        let comments = vec![comment(1, "T", "5.2", "10", "3")];
        let rows = vec![row_for(&comments[0]), row_for(&comments[0])];
        let out = match_by_elimination(&comments, &rows);
        assert_eq!(out.matched, vec![(0, 0)]);
        assert_eq!(out.unmatched_sheet, vec![1]);
    }

    #[test]
    fn divergent_rows_are_eliminated() {
        let comments = vec![comment(1, "T", "5.2", "10", "3")];
        let mut stranger = row_for(&comments[0]);
        stranger.category = Some("G".to_string());
        stranger.clause = Some("12.1".to_string());
        stranger.page = Some("99".to_string());
        stranger.line = Some("1".to_string());
        stranger.comment = Some("different remark".to_string());
        stranger.proposed_change = Some("different change".to_string());
        let out = match_by_elimination(&comments, &[stranger, row_for(&comments[0])]);
        assert_eq!(out.matched, vec![(0, 1)]);
        assert_eq!(out.unmatched_sheet, vec![0]);
    }

    #[test]
    fn comments_are_processed_in_ascending_cid_order() {
        // Both comments would accept the first row on a tie-break, but the
        // lower cid is processed first and consumes it.
        let mut c_high = comment(9, "T", "5.2", "10", "3");
        let mut c_low = comment(2, "T", "5.2", "10", "3");
        c_high.comment = "same body".to_string();
        c_high.proposed_change = String::new();
        c_low.comment = "same body".to_string();
        c_low.proposed_change = String::new();
        let row = {
            let mut r = row_for(&c_low);
            r.cid = None;
            r
        };
        let comments = vec![c_high, c_low];
        let out = match_by_elimination(&comments, &[row.clone(), row]);
        // comments[1] has cid 2 and went first.
        assert_eq!(out.matched, vec![(1, 0), (0, 1)]);
    }
}

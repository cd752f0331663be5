//! Matching by whole-content equality: the first remaining row on which
//! every comparator agrees is taken. First-come, not globally optimal; a
//! consumed row leaves the pool before the next comment is considered.

use crate::recon::comparators::COMPARATORS;
use crate::recon::sheet::SheetRow;
use crate::recon::{CommentRecord, MatchOutcome};

pub(crate) fn match_by_content(comments: &[CommentRecord], rows: &[SheetRow]) -> MatchOutcome {
    let mut used = vec![false; rows.len()];
    let mut matched: Vec<(usize, usize)> = Vec::new();
    let mut unmatched_db: Vec<usize> = Vec::new();

    for (ci, comment) in comments.iter().enumerate() {
        let hit = rows.iter().enumerate().position(|(ri, row)| {
            !used[ri] && COMPARATORS.iter().all(|(_, compare)| compare(comment, row))
        });
        match hit {
            Some(ri) => {
                used[ri] = true;
                matched.push((ci, ri));
            }
            None => unmatched_db.push(ci),
        }
    }
    let unmatched_sheet = (0..rows.len()).filter(|&ri| !used[ri]).collect();

    MatchOutcome {
        matched,
        unmatched_db,
        unmatched_sheet,
    }
}

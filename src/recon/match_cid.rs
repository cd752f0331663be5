//! Matching by identifier: the row's CID column against the comment's
//! sequence number. The cheap path when the upload kept the exported ids.

use std::collections::HashMap;

use crate::recon::sheet::SheetRow;
use crate::recon::{CommentRecord, MatchOutcome};

pub(crate) fn match_by_cid(comments: &[CommentRecord], rows: &[SheetRow]) -> MatchOutcome {
    let mut by_cid: HashMap<u32, usize> = HashMap::new();
    for (ri, row) in rows.iter().enumerate() {
        if let Some(cid) = row.parse_cid() {
            // The first of duplicated CIDs wins; the rest stay unmatched.
            by_cid.entry(cid).or_insert(ri);
        }
    }

    let mut used = vec![false; rows.len()];
    let mut matched: Vec<(usize, usize)> = Vec::new();
    let mut unmatched_db: Vec<usize> = Vec::new();
    for (ci, comment) in comments.iter().enumerate() {
        match by_cid.get(&comment.cid) {
            Some(&ri) if !used[ri] => {
                used[ri] = true;
                matched.push((ci, ri));
            }
            _ => unmatched_db.push(ci),
        }
    }
    let unmatched_sheet = (0..rows.len()).filter(|&ri| !used[ri]).collect();

    MatchOutcome {
        matched,
        unmatched_db,
        unmatched_sheet,
    }
}

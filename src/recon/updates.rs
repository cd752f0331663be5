//! Field-level update application after matching.
//!
//! Only fields that actually differ, and whose category the caller enabled,
//! are written. The comment-side categories are cid renumbering, location
//! and triage; the resolution-side categories are assignee, resolution and
//! editing, applied to the comment's lowest-numbered resolution (created in
//! the smallest free slot when the row carries resolution content and the
//! comment has none).

use log::debug;

use std::collections::HashSet;

use crate::recon::sheet::{cell, SheetRow};
use crate::recon::{CommentRecord, ResolutionRecord, UpdateCategories};

/// Smallest free non-negative resolution identifier.
pub(crate) fn next_resolution_id(existing: &[u32]) -> u32 {
    let used: HashSet<u32> = existing.iter().copied().collect();
    (0..).find(|id| !used.contains(id)).unwrap_or(0)
}

// Overwrites `dst` with the row's value when the column is present and the
// values differ. Returns whether a write happened.
fn set_if_differs(dst: &mut String, src: &Option<String>) -> bool {
    match src {
        Some(value) if dst != value => {
            *dst = value.clone();
            true
        }
        _ => false,
    }
}

fn truthy(cell_text: &str) -> bool {
    matches!(
        cell_text.trim().to_ascii_lowercase().as_str(),
        "1" | "x" | "y" | "yes" | "true"
    )
}

pub(crate) fn apply_updates(
    comments: &mut [CommentRecord],
    rows: &[SheetRow],
    matched: &[(usize, usize)],
    categories: &UpdateCategories,
) -> usize {
    let mut applied = 0;
    for &(ci, ri) in matched {
        let comment = &mut comments[ci];
        let row = &rows[ri];

        if categories.cid {
            if let Some(new_cid) = row.parse_cid() {
                if new_cid != comment.cid {
                    debug!("apply_updates: renumbering {} -> {}", comment.cid, new_cid);
                    comment.cid = new_cid;
                    applied += 1;
                }
            }
        }
        if categories.location {
            applied += usize::from(set_if_differs(&mut comment.clause, &row.clause));
            applied += usize::from(set_if_differs(&mut comment.page, &row.page));
            applied += usize::from(set_if_differs(&mut comment.line, &row.line));
        }
        if categories.triage {
            applied += usize::from(set_if_differs(&mut comment.ad_hoc, &row.ad_hoc));
            applied += usize::from(set_if_differs(&mut comment.comment_group, &row.comment_group));
            applied += usize::from(set_if_differs(&mut comment.notes, &row.notes));
        }

        if categories.assignee || categories.resolution || categories.editing {
            applied += apply_resolution_updates(comment, row, categories);
        }
    }
    applied
}

fn apply_resolution_updates(
    comment: &mut CommentRecord,
    row: &SheetRow,
    categories: &UpdateCategories,
) -> usize {
    if comment.resolutions.is_empty() {
        if !row_has_resolution_content(row) {
            return 0;
        }
        let resn_id = next_resolution_id(&[]);
        comment.resolutions.push(ResolutionRecord {
            resn_id,
            ..ResolutionRecord::default()
        });
    }
    // The lowest-numbered resolution is the one the export produced.
    let resolution = comment
        .resolutions
        .iter_mut()
        .min_by_key(|r| r.resn_id)
        .expect("at least one resolution");

    let mut applied = 0;
    if categories.assignee {
        applied += usize::from(set_if_differs(&mut resolution.assignee, &row.assignee));
        applied += usize::from(set_if_differs(&mut resolution.submission, &row.submission));
    }
    if categories.resolution {
        applied += usize::from(set_if_differs(&mut resolution.resn_status, &row.resn_status));
        applied += usize::from(set_if_differs(&mut resolution.resolution, &row.resolution));
        if let Some(raw) = &row.ready_for_motion {
            let flag = truthy(raw);
            if resolution.ready_for_motion != flag {
                resolution.ready_for_motion = flag;
                applied += 1;
            }
        }
        applied += usize::from(set_if_differs(
            &mut resolution.approved_by_motion,
            &row.approved_by_motion,
        ));
    }
    if categories.editing {
        applied += usize::from(set_if_differs(&mut resolution.edit_status, &row.edit_status));
        applied += usize::from(set_if_differs(&mut resolution.edit_notes, &row.edit_notes));
        applied += usize::from(set_if_differs(
            &mut resolution.edit_in_draft,
            &row.edit_in_draft,
        ));
    }
    applied
}

fn row_has_resolution_content(row: &SheetRow) -> bool {
    [
        &row.assignee,
        &row.submission,
        &row.resn_status,
        &row.resolution,
        &row.ready_for_motion,
        &row.approved_by_motion,
        &row.edit_status,
        &row.edit_notes,
        &row.edit_in_draft,
    ]
    .iter()
    .any(|f| f.as_deref().is_some_and(|s| !s.trim().is_empty()))
}

/// Inserts unmatched sheet rows as brand-new comments. The row's CID is
/// honored when free; otherwise the next sequence number past the current
/// maximum is allocated. Returns the new identifiers.
pub(crate) fn insert_unmatched(
    comments: &mut Vec<CommentRecord>,
    rows: &[SheetRow],
    unmatched_sheet: &[usize],
) -> Vec<u32> {
    let mut added: Vec<u32> = Vec::new();
    let mut next_cid = comments.iter().map(|c| c.cid).max().map_or(1, |m| m + 1);
    for &ri in unmatched_sheet {
        let row = &rows[ri];
        let cid = match row.parse_cid() {
            Some(cid) if !comments.iter().any(|c| c.cid == cid) => cid,
            _ => next_cid,
        };
        next_cid = next_cid.max(cid + 1);

        let mut comment = CommentRecord {
            cid,
            commenter: cell(&row.commenter).to_string(),
            category: cell(&row.category).to_string(),
            clause: cell(&row.clause).to_string(),
            page: cell(&row.page).to_string(),
            line: cell(&row.line).to_string(),
            comment: cell(&row.comment).to_string(),
            proposed_change: cell(&row.proposed_change).to_string(),
            ad_hoc: cell(&row.ad_hoc).to_string(),
            comment_group: cell(&row.comment_group).to_string(),
            notes: cell(&row.notes).to_string(),
            resolutions: Vec::new(),
        };
        if row_has_resolution_content(row) {
            comment.resolutions.push(ResolutionRecord {
                resn_id: next_resolution_id(&[]),
                assignee: cell(&row.assignee).to_string(),
                submission: cell(&row.submission).to_string(),
                resn_status: cell(&row.resn_status).to_string(),
                resolution: cell(&row.resolution).to_string(),
                ready_for_motion: truthy(cell(&row.ready_for_motion)),
                approved_by_motion: cell(&row.approved_by_motion).to_string(),
                edit_status: cell(&row.edit_status).to_string(),
                edit_notes: cell(&row.edit_notes).to_string(),
                edit_in_draft: cell(&row.edit_in_draft).to_string(),
            });
        }
        debug!("insert_unmatched: added comment {}", cid);
        added.push(cid);
        comments.push(comment);
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recon::testing::{comment, row_for};

    #[test]
    fn resolution_ids_fill_the_smallest_free_slot() {
        assert_eq!(next_resolution_id(&[]), 0);
        assert_eq!(next_resolution_id(&[0, 1, 2]), 3);
        assert_eq!(next_resolution_id(&[0, 2, 3]), 1);
        assert_eq!(next_resolution_id(&[1, 2]), 0);
    }

    #[test]
    fn only_enabled_categories_are_applied() {
        let mut comments = vec![comment(1, "T", "5.2", "10", "3")];
        let mut row = row_for(&comments[0]);
        row.clause = Some("6.3".to_string());
        row.notes = Some("bring to ad-hoc".to_string());

        // Location disabled, triage enabled.
        let categories = UpdateCategories {
            triage: true,
            ..UpdateCategories::default()
        };
        let applied = apply_updates(&mut comments, &[row.clone()], &[(0, 0)], &categories);
        assert_eq!(applied, 1);
        assert_eq!(comments[0].clause, "5.2");
        assert_eq!(comments[0].notes, "bring to ad-hoc");

        // Now location too; only the clause still differs.
        let categories = UpdateCategories {
            triage: true,
            location: true,
            ..UpdateCategories::default()
        };
        let applied = apply_updates(&mut comments, &[row], &[(0, 0)], &categories);
        assert_eq!(applied, 1);
        assert_eq!(comments[0].clause, "6.3");
    }

    #[test]
    fn unchanged_fields_cost_nothing() {
        let mut comments = vec![comment(1, "T", "5.2", "10", "3")];
        let row = row_for(&comments[0]);
        let applied = apply_updates(&mut comments, &[row], &[(0, 0)], &UpdateCategories::all());
        assert_eq!(applied, 0);
    }

    #[test]
    fn cid_renumbering_is_its_own_category() {
        let mut comments = vec![comment(1, "T", "5.2", "10", "3")];
        let mut row = row_for(&comments[0]);
        row.cid = Some("42".to_string());
        let categories = UpdateCategories {
            cid: true,
            ..UpdateCategories::default()
        };
        let applied = apply_updates(&mut comments, &[row], &[(0, 0)], &categories);
        assert_eq!(applied, 1);
        assert_eq!(comments[0].cid, 42);
    }

    #[test]
    fn resolution_updates_create_the_first_slot_when_needed() {
        let mut comments = vec![comment(1, "T", "5.2", "10", "3")];
        let mut row = row_for(&comments[0]);
        row.resn_status = Some("V".to_string());
        row.resolution = Some("Revised per discussion.".to_string());
        row.ready_for_motion = Some("1".to_string());
        let categories = UpdateCategories {
            resolution: true,
            ..UpdateCategories::default()
        };
        let applied = apply_updates(&mut comments, &[row], &[(0, 0)], &categories);
        assert_eq!(applied, 3);
        let resolution = &comments[0].resolutions[0];
        assert_eq!(resolution.resn_id, 0);
        assert_eq!(resolution.resn_status, "V");
        assert!(resolution.ready_for_motion);
    }

    #[test]
    fn inserted_rows_avoid_cid_collisions() {
        let mut comments = vec![comment(7, "T", "5.2", "10", "3")];
        let mut colliding = row_for(&comments[0]);
        colliding.cid = Some("7".to_string());
        let mut free = row_for(&comments[0]);
        free.cid = Some("12".to_string());
        let rows = vec![colliding, free];
        let added = insert_unmatched(&mut comments, &rows, &[0, 1]);
        assert_eq!(added, vec![8, 12]);
        assert_eq!(comments.len(), 3);
    }
}

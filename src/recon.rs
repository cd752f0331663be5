use log::{debug, info};

use serde::Serialize;
use snafu::{prelude::*, Snafu};

pub mod comparators;
pub mod sheet;

mod match_cid;
mod match_content;
mod match_elimination;
mod updates;

use crate::recon::sheet::SheetRow;

/// An authoritative comment, keyed by its sequence number within a ballot.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct CommentRecord {
    pub cid: u32,
    pub commenter: String,
    pub category: String,
    pub clause: String,
    pub page: String,
    pub line: String,
    pub comment: String,
    pub proposed_change: String,
    pub ad_hoc: String,
    pub comment_group: String,
    pub notes: String,
    pub resolutions: Vec<ResolutionRecord>,
}

/// One resolution of a comment. Identifiers are unique within the comment;
/// allocation reuses the smallest free non-negative slot.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ResolutionRecord {
    pub resn_id: u32,
    pub assignee: String,
    pub submission: String,
    pub resn_status: String,
    pub resolution: String,
    pub ready_for_motion: bool,
    pub approved_by_motion: String,
    pub edit_status: String,
    pub edit_notes: String,
    pub edit_in_draft: String,
}

/// How spreadsheet rows are paired with stored comments.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize)]
pub enum MatchStrategy {
    /// The row's CID column, parsed as an integer, equals the comment's
    /// sequence number.
    Cid,
    /// First row for which all six field comparators agree.
    Content,
    /// Progressive candidate elimination with comparator rotation.
    Elimination,
}

/// The six independently toggleable update categories.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct UpdateCategories {
    /// Renumber the comment to the row's CID.
    pub cid: bool,
    /// Clause, page and line location fields.
    pub location: bool,
    /// Ad-hoc owner, comment group and notes triage fields.
    pub triage: bool,
    /// Resolution assignee and submission.
    pub assignee: bool,
    /// Resolution text, disposition status and motion fields.
    pub resolution: bool,
    /// Editorial status, notes and in-draft marker.
    pub editing: bool,
}

impl UpdateCategories {
    pub fn all() -> UpdateCategories {
        UpdateCategories {
            cid: true,
            location: true,
            triage: true,
            assignee: true,
            resolution: true,
            editing: true,
        }
    }
}

/// What the caller wants updated after matching.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum UpdateScope {
    /// Every category. Not accepted together with elimination matching,
    /// where a mismatched pair would rewrite every field of the wrong
    /// comment.
    All,
    Selected(UpdateCategories),
}

/// Index pairs produced by a matching strategy. Indices refer to the inputs
/// of [match_rows]; both unmatched sides are reported explicitly.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub matched: Vec<(usize, usize)>,
    pub unmatched_db: Vec<usize>,
    pub unmatched_sheet: Vec<usize>,
}

/// Summary handed back to the upload layer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchReport {
    pub matched_count: usize,
    pub unmatched_db_ids: Vec<u32>,
    pub unmatched_sheet_ids: Vec<String>,
    pub added_ids: Vec<u32>,
    pub applied_update_count: usize,
}

#[derive(Debug, Snafu)]
pub enum ReconError {
    #[snafu(display(
        "the spreadsheet carries {sheet} comment row(s) but the ballot has {db}; \
         elimination matching needs a row for every comment"
    ))]
    CountMismatch { sheet: usize, db: usize },

    #[snafu(display("update scope {scope} cannot be combined with {strategy:?} matching"))]
    InvalidPolicy {
        strategy: MatchStrategy,
        scope: String,
    },

    #[snafu(display("row {row}: {detail}"))]
    MalformedRow { row: usize, detail: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ReconResult<T> = Result<T, ReconError>;

fn validate_scope(strategy: MatchStrategy, scope: UpdateScope) -> ReconResult<UpdateCategories> {
    match (strategy, scope) {
        (MatchStrategy::Elimination, UpdateScope::All) => InvalidPolicySnafu {
            strategy,
            scope: "all".to_string(),
        }
        .fail(),
        (_, UpdateScope::All) => Ok(UpdateCategories::all()),
        (_, UpdateScope::Selected(categories)) => Ok(categories),
    }
}

// A row that can match nothing is almost always a parsing accident in the
// upload; better to refuse the whole file than to silently drop it.
fn validate_rows(strategy: MatchStrategy, rows: &[SheetRow]) -> ReconResult<()> {
    for (idx, row) in rows.iter().enumerate() {
        match strategy {
            MatchStrategy::Cid => {
                if row.parse_cid().is_none() {
                    return MalformedRowSnafu {
                        row: idx,
                        detail: format!(
                            "CID column {:?} is not an integer",
                            row.cid.as_deref().unwrap_or("")
                        ),
                    }
                    .fail();
                }
            }
            MatchStrategy::Content | MatchStrategy::Elimination => {
                if !row.has_matchable_content() {
                    return MalformedRowSnafu {
                        row: idx,
                        detail: "row carries none of the matchable fields".to_string(),
                    }
                    .fail();
                }
            }
        }
    }
    Ok(())
}

/// Runs one matching strategy over the full sheet and comment set.
///
/// Pure: nothing is modified. Elimination fails fast on a count mismatch;
/// the other strategies degrade gracefully and report both unmatched sides.
pub fn match_rows(
    strategy: MatchStrategy,
    rows: &[SheetRow],
    comments: &[CommentRecord],
) -> ReconResult<MatchOutcome> {
    validate_rows(strategy, rows)?;
    let outcome = match strategy {
        MatchStrategy::Cid => match_cid::match_by_cid(comments, rows),
        MatchStrategy::Content => match_content::match_by_content(comments, rows),
        MatchStrategy::Elimination => {
            ensure!(
                rows.len() >= comments.len(),
                CountMismatchSnafu {
                    sheet: rows.len(),
                    db: comments.len()
                }
            );
            match_elimination::match_by_elimination(comments, rows)
        }
    };
    debug!(
        "match_rows: {:?}: {} matched, {} db unmatched, {} sheet unmatched",
        strategy,
        outcome.matched.len(),
        outcome.unmatched_db.len(),
        outcome.unmatched_sheet.len()
    );
    Ok(outcome)
}

/// Matches an uploaded sheet against the stored comments and applies the
/// requested field updates in place.
///
/// Only fields that actually differ and whose category is enabled are
/// touched. When `insert_unmatched` is set, sheet rows with no counterpart
/// become brand-new comments with freshly derived child resolutions.
pub fn reconcile_upload(
    strategy: MatchStrategy,
    scope: UpdateScope,
    rows: &[SheetRow],
    comments: &mut Vec<CommentRecord>,
    insert_unmatched: bool,
) -> ReconResult<MatchReport> {
    let categories = validate_scope(strategy, scope)?;
    info!(
        "reconcile_upload: {} row(s) against {} comment(s), strategy {:?}",
        rows.len(),
        comments.len(),
        strategy
    );
    let outcome = match_rows(strategy, rows, comments)?;

    // Report identifiers before any renumbering below can move them.
    let unmatched_db_ids: Vec<u32> = outcome.unmatched_db.iter().map(|&ci| comments[ci].cid).collect();
    let unmatched_sheet_ids: Vec<String> = outcome
        .unmatched_sheet
        .iter()
        .map(|&ri| rows[ri].label(ri))
        .collect();

    let applied_update_count = updates::apply_updates(comments, rows, &outcome.matched, &categories);
    let added_ids = if insert_unmatched {
        updates::insert_unmatched(comments, rows, &outcome.unmatched_sheet)
    } else {
        Vec::new()
    };

    Ok(MatchReport {
        matched_count: outcome.matched.len(),
        unmatched_db_ids,
        unmatched_sheet_ids,
        added_ids,
        applied_update_count,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub(crate) fn comment(cid: u32, category: &str, clause: &str, page: &str, line: &str) -> CommentRecord {
        CommentRecord {
            cid,
            category: category.to_string(),
            clause: clause.to_string(),
            page: page.to_string(),
            line: line.to_string(),
            comment: format!("comment body {cid}"),
            proposed_change: format!("proposed change {cid}"),
            ..CommentRecord::default()
        }
    }

    pub(crate) fn row_for(c: &CommentRecord) -> SheetRow {
        SheetRow {
            cid: Some(c.cid.to_string()),
            category: Some(c.category.clone()),
            clause: Some(c.clause.clone()),
            page: Some(c.page.clone()),
            line: Some(c.line.clone()),
            comment: Some(c.comment.clone()),
            proposed_change: Some(c.proposed_change.clone()),
            ..SheetRow::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{comment, row_for};
    use super::*;

    #[test]
    fn elimination_rejects_all_scope() {
        let mut comments = vec![comment(1, "T", "5.2", "10", "3")];
        let rows = vec![row_for(&comments[0])];
        let res = reconcile_upload(
            MatchStrategy::Elimination,
            UpdateScope::All,
            &rows,
            &mut comments,
            false,
        );
        assert!(matches!(res, Err(ReconError::InvalidPolicy { .. })));
    }

    #[test]
    fn elimination_fails_fast_on_count_mismatch() {
        let comments = vec![
            comment(1, "T", "5.2", "10", "3"),
            comment(2, "E", "6.1", "20", "8"),
        ];
        let rows = vec![row_for(&comments[0])];
        let res = match_rows(MatchStrategy::Elimination, &rows, &comments);
        match res {
            Err(ReconError::CountMismatch { sheet: 1, db: 2 }) => {}
            other => panic!("expected a count mismatch, got {other:?}"),
        }
    }

    #[test]
    fn cid_strategy_requires_parseable_cids() {
        let comments = vec![comment(1, "T", "5.2", "10", "3")];
        let mut row = row_for(&comments[0]);
        row.cid = Some("not-a-number".to_string());
        let res = match_rows(MatchStrategy::Cid, &[row], &comments);
        assert!(matches!(res, Err(ReconError::MalformedRow { row: 0, .. })));
    }

    #[test]
    fn reconcile_reports_both_unmatched_sides() {
        let mut comments = vec![
            comment(7, "T", "5.2", "10", "3"),
            comment(9, "E", "6.1", "20", "8"),
        ];
        // One row matches comment 7; nothing matches comment 9.
        let rows = vec![row_for(&comments[0]), {
            let mut r = row_for(&comments[0]);
            r.cid = Some("1000".to_string());
            r.comment = Some("entirely new remark".to_string());
            r
        }];
        let report = reconcile_upload(
            MatchStrategy::Cid,
            UpdateScope::Selected(UpdateCategories::default()),
            &rows,
            &mut comments,
            false,
        )
        .unwrap();
        assert_eq!(report.matched_count, 1);
        assert_eq!(report.unmatched_db_ids, vec![9]);
        assert_eq!(report.unmatched_sheet_ids, vec!["CID 1000".to_string()]);
        assert_eq!(report.applied_update_count, 0);
        assert!(report.added_ids.is_empty());
    }

    #[test]
    fn unmatched_rows_can_become_new_comments() {
        let mut comments = vec![comment(1, "T", "5.2", "10", "3")];
        let mut extra = SheetRow {
            cid: Some("12".to_string()),
            category: Some("G".to_string()),
            comment: Some("brand new".to_string()),
            resolution: Some("Will fix.".to_string()),
            resn_status: Some("A".to_string()),
            ..SheetRow::default()
        };
        extra.clause = Some("9.9".to_string());
        let rows = vec![row_for(&comments[0]), extra];
        let report = reconcile_upload(
            MatchStrategy::Cid,
            UpdateScope::Selected(UpdateCategories::default()),
            &rows,
            &mut comments,
            true,
        )
        .unwrap();
        assert_eq!(report.added_ids, vec![12]);
        assert_eq!(comments.len(), 2);
        let added = comments.iter().find(|c| c.cid == 12).unwrap();
        assert_eq!(added.comment, "brand new");
        assert_eq!(added.resolutions.len(), 1);
        assert_eq!(added.resolutions[0].resn_id, 0);
        assert_eq!(added.resolutions[0].resolution, "Will fix.");
    }
}

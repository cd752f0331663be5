//! Read-path orchestration: compute a ballot's coalesced results, refresh
//! the memoized summary, and shape export payloads for the reporting layer.
//!
//! The JSON trees built here are what the surrounding application hands to
//! its export endpoints; nothing in this module performs I/O.

use log::info;

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;

use vote_coalescing::participation::MemberParticipation;
use vote_coalescing::{
    refresh_results, Ballot, BallotResults, CoalesceError, CoalescedResult, ResultsSummary,
    SeriesDataset,
};

pub fn summary_to_json(summary: &ResultsSummary) -> JSValue {
    json!({
        "approve": summary.approve,
        "disapprove": summary.disapprove,
        "abstain": summary.abstain,
        "invalidDisapprove": summary.invalid_disapprove,
        "invalidAbstain": summary.invalid_abstain,
        "invalidVote": summary.invalid_vote,
        "returnsPool": summary.returns_pool,
        "totalReturns": summary.total_returns,
        "votingPool": summary.voting_pool,
        "commenters": summary.commenters,
        // Rates are null rather than NaN when a pool is empty.
        "approvalRate": summary.approval_rate(),
        "returnRate": summary.return_rate(),
    })
}

pub fn rows_to_json(rows: &[CoalescedResult]) -> Vec<JSValue> {
    let mut out: Vec<JSValue> = Vec::with_capacity(rows.len());
    for row in rows {
        let mut m: JSMap<String, JSValue> = JSMap::new();
        m.insert("voter".to_string(), json!(row.voter_id));
        m.insert("status".to_string(), json!(format!("{:?}", row.status)));
        m.insert("vote".to_string(), json!(row.vote));
        if let Some(ballot_id) = row.vote_ballot_id {
            m.insert("voteBallot".to_string(), json!(ballot_id));
        }
        if let Some(voter_id) = &row.vote_voter_id {
            m.insert("voteAs".to_string(), json!(voter_id));
        }
        m.insert("comments".to_string(), json!(row.comment_count));
        m.insert("totalComments".to_string(), json!(row.total_comment_count));
        out.push(JSValue::Object(m));
    }
    out
}

pub fn results_to_json(ballot: &Ballot, results: &BallotResults) -> JSValue {
    json!({
        "ballot": ballot.id,
        "type": format!("{:?}", ballot.ballot_type),
        "opens": ballot.opens_at.to_rfc3339(),
        "closes": ballot.closes_at.to_rfc3339(),
        "summary": summary_to_json(&results.summary),
        "results": rows_to_json(&results.rows),
    })
}

/// Recomputes a ballot's results, refreshes its cached summary when stale,
/// and returns the export payload.
pub fn refresh_and_export(
    ballot: &mut Ballot,
    data: &SeriesDataset,
) -> Result<JSValue, CoalesceError> {
    let results = refresh_results(ballot, data)?;
    if results.cache_refreshed {
        info!("refresh_and_export: ballot {:?}: summary cache updated", ballot.id);
    }
    Ok(results_to_json(ballot, &results))
}

pub fn participation_to_json(members: &[MemberParticipation]) -> JSValue {
    let mut out: Vec<JSValue> = Vec::with_capacity(members.len());
    for member in members {
        let series: Vec<JSValue> = member
            .series
            .iter()
            .map(|s| {
                json!({
                    "series": s.label,
                    "vote": s.vote,
                    "ballot": s.ballot_id,
                    "voteAs": s.voter_id,
                    "comments": s.comment_count,
                    "excused": s.excused,
                })
            })
            .collect();
        out.push(json!({"voter": member.voter_id, "series": series}));
    }
    JSValue::Array(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vote_coalescing::builder::Builder;
    use vote_coalescing::{BallotType, VoterStatus};

    fn small_dataset() -> SeriesDataset {
        let mut builder = Builder::new()
            .round(1, None, BallotType::WorkingGroup)
            .unwrap()
            .round(2, Some(1), BallotType::WorkingGroup)
            .unwrap()
            .roster_entry("anna", VoterStatus::Voter, None)
            .unwrap()
            .roster_entry("bob", VoterStatus::Voter, None)
            .unwrap();
        builder.add_vote(1, "anna", "Approve", 0).unwrap();
        builder.add_vote(1, "bob", "Disapprove", 2).unwrap();
        builder.add_vote(2, "anna", "Disapprove", 1).unwrap();
        builder.build()
    }

    #[test]
    fn export_carries_summary_and_rows() {
        let data = small_dataset();
        let mut ballot = data.ballots[&2].clone();
        let js = refresh_and_export(&mut ballot, &data).unwrap();
        assert_eq!(js["ballot"], json!(2));
        assert_eq!(js["summary"]["disapprove"], json!(2));
        assert_eq!(js["summary"]["totalReturns"], json!(2));
        assert_eq!(js["results"].as_array().unwrap().len(), 2);
        assert!(ballot.cached_summary.is_some());
    }

    #[test]
    fn empty_pool_rates_export_as_null() {
        let summary = ResultsSummary::default();
        let js = summary_to_json(&summary);
        assert_eq!(js["approvalRate"], JSValue::Null);
        assert_eq!(js["returnRate"], JSValue::Null);
    }
}

//! Cross-series participation reporting.
//!
//! Compliance views need to answer "when did this member last take part"
//! across the last few completed series. This module scans each series'
//! rounds newest to oldest and records, per roster member, the last valid
//! vote together with the round and identity that produced it.

use log::debug;

use std::collections::{HashMap, HashSet};

use crate::{
    ballot_series, classify_vote, resolve_current, BallotId, CoalesceError, SeriesDataset,
};

/// One series to include in the participation matrix.
#[derive(Debug, Clone)]
pub struct SeriesInput {
    /// Column label for the matrix, e.g. the draft name.
    pub label: String,
    /// The most recent round of the series; the walk starts here.
    pub final_ballot_id: BallotId,
    pub dataset: SeriesDataset,
    /// Members administratively excused for this series.
    pub excused: HashSet<String>,
}

/// A member's engagement with one series.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SeriesVote {
    pub label: String,
    /// The last valid vote, or `None` when the member never voted in the
    /// series or is not on its roster.
    pub vote: Option<String>,
    /// Round that produced the vote.
    pub ballot_id: Option<BallotId>,
    /// Identity under which the vote was cast.
    pub voter_id: Option<String>,
    /// Comments across every round of the series.
    pub comment_count: u32,
    pub excused: bool,
}

/// One record per member, one [SeriesVote] per requested series, in request
/// order. Suitable for rendering a member-by-series matrix.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct MemberParticipation {
    pub voter_id: String,
    pub series: Vec<SeriesVote>,
}

// Per-series scan results, keyed by resolved member identity.
struct SeriesScan {
    last_vote: HashMap<String, (String, BallotId, String)>,
    comment_totals: HashMap<String, u32>,
    roster_members: Vec<String>,
}

/// Builds the participation summary over the given series.
///
/// Members are the union of the rosters (resolved to current identities);
/// each series is scanned independently, so callers are free to compute the
/// per-series scans concurrently and merge.
pub fn participation(inputs: &[SeriesInput]) -> Result<Vec<MemberParticipation>, CoalesceError> {
    let mut scans: Vec<SeriesScan> = Vec::with_capacity(inputs.len());
    for input in inputs {
        scans.push(scan_series(input)?);
    }

    // Union of all rosters, first-seen order.
    let mut members: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for scan in &scans {
        for m in &scan.roster_members {
            if seen.insert(m.clone()) {
                members.push(m.clone());
            }
        }
    }
    debug!(
        "participation: {} member(s) over {} series",
        members.len(),
        inputs.len()
    );

    let mut out: Vec<MemberParticipation> = Vec::with_capacity(members.len());
    for member in members {
        let mut series: Vec<SeriesVote> = Vec::with_capacity(inputs.len());
        for (input, scan) in inputs.iter().zip(scans.iter()) {
            let (vote, ballot_id, voter_id) = match scan.last_vote.get(&member) {
                Some((v, b, id)) => (Some(v.clone()), Some(*b), Some(id.clone())),
                None => (None, None, None),
            };
            series.push(SeriesVote {
                label: input.label.clone(),
                vote,
                ballot_id,
                voter_id,
                comment_count: scan.comment_totals.get(&member).copied().unwrap_or(0),
                excused: input.excused.contains(&member),
            });
        }
        out.push(MemberParticipation {
            voter_id: member,
            series,
        });
    }
    Ok(out)
}

fn scan_series(input: &SeriesInput) -> Result<SeriesScan, CoalesceError> {
    let data = &input.dataset;
    let series = ballot_series(input.final_ballot_id, &data.ballots)?;
    let round_index: HashMap<BallotId, usize> =
        series.iter().enumerate().map(|(i, b)| (b.id, i)).collect();

    // Votes grouped by round, keyed by resolved identity.
    let mut per_round: Vec<HashMap<String, &crate::VoteRecord>> =
        vec![HashMap::new(); series.len()];
    let mut comment_totals: HashMap<String, u32> = HashMap::new();
    for v in &data.votes {
        let Some(&ridx) = round_index.get(&v.ballot_id) else {
            continue;
        };
        let resolved = resolve_current(&v.voter_id, &data.roster);
        *comment_totals.entry(resolved.voter_id.clone()).or_insert(0) += v.comment_count;
        per_round[ridx].insert(resolved.voter_id, v);
    }

    let mut roster_members: Vec<String> = Vec::new();
    let mut last_vote: HashMap<String, (String, BallotId, String)> = HashMap::new();
    for entry in &data.roster {
        let member = resolve_current(&entry.voter_id, &data.roster).voter_id;
        if roster_members.contains(&member) {
            continue;
        }
        // Newest round first; the first valid vote found wins.
        for ridx in (0..series.len()).rev() {
            if let Some(record) = per_round[ridx].get(&member) {
                if classify_vote(&record.vote).is_return() {
                    last_vote.insert(
                        member.clone(),
                        (record.vote.clone(), series[ridx].id, record.voter_id.clone()),
                    );
                    break;
                }
            }
        }
        roster_members.push(member);
    }

    Ok(SeriesScan {
        last_vote,
        comment_totals,
        roster_members,
    })
}

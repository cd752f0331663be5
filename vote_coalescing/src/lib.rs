mod config;
pub mod builder;
pub mod manual;
pub mod participation;

use log::{debug, info, warn};

use std::collections::{HashMap, HashSet};

pub use crate::config::*;

// **** Private structures ****

/// Lookup table over the roster, replacement chains included.
struct RosterIndex<'a> {
    by_id: HashMap<&'a str, &'a VoterPoolEntry>,
}

impl<'a> RosterIndex<'a> {
    fn new(roster: &'a [VoterPoolEntry]) -> RosterIndex<'a> {
        RosterIndex {
            by_id: roster.iter().map(|e| (e.voter_id.as_str(), e)).collect(),
        }
    }

    fn status(&self, voter_id: &str) -> Option<VoterStatus> {
        self.by_id.get(voter_id).map(|e| e.status)
    }

    /// Bounded walk over the replacement chain. Fails closed: on a cycle or
    /// a missing link the original identifier comes back unresolved with
    /// `terminated = false`, never a loop.
    fn resolve(&self, voter_id: &str) -> ResolvedIdentity {
        let mut cur = voter_id;
        for _ in 0..MAX_REPLACEMENT_HOPS {
            match self.by_id.get(cur) {
                Some(entry) if entry.status != VoterStatus::Obsolete => {
                    return ResolvedIdentity {
                        voter_id: cur.to_string(),
                        terminated: true,
                    };
                }
                Some(entry) => match entry.replaced_by.as_deref() {
                    Some(next) => cur = next,
                    None => {
                        return ResolvedIdentity {
                            voter_id: cur.to_string(),
                            terminated: true,
                        };
                    }
                },
                // Unknown identifier: fine as a starting point (a voter
                // outside the roster), a broken link mid-chain otherwise.
                None => {
                    return ResolvedIdentity {
                        voter_id: voter_id.to_string(),
                        terminated: cur == voter_id,
                    };
                }
            }
        }
        warn!(
            "resolve: replacement chain from {:?} did not terminate within {} hops",
            voter_id, MAX_REPLACEMENT_HOPS
        );
        ResolvedIdentity {
            voter_id: voter_id.to_string(),
            terminated: false,
        }
    }
}

// How vote records are grouped into one row per voter.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum GroupKey {
    // Working-group ballots: group by the resolved current identity.
    ResolvedIdentity,
    // Approval-body ballots: group by the email carried in `voter_id`.
    Email,
}

// Accumulator for one voter across the series. Indices point into the
// dataset's vote list to keep the borrows simple.
#[derive(Debug, Clone, Copy, Default)]
struct VoteAcc {
    latest: Option<(usize, usize)>, // (round index in series, vote index)
    total_comments: u32,
}

/// Outcome of resolving a voter identifier through the replacement chain.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ResolvedIdentity {
    /// The current identity, or the original identifier when the chain was
    /// cyclic or broken.
    pub voter_id: String,
    /// False when the chain did not terminate within the hop bound.
    pub terminated: bool,
}

/// The fully-loaded inputs for one series: the ballot table, the roster as
/// captured at the series' initial round, and the vote records of every
/// round. Loading is the caller's concern; nothing here performs I/O.
#[derive(Debug, Clone, Default)]
pub struct SeriesDataset {
    pub ballots: HashMap<BallotId, Ballot>,
    pub roster: Vec<VoterPoolEntry>,
    pub votes: Vec<VoteRecord>,
}

/// Coalesced rows plus the summary derived from them.
#[derive(Debug, Clone)]
pub struct BallotResults {
    pub rows: Vec<CoalescedResult>,
    pub summary: ResultsSummary,
    /// Whether the ballot's cached summary had to be overwritten.
    pub cache_refreshed: bool,
}

/// Resolves a historical voter identifier to its current identity by
/// following the roster's replacement chain.
pub fn resolve_current(voter_id: &str, roster: &[VoterPoolEntry]) -> ResolvedIdentity {
    RosterIndex::new(roster).resolve(voter_id)
}

/// Classifies a free-text vote. The qualifier check for abstains is
/// case-insensitive, matching what human-entered ballots actually contain.
pub fn classify_vote(vote: &str) -> VoteKind {
    let v = vote.trim();
    if v.is_empty() || v.eq_ignore_ascii_case(CoalescedResult::NO_VOTE) {
        return VoteKind::NotReturned;
    }
    let lower = v.to_ascii_lowercase();
    if lower.starts_with("approve") {
        VoteKind::Approve
    } else if lower.starts_with("disapprove") {
        VoteKind::Disapprove
    } else if lower.starts_with("abstain") {
        if lower.contains("lack of expertise") {
            VoteKind::AbstainLackOfExpertise
        } else {
            VoteKind::AbstainOther
        }
    } else {
        VoteKind::Other
    }
}

/// Walks the series chain of the given ballot and returns the rounds in
/// series order, initial round first.
///
/// Traversal is bounded iteration, never recursion: a chain that does not
/// reach an initial round within [MAX_SERIES_ROUNDS] hops is reported as a
/// broken series, not silently truncated.
pub fn ballot_series(
    ballot_id: BallotId,
    ballots: &HashMap<BallotId, Ballot>,
) -> Result<Vec<Ballot>, CoalesceError> {
    let start = ballots
        .get(&ballot_id)
        .ok_or(CoalesceError::BallotNotFound(ballot_id))?;
    let mut chain: Vec<Ballot> = vec![start.clone()];
    let mut cur = start;
    while let Some(prev_id) = cur.prev_id {
        if chain.len() >= MAX_SERIES_ROUNDS {
            return Err(CoalesceError::BrokenSeries {
                ballot_id,
                detail: format!("no initial round within {MAX_SERIES_ROUNDS} rounds"),
            });
        }
        let prev = ballots
            .get(&prev_id)
            .ok_or_else(|| CoalesceError::BrokenSeries {
                ballot_id,
                detail: format!("round {} references missing round {}", cur.id, prev_id),
            })?;
        chain.push(prev.clone());
        cur = prev;
    }
    chain.reverse();
    debug!(
        "ballot_series: ballot {:?} has {} round(s)",
        ballot_id,
        chain.len()
    );
    Ok(chain)
}

/// Coalesces the vote records of a ballot's whole series into one effective
/// row per voter. The grouping and carry-forward rules depend on the ballot
/// type; see the crate documentation.
pub fn coalesce(
    ballot_id: BallotId,
    data: &SeriesDataset,
) -> Result<Vec<CoalescedResult>, CoalesceError> {
    let ballot = data
        .ballots
        .get(&ballot_id)
        .ok_or(CoalesceError::BallotNotFound(ballot_id))?;
    info!(
        "coalesce: ballot {:?} ({:?}), {} vote record(s), roster of {}",
        ballot_id,
        ballot.ballot_type,
        data.votes.len(),
        data.roster.len()
    );
    match ballot.ballot_type {
        BallotType::WorkingGroup => coalesce_series(ballot_id, data, GroupKey::ResolvedIdentity),
        BallotType::ApprovalBody => coalesce_series(ballot_id, data, GroupKey::Email),
        BallotType::CommentCollection => coalesce_passthrough(ballot_id, data),
    }
}

fn coalesce_series(
    ballot_id: BallotId,
    data: &SeriesDataset,
    group_key: GroupKey,
) -> Result<Vec<CoalescedResult>, CoalesceError> {
    let series = ballot_series(ballot_id, &data.ballots)?;
    let round_index: HashMap<BallotId, usize> =
        series.iter().enumerate().map(|(i, b)| (b.id, i)).collect();
    let index = RosterIndex::new(&data.roster);

    let mut seen: HashSet<(BallotId, &str)> = HashSet::new();
    let mut groups: HashMap<String, VoteAcc> = HashMap::new();
    // First-seen order of the groups, for deterministic output.
    let mut group_order: Vec<String> = Vec::new();

    for (vote_idx, v) in data.votes.iter().enumerate() {
        let Some(&ridx) = round_index.get(&v.ballot_id) else {
            continue;
        };
        if !seen.insert((v.ballot_id, v.voter_id.as_str())) {
            return Err(CoalesceError::DuplicateVote {
                ballot_id: v.ballot_id,
                voter_id: v.voter_id.clone(),
            });
        }
        let key = match group_key {
            GroupKey::ResolvedIdentity => {
                let resolved = index.resolve(&v.voter_id);
                if !resolved.terminated {
                    warn!(
                        "coalesce: keeping {:?} unresolved (broken replacement chain)",
                        v.voter_id
                    );
                }
                resolved.voter_id
            }
            GroupKey::Email => v.voter_id.clone(),
        };
        let acc = groups.entry(key.clone()).or_insert_with(|| {
            group_order.push(key);
            VoteAcc::default()
        });
        acc.total_comments += v.comment_count;
        // The last round of the series that contains a vote is authoritative.
        if acc.latest.map_or(true, |(prev_ridx, _)| ridx >= prev_ridx) {
            acc.latest = Some((ridx, vote_idx));
        }
    }

    let mut rows: Vec<CoalescedResult> = Vec::new();
    let mut emitted: HashSet<String> = HashSet::new();

    if group_key == GroupKey::ResolvedIdentity {
        // Roster members first, in roster order. Two roster entries may
        // resolve to the same current identity; the first one wins.
        for entry in &data.roster {
            let resolved = index.resolve(&entry.voter_id);
            if !emitted.insert(resolved.voter_id.clone()) {
                continue;
            }
            let status = index.status(&resolved.voter_id).unwrap_or(entry.status);
            match groups.get(&resolved.voter_id) {
                Some(acc) => rows.push(row_from_acc(&resolved.voter_id, status, acc, &series, data)),
                None => rows.push(CoalescedResult {
                    voter_id: resolved.voter_id,
                    status,
                    vote: CoalescedResult::NO_VOTE.to_string(),
                    vote_ballot_id: None,
                    vote_voter_id: None,
                    comment_count: 0,
                    total_comment_count: 0,
                }),
            }
        }
    }

    // Voters who cast a vote but were not reached through the roster. For
    // approval-body ballots this is every respondent.
    for key in &group_order {
        if emitted.contains(key) {
            continue;
        }
        let status = match group_key {
            GroupKey::ResolvedIdentity => index.status(key).unwrap_or(VoterStatus::NonVoter),
            GroupKey::Email => VoterStatus::Voter,
        };
        let acc = &groups[key];
        rows.push(row_from_acc(key, status, acc, &series, data));
    }

    debug!(
        "coalesce: ballot {:?}: {} coalesced row(s)",
        ballot_id,
        rows.len()
    );
    Ok(rows)
}

fn row_from_acc(
    voter_id: &str,
    status: VoterStatus,
    acc: &VoteAcc,
    series: &[Ballot],
    data: &SeriesDataset,
) -> CoalescedResult {
    // The accumulator always holds at least one vote by construction.
    let (ridx, vote_idx) = acc.latest.expect("vote group without a vote");
    let record = &data.votes[vote_idx];
    CoalescedResult {
        voter_id: voter_id.to_string(),
        status,
        vote: record.vote.clone(),
        vote_ballot_id: Some(series[ridx].id),
        vote_voter_id: Some(record.voter_id.clone()),
        comment_count: record.comment_count,
        total_comment_count: acc.total_comments,
    }
}

// Comment-collection ballots are single-round by construction: one row per
// vote record, no cross-round merge.
fn coalesce_passthrough(
    ballot_id: BallotId,
    data: &SeriesDataset,
) -> Result<Vec<CoalescedResult>, CoalesceError> {
    let index = RosterIndex::new(&data.roster);
    let mut seen: HashSet<&str> = HashSet::new();
    let mut rows: Vec<CoalescedResult> = Vec::new();
    for v in data.votes.iter().filter(|v| v.ballot_id == ballot_id) {
        if !seen.insert(v.voter_id.as_str()) {
            return Err(CoalesceError::DuplicateVote {
                ballot_id,
                voter_id: v.voter_id.clone(),
            });
        }
        rows.push(CoalescedResult {
            voter_id: v.voter_id.clone(),
            status: index.status(&v.voter_id).unwrap_or(VoterStatus::NonVoter),
            vote: v.vote.clone(),
            vote_ballot_id: Some(ballot_id),
            vote_voter_id: Some(v.voter_id.clone()),
            comment_count: v.comment_count,
            total_comment_count: v.comment_count,
        });
    }
    Ok(rows)
}

/// Derives the aggregate counts for a list of coalesced rows. One handler
/// per ballot type; the invariant `total_returns = approve + disapprove +
/// abstain` holds for all three.
pub fn summarize(ballot_type: BallotType, results: &[CoalescedResult]) -> ResultsSummary {
    let mut summary = match ballot_type {
        BallotType::WorkingGroup => summarize_working_group(results),
        BallotType::ApprovalBody => summarize_flat(results, true),
        BallotType::CommentCollection => summarize_flat(results, false),
    };
    summary.total_returns = summary.approve + summary.disapprove + summary.abstain;
    summary
}

fn summarize_working_group(results: &[CoalescedResult]) -> ResultsSummary {
    let mut s = ResultsSummary::default();
    for row in results {
        let kind = classify_vote(&row.vote);
        let in_pool = matches!(row.status, VoterStatus::Voter | VoterStatus::ExOfficio);
        let mut valid = false;
        if in_pool {
            match kind {
                VoteKind::Approve => {
                    s.approve += 1;
                    valid = true;
                }
                VoteKind::Disapprove if row.comment_count > 0 => {
                    s.disapprove += 1;
                    valid = true;
                }
                VoteKind::Disapprove => s.invalid_disapprove += 1,
                VoteKind::AbstainLackOfExpertise => {
                    s.abstain += 1;
                    valid = true;
                }
                VoteKind::AbstainOther => s.invalid_abstain += 1,
                VoteKind::NotReturned | VoteKind::Other => {}
            }
        } else if kind.is_return() {
            // A vote from outside the pool never counts toward the tallies.
            s.invalid_vote += 1;
        }
        match row.status {
            VoterStatus::Voter => {
                s.voting_pool += 1;
                s.returns_pool += 1;
            }
            VoterStatus::ExOfficio if valid => s.returns_pool += 1,
            _ => {}
        }
        if row.total_comment_count > 0 {
            s.commenters += 1;
        }
    }
    s
}

// Approval-body and comment-collection summaries share a shape: no roster,
// every row is in the pool. Approval-body keeps the validity gating;
// comment-collection is a straight tally.
fn summarize_flat(results: &[CoalescedResult], gated: bool) -> ResultsSummary {
    let mut s = ResultsSummary::default();
    for row in results {
        match classify_vote(&row.vote) {
            VoteKind::Approve => s.approve += 1,
            VoteKind::Disapprove if gated && row.comment_count == 0 => s.invalid_disapprove += 1,
            VoteKind::Disapprove => s.disapprove += 1,
            VoteKind::AbstainLackOfExpertise => s.abstain += 1,
            VoteKind::AbstainOther if gated => s.invalid_abstain += 1,
            VoteKind::AbstainOther => s.abstain += 1,
            VoteKind::NotReturned | VoteKind::Other => {}
        }
        s.returns_pool += 1;
        s.voting_pool += 1;
        if row.total_comment_count > 0 {
            s.commenters += 1;
        }
    }
    s
}

/// Computes the coalesced rows and summary for a ballot, refreshing the
/// ballot's cached summary when it differs from the fresh value.
///
/// This is the only mutation the read path performs and it is idempotent:
/// recomputing over unchanged votes compares equal and leaves the cache
/// untouched. `data.ballots` must contain the ballot itself.
pub fn refresh_results(
    ballot: &mut Ballot,
    data: &SeriesDataset,
) -> Result<BallotResults, CoalesceError> {
    let rows = coalesce(ballot.id, data)?;
    let summary = summarize(ballot.ballot_type, &rows);
    let cache_refreshed = ballot.cached_summary.as_ref() != Some(&summary);
    if cache_refreshed {
        debug!(
            "refresh_results: ballot {:?}: cached summary replaced",
            ballot.id
        );
        ballot.cached_summary = Some(summary.clone());
    }
    Ok(BallotResults {
        rows,
        summary,
        cache_refreshed,
    })
}

// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric identifier of one ballot round.
pub type BallotId = u32;

/// The three kinds of ballots handled by the coalescing pipeline.
///
/// The kind is selected once at the top of the pipeline and drives both
/// the grouping strategy and the summary rules.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum BallotType {
    /// Single-round call for comments. No validity gating.
    CommentCollection,
    /// Working-group letter ballot, possibly followed by recirculations.
    WorkingGroup,
    /// Single-round approval-body ballot. Respondents are keyed by email
    /// because no persistent voter identifier exists for this population.
    ApprovalBody,
}

/// One ballot round. Rounds of the same series are chained through
/// `prev_id`; the initial round carries `prev_id = None`.
#[derive(PartialEq, Debug, Clone)]
pub struct Ballot {
    pub id: BallotId,
    pub prev_id: Option<BallotId>,
    pub ballot_type: BallotType,
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    /// Memoized summary of the last results computation. Treated purely as
    /// a derived value: recomputed and compared before every overwrite.
    pub cached_summary: Option<ResultsSummary>,
}

/// Membership status of a roster entry, as of the initial round of a series.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum VoterStatus {
    Voter,
    NonVoter,
    ExOfficio,
    Obsolete,
}

/// A roster entry of the voter pool captured at a series' initial round.
///
/// `replaced_by` points at the identifier that superseded this one, e.g.
/// after a status change. Replacement chains are expected to be acyclic;
/// resolution walks them with a bounded number of hops.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoterPoolEntry {
    pub voter_id: String,
    pub status: VoterStatus,
    pub replaced_by: Option<String>,
}

/// One cast vote for one (round, voter) pair.
///
/// For approval-body ballots `voter_id` carries the respondent email.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoteRecord {
    pub ballot_id: BallotId,
    pub voter_id: String,
    pub vote: String,
    pub comment_count: u32,
    pub notes: Option<String>,
}

// ******** Output data structures *********

/// One row of coalesced results: the effective vote of one voter across the
/// whole series, with the provenance of that vote.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CoalescedResult {
    /// The voter's current identity.
    pub voter_id: String,
    /// Status of the current identity in the roster. `NonVoter` when the
    /// voter does not appear in the roster at all.
    pub status: VoterStatus,
    /// Effective vote text, `"None"` when the voter never voted.
    pub vote: String,
    /// Round that produced the effective vote.
    pub vote_ballot_id: Option<BallotId>,
    /// Identity under which the effective vote was cast, before resolution.
    pub vote_voter_id: Option<String>,
    /// Comment count of the round that produced the effective vote.
    pub comment_count: u32,
    /// Comments summed over every round of the series for this voter.
    pub total_comment_count: u32,
}

impl CoalescedResult {
    /// The vote text reported for a roster voter who never voted.
    pub const NO_VOTE: &'static str = "None";
}

/// Aggregate counts derived from a list of [CoalescedResult] rows.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultsSummary {
    pub approve: u32,
    pub disapprove: u32,
    pub abstain: u32,
    /// Disapproves cast without any comment in the producing round.
    pub invalid_disapprove: u32,
    /// Abstains without the "lack of expertise" qualifier.
    pub invalid_abstain: u32,
    /// Votes cast by identities outside the returns pool.
    pub invalid_vote: u32,
    /// Pool against which the return rate is computed.
    pub returns_pool: u32,
    /// `approve + disapprove + abstain`, valid returns only.
    pub total_returns: u32,
    /// Voter-status members of the roster.
    pub voting_pool: u32,
    /// Voters with at least one comment anywhere in the series.
    pub commenters: u32,
}

impl ResultsSummary {
    /// Approval rate among valid approve/disapprove votes, or `None` when no
    /// such vote was cast. Guarded so a zero denominator never leaks out as
    /// NaN or infinity.
    pub fn approval_rate(&self) -> Option<f64> {
        let denom = self.approve + self.disapprove;
        if denom == 0 {
            None
        } else {
            Some(f64::from(self.approve) / f64::from(denom))
        }
    }

    /// Fraction of the returns pool that returned a valid vote, or `None`
    /// for an empty pool.
    pub fn return_rate(&self) -> Option<f64> {
        if self.returns_pool == 0 {
            None
        } else {
            Some(f64::from(self.total_returns) / f64::from(self.returns_pool))
        }
    }
}

/// Classification of a free-text vote.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum VoteKind {
    Approve,
    Disapprove,
    /// An abstain carrying the "lack of expertise" qualifier.
    AbstainLackOfExpertise,
    /// Any other abstain.
    AbstainOther,
    /// No vote was returned.
    NotReturned,
    /// Unrecognized vote text.
    Other,
}

impl VoteKind {
    /// Whether this vote is a return at all. Per-kind validity gating
    /// (comment count for disapproves, the qualifier for abstains) is
    /// applied on top of this by the summarizer.
    pub fn is_return(self) -> bool {
        matches!(
            self,
            VoteKind::Approve
                | VoteKind::Disapprove
                | VoteKind::AbstainLackOfExpertise
                | VoteKind::AbstainOther
        )
    }
}

/// Errors that prevent coalescing from completing.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum CoalesceError {
    /// The requested ballot does not exist in the supplied table.
    BallotNotFound(BallotId),
    /// A `prev_id` chain did not terminate within the traversal bound, or
    /// pointed at a round missing from the table.
    BrokenSeries { ballot_id: BallotId, detail: String },
    /// More than one vote record for one (round, voter) pair.
    DuplicateVote {
        ballot_id: BallotId,
        voter_id: String,
    },
}

impl Error for CoalesceError {}

impl Display for CoalesceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoalesceError::BallotNotFound(id) => write!(f, "ballot {id} not found"),
            CoalesceError::BrokenSeries { ballot_id, detail } => {
                write!(f, "ballot {ballot_id}: broken series chain: {detail}")
            }
            CoalesceError::DuplicateVote {
                ballot_id,
                voter_id,
            } => {
                write!(
                    f,
                    "ballot {ballot_id}: duplicate vote record for voter {voter_id}"
                )
            }
        }
    }
}

// ********* Traversal bounds **********

// Both bounds sit far beyond anything a real series produces. They exist to
// turn a corrupted cycle into a surfaced error instead of a hang.

/// Maximum number of rounds followed when walking a series chain.
pub const MAX_SERIES_ROUNDS: usize = 64;

/// Maximum number of hops followed when resolving a replacement chain.
pub const MAX_REPLACEMENT_HOPS: usize = 64;

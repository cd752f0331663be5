pub use crate::config::*;
use crate::SeriesDataset;

use std::collections::{HashMap, HashSet};

use chrono::Utc;

/// A builder for assembling a [SeriesDataset].
///
/// Duplicate vote records are rejected at insertion time, so a dataset that
/// came out of the builder never trips the coalescer's duplicate check.
///
/// ```
/// pub use vote_coalescing::builder::Builder;
/// pub use vote_coalescing::{BallotType, VoterStatus};
/// # use vote_coalescing::CoalesceError;
///
/// let mut builder = Builder::new()
///     .round(1, None, BallotType::WorkingGroup)?
///     .round(2, Some(1), BallotType::WorkingGroup)?
///     .roster_entry("anna", VoterStatus::Voter, None)?;
///
/// builder.add_vote(1, "anna", "Approve", 0)?;
/// builder.add_vote(2, "anna", "Disapprove", 4)?;
///
/// let data = builder.build();
/// assert_eq!(data.votes.len(), 2);
/// # Ok::<(), CoalesceError>(())
/// ```
pub struct Builder {
    pub(crate) _ballots: HashMap<BallotId, Ballot>,
    pub(crate) _roster: Vec<VoterPoolEntry>,
    pub(crate) _votes: Vec<VoteRecord>,
    pub(crate) _seen: HashSet<(BallotId, String)>,
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}

impl Builder {
    pub fn new() -> Builder {
        Builder {
            _ballots: HashMap::new(),
            _roster: Vec::new(),
            _votes: Vec::new(),
            _seen: HashSet::new(),
        }
    }

    /// Adds a round with a window of "now"; the coalescing algorithms never
    /// read the window, so this is the simplest use case for most tests and
    /// batch jobs. Use [Builder::round_at] to control the window.
    pub fn round(
        self,
        id: BallotId,
        prev_id: Option<BallotId>,
        ballot_type: BallotType,
    ) -> Result<Builder, CoalesceError> {
        let now = Utc::now();
        self.round_at(Ballot {
            id,
            prev_id,
            ballot_type,
            opens_at: now,
            closes_at: now,
            cached_summary: None,
        })
    }

    pub fn round_at(mut self, ballot: Ballot) -> Result<Builder, CoalesceError> {
        self._ballots.insert(ballot.id, ballot);
        Ok(self)
    }

    pub fn roster_entry(
        mut self,
        voter_id: &str,
        status: VoterStatus,
        replaced_by: Option<&str>,
    ) -> Result<Builder, CoalesceError> {
        self._roster.push(VoterPoolEntry {
            voter_id: voter_id.to_string(),
            status,
            replaced_by: replaced_by.map(str::to_string),
        });
        Ok(self)
    }

    /// Adds a vote record.
    ///
    /// At most one record may exist per (round, voter) pair.
    pub fn add_vote(
        &mut self,
        ballot_id: BallotId,
        voter_id: &str,
        vote: &str,
        comment_count: u32,
    ) -> Result<(), CoalesceError> {
        self.add_vote_2(&VoteRecord {
            ballot_id,
            voter_id: voter_id.to_string(),
            vote: vote.to_string(),
            comment_count,
            notes: None,
        })
    }

    pub fn add_vote_2(&mut self, vote: &VoteRecord) -> Result<(), CoalesceError> {
        if !self
            ._seen
            .insert((vote.ballot_id, vote.voter_id.clone()))
        {
            return Err(CoalesceError::DuplicateVote {
                ballot_id: vote.ballot_id,
                voter_id: vote.voter_id.clone(),
            });
        }
        self._votes.push(vote.clone());
        Ok(())
    }

    pub fn build(self) -> SeriesDataset {
        SeriesDataset {
            ballots: self._ballots,
            roster: self._roster,
            votes: self._votes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_duplicate_votes() {
        let mut builder = Builder::new()
            .round(1, None, BallotType::WorkingGroup)
            .unwrap();
        builder.add_vote(1, "v1", "Approve", 0).unwrap();
        assert_eq!(
            builder.add_vote(1, "v1", "Approve", 0),
            Err(CoalesceError::DuplicateVote {
                ballot_id: 1,
                voter_id: "v1".to_string()
            })
        );
    }
}

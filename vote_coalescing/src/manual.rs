/*!

This is the long-form manual for `vote_coalescing`.

## Ballot series

A series is a chain of ballot rounds on the same underlying question: an
initial round followed by zero or more recirculations. Rounds link backward
through `prev_id`; the initial round has none. [crate::ballot_series] walks
the chain with bounded iteration and returns the rounds oldest first. A
chain that cycles or points at a missing round is surfaced as
[crate::CoalesceError::BrokenSeries] rather than truncated.

## Ballot types

* `WorkingGroup`: multi-round letter ballot. Votes from every round of the
  series are merged into one row per voter; the voter's identity is first
  resolved through the roster's replacement chain, so a vote cast under a
  superseded identifier still lands on the member's current row.
* `ApprovalBody`: single-round ballot of an approval body. Respondents have
  no persistent identifier, so rows are grouped purely by email.
* `CommentCollection`: single-round call for comments; results pass through
  without any merge or validity gating.

## Carry-forward rules

Within one voter's group, the vote from the last round of the series that
contains a vote is authoritative: its text and its round's comment count make
up the row. Comments are additionally summed over every round of the group,
which feeds the "has this member ever commented" reporting. Roster voters
who never voted appear with the vote text `"None"`; voters who voted without
being on the roster appear with `NonVoter` status.

## Summaries

[crate::summarize] derives the aggregate counts with one handler per ballot
type. For working-group ballots only voter and ex-officio rows tally; a
disapprove without comments and an abstain without the "lack of expertise"
qualifier are counted as invalid. `total_returns = approve + disapprove +
abstain` holds for every ballot type. Rates on [crate::ResultsSummary] are
`Option`-valued so an empty pool can never produce NaN.

The summary computed by [crate::refresh_results] is memoized on the ballot:
it is recomputed from scratch on every request and written back only when it
differs from the cached value. Recomputation is deterministic, so concurrent
refreshes of the same ballot may race with last-writer-wins semantics.

## Participation

[crate::participation::participation] composes the series walker and the
identity resolver over several recent series and reports, per member, the
last valid vote in each series. See the module documentation.

*/

//! Reconciliation engines for recurring committee ballots.
//!
//! Two engines live here, behind the surrounding application's CRUD and
//! upload layers:
//!
//! * the read path ([results]) walks a ballot series, coalesces every
//!   round's votes into one effective row per voter via the
//!   [`vote_coalescing`] crate, derives the per-type summary and refreshes
//!   the ballot's memoized copy;
//! * the write path ([recon]) pairs an uploaded comment-resolution
//!   spreadsheet with the authoritative comment set (by identifier, by
//!   content, or by elimination) and applies field updates only where the
//!   two sides differ.
//!
//! All inputs arrive already parsed and typed; all outputs are returned for
//! the caller to persist.

pub mod recon;
pub mod results;

pub use vote_coalescing as coalescing;

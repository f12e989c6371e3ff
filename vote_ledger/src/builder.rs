pub use crate::config::*;

use std::collections::BTreeMap;

use snafu::prelude::*;

use crate::ledger::{LedgerError, OverflowSnafu};

/// A builder for vote records.
///
/// The parser uses it, and it is also the simplest way to write records by hand.
/// Votes given several times to the same candidate are summed.
///
/// ```
/// use vote_ledger::builder::RecordBuilder;
/// use vote_ledger::Office;
/// # use vote_ledger::ledger::LedgerError;
///
/// let mut builder = RecordBuilder::new();
/// builder.add_candidate("12", 150)?;
/// builder.add_candidate("12345", 3)?;
/// builder.add_blank(5)?;
/// let record = builder.build();
///
/// assert_eq!(record.candidate_total(), 153);
/// assert_eq!(record.office_votes(Office::Councilor).map(|m| m.len()), Some(1));
/// # Ok::<(), LedgerError>(())
/// ```
#[derive(Debug, Default, Clone)]
pub struct RecordBuilder {
    votes: BTreeMap<Office, BTreeMap<CandidateId, u64>>,
    blank: u64,
    null: u64,
}

impl RecordBuilder {
    pub fn new() -> RecordBuilder {
        RecordBuilder::default()
    }

    /// Adds votes for a candidate number.
    ///
    /// Returns false without changing anything if the number does not belong to
    /// a known office.
    pub fn add_candidate(&mut self, number: &str, votes: u64) -> Result<bool, LedgerError> {
        match CandidateId::parse(number) {
            Some((office, cid)) => {
                self.add(office, cid, votes)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn add(&mut self, office: Office, cid: CandidateId, votes: u64) -> Result<(), LedgerError> {
        let entry = self.votes.entry(office).or_default().entry(cid).or_insert(0);
        *entry = entry.checked_add(votes).context(OverflowSnafu {})?;
        Ok(())
    }

    pub fn add_blank(&mut self, votes: u64) -> Result<(), LedgerError> {
        self.blank = self.blank.checked_add(votes).context(OverflowSnafu {})?;
        Ok(())
    }

    pub fn add_null(&mut self, votes: u64) -> Result<(), LedgerError> {
        self.null = self.null.checked_add(votes).context(OverflowSnafu {})?;
        Ok(())
    }

    pub fn build(self) -> VoteRecord {
        VoteRecord {
            votes: self
                .votes
                .into_iter()
                .filter(|(_, m)| !m.is_empty())
                .collect(),
            blank: self.blank,
            null: self.null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_candidates_are_summed() {
        let mut b = RecordBuilder::new();
        assert!(b.add_candidate("12", 10).unwrap());
        assert!(b.add_candidate("12", 5).unwrap());
        let r = b.build();
        let (_, cid) = CandidateId::parse("12").unwrap();
        assert_eq!(r.votes_for(Office::Mayor, &cid), 15);
    }

    #[test]
    fn unknown_office_is_ignored() {
        let mut b = RecordBuilder::new();
        assert!(!b.add_candidate("123", 10).unwrap());
        assert!(b.build().is_empty());
    }

    #[test]
    fn overflow_is_reported() {
        let mut b = RecordBuilder::new();
        b.add_candidate("12", u64::MAX).unwrap();
        assert_eq!(b.add_candidate("12", 1), Err(LedgerError::Overflow {}));
    }
}

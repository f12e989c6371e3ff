use log::{debug, info};
use snafu::prelude::*;
use std::collections::BTreeMap;
use std::fmt::Display;

use crate::config::*;

/// One of the counters kept by the ledger.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Account {
    Candidate(Office, CandidateId),
    TotalVotes,
    Blank,
    Null,
    /// The number of records currently committed.
    Records,
    /// The number of committed records that mention a candidate.
    Contributors(Office, CandidateId),
}

impl Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Account::Candidate(office, cid) => write!(f, "{} candidate {}", office, cid),
            Account::TotalVotes => write!(f, "total votes"),
            Account::Blank => write!(f, "blank votes"),
            Account::Null => write!(f, "null votes"),
            Account::Records => write!(f, "committed records"),
            Account::Contributors(office, cid) => {
                write!(f, "records mentioning {} candidate {}", office, cid)
            }
        }
    }
}

/// Errors from the mutations of the ledger.
///
/// When one of them is returned, the ledger has not been modified.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LedgerError {
    /// The retracted record is not reflected in the ledger: a counter would go
    /// negative, or would be left with a value that the remaining records cannot
    /// account for.
    ///
    /// For a candidate, `available` is what the ledger holds. A retraction that
    /// removes the last record mentioning the candidate must request all of it.
    /// For [`Account::Contributors`], `available` is the number of records left
    /// and `requested` the number of them that still mention the candidate.
    #[snafu(display("retraction does not match {account} ({available} available, {requested} requested)"))]
    NegativeBalance {
        account: Account,
        available: u64,
        requested: u64,
    },
    #[snafu(display("vote counter overflow"))]
    Overflow {},
}

impl LedgerError {
    /// True when the error reveals that the ledger and the records that are
    /// retracted from it have diverged.
    pub fn is_desynchronization(&self) -> bool {
        !matches!(self, LedgerError::Overflow {})
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

// The accumulated votes of a candidate.
// `contributors` is the number of committed records that mention the candidate,
// including with zero votes. Invariant: it is never zero for a stored entry.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
struct Entry {
    votes: u64,
    contributors: u64,
}

/// The accumulated totals of all the committed vote records.
///
/// The only mutators are [`Ledger::commit`] and [`Ledger::retract`]. Both are
/// atomic: either every counter is updated, or none is. The state only depends
/// on the multiset of records currently committed, not on the order of the
/// operations.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Ledger {
    offices: BTreeMap<Office, BTreeMap<CandidateId, Entry>>,
    total_votes: u64,
    blank: u64,
    null: u64,
    records: u64,
}

// The changes of one mutation, computed before anything is applied.
struct Plan {
    entries: Vec<(Office, CandidateId, Entry)>,
    total_votes: u64,
    blank: u64,
    null: u64,
    records: u64,
}

impl Ledger {
    pub fn new() -> Ledger {
        Ledger::default()
    }

    /// Builds the ledger that corresponds to a set of records.
    pub fn from_records<'a, I>(records: I) -> LedgerResult<Ledger>
    where
        I: IntoIterator<Item = &'a VoteRecord>,
    {
        let mut ledger = Ledger::new();
        for r in records {
            ledger.commit(r)?;
        }
        Ok(ledger)
    }

    /// Adds the contribution of a record.
    pub fn commit(&mut self, record: &VoteRecord) -> LedgerResult<()> {
        let mut entries = Vec::new();
        let mut total_votes = self.total_votes;
        for (office, cid, votes) in record.lines() {
            let current = self.entry(office, cid).unwrap_or(Entry {
                votes: 0,
                contributors: 0,
            });
            let next = Entry {
                votes: current.votes.checked_add(votes).context(OverflowSnafu {})?,
                contributors: current.contributors + 1,
            };
            total_votes = total_votes.checked_add(votes).context(OverflowSnafu {})?;
            entries.push((office, cid.clone(), next));
        }
        let plan = Plan {
            entries,
            total_votes,
            blank: self.blank.checked_add(record.blank()).context(OverflowSnafu {})?,
            null: self.null.checked_add(record.null()).context(OverflowSnafu {})?,
            records: self.records.checked_add(1).context(OverflowSnafu {})?,
        };
        self.apply(plan);
        info!(
            "commit: {} candidate votes, total votes now {}",
            record.candidate_total(),
            self.total_votes
        );
        Ok(())
    }

    /// Removes the contribution of a record that was committed before.
    ///
    /// Fails with [`LedgerError::NegativeBalance`] if the record is not reflected
    /// in the ledger.
    pub fn retract(&mut self, record: &VoteRecord) -> LedgerResult<()> {
        let mut entries = Vec::new();
        let mut total_votes = self.total_votes;
        for (office, cid, votes) in record.lines() {
            let account = || Account::Candidate(office, cid.clone());
            let current = self.entry(office, cid).context(NegativeBalanceSnafu {
                account: account(),
                available: 0u64,
                requested: votes,
            })?;
            let remaining = current.votes.checked_sub(votes).context(NegativeBalanceSnafu {
                account: account(),
                available: current.votes,
                requested: votes,
            })?;
            let contributors = current.contributors - 1;
            ensure!(
                contributors > 0 || remaining == 0,
                NegativeBalanceSnafu {
                    account: account(),
                    available: current.votes,
                    requested: votes,
                }
            );
            total_votes = sub_counter(total_votes, votes, Account::TotalVotes)?;
            entries.push((
                office,
                cid.clone(),
                Entry {
                    votes: remaining,
                    contributors,
                },
            ));
        }
        let plan = Plan {
            entries,
            total_votes,
            blank: sub_counter(self.blank, record.blank(), Account::Blank)?,
            null: sub_counter(self.null, record.null(), Account::Null)?,
            records: sub_counter(self.records, 1, Account::Records)?,
        };
        self.check_reachable(record, &plan)?;
        self.apply(plan);
        info!(
            "retract: {} candidate votes, total votes now {}",
            record.candidate_total(),
            self.total_votes
        );
        Ok(())
    }

    // After a retraction, no candidate can be mentioned by more records than
    // remain, and an empty ledger holds no blank or null votes.
    fn check_reachable(&self, record: &VoteRecord, plan: &Plan) -> LedgerResult<()> {
        for (office, cands) in self.offices.iter() {
            let mentioned = record.office_votes(*office);
            for (cid, entry) in cands.iter() {
                if mentioned.map_or(false, |m| m.contains_key(cid)) {
                    // Decremented along with the records.
                    continue;
                }
                ensure!(
                    entry.contributors <= plan.records,
                    NegativeBalanceSnafu {
                        account: Account::Contributors(*office, cid.clone()),
                        available: plan.records,
                        requested: entry.contributors,
                    }
                );
            }
        }
        if plan.records == 0 {
            ensure!(
                plan.blank == 0,
                NegativeBalanceSnafu {
                    account: Account::Blank,
                    available: self.blank,
                    requested: record.blank(),
                }
            );
            ensure!(
                plan.null == 0,
                NegativeBalanceSnafu {
                    account: Account::Null,
                    available: self.null,
                    requested: record.null(),
                }
            );
        }
        Ok(())
    }

    fn apply(&mut self, plan: Plan) {
        for (office, cid, entry) in plan.entries {
            debug!("apply: {} {} -> {:?}", office, cid, entry);
            let cands = self.offices.entry(office).or_default();
            if entry.contributors == 0 {
                cands.remove(&cid);
            } else {
                cands.insert(cid, entry);
            }
        }
        self.offices.retain(|_, cands| !cands.is_empty());
        self.total_votes = plan.total_votes;
        self.blank = plan.blank;
        self.null = plan.null;
        self.records = plan.records;
    }

    fn entry(&self, office: Office, cid: &CandidateId) -> Option<Entry> {
        self.offices.get(&office).and_then(|m| m.get(cid)).cloned()
    }

    /// The accumulated votes of a candidate (0 if unknown).
    pub fn votes(&self, office: Office, cid: &CandidateId) -> u64 {
        self.entry(office, cid).map(|e| e.votes).unwrap_or(0)
    }

    /// The candidates of an office with their accumulated votes, by candidate number.
    pub fn entries(&self, office: Office) -> impl Iterator<Item = (&CandidateId, u64)> + '_ {
        self.offices
            .get(&office)
            .into_iter()
            .flat_map(|m| m.iter().map(|(cid, e)| (cid, e.votes)))
    }

    pub fn total_votes(&self) -> u64 {
        self.total_votes
    }

    pub fn blank(&self) -> u64 {
        self.blank
    }

    pub fn null(&self) -> u64 {
        self.null
    }

    /// The number of records currently committed.
    pub fn active_records(&self) -> u64 {
        self.records
    }

    /// Checks that the total counter matches the candidate entries.
    pub fn is_consistent(&self) -> bool {
        let sum: Option<u64> = Office::ALL
            .iter()
            .flat_map(|o| self.entries(*o).map(|(_, v)| v))
            .try_fold(0u64, |acc, v| acc.checked_add(v));
        sum == Some(self.total_votes)
    }
}

fn sub_counter(current: u64, requested: u64, account: Account) -> LedgerResult<u64> {
    current.checked_sub(requested).context(NegativeBalanceSnafu {
        account,
        available: current,
        requested,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RecordBuilder;
    use proptest::prelude::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn record(lines: &[(&str, u64)], blank: u64, null: u64) -> VoteRecord {
        let mut b = RecordBuilder::new();
        for (n, v) in lines {
            assert!(b.add_candidate(n, *v).unwrap());
        }
        b.add_blank(blank).unwrap();
        b.add_null(null).unwrap();
        b.build()
    }

    fn cid(s: &str) -> CandidateId {
        CandidateId::parse(s).unwrap().1
    }

    #[test]
    fn commit_accumulates() {
        let mut l = Ledger::new();
        l.commit(&record(&[("12", 150), ("13", 90)], 5, 2)).unwrap();
        assert_eq!(l.votes(Office::Mayor, &cid("12")), 150);
        assert_eq!(l.votes(Office::Mayor, &cid("13")), 90);
        assert_eq!(l.total_votes(), 240);
        assert_eq!(l.blank(), 5);
        assert_eq!(l.null(), 2);
        assert!(l.is_consistent());
    }

    #[test]
    fn commit_then_retract_restores_state() {
        let mut l = Ledger::new();
        l.commit(&record(&[("12", 0), ("45678", 4)], 0, 0)).unwrap();
        let before = l.clone();
        let r = record(&[("12", 7), ("13", 3), ("45678", 1)], 2, 1);
        l.commit(&r).unwrap();
        l.retract(&r).unwrap();
        assert_eq!(l, before);
        // The pre-existing zero entry is still there.
        assert_eq!(l.entries(Office::Mayor).count(), 1);
    }

    #[test]
    fn retract_unknown_record_fails_unchanged() {
        init_logger();
        let mut l = Ledger::new();
        l.commit(&record(&[("12", 10)], 0, 0)).unwrap();
        let before = l.clone();

        let err = l.retract(&record(&[("13", 1)], 0, 0)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::NegativeBalance {
                account: Account::Candidate(Office::Mayor, cid("13")),
                available: 0,
                requested: 1
            }
        );
        assert_eq!(l, before);

        let err = l.retract(&record(&[("12", 11)], 0, 0)).unwrap_err();
        assert!(matches!(err, LedgerError::NegativeBalance { available: 10, requested: 11, .. }));
        assert_eq!(l, before);

        let err = l.retract(&record(&[("12", 10)], 1, 0)).unwrap_err();
        assert!(matches!(err, LedgerError::NegativeBalance { account: Account::Blank, .. }));
        assert_eq!(l, before);
    }

    #[test]
    fn retract_on_empty_ledger_fails() {
        let mut l = Ledger::new();
        let r = record(&[("12", 10)], 0, 0);
        assert!(matches!(
            l.retract(&r),
            Err(LedgerError::NegativeBalance { .. })
        ));
        assert!(matches!(
            l.retract(&VoteRecord::EMPTY),
            Err(LedgerError::NegativeBalance {
                account: Account::Records,
                ..
            })
        ));
        assert_eq!(l, Ledger::new());
    }

    #[test]
    fn partial_retraction_of_last_record_fails() {
        init_logger();
        let mut l = Ledger::new();
        l.commit(&record(&[("12", 150)], 0, 0)).unwrap();
        let before = l.clone();
        let err = l.retract(&record(&[("12", 100)], 0, 0)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::NegativeBalance {
                account: Account::Candidate(Office::Mayor, cid("12")),
                available: 150,
                requested: 100
            }
        );
        assert!(err.is_desynchronization());
        assert_eq!(l, before);
    }

    #[test]
    fn retract_cannot_leave_candidates_without_records() {
        init_logger();
        let mut l = Ledger::new();
        l.commit(&record(&[("12", 10), ("13", 5)], 0, 0)).unwrap();
        let before = l.clone();
        let err = l.retract(&record(&[("12", 10)], 0, 0)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::NegativeBalance {
                account: Account::Contributors(Office::Mayor, cid("13")),
                available: 0,
                requested: 1
            }
        );
        assert_eq!(l, before);
        assert_eq!(l.active_records(), 1);

        // With a second record the same retraction leaves a reachable state.
        let other = record(&[("45678", 0)], 0, 0);
        l.commit(&other).unwrap();
        l.retract(&record(&[("12", 10)], 0, 0)).unwrap();
        assert_eq!(l.votes(Office::Mayor, &cid("13")), 5);
        assert_eq!(l.active_records(), 1);
    }

    #[test]
    fn last_retraction_must_take_blank_and_null() {
        let mut l = Ledger::new();
        l.commit(&record(&[], 5, 2)).unwrap();
        let before = l.clone();
        let err = l.retract(&VoteRecord::EMPTY).unwrap_err();
        assert!(matches!(err, LedgerError::NegativeBalance { account: Account::Blank, available: 5, requested: 0 }));
        assert_eq!(l, before);
        let err = l.retract(&record(&[], 5, 0)).unwrap_err();
        assert!(matches!(err, LedgerError::NegativeBalance { account: Account::Null, .. }));
        l.retract(&record(&[], 5, 2)).unwrap();
        assert_eq!(l, Ledger::new());
    }

    #[test]
    fn overflow_leaves_ledger_unchanged() {
        let mut l = Ledger::new();
        l.commit(&record(&[("12", u64::MAX)], 0, 0)).unwrap();
        let before = l.clone();
        assert_eq!(
            l.commit(&record(&[("13", 1)], 0, 0)),
            Err(LedgerError::Overflow {})
        );
        assert_eq!(l, before);
    }

    #[test]
    fn commit_order_does_not_matter() {
        let r1 = record(&[("12", 100), ("45678", 3)], 1, 0);
        let r2 = record(&[("12", 50), ("13", 2)], 0, 4);
        let mut a = Ledger::new();
        a.commit(&r1).unwrap();
        a.commit(&r2).unwrap();
        let mut b = Ledger::new();
        b.commit(&r2).unwrap();
        b.commit(&r1).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.votes(Office::Mayor, &cid("12")), 150);
    }

    fn record_strategy() -> impl Strategy<Value = VoteRecord> {
        let number = prop_oneof!["[0-9]{2}", "[0-9]{5}"];
        (
            proptest::collection::vec((number, 0u64..1_000), 0..6),
            0u64..50,
            0u64..50,
        )
            .prop_map(|(lines, blank, null)| {
                let mut b = RecordBuilder::new();
                for (n, v) in lines {
                    b.add_candidate(&n, v).unwrap();
                }
                b.add_blank(blank).unwrap();
                b.add_null(null).unwrap();
                b.build()
            })
    }

    proptest! {
        #[test]
        fn state_only_depends_on_active_records(
            records in proptest::collection::vec(record_strategy(), 1..8),
            removed in proptest::collection::vec(any::<bool>(), 8),
        ) {
            let mut forward = Ledger::new();
            for r in records.iter() {
                forward.commit(r).unwrap();
            }
            for (r, rm) in records.iter().zip(removed.iter()) {
                if *rm {
                    forward.retract(r).unwrap();
                }
            }
            let active: Vec<&VoteRecord> = records
                .iter()
                .zip(removed.iter())
                .filter(|(_, rm)| !**rm)
                .map(|(r, _)| r)
                .collect();
            let rebuilt = Ledger::from_records(active.iter().rev().cloned()).unwrap();
            prop_assert_eq!(&forward, &rebuilt);
            prop_assert!(forward.is_consistent());
            let expected: u64 = active.iter().map(|r| r.candidate_total()).sum();
            prop_assert_eq!(forward.total_votes(), expected);
        }
    }
}

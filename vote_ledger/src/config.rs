// ********* Input data structures ***********

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::Serialize;

/// The offices that appear on a municipal ballot-tally QR code.
///
/// The office of a ballot line is not written in the payload: it is deduced
/// from the number of digits of the candidate number.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize)]
pub enum Office {
    /// Two-digit candidate numbers.
    Mayor,
    /// Five-digit candidate numbers.
    Councilor,
}

impl Office {
    pub const ALL: [Office; 2] = [Office::Mayor, Office::Councilor];

    /// The office of a candidate number with the given count of digits, if any.
    pub fn from_digit_len(len: usize) -> Option<Office> {
        match len {
            2 => Some(Office::Mayor),
            5 => Some(Office::Councilor),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Office::Mayor => "Mayor",
            Office::Councilor => "Councilor",
        }
    }
}

impl Display for Office {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A candidate number, as printed on the QR code.
///
/// Invariant: only made of ASCII digits, and 2 or 5 of them. Within one office
/// all the numbers have the same length, so the lexicographic order is also the
/// numeric order.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct CandidateId(String);

impl CandidateId {
    /// Checks the candidate number and returns it with the office it runs for.
    pub fn parse(number: &str) -> Option<(Office, CandidateId)> {
        if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Office::from_digit_len(number.len()).map(|office| (office, CandidateId(number.to_string())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The votes read from one QR code.
///
/// Records are immutable: use the [`crate::builder::RecordBuilder`] to assemble one.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize)]
pub struct VoteRecord {
    pub(crate) votes: BTreeMap<Office, BTreeMap<CandidateId, u64>>,
    pub(crate) blank: u64,
    pub(crate) null: u64,
}

impl VoteRecord {
    /// The record of a scan that could not be read.
    pub const EMPTY: VoteRecord = VoteRecord {
        votes: BTreeMap::new(),
        blank: 0,
        null: 0,
    };

    /// All the (office, candidate, votes) lines, ordered by office then candidate.
    pub fn lines(&self) -> impl Iterator<Item = (Office, &CandidateId, u64)> + '_ {
        self.votes
            .iter()
            .flat_map(|(office, cands)| cands.iter().map(move |(cid, v)| (*office, cid, *v)))
    }

    pub fn office_votes(&self, office: Office) -> Option<&BTreeMap<CandidateId, u64>> {
        self.votes.get(&office)
    }

    pub fn votes_for(&self, office: Office, candidate: &CandidateId) -> u64 {
        self.votes
            .get(&office)
            .and_then(|m| m.get(candidate))
            .cloned()
            .unwrap_or(0)
    }

    pub fn blank(&self) -> u64 {
        self.blank
    }

    pub fn null(&self) -> u64 {
        self.null
    }

    /// The sum of the votes given to candidates, for all offices.
    /// Blank and null votes are not included.
    pub fn candidate_total(&self) -> u64 {
        self.lines().map(|(_, _, v)| v).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.values().all(|m| m.is_empty()) && self.blank == 0 && self.null == 0
    }
}

// ********* Configuration **********

/// What to do with a `key:value` token whose key is understood but whose value
/// is not a non-negative integer.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub enum MalformedTokenPolicy {
    /// Skip the token and keep reading the rest of the payload.
    #[default]
    Skip,
    /// Reject the whole payload.
    Abort,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct ParseRules {
    pub malformed_token_policy: MalformedTokenPolicy,
}

impl ParseRules {
    pub const DEFAULT_RULES: ParseRules = ParseRules {
        malformed_token_policy: MalformedTokenPolicy::Skip,
    };

    pub const STRICT_RULES: ParseRules = ParseRules {
        malformed_token_policy: MalformedTokenPolicy::Abort,
    };
}

impl Default for ParseRules {
    fn default() -> Self {
        ParseRules::DEFAULT_RULES
    }
}

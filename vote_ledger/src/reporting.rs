//! Read-only views over the ledger and the registry.

use serde::Serialize;

use crate::config::*;
use crate::ledger::Ledger;
use crate::registry::{ScanId, ScanRegistry, ScanStatus};

/// The default number of candidates shown in a ranking.
pub const DEFAULT_RANKING_LIMIT: usize = 15;

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct RankingEntry {
    pub candidate: CandidateId,
    pub votes: u64,
}

/// The candidates of an office that received votes, most voted first.
///
/// Candidates with the same number of votes are ordered by candidate number.
pub fn ranking(ledger: &Ledger, office: Office, limit: usize) -> Vec<RankingEntry> {
    let mut res: Vec<RankingEntry> = ledger
        .entries(office)
        .filter(|(_, votes)| *votes > 0)
        .map(|(cid, votes)| RankingEntry {
            candidate: cid.clone(),
            votes,
        })
        .collect();
    res.sort_by(|a, b| b.votes.cmp(&a.votes).then_with(|| a.candidate.cmp(&b.candidate)));
    res.truncate(limit);
    res
}

/// One sheet of the export: all the candidates of an office.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct ExportSheet {
    pub office: Office,
    pub rows: Vec<RankingEntry>,
}

impl ExportSheet {
    pub const COLUMNS: [&'static str; 2] = ["Candidate", "Votes"];

    pub fn name(&self) -> &'static str {
        self.office.name()
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct ExportSnapshot {
    pub sheets: Vec<ExportSheet>,
    pub total_votes: u64,
    pub blank: u64,
    pub null: u64,
}

/// The full state of the ledger, one sheet per office, by candidate number.
/// Candidates without votes are included.
pub fn export(ledger: &Ledger) -> ExportSnapshot {
    let sheets = Office::ALL
        .iter()
        .map(|office| ExportSheet {
            office: *office,
            rows: ledger
                .entries(*office)
                .map(|(cid, votes)| RankingEntry {
                    candidate: cid.clone(),
                    votes,
                })
                .collect(),
        })
        .collect();
    ExportSnapshot {
        sheets,
        total_votes: ledger.total_votes(),
        blank: ledger.blank(),
        null: ledger.null(),
    }
}

/// The contribution of one scan to the candidates of a ranking.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct ScanBreakdown {
    pub id: ScanId,
    pub source: String,
    /// In the order of the ranking; 0 when the scan has no votes for the candidate.
    pub votes: Vec<RankingEntry>,
    pub blank: u64,
    pub null: u64,
}

/// For every decoded scan with votes for the office, the votes it brought to
/// each candidate of the ranking.
pub fn scan_breakdown(
    registry: &ScanRegistry,
    office: Office,
    ranking: &[RankingEntry],
) -> Vec<ScanBreakdown> {
    registry
        .scans()
        .filter(|s| s.status == ScanStatus::Decoded)
        .filter(|s| {
            s.record
                .office_votes(office)
                .map(|m| !m.is_empty())
                .unwrap_or(false)
        })
        .map(|s| ScanBreakdown {
            id: s.id,
            source: s.source.name.clone(),
            votes: ranking
                .iter()
                .map(|e| RankingEntry {
                    candidate: e.candidate.clone(),
                    votes: s.record.votes_for(office, &e.candidate),
                })
                .collect(),
            blank: s.record.blank(),
            null: s.record.null(),
        })
        .collect()
}

use log::{info, warn};
use serde::Serialize;
use snafu::prelude::*;
use std::collections::BTreeMap;
use std::fmt::Display;

use crate::config::*;
use crate::decode::DecodeError;
use crate::ledger::{Ledger, LedgerError};
use crate::parser::ParseFailure;

/// The identity of a scan. Identities are allocated in increasing order and
/// never reused.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ScanId(pub u64);

impl Display for ScanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where the scanned image came from.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct ImageRef {
    pub name: String,
    /// Hex-encoded SHA-256 of the image content, when the content is known.
    pub digest: Option<String>,
}

impl ImageRef {
    pub fn named(name: &str) -> ImageRef {
        ImageRef {
            name: name.to_string(),
            digest: None,
        }
    }

    pub fn from_bytes(name: &str, content: &[u8]) -> ImageRef {
        ImageRef {
            name: name.to_string(),
            digest: Some(sha256::digest(content)),
        }
    }
}

/// Why a scan could not produce votes.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ScanFailure {
    #[snafu(display("could not decode the QR code: {source}"))]
    Decode { source: DecodeError },
    #[snafu(display("could not read the votes: {source}"))]
    Parse { source: ParseFailure },
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize)]
pub enum ScanStatus {
    Decoded,
    Failed,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Scan {
    pub id: ScanId,
    pub source: ImageRef,
    pub status: ScanStatus,
    /// Empty for failed scans.
    pub record: VoteRecord,
    pub failure: Option<ScanFailure>,
}

/// What the display layer needs to know about a scan.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct ScanSummary {
    /// 1-based position in the list, for display. Not stable across removals.
    pub position: usize,
    pub id: ScanId,
    pub source: ImageRef,
    pub status: ScanStatus,
    pub candidate_votes: u64,
    pub blank: u64,
    pub null: u64,
    pub failure: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RegistryError {
    #[snafu(display("no scan with identity {id}"))]
    UnknownScan { id: ScanId },
    #[snafu(display("the ledger rejected the votes of scan {id}: {source}"))]
    Ledger { id: ScanId, source: LedgerError },
}

impl RegistryError {
    /// Errors that reveal a corrupted accounting, as opposed to a bad request.
    pub fn is_fatal(&self) -> bool {
        match self {
            RegistryError::UnknownScan { .. } => false,
            RegistryError::Ledger { source, .. } => source.is_desynchronization(),
        }
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// The ordered collection of all the scans ingested so far.
#[derive(Debug, Clone)]
pub struct ScanRegistry {
    // Identities are increasing, so the map order is the insertion order.
    scans: BTreeMap<ScanId, Scan>,
    next_id: u64,
}

impl Default for ScanRegistry {
    fn default() -> Self {
        ScanRegistry::new()
    }
}

impl ScanRegistry {
    pub fn new() -> ScanRegistry {
        ScanRegistry {
            scans: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Registers a scan.
    ///
    /// Decoded scans are committed into the ledger first. If the commit fails,
    /// nothing is registered and the identity is not consumed.
    pub fn ingest(
        &mut self,
        source: ImageRef,
        parsed: Result<VoteRecord, ScanFailure>,
        ledger: &mut Ledger,
    ) -> RegistryResult<ScanId> {
        let id = ScanId(self.next_id);
        let scan = match parsed {
            Ok(record) => {
                ledger.commit(&record).context(LedgerSnafu { id })?;
                info!(
                    "ingest: scan {} from {:?}: {} candidate votes",
                    id,
                    source.name,
                    record.candidate_total()
                );
                Scan {
                    id,
                    source,
                    status: ScanStatus::Decoded,
                    record,
                    failure: None,
                }
            }
            Err(failure) => {
                warn!("ingest: scan {} from {:?} failed: {}", id, source.name, failure);
                Scan {
                    id,
                    source,
                    status: ScanStatus::Failed,
                    record: VoteRecord::EMPTY,
                    failure: Some(failure),
                }
            }
        };
        self.next_id += 1;
        self.scans.insert(id, scan);
        Ok(id)
    }

    /// Removes a scan and retracts its votes from the ledger.
    ///
    /// The scan stays registered if the ledger refuses the retraction.
    pub fn remove(&mut self, id: ScanId, ledger: &mut Ledger) -> RegistryResult<Scan> {
        let scan = self.scans.get(&id).context(UnknownScanSnafu { id })?;
        if scan.status == ScanStatus::Decoded {
            ledger.retract(&scan.record).context(LedgerSnafu { id })?;
        }
        info!("remove: scan {} from {:?}", id, scan.source.name);
        self.scans.remove(&id).context(UnknownScanSnafu { id })
    }

    pub fn get(&self, id: ScanId) -> Option<&Scan> {
        self.scans.get(&id)
    }

    /// All the scans, in insertion order.
    pub fn scans(&self) -> impl Iterator<Item = &Scan> + '_ {
        self.scans.values()
    }

    /// The records of the scans that currently contribute to the ledger.
    pub fn active_records(&self) -> impl Iterator<Item = &VoteRecord> + '_ {
        self.scans
            .values()
            .filter(|s| s.status == ScanStatus::Decoded)
            .map(|s| &s.record)
    }

    pub fn list(&self) -> Vec<ScanSummary> {
        self.scans
            .values()
            .enumerate()
            .map(|(idx, s)| ScanSummary {
                position: idx + 1,
                id: s.id,
                source: s.source.clone(),
                status: s.status,
                candidate_votes: s.record.candidate_total(),
                blank: s.record.blank(),
                null: s.record.null(),
                failure: s.failure.as_ref().map(|f| f.to_string()),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }
}

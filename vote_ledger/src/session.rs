use log::{debug, warn};
use snafu::prelude::*;
use std::sync::{Mutex, MutexGuard};

use crate::config::*;
use crate::decode::{DecodeError, Decoder};
use crate::ledger::Ledger;
use crate::parser::parse;
use crate::registry::*;
use crate::reporting::{self, ExportSnapshot, RankingEntry, ScanBreakdown};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SessionError {
    #[snafu(display("{source}"))]
    Registry { source: RegistryError },
    #[snafu(display("the tally session lock was poisoned"))]
    Poisoned {},
}

impl SessionError {
    pub fn is_fatal(&self) -> bool {
        match self {
            SessionError::Registry { source } => source.is_fatal(),
            SessionError::Poisoned {} => true,
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// A ledger together with the scans that feed it.
///
/// Every method runs one complete mutation sequence, so the ledger always
/// reflects exactly the decoded scans of the registry between two calls.
#[derive(Debug, Clone, Default)]
pub struct TallySession {
    ledger: Ledger,
    registry: ScanRegistry,
    rules: ParseRules,
}

impl TallySession {
    pub fn new(rules: ParseRules) -> TallySession {
        TallySession {
            ledger: Ledger::new(),
            registry: ScanRegistry::new(),
            rules,
        }
    }

    /// Ingests the outcome of the decoding step: parses the payload and registers the scan.
    pub fn ingest_payload(
        &mut self,
        source: ImageRef,
        payload: Result<String, DecodeError>,
    ) -> SessionResult<ScanId> {
        let parsed = match payload {
            Ok(text) => {
                debug!("ingest_payload: {:?}: {:?}", source.name, text);
                parse(&text, &self.rules).context(ParseSnafu {})
            }
            Err(e) => {
                warn!("ingest_payload: {:?}: decoding failed: {}", source.name, e);
                Err(ScanFailure::Decode { source: e })
            }
        };
        self.registry
            .ingest(source, parsed, &mut self.ledger)
            .context(RegistrySnafu {})
    }

    /// Decodes an image with the given decoder and ingests it.
    pub fn ingest_image<D: Decoder + ?Sized>(
        &mut self,
        name: &str,
        image: &[u8],
        decoder: &D,
    ) -> SessionResult<ScanId> {
        let source = ImageRef::from_bytes(name, image);
        let payload = decoder.decode(image);
        self.ingest_payload(source, payload)
    }

    pub fn remove(&mut self, id: ScanId) -> SessionResult<Scan> {
        self.registry
            .remove(id, &mut self.ledger)
            .context(RegistrySnafu {})
    }

    pub fn list(&self) -> Vec<ScanSummary> {
        self.registry.list()
    }

    pub fn ranking(&self, office: Office, limit: usize) -> Vec<RankingEntry> {
        reporting::ranking(&self.ledger, office, limit)
    }

    pub fn export(&self) -> ExportSnapshot {
        reporting::export(&self.ledger)
    }

    pub fn scan_breakdown(&self, office: Office, limit: usize) -> Vec<ScanBreakdown> {
        let rk = self.ranking(office, limit);
        reporting::scan_breakdown(&self.registry, office, &rk)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn registry(&self) -> &ScanRegistry {
        &self.registry
    }

    /// Rebuilds the ledger from the registered scans and compares it with the
    /// accumulated one.
    pub fn is_consistent(&self) -> bool {
        match Ledger::from_records(self.registry.active_records()) {
            Ok(rebuilt) => rebuilt == self.ledger && self.ledger.is_consistent(),
            Err(_) => false,
        }
    }
}

/// A tally session that can be shared between threads.
///
/// Each operation holds the lock for its whole mutation sequence.
#[derive(Debug, Default)]
pub struct SharedSession {
    inner: Mutex<TallySession>,
}

impl SharedSession {
    pub fn new(session: TallySession) -> SharedSession {
        SharedSession {
            inner: Mutex::new(session),
        }
    }

    fn lock(&self) -> SessionResult<MutexGuard<'_, TallySession>> {
        self.inner.lock().ok().context(PoisonedSnafu {})
    }

    pub fn ingest_payload(
        &self,
        source: ImageRef,
        payload: Result<String, DecodeError>,
    ) -> SessionResult<ScanId> {
        self.lock()?.ingest_payload(source, payload)
    }

    pub fn remove(&self, id: ScanId) -> SessionResult<Scan> {
        self.lock()?.remove(id)
    }

    pub fn list(&self) -> SessionResult<Vec<ScanSummary>> {
        Ok(self.lock()?.list())
    }

    pub fn ranking(&self, office: Office, limit: usize) -> SessionResult<Vec<RankingEntry>> {
        Ok(self.lock()?.ranking(office, limit))
    }

    pub fn export(&self) -> SessionResult<ExportSnapshot> {
        Ok(self.lock()?.export())
    }

    /// Runs a read-only closure on a consistent state.
    pub fn with<T>(&self, f: impl FnOnce(&TallySession) -> T) -> SessionResult<T> {
        Ok(f(&*self.lock()?))
    }

    pub fn into_inner(self) -> SessionResult<TallySession> {
        self.inner.into_inner().ok().context(PoisonedSnafu {})
    }
}

/*!
Accounting of the votes read from ballot-tally QR codes.

The QR codes printed at the end of an election day by each voting machine
carry the vote counts of the machine as a list of `key:value` tokens. This
crate turns these payloads into vote records, accumulates them in a
[`ledger::Ledger`] and keeps track of which scan brought which votes, so that a
bad scan can be removed later without disturbing the other ones.

```
use vote_ledger::*;

let mut session = TallySession::new(ParseRules::DEFAULT_RULES);
let first = session.ingest_payload(ImageRef::named("first.png"), Ok("12:100 BRAN:3".to_string()))?;
session.ingest_payload(ImageRef::named("second.png"), Ok("12:50 13:20".to_string()))?;

assert_eq!(session.ledger().total_votes(), 170);
session.remove(first)?;
assert_eq!(session.ledger().total_votes(), 70);

let top = session.ranking(Office::Mayor, 1);
assert_eq!(top[0].candidate.as_str(), "12");
# Ok::<(), SessionError>(())
```

See the [manual] for the format of the payloads.
*/
mod config;

pub mod builder;
pub mod decode;
pub mod ledger;
pub mod manual;
pub mod parser;
pub mod registry;
pub mod reporting;
pub mod session;

pub use crate::config::*;
pub use crate::decode::{DecodeError, Decoder, StaticDecoder};
pub use crate::ledger::{Account, Ledger, LedgerError};
pub use crate::parser::{parse, ParseFailure};
pub use crate::registry::{
    ImageRef, RegistryError, Scan, ScanFailure, ScanId, ScanRegistry, ScanStatus, ScanSummary,
};
pub use crate::reporting::{
    export, ranking, scan_breakdown, ExportSheet, ExportSnapshot, RankingEntry, ScanBreakdown,
    DEFAULT_RANKING_LIMIT,
};
pub use crate::session::{SessionError, SharedSession, TallySession};

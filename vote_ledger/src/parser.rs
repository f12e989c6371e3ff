use log::{debug, warn};
use snafu::prelude::*;

use crate::builder::RecordBuilder;
use crate::config::*;
use crate::ledger::LedgerError;

const BLANK_KEY: &str = "BRAN";
const NULL_KEY: &str = "NULO";

/// Reasons for which a decoded payload does not yield a vote record.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum ParseFailure {
    #[snafu(display("no valid vote token found in the payload"))]
    NoValidTokens {},
    #[snafu(display("malformed vote token {token:?}"))]
    MalformedToken { token: String },
    #[snafu(display("vote counts in the payload do not fit in a counter"))]
    CountOverflow { source: LedgerError },
}

// The key of a token, once recognized.
#[derive(Eq, PartialEq, Debug, Clone)]
enum TokenKey {
    Candidate(Office, CandidateId),
    Blank,
    Null,
}

fn read_key(key: &str) -> Option<TokenKey> {
    match key {
        BLANK_KEY => Some(TokenKey::Blank),
        NULL_KEY => Some(TokenKey::Null),
        k => CandidateId::parse(k).map(|(office, cid)| TokenKey::Candidate(office, cid)),
    }
}

/// Parses the text of a ballot-tally QR code.
///
/// The payload is a list of whitespace-separated tokens. Only the tokens of the
/// form `key:value` with a candidate number, `BRAN` or `NULO` as a key are read.
/// Everything else (header fields, hashes, multi-part tokens) is ignored.
pub fn parse(raw: &str, rules: &ParseRules) -> Result<VoteRecord, ParseFailure> {
    let mut builder = RecordBuilder::new();
    let mut valid_tokens: usize = 0;

    for token in raw.split_whitespace() {
        let (key_s, value_s) = match token.split_once(':') {
            Some((k, v)) if !v.contains(':') => (k, v),
            _ => continue,
        };
        let key = match read_key(key_s) {
            Some(k) => k,
            None => {
                if !key_s.is_empty() && key_s.chars().all(|c| c.is_ascii_digit()) {
                    debug!("parse: ignoring candidate number of unknown office {:?}", token);
                }
                continue;
            }
        };
        let votes = match value_s.parse::<u64>() {
            Ok(v) => v,
            Err(_) => match rules.malformed_token_policy {
                MalformedTokenPolicy::Skip => {
                    warn!("parse: skipping malformed token {:?}", token);
                    continue;
                }
                MalformedTokenPolicy::Abort => {
                    return MalformedTokenSnafu { token }.fail();
                }
            },
        };
        debug!("parse: token {:?} -> {:?} {}", token, key, votes);
        let added = match key {
            TokenKey::Candidate(office, cid) => builder.add(office, cid, votes),
            TokenKey::Blank => builder.add_blank(votes),
            TokenKey::Null => builder.add_null(votes),
        };
        added.context(CountOverflowSnafu {})?;
        valid_tokens += 1;
    }

    ensure!(valid_tokens > 0, NoValidTokensSnafu {});
    Ok(builder.build())
}

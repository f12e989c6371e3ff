// Decoders behind the external QR boundary.

use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;
use vote_ledger::decode::*;

use crate::tally::*;

/// Sends images to the qrserver.com reading API.
pub struct QrServerDecoder {
    url: String,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct QrServerAnswer {
    symbol: Vec<QrServerSymbol>,
}

#[derive(Debug, Deserialize)]
struct QrServerSymbol {
    data: Option<String>,
    error: Option<String>,
}

impl QrServerDecoder {
    pub fn new(url: &str, timeout_seconds: u64) -> TallyResult<QrServerDecoder> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context(HttpClientSnafu {})?;
        Ok(QrServerDecoder {
            url: url.to_string(),
            client,
        })
    }
}

impl Decoder for QrServerDecoder {
    fn decode(&self, image: &[u8]) -> Result<String, DecodeError> {
        let form = Form::new().part("file", Part::bytes(image.to_vec()).file_name("image.png"));
        info!("Sending {} bytes to {}", image.len(), self.url);
        let response = self
            .client
            .post(self.url.as_str())
            .multipart(form)
            .send()
            .map_err(|e| DecodeError::Unreachable {
                message: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return BadStatusSnafu {
                status: status.as_u16(),
            }
            .fail();
        }
        let answers: Vec<QrServerAnswer> =
            response.json().map_err(|e| DecodeError::MalformedResponse {
                message: e.to_string(),
            })?;
        debug!("decode: answer {:?}", answers);
        read_answer(answers)
    }
}

fn read_answer(answers: Vec<QrServerAnswer>) -> Result<String, DecodeError> {
    let symbol = answers
        .into_iter()
        .next()
        .and_then(|a| a.symbol.into_iter().next())
        .context(MalformedResponseSnafu {
            message: "no symbol in the answer",
        })?;
    match symbol {
        QrServerSymbol {
            data: Some(data), ..
        } if !data.is_empty() => Ok(data),
        QrServerSymbol { error, .. } => UnreadableSnafu {
            message: error.unwrap_or_else(|| "empty QR code".to_string()),
        }
        .fail(),
    }
}

/// Reads files that already contain the decoded text of a QR code.
pub struct PayloadFileDecoder;

impl Decoder for PayloadFileDecoder {
    fn decode(&self, content: &[u8]) -> Result<String, DecodeError> {
        std::str::from_utf8(content)
            .map(|s| s.trim().to_string())
            .map_err(|e| DecodeError::Unreadable {
                message: format!("payload file is not UTF-8: {}", e),
            })
    }
}

use snafu::prelude::*;
use std::collections::HashMap;
use std::sync::Mutex;

/// Failures of the external QR decoding step.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum DecodeError {
    #[snafu(display("decode service unreachable: {message}"))]
    Unreachable { message: String },
    #[snafu(display("decode service answered with status {status}"))]
    BadStatus { status: u16 },
    #[snafu(display("malformed answer from the decode service: {message}"))]
    MalformedResponse { message: String },
    #[snafu(display("no QR code found in the image: {message}"))]
    Unreadable { message: String },
}

/// Turns the bytes of an image into the text of the QR code it contains.
///
/// The core never decodes images itself. Implementations may call a remote
/// service, read pre-decoded payloads, or return canned answers in tests.
pub trait Decoder {
    fn decode(&self, image: &[u8]) -> Result<String, DecodeError>;
}

/// A decoder that knows the answer in advance, keyed by the image content.
///
/// Images it does not know are reported as unreadable.
#[derive(Debug, Default)]
pub struct StaticDecoder {
    payloads: HashMap<Vec<u8>, String>,
    calls: Mutex<usize>,
}

impl StaticDecoder {
    pub fn new() -> StaticDecoder {
        StaticDecoder::default()
    }

    pub fn with_payload(mut self, image: &[u8], payload: &str) -> StaticDecoder {
        self.payloads.insert(image.to_vec(), payload.to_string());
        self
    }

    /// How many times `decode` was called.
    pub fn calls(&self) -> usize {
        self.calls.lock().map(|c| *c).unwrap_or(0)
    }
}

impl Decoder for StaticDecoder {
    fn decode(&self, image: &[u8]) -> Result<String, DecodeError> {
        if let Ok(mut c) = self.calls.lock() {
            *c += 1;
        }
        self.payloads
            .get(image)
            .cloned()
            .context(UnreadableSnafu {
                message: format!("unknown image of {} bytes", image.len()),
            })
    }
}

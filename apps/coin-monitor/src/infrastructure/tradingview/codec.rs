//! TradingView Packet Codec
//!
//! Every WebSocket text message carries one or more packets, each prefixed
//! with a length header:
//!
//! ```text
//! ~m~27~m~{"some_obfuscated":"json"}~m~4~m~~h~2
//! ```
//!
//! - `~m~` - static magic
//! - `27` - character length of the payload that follows the second magic
//! - payload - either a JSON object or a `~h~<id>` keepalive
//!
//! The server may merge several packets into one WebSocket message. Decoding
//! is done per header match, so a broken payload only affects itself.

use std::num::ParseIntError;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};

use super::packet::{
    CoinUpdate, IncomingPacket, JsonPacket, OutgoingPacket, PacketContent, QuoteData,
};

/// Frame magic.
pub const MAGIC: &str = "~m~";

/// Token sent in the handshake by clients without an account.
pub const UNAUTHORIZED_TOKEN: &str = "unauthorized_user_token";

#[allow(clippy::expect_used)]
static FRAME_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"~m~([0-9]+)~m~").expect("static frame header pattern is valid")
});

/// Result of decoding one framed payload. `Ok(None)` means the payload was
/// well-formed but carries nothing this client understands.
pub type Decoded = Result<Option<IncomingPacket>, DecodeFailure>;

/// Reasons a single payload could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Header length does not fit in `usize`.
    #[error("invalid frame length: {0}")]
    InvalidLength(String),

    /// Keepalive id is not a number.
    #[error("invalid ping id: {0}")]
    InvalidPingId(#[from] ParseIntError),

    /// Payload is not valid JSON or has the wrong shape.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload is valid JSON but not an object.
    #[error("expected JSON object payload")]
    NotAnObject,
}

/// A payload that failed to decode, kept for logging.
#[derive(Debug, thiserror::Error)]
#[error("failed to decode packet {raw:?}: {cause}")]
pub struct DecodeFailure {
    /// Why decoding failed.
    #[source]
    pub cause: DecodeError,
    /// The offending payload (without header).
    pub raw: String,
}

/// Packet encoder and decoder for the TradingView socket.
#[derive(Debug, Default, Clone, Copy)]
pub struct PacketCodec;

impl PacketCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Encode an outgoing packet as its JSON body.
    ///
    /// The result has no frame header; see [`Self::encode_frame`].
    #[must_use]
    pub fn encode(&self, packet: &OutgoingPacket) -> Value {
        let params: Vec<&str> = match packet {
            OutgoingPacket::SetAuthToken { token } => vec![token.as_str()],
            OutgoingPacket::CreateSession { session_id } => vec![session_id.as_str()],
            OutgoingPacket::AddSymbols {
                session_id,
                symbols,
            } => std::iter::once(session_id.as_str())
                .chain(symbols.iter().map(String::as_str))
                .collect(),
        };

        json!({ "m": packet.method(), "p": params })
    }

    /// Encode an outgoing packet and wrap it in a frame header.
    #[must_use]
    pub fn encode_frame(&self, packet: &OutgoingPacket) -> String {
        wrap_frame(&self.encode(packet).to_string())
    }

    /// Frame sent right after the socket opens.
    #[must_use]
    pub fn handshake_frame(&self) -> String {
        self.encode_frame(&OutgoingPacket::SetAuthToken {
            token: UNAUTHORIZED_TOKEN.to_string(),
        })
    }

    /// Frame answering a keepalive probe.
    #[must_use]
    pub fn pong_frame(&self, id: u64) -> String {
        wrap_frame(&format!("~h~{id}"))
    }

    /// Split a WebSocket message into its framed payloads.
    ///
    /// Yields exactly one entry per header found, in order. A header whose
    /// declared length runs past the end of the message takes whatever text
    /// remains.
    pub fn payloads<'a>(&self, raw: &'a str) -> Vec<Result<&'a str, DecodeFailure>> {
        FRAME_HEADER
            .captures_iter(raw)
            .map(|caps| {
                let header_end = caps.get_match().end();
                let declared = &caps[1];
                let length = declared.parse::<usize>().map_err(|_| DecodeFailure {
                    cause: DecodeError::InvalidLength(declared.to_string()),
                    raw: String::new(),
                })?;
                Ok(take_chars(&raw[header_end..], length))
            })
            .collect()
    }

    /// Decode every framed packet in a WebSocket message.
    pub fn decode_all(&self, raw: &str) -> Vec<Decoded> {
        self.payloads(raw)
            .into_iter()
            .map(|payload| {
                let payload = payload?;
                decode_payload(payload).map_err(|cause| DecodeFailure {
                    cause,
                    raw: payload.to_string(),
                })
            })
            .collect()
    }
}

/// Prefix a payload with its `~m~<len>~m~` header.
#[must_use]
pub fn wrap_frame(payload: &str) -> String {
    format!("{MAGIC}{}{MAGIC}{payload}", payload.chars().count())
}

fn take_chars(text: &str, count: usize) -> &str {
    text.char_indices()
        .nth(count)
        .map_or(text, |(end, _)| &text[..end])
}

fn decode_payload(payload: &str) -> Result<Option<IncomingPacket>, DecodeError> {
    if payload.is_empty() {
        Ok(None)
    } else if payload.starts_with('~') {
        decode_tilde_packet(payload)
    } else {
        decode_json_packet(payload)
    }
}

/// `~<type>~<body>`; only the `h` (keepalive) type is known.
fn decode_tilde_packet(payload: &str) -> Result<Option<IncomingPacket>, DecodeError> {
    let bytes = payload.as_bytes();
    if bytes.len() <= 3 || bytes[2] != b'~' {
        return Ok(None);
    }

    match (bytes[1], payload.get(3..)) {
        (b'h', Some(id)) => Ok(Some(IncomingPacket::Ping { id: id.parse()? })),
        _ => Ok(None),
    }
}

fn decode_json_packet(payload: &str) -> Result<Option<IncomingPacket>, DecodeError> {
    let root: Value = serde_json::from_str(payload)?;
    let root = root.as_object().ok_or(DecodeError::NotAnObject)?;

    let Some(params) = root
        .get("p")
        .and_then(Value::as_array)
        .filter(|params| params.len() >= 2)
    else {
        return Ok(None);
    };

    let content = match root.get("m").and_then(Value::as_str) {
        Some("qsd") => {
            let data = QuoteData::deserialize(&params[1])?;
            PacketContent::CoinUpdate(CoinUpdate::from(data))
        }
        _ => return Ok(None),
    };

    Ok(Some(IncomingPacket::Json(JsonPacket {
        listener_id: params[0].as_str().map(str::to_owned),
        content,
    })))
}

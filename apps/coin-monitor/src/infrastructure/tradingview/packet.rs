//! TradingView Packet Types
//!
//! Typed representation of the packets carried inside `~m~<len>~m~` frames.
//! Only the packets this client actually uses are modelled; everything else
//! the server sends decodes to "no packet".

use serde::Deserialize;

// =============================================================================
// Incoming Packets
// =============================================================================

/// Packet received from the TradingView socket.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingPacket {
    /// Keepalive probe (`~h~<id>`). Must be answered with the same id.
    Ping {
        /// Probe id echoed back in the pong.
        id: u64,
    },
    /// JSON control/data packet.
    Json(JsonPacket),
}

/// JSON packet addressed to a quote session.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPacket {
    /// Quote session the packet belongs to (first element of `"p"`).
    pub listener_id: Option<String>,
    /// Decoded content.
    pub content: PacketContent,
}

/// Content kinds carried by [`JsonPacket`].
#[derive(Debug, Clone, PartialEq)]
pub enum PacketContent {
    /// Quote series data (`"qsd"`).
    CoinUpdate(CoinUpdate),
}

/// Price update for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct CoinUpdate {
    /// Symbol descriptor as sent by the server (`"n"`).
    pub coin_id: String,
    /// Last price (`"v"."lp"`). Partial updates omit it.
    pub price: Option<f64>,
}

/// Wire shape of the `"qsd"` content object. Only `n` and `v.lp` are read.
#[derive(Debug, Deserialize)]
pub(crate) struct QuoteData {
    pub n: String,
    pub v: QuoteValues,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuoteValues {
    #[serde(default)]
    pub lp: Option<f64>,
}

impl From<QuoteData> for CoinUpdate {
    fn from(data: QuoteData) -> Self {
        Self {
            coin_id: data.n,
            price: data.v.lp,
        }
    }
}

// =============================================================================
// Outgoing Packets
// =============================================================================

/// Control packet sent to the TradingView socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingPacket {
    /// Sets the auth token for the socket (handshake).
    SetAuthToken {
        /// Token value; the unauthenticated client uses a fixed literal.
        token: String,
    },
    /// Creates a quote session.
    CreateSession {
        /// Session id, reused as the listener id of the subscription.
        session_id: String,
    },
    /// Attaches symbols to an existing quote session.
    AddSymbols {
        /// Target session.
        session_id: String,
        /// Symbols in `EXCHANGE:TICKER` form.
        symbols: Vec<String>,
    },
}

impl OutgoingPacket {
    /// Discriminator written to the `"m"` field.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::SetAuthToken { .. } => "set_auth_token",
            Self::CreateSession { .. } => "quote_create_session",
            Self::AddSymbols { .. } => "quote_add_symbols",
        }
    }
}

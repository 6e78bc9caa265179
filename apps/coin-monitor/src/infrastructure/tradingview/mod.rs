//! TradingView Quote Feed
//!
//! Client for TradingView's unauthenticated quote WebSocket.
//!
//! - [`codec`]: `~m~<len>~m~` framing and packet (de)serialization
//! - [`connection`]: one socket, driven by a single writer task
//! - [`supervisor`]: keeps one connection open, reconnecting after a delay
//! - [`quotes`]: per-symbol price streams multiplexed over the connection

pub mod codec;
pub mod connection;
pub mod packet;
pub mod quotes;
pub mod supervisor;

pub use codec::{DecodeError, DecodeFailure, PacketCodec};
pub use connection::{Connection, ConnectionConfig, ConnectionError, ConnectionHandle};
pub use packet::{CoinUpdate, IncomingPacket, JsonPacket, OutgoingPacket, PacketContent};
pub use quotes::{PriceStream, QuoteFeed, get_price};
pub use supervisor::{Connector, Established, LiveConnection, Supervisor, WebSocketConnector};

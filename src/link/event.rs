use enumflags2::{bitflags, BitFlags};

use super::ChannelId;
use crate::reply::ClientId;
use crate::Address;

/// Conditions observed on a watched raw channel.
#[bitflags]
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum IoCondition {
    Writable = 0x01,
    Error = 0x02,
    Hangup = 0x04,
    Invalid = 0x08,
}

pub type IoConditions = BitFlags<IoCondition>;

/// Asynchronous completions delivered to the adapter's single event entry
/// point. Events are handled strictly in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    /// A device answered the running inquiry.
    InquiryResult { peer: Address, class: u32 },
    /// The inquiry (or one periodic inquiry round) finished.
    InquiryComplete,
    /// A remote name request finished. `name` is present on success.
    RemoteNameComplete {
        peer: Address,
        status: u8,
        name: Option<String>,
    },
    /// A baseband connection was set up.
    ConnectionComplete { peer: Address, handle: u16 },
    /// A baseband connection went away.
    DisconnectComplete { handle: u16 },
    /// The authentication request for a connection handle finished.
    AuthComplete { handle: u16, status: u8 },
    /// The controller asks for a PIN during pairing.
    PinCodeRequest { peer: Address },
    /// The PIN agent answered the pending PIN request.
    PinCodeReplied { peer: Address },
    /// A new link key was negotiated and should be persisted.
    LinkKeyNotify {
        peer: Address,
        key: [u8; 16],
        key_type: u8,
        pin_length: u8,
    },
    /// A watched raw channel reported one or more conditions.
    ChannelReady {
        channel: ChannelId,
        conditions: IoConditions,
    },
    /// The discoverable-mode timer fired. Stale generations are ignored.
    DiscoverableTimeout { generation: u64 },
    /// A bus client disconnected; its long-running operations are cancelled.
    ClientGone { client: ClientId },
}

use std::time::Duration;

use crate::Address;

use super::ScanMode;

/// The general inquiry access code, scanned by every discoverable device.
pub const GIAC: [u8; 3] = [0x33, 0x8b, 0x9e];

/// Disconnect reason sent when the local user ends a connection.
pub const USER_ENDED_CONNECTION: u8 = 0x13;

pub const TIMEOUT_SHORT: Duration = Duration::from_millis(500);
pub const TIMEOUT_DEFAULT: Duration = Duration::from_millis(1000);
pub const TIMEOUT_LONG: Duration = Duration::from_millis(2000);

/// Commands the adapter core issues on the controller link. Each maps to one
/// HCI command packet; replies carry the completion status and, for reads,
/// the returned value.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkCommand {
    ReadScanEnable,
    WriteScanEnable(ScanMode),
    ReadClassOfDevice,
    WriteClassOfDevice(u32),
    ReadLocalName,
    WriteLocalName(String),
    Inquiry {
        lap: [u8; 3],
        length: u8,
        num_responses: u8,
    },
    InquiryCancel,
    PeriodicInquiry {
        lap: [u8; 3],
        max_period: u16,
        min_period: u16,
        length: u8,
        num_responses: u8,
    },
    ExitPeriodicInquiry,
    RemoteNameRequest(Address),
    RemoteNameRequestCancel(Address),
    AuthRequested {
        handle: u16,
    },
    DeleteStoredLinkKey {
        peer: Address,
        delete_all: bool,
    },
    Disconnect {
        handle: u16,
        reason: u8,
    },
    PinCodeNegativeReply(Address),
}

/// Reply to a submitted command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    /// Command status or command complete carrying only a status byte.
    Status(u8),
    ScanEnable(ScanMode),
    ClassOfDevice([u8; 3]),
    LocalName(String),
}

impl CommandReply {
    /// The completion status; replies that carry data imply success.
    pub fn status(&self) -> u8 {
        match self {
            CommandReply::Status(status) => *status,
            _ => 0,
        }
    }
}

//! The command/response link to the Bluetooth controller and the raw
//! link-layer channel used during bonding. The adapter core drives these
//! through traits; [`socket`] provides the Linux HCI implementation.

pub use self::command::*;
pub use self::event::*;
pub use self::status::*;

use enumflags2::{bitflags, BitFlags};

use crate::Address;

pub mod socket;

mod command;
mod event;
mod status;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    #[error("Controller device could not be opened.")]
    NoDevice,
    #[error("IO error {} on the controller link.", code)]
    Io { code: i32 },
    #[error("Controller command timed out.")]
    TimedOut,
    #[error("Controller reported status {:#04x}.", status)]
    Status { status: u8 },
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::Io {
            code: err.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}

/// Scan-enable bits as written to the controller.
#[bitflags]
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ScanFlag {
    PageScan = 0x01,
    InquiryScan = 0x02,
}

pub type ScanMode = BitFlags<ScanFlag>;

/// Identifier of an open raw link-layer channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ChannelId(pub u64);

/// Socket-level connection info of a raw channel, read once the connect has
/// completed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub handle: u16,
}

/// An open session on the controller's command interface. Commands block for
/// at most the given timeout; dropping the handle closes the session.
pub trait ControllerHandle {
    fn submit(
        &mut self,
        command: LinkCommand,
        timeout: std::time::Duration,
    ) -> Result<CommandReply, LinkError>;
}

/// Access to one controller device. Command sessions are opened per call and
/// closed right after; the only long-lived resource is the raw bonding
/// channel, watched through the event queue.
pub trait ControllerIo: Send + Sync {
    fn open(&self) -> Result<Box<dyn ControllerHandle>, LinkError>;

    /// Starts the controller. Returns the OS error code when bring-up fails;
    /// `EALREADY` means the device was already up.
    fn bring_up(&self) -> Result<(), LinkError>;

    /// Initiates a raw link-layer connection to the peer. Completion is
    /// observed through [`AdapterEvent::ChannelReady`] conditions, never
    /// synchronously.
    fn raw_connect(&self, local: Address, peer: Address) -> Result<ChannelId, LinkError>;

    /// Registers interest in channel conditions. Matching conditions are
    /// delivered as [`AdapterEvent::ChannelReady`].
    fn watch_channel(&self, channel: ChannelId, interest: BitFlags<IoCondition>);

    /// Pending socket-level error on the channel, 0 when none.
    fn channel_error(&self, channel: ChannelId) -> Result<i32, LinkError>;

    fn channel_info(&self, channel: ChannelId) -> Result<ConnectionInfo, LinkError>;

    fn close_channel(&self, channel: ChannelId);

    fn encryption_key_size(&self, peer: Address) -> Result<u8, LinkError>;
}

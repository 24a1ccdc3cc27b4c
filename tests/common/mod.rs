//! Shared fixture: an adapter wired to a scripted controller and an
//! in-memory store, so the state machines can be driven without hardware.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};

use btadapterd::adapter::{Adapter, AdapterConfig, LocalVersion};
use btadapterd::ids::NoOuiDb;
use btadapterd::link::{
    AdapterEvent, ChannelId, CommandReply, ConnectionInfo, ControllerHandle, ControllerIo,
    IoConditions, LinkCommand, LinkError, ScanMode,
};
use btadapterd::reply::{ClientId, Responder, Signal, Value};
use btadapterd::store::MemoryStore;
use btadapterd::{Address, Error};

pub const ENODEV: i32 = 19;
pub const EALREADY: i32 = 114;

/// Scripted controller state shared between the fake and the test body.
pub struct FakeState {
    pub log: Vec<LinkCommand>,
    pub open_fail: bool,
    pub bring_up: Result<(), LinkError>,
    pub connect_fail: bool,
    pub scan_enable: ScanMode,
    pub class: [u8; 3],
    pub local_name: String,
    /// Non-zero completion status per command kind.
    pub statuses: HashMap<&'static str, u8>,
    /// Command kinds that fail at the transport level.
    pub io_errors: HashSet<&'static str>,
    pub next_channel: u64,
    pub open_channels: Vec<ChannelId>,
    pub watches: Vec<(ChannelId, IoConditions)>,
    pub closed_channels: Vec<ChannelId>,
    pub channel_error: i32,
    pub conn_handle: u16,
    pub encryption_key_size: u8,
}

impl Default for FakeState {
    fn default() -> FakeState {
        FakeState {
            log: Vec::new(),
            open_fail: false,
            bring_up: Ok(()),
            connect_fail: false,
            scan_enable: ScanMode::empty(),
            class: [0x04, 0x01, 0x08],
            local_name: "test adapter".to_owned(),
            statuses: HashMap::new(),
            io_errors: HashSet::new(),
            next_channel: 1,
            open_channels: Vec::new(),
            watches: Vec::new(),
            closed_channels: Vec::new(),
            channel_error: 0,
            conn_handle: 0x002A,
            encryption_key_size: 16,
        }
    }
}

/// Stable name for a command variant, used to script failures.
pub fn kind(command: &LinkCommand) -> &'static str {
    match command {
        LinkCommand::ReadScanEnable => "read_scan_enable",
        LinkCommand::WriteScanEnable(_) => "write_scan_enable",
        LinkCommand::ReadClassOfDevice => "read_class",
        LinkCommand::WriteClassOfDevice(_) => "write_class",
        LinkCommand::ReadLocalName => "read_local_name",
        LinkCommand::WriteLocalName(_) => "write_local_name",
        LinkCommand::Inquiry { .. } => "inquiry",
        LinkCommand::InquiryCancel => "inquiry_cancel",
        LinkCommand::PeriodicInquiry { .. } => "periodic_inquiry",
        LinkCommand::ExitPeriodicInquiry => "exit_periodic_inquiry",
        LinkCommand::RemoteNameRequest(_) => "remote_name_request",
        LinkCommand::RemoteNameRequestCancel(_) => "remote_name_cancel",
        LinkCommand::AuthRequested { .. } => "auth_requested",
        LinkCommand::DeleteStoredLinkKey { .. } => "delete_stored_link_key",
        LinkCommand::Disconnect { .. } => "disconnect",
        LinkCommand::PinCodeNegativeReply(_) => "pin_code_negative_reply",
    }
}

pub struct FakeController {
    state: Arc<Mutex<FakeState>>,
}

struct FakeHandle {
    state: Arc<Mutex<FakeState>>,
}

impl ControllerHandle for FakeHandle {
    fn submit(
        &mut self,
        command: LinkCommand,
        _timeout: std::time::Duration,
    ) -> Result<CommandReply, LinkError> {
        let mut state = self.state.lock().unwrap();
        let command_kind = kind(&command);

        if state.io_errors.contains(command_kind) {
            state.log.push(command);
            return Err(LinkError::Io { code: 5 });
        }

        let status = state.statuses.get(command_kind).copied().unwrap_or(0);
        if status != 0 {
            state.log.push(command);
            return Ok(CommandReply::Status(status));
        }

        let reply = match &command {
            LinkCommand::ReadScanEnable => CommandReply::ScanEnable(state.scan_enable),
            LinkCommand::ReadClassOfDevice => CommandReply::ClassOfDevice(state.class),
            LinkCommand::ReadLocalName => CommandReply::LocalName(state.local_name.clone()),
            LinkCommand::WriteScanEnable(mode) => {
                state.scan_enable = *mode;
                CommandReply::Status(0)
            }
            LinkCommand::WriteLocalName(name) => {
                state.local_name = name.clone();
                CommandReply::Status(0)
            }
            _ => CommandReply::Status(0),
        };

        state.log.push(command);
        Ok(reply)
    }
}

impl ControllerIo for FakeController {
    fn open(&self) -> Result<Box<dyn ControllerHandle>, LinkError> {
        if self.state.lock().unwrap().open_fail {
            return Err(LinkError::NoDevice);
        }

        Ok(Box::new(FakeHandle {
            state: self.state.clone(),
        }))
    }

    fn bring_up(&self) -> Result<(), LinkError> {
        self.state.lock().unwrap().bring_up.clone()
    }

    fn raw_connect(&self, _local: Address, _peer: Address) -> Result<ChannelId, LinkError> {
        let mut state = self.state.lock().unwrap();

        if state.connect_fail {
            return Err(LinkError::Io { code: 111 });
        }

        let channel = ChannelId(state.next_channel);
        state.next_channel += 1;
        state.open_channels.push(channel);

        Ok(channel)
    }

    fn watch_channel(&self, channel: ChannelId, interest: IoConditions) {
        self.state.lock().unwrap().watches.push((channel, interest));
    }

    fn channel_error(&self, _channel: ChannelId) -> Result<i32, LinkError> {
        Ok(self.state.lock().unwrap().channel_error)
    }

    fn channel_info(&self, _channel: ChannelId) -> Result<ConnectionInfo, LinkError> {
        Ok(ConnectionInfo {
            handle: self.state.lock().unwrap().conn_handle,
        })
    }

    fn close_channel(&self, channel: ChannelId) {
        let mut state = self.state.lock().unwrap();
        state.open_channels.retain(|open| *open != channel);
        state.closed_channels.push(channel);
    }

    fn encryption_key_size(&self, _peer: Address) -> Result<u8, LinkError> {
        Ok(self.state.lock().unwrap().encryption_key_size)
    }
}

pub struct Harness {
    pub adapter: Adapter,
    pub state: Arc<Mutex<FakeState>>,
    pub store: Arc<MemoryStore>,
    pub signals: mpsc::UnboundedReceiver<Signal>,
    pub events: mpsc::UnboundedReceiver<AdapterEvent>,
}

impl Harness {
    /// A powered-down adapter on a scripted controller.
    pub fn new() -> Harness {
        let state = Arc::new(Mutex::new(FakeState::default()));
        let store = Arc::new(MemoryStore::new());
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let config = AdapterConfig {
            dev_id: 0,
            address: addr("00:11:22:33:44:55"),
            version: LocalVersion {
                manufacturer: 15,
                hci_version: 3,
                hci_revision: 0x1FA,
                lmp_version: 4,
                lmp_subversion: 0x420C,
            },
        };

        let adapter = Adapter::new(
            config,
            Arc::new(FakeController {
                state: state.clone(),
            }),
            store.clone(),
            Arc::new(NoOuiDb),
            signal_tx,
            event_tx,
        );

        Harness {
            adapter,
            state,
            store,
            signals: signal_rx,
            events: event_rx,
        }
    }

    /// A powered-up adapter with an empty command log.
    pub fn up() -> Harness {
        let mut harness = Harness::new();
        harness.adapter.controller_up();
        harness.clear_log();
        harness
    }

    pub fn log(&self) -> Vec<LinkCommand> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn clear_log(&self) {
        self.state.lock().unwrap().log.clear();
    }

    pub fn submitted(&self, command_kind: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .log
            .iter()
            .filter(|command| kind(command) == command_kind)
            .count()
    }

    pub fn set_status(&self, command_kind: &'static str, status: u8) {
        self.state
            .lock()
            .unwrap()
            .statuses
            .insert(command_kind, status);
    }

    pub fn next_signal(&mut self) -> Option<Signal> {
        self.signals.try_recv().ok()
    }
}

pub fn addr(text: &str) -> Address {
    text.parse().unwrap()
}

pub fn client(name: &str) -> ClientId {
    ClientId::new(name)
}

pub type ReplyRx = oneshot::Receiver<Result<Value, Error>>;

pub fn call() -> (Responder, ReplyRx) {
    Responder::new()
}

/// The reply a deferred call eventually produced; panics if none was sent.
pub fn reply_of(rx: &mut ReplyRx) -> Result<Value, Error> {
    rx.try_recv().expect("no reply was sent")
}

/// Asserts a deferred call has not been answered yet.
pub fn assert_pending(rx: &mut ReplyRx) {
    assert!(matches!(
        rx.try_recv(),
        Err(oneshot::error::TryRecvError::Empty)
    ));
}

//! The adapter state machine. One [`Adapter`] manages one controller: it
//! answers the bus-facing operation set, owns the bonding and discovery
//! sessions, and applies asynchronous controller events in arrival order.

pub use self::bonding::BondingSession;
pub use self::dispatch::{dispatch, Method, MethodCall};
pub use self::owner::{LongRunningOp, OwnershipTracker};
pub use self::registry::{
    ActiveConnection, DiscoveredDevice, FoundDeviceRegistry, NameStatus, PendingPin,
};

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use enumflags2::BitFlags;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, warn};

use crate::class;
use crate::error::{Error, Result};
use crate::ids::{self, OuiResolver};
use crate::link::{
    AdapterEvent, CommandReply, ControllerHandle, ControllerIo, LinkCommand, LinkError, ScanFlag,
    ScanMode, TIMEOUT_DEFAULT, TIMEOUT_LONG, TIMEOUT_SHORT, USER_ENDED_CONNECTION,
};
use crate::reply::{ClientId, Signal};
use crate::store::{
    format_class_record, Category, DeviceStore, ManufacturerRecord, CONFIG_CLASS,
    CONFIG_DISCOVERABLE_TIMEOUT, CONFIG_MODE, CONFIG_NAME,
};
use crate::Address;

mod bonding;
mod discovery;
mod dispatch;
mod owner;
mod registry;

pub const MODE_OFF: &str = "off";
pub const MODE_CONNECTABLE: &str = "connectable";
pub const MODE_DISCOVERABLE: &str = "discoverable";
pub const MODE_UNKNOWN: &str = "unknown";

/// Scan types a running discovery combines.
#[enumflags2::bitflags]
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum DiscoveryType {
    StdInquiry = 0x01,
    PeriodicInquiry = 0x02,
    ResolveName = 0x04,
}

/// Identity of the local controller, captured when it is attached.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LocalVersion {
    pub manufacturer: u16,
    pub hci_version: u8,
    pub hci_revision: u16,
    pub lmp_version: u8,
    pub lmp_subversion: u16,
}

#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub dev_id: u16,
    pub address: Address,
    pub version: LocalVersion,
}

/// State machine for one local Bluetooth adapter.
///
/// All methods run to completion synchronously; anything the controller
/// completes asynchronously is resumed through [`Adapter::handle_event`].
/// The invariants the operations rely on: at most one bonding session, at
/// most one of standard/periodic discovery active, and `mode` mirroring the
/// last scan-enable value the controller accepted.
pub struct Adapter {
    config: AdapterConfig,
    up: bool,
    mode: ScanMode,
    discoverable_timeout: u32,
    timer_generation: u64,
    timer_armed: bool,

    discov_active: bool,
    pdiscov_active: bool,
    pinq_idle: bool,
    pdiscov_resolve_names: bool,
    discov_type: BitFlags<DiscoveryType>,
    discovery_cancel: Option<crate::reply::Responder>,

    bonding: Option<BondingSession>,
    pin_requests: Vec<PendingPin>,
    found: FoundDeviceRegistry,
    connections: Vec<ActiveConnection>,
    owners: OwnershipTracker,

    io: Arc<dyn ControllerIo>,
    store: Arc<dyn DeviceStore>,
    oui: Arc<dyn OuiResolver>,
    signals: UnboundedSender<Signal>,
    events: UnboundedSender<AdapterEvent>,
}

impl Adapter {
    pub fn new(
        config: AdapterConfig,
        io: Arc<dyn ControllerIo>,
        store: Arc<dyn DeviceStore>,
        oui: Arc<dyn OuiResolver>,
        signals: UnboundedSender<Signal>,
        events: UnboundedSender<AdapterEvent>,
    ) -> Adapter {
        Adapter {
            config,
            up: false,
            mode: ScanMode::empty(),
            discoverable_timeout: 0,
            timer_generation: 0,
            timer_armed: false,
            discov_active: false,
            pdiscov_active: false,
            pinq_idle: false,
            pdiscov_resolve_names: false,
            discov_type: BitFlags::empty(),
            discovery_cancel: None,
            bonding: None,
            pin_requests: Vec::new(),
            found: FoundDeviceRegistry::new(),
            connections: Vec::new(),
            owners: OwnershipTracker::new(),
            io,
            store,
            oui,
            signals,
            events,
        }
    }

    pub fn address(&self) -> Address {
        self.config.address
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    pub fn is_discovering(&self) -> bool {
        self.discov_active
    }

    /// The controller came up. Restores the persisted scan mode and
    /// discoverable timeout.
    pub fn controller_up(&mut self) {
        self.up = true;

        match self.open_link() {
            Ok(mut link) => {
                match link.submit(LinkCommand::ReadScanEnable, TIMEOUT_DEFAULT) {
                    Ok(CommandReply::ScanEnable(mode)) => self.mode = mode,
                    Ok(reply) => warn!(status = reply.status(), "could not read scan enable"),
                    Err(err) => warn!(%err, "could not read scan enable"),
                }

                let stored = self
                    .store
                    .get(Category::Config, CONFIG_MODE)
                    .and_then(|name| mode_from_name(&name));

                if let Some(mode) = stored {
                    if mode != self.mode {
                        match link.submit(LinkCommand::WriteScanEnable(mode), TIMEOUT_DEFAULT) {
                            Ok(reply) if reply.status() == 0 => self.mode = mode,
                            Ok(reply) => {
                                warn!(status = reply.status(), "could not restore scan mode")
                            }
                            Err(err) => warn!(%err, "could not restore scan mode"),
                        }
                    }
                }
            }
            Err(err) => warn!(%err, "adapter came up but device could not be opened"),
        }

        self.discoverable_timeout = self
            .store
            .get(Category::Config, CONFIG_DISCOVERABLE_TIMEOUT)
            .and_then(|value| value.parse().ok())
            .unwrap_or(0);

        if self.discoverable_timeout != 0 && self.mode.contains(ScanFlag::InquiryScan) {
            self.arm_discoverable_timer();
        }
    }

    /// The controller went away. Every in-flight operation is terminated and
    /// per-connection state dropped; stored records stay.
    pub fn controller_down(&mut self) {
        self.cancel_discoverable_timer();
        self.up = false;
        self.mode = ScanMode::empty();

        self.terminate_bonding(Err(Error::NotReady), true);

        let was_discovering = self.discov_active || self.pdiscov_active;
        self.flush_found_devices();
        self.discov_active = false;
        self.pdiscov_active = false;
        self.pinq_idle = false;
        self.discov_type = BitFlags::empty();
        self.owners.release(LongRunningOp::Discovery);
        self.owners.release(LongRunningOp::PeriodicDiscovery);

        if let Some(responder) = self.discovery_cancel.take() {
            responder.ok(());
        }

        if was_discovering {
            self.emit(Signal::DiscoveryCompleted);
        }

        self.connections.clear();
        self.pin_requests.clear();
    }

    /// Applies one asynchronous controller completion. Events arrive in
    /// order; each is handled to completion before the next.
    pub fn handle_event(&mut self, event: AdapterEvent) {
        match event {
            AdapterEvent::InquiryResult { peer, class } => self.on_inquiry_result(peer, class),
            AdapterEvent::InquiryComplete => self.on_inquiry_complete(),
            AdapterEvent::RemoteNameComplete { peer, status, name } => {
                self.on_remote_name_complete(peer, status, name)
            }
            AdapterEvent::ConnectionComplete { peer, handle } => {
                self.on_connection_complete(peer, handle)
            }
            AdapterEvent::DisconnectComplete { handle } => self.on_disconnect_complete(handle),
            AdapterEvent::AuthComplete { handle, status } => self.on_auth_complete(handle, status),
            AdapterEvent::PinCodeRequest { peer } => self.on_pin_code_request(peer),
            AdapterEvent::PinCodeReplied { peer } => self.on_pin_code_replied(peer),
            AdapterEvent::LinkKeyNotify {
                peer,
                key,
                key_type,
                pin_length,
            } => self.on_link_key_notify(peer, key, key_type, pin_length),
            AdapterEvent::ChannelReady {
                channel,
                conditions,
            } => self.on_channel_ready(channel, conditions),
            AdapterEvent::DiscoverableTimeout { generation } => {
                self.on_discoverable_timeout(generation)
            }
            AdapterEvent::ClientGone { client } => self.on_client_gone(client),
        }
    }

    // ---- mode ----

    pub fn get_mode(&self) -> &'static str {
        mode_name(self.mode)
    }

    pub fn set_mode(&mut self, requested: &str) -> Result<()> {
        let target = mode_from_name(requested).ok_or(Error::InvalidArguments)?;

        let mut link = self.open_link()?;

        if !self.up {
            // applied when the adapter next comes up
            self.store_put(Category::Config, CONFIG_MODE, mode_name(target));

            match self.io.bring_up() {
                Ok(()) => return Ok(()),
                Err(LinkError::Io { code }) if code == libc::EALREADY => {}
                Err(LinkError::Io { code }) => {
                    error!(code, dev_id = self.config.dev_id, "can't init device");
                    return Err(Error::Failed { code });
                }
                Err(err) => return Err(err.into()),
            }
        }

        if self.mode != target {
            let reply = link
                .submit(LinkCommand::WriteScanEnable(target), TIMEOUT_DEFAULT)
                .map_err(|err| {
                    error!(%err, "sending write scan enable command failed");
                    Error::from(err)
                })?;

            if reply.status() != 0 {
                error!(status = reply.status(), "setting scan enable failed");
                return Err(Error::failed(reply.status() as i32));
            }

            self.mode = target;

            if !self.mode.contains(ScanFlag::InquiryScan) {
                self.cancel_discoverable_timer();
            } else if self.discoverable_timeout != 0 {
                self.arm_discoverable_timer();
            }
        }

        Ok(())
    }

    pub fn is_connectable(&self) -> bool {
        self.mode.contains(ScanFlag::PageScan)
    }

    pub fn is_discoverable(&self) -> bool {
        self.mode.contains(ScanFlag::InquiryScan)
    }

    // ---- discoverable timeout ----

    pub fn get_discoverable_timeout(&self) -> u32 {
        self.discoverable_timeout
    }

    /// A timeout of 0 leaves discoverable mode on until changed; anything
    /// else replaces the running timer.
    pub fn set_discoverable_timeout(&mut self, seconds: u32) -> Result<()> {
        self.require_up()?;

        self.cancel_discoverable_timer();
        self.discoverable_timeout = seconds;

        if seconds != 0 && self.mode.contains(ScanFlag::InquiryScan) {
            self.arm_discoverable_timer();
        }

        self.store_put(
            Category::Config,
            CONFIG_DISCOVERABLE_TIMEOUT,
            &seconds.to_string(),
        );

        Ok(())
    }

    fn arm_discoverable_timer(&mut self) {
        self.timer_generation += 1;
        self.timer_armed = true;

        let generation = self.timer_generation;
        let seconds = self.discoverable_timeout;
        let events = self.events.clone();

        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(seconds as u64)).await;
            let _ = events.send(AdapterEvent::DiscoverableTimeout { generation });
        });
    }

    fn cancel_discoverable_timer(&mut self) {
        self.timer_generation += 1;
        self.timer_armed = false;
    }

    fn on_discoverable_timeout(&mut self, generation: u64) {
        if !self.timer_armed || generation != self.timer_generation {
            return;
        }

        self.timer_armed = false;

        let connectable: ScanMode = ScanFlag::PageScan.into();

        match self.open_link() {
            Ok(mut link) => {
                match link.submit(LinkCommand::WriteScanEnable(connectable), TIMEOUT_DEFAULT) {
                    Ok(reply) if reply.status() == 0 => self.mode = connectable,
                    Ok(reply) => error!(
                        status = reply.status(),
                        "leaving discoverable mode failed"
                    ),
                    Err(err) => error!(%err, "leaving discoverable mode failed"),
                }
            }
            Err(err) => error!(%err, "leaving discoverable mode failed"),
        }
    }

    // ---- local identity ----

    pub fn get_version(&self) -> String {
        format!(
            "Bluetooth {}",
            ids::lmp_version_str(self.config.version.lmp_version)
        )
    }

    pub fn get_revision(&self) -> String {
        format!("HCI 0x{:X}", self.config.version.hci_revision)
    }

    pub fn get_manufacturer(&self) -> String {
        ids::company_str(self.config.version.manufacturer).to_owned()
    }

    pub fn get_company(&self) -> Result<String> {
        self.oui
            .company_for(self.config.address)
            .ok_or(Error::NotAvailable)
    }

    // ---- local name ----

    pub fn get_name(&self) -> Result<String> {
        if let Some(name) = self.store.get(Category::Config, CONFIG_NAME) {
            return Ok(name);
        }

        self.require_up()?;

        let mut link = self.open_link()?;
        match link.submit(LinkCommand::ReadLocalName, TIMEOUT_DEFAULT)? {
            CommandReply::LocalName(name) => Ok(name),
            reply => Err(Error::failed(reply.status() as i32)),
        }
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        self.require_up()?;

        if name.is_empty() || name.len() > 248 || name.contains('\0') {
            return Err(Error::InvalidArguments);
        }

        self.store
            .put(Category::Config, CONFIG_NAME, name)
            .map_err(Error::from)?;

        let mut link = self.open_link()?;
        let reply = link.submit(LinkCommand::WriteLocalName(name.to_owned()), TIMEOUT_DEFAULT)?;

        if reply.status() != 0 {
            return Err(Error::failed(reply.status() as i32));
        }

        Ok(())
    }

    // ---- local class of device ----

    pub fn get_major_class(&self) -> Result<String> {
        let mut link = self.open_link()?;
        let cls = read_class(link.as_mut())?;

        // only the computer major class is supported locally
        if cls[1] & 0x1F != 1 {
            return Err(Error::UnsupportedMajorClass);
        }

        Ok("computer".to_owned())
    }

    pub fn list_available_minor_classes(&self) -> Result<Vec<String>> {
        self.require_up()?;

        let mut link = self.open_link()?;
        let cls = read_class(link.as_mut())?;

        let table: &[&str] = match cls[1] & 0x1F {
            1 => &class::COMPUTER_MINOR_CLASSES,
            2 => &class::PHONE_MINOR_CLASSES,
            _ => return Err(Error::UnsupportedMajorClass),
        };

        Ok(table.iter().map(|minor| minor.to_string()).collect())
    }

    pub fn get_minor_class(&self) -> Result<String> {
        self.require_up()?;

        let mut link = self.open_link()?;
        let cls = read_class(link.as_mut())?;

        if cls[1] & 0x1F != 1 {
            return Err(Error::UnsupportedMajorClass);
        }

        let minor = (cls[0] >> 2) as usize;
        Ok(class::COMPUTER_MINOR_CLASSES
            .get(minor)
            .copied()
            .unwrap_or("")
            .to_owned())
    }

    pub fn set_minor_class(&mut self, minor: &str) -> Result<()> {
        self.require_up()?;

        let mut link = self.open_link()?;
        let cls = read_class(link.as_mut())?;

        if cls[1] & 0x1F != 1 {
            return Err(Error::UnsupportedMajorClass);
        }

        let index = class::computer_minor_class_index(minor).ok_or(Error::InvalidArguments)?;

        let class =
            ((cls[2] as u32) << 16) | ((cls[1] as u32) << 8) | ((index as u32) << 2);

        self.store_put(Category::Config, CONFIG_CLASS, &format_class_record(class));

        let reply = link.submit(LinkCommand::WriteClassOfDevice(class), TIMEOUT_LONG)?;
        if reply.status() != 0 {
            error!(status = reply.status(), "can't write class of device");
            return Err(Error::failed(reply.status() as i32));
        }

        self.emit(Signal::MinorClassChanged {
            minor: minor.to_owned(),
        });

        Ok(())
    }

    pub fn get_service_classes(&self) -> Result<Vec<String>> {
        self.require_up()?;

        let mut link = self.open_link()?;
        let cls = read_class(link.as_mut())?;

        Ok(class::service_classes_from_byte(cls[2])
            .into_iter()
            .map(str::to_owned)
            .collect())
    }

    // ---- remote device metadata ----

    pub fn get_remote_version(&self, peer: Address) -> Result<String> {
        let key = peer.to_string();

        let record = self
            .store
            .get(Category::Manufacturers, &key)
            .ok_or(Error::NotAvailable)?;

        let record: ManufacturerRecord = match record.parse() {
            Ok(record) => record,
            Err(_) => {
                warn!(peer = %key, "corrupt manufacturers record");
                return Ok(String::new());
            }
        };

        let version = ids::lmp_version_str(record.version);

        let edr = self
            .store
            .get(Category::Features, &key)
            .and_then(|features| features.parse::<crate::store::FeaturesRecord>().ok())
            .map(|features| features.supports_edr())
            .unwrap_or(false);

        Ok(if edr {
            format!("Bluetooth {} + EDR", version)
        } else {
            format!("Bluetooth {}", version)
        })
    }

    pub fn get_remote_revision(&self, peer: Address) -> Result<String> {
        let record = self
            .store
            .get(Category::Manufacturers, &peer.to_string())
            .ok_or(Error::NotAvailable)?;

        Ok(match record.parse::<ManufacturerRecord>() {
            Ok(record) => format!("HCI 0x{:X}", record.subversion),
            Err(_) => String::new(),
        })
    }

    pub fn get_remote_manufacturer(&self, peer: Address) -> Result<String> {
        let record = self
            .store
            .get(Category::Manufacturers, &peer.to_string())
            .ok_or(Error::NotAvailable)?;

        Ok(match record.parse::<ManufacturerRecord>() {
            Ok(record) => ids::company_str(record.company).to_owned(),
            Err(_) => String::new(),
        })
    }

    pub fn get_remote_company(&self, peer: Address) -> Result<String> {
        self.oui.company_for(peer).ok_or(Error::NotAvailable)
    }

    fn read_remote_class(&self, peer: Address) -> Result<u32> {
        let record = self
            .store
            .get(Category::Classes, &peer.to_string())
            .ok_or(Error::NotAvailable)?;

        crate::store::parse_class_record(&record).map_err(|_| Error::NotAvailable)
    }

    pub fn get_remote_class(&self, peer: Address) -> Result<u32> {
        self.read_remote_class(peer)
    }

    pub fn get_remote_major_class(&self, peer: Address) -> Result<String> {
        Ok(class::major_class_str(self.read_remote_class(peer)?).to_owned())
    }

    pub fn get_remote_minor_class(&self, peer: Address) -> Result<String> {
        Ok(class::minor_class_str(self.read_remote_class(peer)?).to_owned())
    }

    pub fn get_remote_service_classes(&self, peer: Address) -> Result<Vec<String>> {
        Ok(class::service_classes_str(self.read_remote_class(peer)?)
            .into_iter()
            .map(str::to_owned)
            .collect())
    }

    pub fn get_remote_alias(&self, peer: Address) -> Result<String> {
        self.store
            .get(Category::Aliases, &peer.to_string())
            .ok_or(Error::NotAvailable)
    }

    pub fn set_remote_alias(&mut self, peer: Address, alias: &str) -> Result<()> {
        if alias.is_empty() {
            return Err(Error::InvalidArguments);
        }

        self.store
            .put(Category::Aliases, &peer.to_string(), alias)
            .map_err(Error::from)?;

        self.emit(Signal::RemoteAliasChanged {
            peer,
            alias: alias.to_owned(),
        });

        Ok(())
    }

    pub fn clear_remote_alias(&mut self, peer: Address) -> Result<()> {
        let key = peer.to_string();
        let had_alias = self.store.get(Category::Aliases, &key).is_some();

        self.store
            .remove(Category::Aliases, &key)
            .map_err(Error::from)?;

        if had_alias {
            self.emit(Signal::RemoteAliasCleared { peer });
        }

        Ok(())
    }

    pub fn last_seen(&self, peer: Address) -> Result<String> {
        self.store
            .get(Category::LastSeen, &peer.to_string())
            .ok_or(Error::NotAvailable)
    }

    pub fn last_used(&self, peer: Address) -> Result<String> {
        self.store
            .get(Category::LastUsed, &peer.to_string())
            .ok_or(Error::NotAvailable)
    }

    // ---- service discovery (delegated to an external browser) ----

    pub fn get_remote_service_record(&self, _peer: Address) -> Result<Vec<String>> {
        Err(Error::NotSupported)
    }

    pub fn get_remote_service_handles(&self, _peer: Address) -> Result<Vec<String>> {
        Err(Error::NotSupported)
    }

    // ---- connections ----

    pub fn is_connected(&self, peer: Address) -> bool {
        self.connections.iter().any(|conn| conn.peer == peer)
    }

    pub fn list_connections(&self) -> Vec<String> {
        self.connections
            .iter()
            .map(|conn| conn.peer.to_string())
            .collect()
    }

    pub fn disconnect_remote_device(&mut self, peer: Address) -> Result<()> {
        self.require_up()?;

        let handle = self
            .connections
            .iter()
            .find(|conn| conn.peer == peer)
            .map(|conn| conn.handle)
            .ok_or(Error::NotConnected)?;

        let mut link = self.open_link()?;
        let reply = link.submit(
            LinkCommand::Disconnect {
                handle,
                reason: USER_ENDED_CONNECTION,
            },
            TIMEOUT_SHORT,
        )?;

        if reply.status() != 0 {
            error!(status = reply.status(), %peer, "disconnect failed");
            return Err(Error::failed(reply.status() as i32));
        }

        // the connection entry goes away with the disconnect event
        Ok(())
    }

    fn on_connection_complete(&mut self, peer: Address, handle: u16) {
        if !self.connections.iter().any(|conn| conn.handle == handle) {
            self.connections.push(ActiveConnection { peer, handle });
        }

        self.store_put(Category::LastUsed, &peer.to_string(), &timestamp());
    }

    fn on_disconnect_complete(&mut self, handle: u16) {
        self.connections.retain(|conn| conn.handle != handle);
    }

    // ---- stored bondings ----

    pub fn has_bonding(&self, peer: Address) -> bool {
        self.store
            .get(Category::LinkKeys, &peer.to_string())
            .is_some()
    }

    pub fn list_bondings(&self) -> Vec<String> {
        self.store.keys(Category::LinkKeys)
    }

    pub fn remove_bonding(&mut self, peer: Address) -> Result<()> {
        self.require_up()?;

        let mut link = self.open_link()?;
        let key = peer.to_string();

        if self.store.get(Category::LinkKeys, &key).is_none() {
            return Err(Error::BondingDoesNotExist);
        }

        self.store
            .remove(Category::LinkKeys, &key)
            .map_err(Error::from)?;

        // also forget the key on the controller; a failure here is not fatal
        if let Err(err) = link.submit(
            LinkCommand::DeleteStoredLinkKey {
                peer,
                delete_all: false,
            },
            TIMEOUT_DEFAULT,
        ) {
            warn!(%err, %peer, "could not delete stored link key");
        }

        if let Some(conn) = self.connections.iter().find(|conn| conn.peer == peer) {
            let reply = link.submit(
                LinkCommand::Disconnect {
                    handle: conn.handle,
                    reason: USER_ENDED_CONNECTION,
                },
                TIMEOUT_SHORT,
            )?;

            if reply.status() != 0 {
                error!(status = reply.status(), %peer, "disconnect failed");
                return Err(Error::failed(reply.status() as i32));
            }
        }

        self.emit(Signal::BondingRemoved { peer });

        Ok(())
    }

    pub fn get_pin_code_length(&self, peer: Address) -> Result<u8> {
        let record = self
            .store
            .get(Category::LinkKeys, &peer.to_string())
            .ok_or(Error::RecordDoesNotExist)?;

        let record: crate::store::LinkKeyRecord =
            record.parse().map_err(|_| Error::RecordDoesNotExist)?;

        Ok(record.pin_length)
    }

    pub fn get_encryption_key_size(&self, peer: Address) -> Result<u8> {
        self.io.encryption_key_size(peer).map_err(Error::from)
    }

    // ---- shared internals ----

    fn require_up(&self) -> Result<()> {
        if self.up {
            Ok(())
        } else {
            Err(Error::NotReady)
        }
    }

    fn open_link(&self) -> Result<Box<dyn ControllerHandle>> {
        self.io.open().map_err(Error::from)
    }

    fn emit(&self, signal: Signal) {
        let _ = self.signals.send(signal);
    }

    /// Store writes on event paths must not fail the event; they are logged
    /// and dropped.
    fn store_put(&self, category: Category, key: &str, value: &str) {
        if let Err(err) = self.store.put(category, key, value) {
            warn!(%err, ?category, key, "store write failed");
        }
    }

    fn on_client_gone(&mut self, client: ClientId) {
        debug!(%client, "client exited");

        for op in self.owners.client_gone(&client) {
            match op {
                LongRunningOp::Bonding => self.cancel_bonding_on_exit(),
                LongRunningOp::Discovery => self.cancel_discovery_on_exit(),
                LongRunningOp::PeriodicDiscovery => self.stop_periodic_on_exit(),
            }
        }
    }
}

fn mode_name(mode: ScanMode) -> &'static str {
    if mode.is_empty() {
        MODE_OFF
    } else if mode == ScanFlag::PageScan {
        MODE_CONNECTABLE
    } else if mode == ScanFlag::PageScan | ScanFlag::InquiryScan {
        MODE_DISCOVERABLE
    } else {
        // inquiry scan alone is not handled
        MODE_UNKNOWN
    }
}

fn mode_from_name(name: &str) -> Option<ScanMode> {
    if name.eq_ignore_ascii_case(MODE_OFF) {
        Some(ScanMode::empty())
    } else if name.eq_ignore_ascii_case(MODE_CONNECTABLE) {
        Some(ScanFlag::PageScan.into())
    } else if name.eq_ignore_ascii_case(MODE_DISCOVERABLE) {
        Some(ScanFlag::PageScan | ScanFlag::InquiryScan)
    } else {
        None
    }
}

fn read_class(link: &mut dyn ControllerHandle) -> Result<[u8; 3]> {
    match link.submit(LinkCommand::ReadClassOfDevice, TIMEOUT_DEFAULT)? {
        CommandReply::ClassOfDevice(cls) => Ok(cls),
        reply if reply.status() != 0 => Err(Error::failed(reply.status() as i32)),
        _ => Err(Error::failed(libc::EBADMSG)),
    }
}

fn timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
        .to_string()
}

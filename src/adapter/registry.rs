//! Devices found during an inquiry, kept in insertion order so name
//! resolution drains them first-in first-out, plus the small per-adapter
//! lists for active baseband connections and unanswered PIN requests.

use crate::reply::Responder;
use crate::Address;

/// Where a found device stands in the name-resolution pipeline.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NameStatus {
    /// Nobody asked for this device's name.
    NotRequested,
    /// Name wanted, request not yet issued.
    Required,
    /// Name request in flight; at most one device is in this state.
    Requested,
    Resolved,
}

#[derive(Debug)]
pub struct DiscoveredDevice {
    pub peer: Address,
    pub name_status: NameStatus,
    pub name: Option<String>,
    waiters: Vec<Responder>,
}

impl DiscoveredDevice {
    fn new(peer: Address, name_status: NameStatus) -> DiscoveredDevice {
        DiscoveredDevice {
            peer,
            name_status,
            name: None,
            waiters: Vec::new(),
        }
    }

    /// Attaches the deferred reply of one GetRemoteName request to this
    /// entry. Each waiter is answered exactly once, when the entry resolves
    /// or is flushed.
    pub fn add_waiter(&mut self, responder: Responder) {
        self.waiters.push(responder);
    }

    pub fn take_waiters(&mut self) -> Vec<Responder> {
        std::mem::take(&mut self.waiters)
    }
}

/// In-memory registry of devices found by the running (or most recent)
/// inquiry.
#[derive(Debug, Default)]
pub struct FoundDeviceRegistry {
    devices: Vec<DiscoveredDevice>,
}

impl FoundDeviceRegistry {
    pub fn new() -> FoundDeviceRegistry {
        FoundDeviceRegistry::default()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn contains(&self, peer: Address) -> bool {
        self.devices.iter().any(|d| d.peer == peer)
    }

    pub fn get_mut(&mut self, peer: Address) -> Option<&mut DiscoveredDevice> {
        self.devices.iter_mut().find(|d| d.peer == peer)
    }

    /// Adds the peer if it is not present yet; an existing entry keeps its
    /// position and status.
    pub fn enqueue(&mut self, peer: Address, name_status: NameStatus) -> &mut DiscoveredDevice {
        if let Some(index) = self.devices.iter().position(|d| d.peer == peer) {
            return &mut self.devices[index];
        }

        self.devices.push(DiscoveredDevice::new(peer, name_status));
        self.devices.last_mut().unwrap()
    }

    /// Oldest entry still waiting for a name request to be issued.
    pub fn first_required(&mut self) -> Option<&mut DiscoveredDevice> {
        self.devices
            .iter_mut()
            .find(|d| d.name_status == NameStatus::Required)
    }

    /// The entry whose name request is currently in flight, if any.
    pub fn requested(&mut self) -> Option<&mut DiscoveredDevice> {
        self.devices
            .iter_mut()
            .find(|d| d.name_status == NameStatus::Requested)
    }

    pub fn remove(&mut self, peer: Address) -> Option<DiscoveredDevice> {
        let index = self.devices.iter().position(|d| d.peer == peer)?;
        Some(self.devices.remove(index))
    }

    /// Empties the registry, handing back every entry so pending waiters can
    /// be answered.
    pub fn flush(&mut self) -> Vec<DiscoveredDevice> {
        std::mem::take(&mut self.devices)
    }
}

/// A link-layer connection the controller reported up.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ActiveConnection {
    pub peer: Address,
    pub handle: u16,
}

/// A PIN request the controller raised during pairing that the agent has not
/// yet answered (or has, once `replied` is set).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PendingPin {
    pub peer: Address,
    pub replied: bool,
}

//! The bus-facing operation set. Marshalling lives with the bus bindings;
//! by the time a call reaches here it is a [`Method`] plus the sender's
//! identity and a reply continuation. Peer addresses stay textual because
//! that is what the wire carries; they are validated here, before any side
//! effect.

use super::Adapter;
use crate::error::{Error, Result};
use crate::reply::{ClientId, Responder, Value};
use crate::Address;

/// Every method of the adapter interface. `DiscoverDevices` and
/// `DiscoverDevicesWithoutNameResolving` are distinct methods mapping to one
/// routine parameterized by the resolve-name flag.
#[derive(Debug, Clone, PartialEq)]
pub enum Method {
    GetAddress,
    GetVersion,
    GetRevision,
    GetManufacturer,
    GetCompany,
    GetMode,
    SetMode(String),
    GetDiscoverableTimeout,
    SetDiscoverableTimeout(u32),
    IsConnectable,
    IsDiscoverable,
    IsConnected(String),
    ListConnections,
    GetMajorClass,
    ListAvailableMinorClasses,
    GetMinorClass,
    SetMinorClass(String),
    GetServiceClasses,
    GetName,
    SetName(String),
    GetRemoteServiceRecord(String),
    GetRemoteServiceHandles(String),
    GetRemoteVersion(String),
    GetRemoteRevision(String),
    GetRemoteManufacturer(String),
    GetRemoteCompany(String),
    GetRemoteMajorClass(String),
    GetRemoteMinorClass(String),
    GetRemoteServiceClasses(String),
    GetRemoteClass(String),
    GetRemoteName(String),
    GetRemoteAlias(String),
    SetRemoteAlias(String, String),
    ClearRemoteAlias(String),
    LastSeen(String),
    LastUsed(String),
    DisconnectRemoteDevice(String),
    CreateBonding(String),
    CancelBondingProcess(String),
    RemoveBonding(String),
    HasBonding(String),
    ListBondings,
    GetPinCodeLength(String),
    GetEncryptionKeySize(String),
    StartPeriodicDiscovery,
    StopPeriodicDiscovery,
    IsPeriodicDiscovery,
    SetPeriodicDiscoveryNameResolving(bool),
    GetPeriodicDiscoveryNameResolving,
    DiscoverDevices,
    DiscoverDevicesWithoutNameResolving,
    CancelDiscovery,
}

/// One inbound request: the method, who sent it, and where the answer goes.
#[derive(Debug)]
pub struct MethodCall {
    pub method: Method,
    pub sender: ClientId,
    pub responder: Responder,
}

impl MethodCall {
    pub fn new(method: Method, sender: ClientId, responder: Responder) -> MethodCall {
        MethodCall {
            method,
            sender,
            responder,
        }
    }
}

fn parse_address(text: &str) -> Result<Address> {
    text.parse().map_err(|_| Error::InvalidArguments)
}

fn reply<T: Into<Value>>(responder: Responder, result: Result<T>) {
    responder.send(result.map(Into::into));
}

/// Routes one call into the adapter. Methods that complete synchronously
/// answer here; deferring methods take the responder with them and answer
/// from the event path.
pub fn dispatch(adapter: &mut Adapter, call: MethodCall) {
    let MethodCall {
        method,
        sender,
        responder,
    } = call;

    // validate textual addresses before any side effect
    macro_rules! addr {
        ($text:expr) => {
            match parse_address(&$text) {
                Ok(addr) => addr,
                Err(err) => {
                    responder.err(err);
                    return;
                }
            }
        };
    }

    match method {
        Method::GetAddress => responder.ok(adapter.address().to_string()),
        Method::GetVersion => responder.ok(adapter.get_version()),
        Method::GetRevision => responder.ok(adapter.get_revision()),
        Method::GetManufacturer => responder.ok(adapter.get_manufacturer()),
        Method::GetCompany => reply(responder, adapter.get_company()),

        Method::GetMode => responder.ok(adapter.get_mode()),
        Method::SetMode(mode) => reply(responder, adapter.set_mode(&mode)),
        Method::GetDiscoverableTimeout => responder.ok(adapter.get_discoverable_timeout()),
        Method::SetDiscoverableTimeout(seconds) => {
            reply(responder, adapter.set_discoverable_timeout(seconds))
        }
        Method::IsConnectable => responder.ok(adapter.is_connectable()),
        Method::IsDiscoverable => responder.ok(adapter.is_discoverable()),

        Method::IsConnected(peer) => {
            let peer = addr!(peer);
            responder.ok(adapter.is_connected(peer));
        }
        Method::ListConnections => responder.ok(adapter.list_connections()),

        Method::GetMajorClass => reply(responder, adapter.get_major_class()),
        Method::ListAvailableMinorClasses => {
            reply(responder, adapter.list_available_minor_classes())
        }
        Method::GetMinorClass => reply(responder, adapter.get_minor_class()),
        Method::SetMinorClass(minor) => reply(responder, adapter.set_minor_class(&minor)),
        Method::GetServiceClasses => reply(responder, adapter.get_service_classes()),

        Method::GetName => reply(responder, adapter.get_name()),
        Method::SetName(name) => reply(responder, adapter.set_name(&name)),

        Method::GetRemoteServiceRecord(peer) => {
            let peer = addr!(peer);
            reply(responder, adapter.get_remote_service_record(peer));
        }
        Method::GetRemoteServiceHandles(peer) => {
            let peer = addr!(peer);
            reply(responder, adapter.get_remote_service_handles(peer));
        }

        Method::GetRemoteVersion(peer) => {
            let peer = addr!(peer);
            reply(responder, adapter.get_remote_version(peer));
        }
        Method::GetRemoteRevision(peer) => {
            let peer = addr!(peer);
            reply(responder, adapter.get_remote_revision(peer));
        }
        Method::GetRemoteManufacturer(peer) => {
            let peer = addr!(peer);
            reply(responder, adapter.get_remote_manufacturer(peer));
        }
        Method::GetRemoteCompany(peer) => {
            let peer = addr!(peer);
            reply(responder, adapter.get_remote_company(peer));
        }

        Method::GetRemoteMajorClass(peer) => {
            let peer = addr!(peer);
            reply(responder, adapter.get_remote_major_class(peer));
        }
        Method::GetRemoteMinorClass(peer) => {
            let peer = addr!(peer);
            reply(responder, adapter.get_remote_minor_class(peer));
        }
        Method::GetRemoteServiceClasses(peer) => {
            let peer = addr!(peer);
            reply(responder, adapter.get_remote_service_classes(peer));
        }
        Method::GetRemoteClass(peer) => {
            let peer = addr!(peer);
            reply(responder, adapter.get_remote_class(peer));
        }

        Method::GetRemoteName(peer) => {
            let peer = addr!(peer);
            adapter.get_remote_name(peer, responder);
        }

        Method::GetRemoteAlias(peer) => {
            let peer = addr!(peer);
            reply(responder, adapter.get_remote_alias(peer));
        }
        Method::SetRemoteAlias(peer, alias) => {
            let peer = addr!(peer);
            reply(responder, adapter.set_remote_alias(peer, &alias));
        }
        Method::ClearRemoteAlias(peer) => {
            let peer = addr!(peer);
            reply(responder, adapter.clear_remote_alias(peer));
        }

        Method::LastSeen(peer) => {
            let peer = addr!(peer);
            reply(responder, adapter.last_seen(peer));
        }
        Method::LastUsed(peer) => {
            let peer = addr!(peer);
            reply(responder, adapter.last_used(peer));
        }

        Method::DisconnectRemoteDevice(peer) => {
            let peer = addr!(peer);
            reply(responder, adapter.disconnect_remote_device(peer));
        }

        Method::CreateBonding(peer) => {
            let peer = addr!(peer);
            adapter.create_bonding(sender, peer, responder);
        }
        Method::CancelBondingProcess(peer) => {
            let peer = addr!(peer);
            reply(responder, adapter.cancel_bonding_process(&sender, peer));
        }
        Method::RemoveBonding(peer) => {
            let peer = addr!(peer);
            reply(responder, adapter.remove_bonding(peer));
        }
        Method::HasBonding(peer) => {
            let peer = addr!(peer);
            responder.ok(adapter.has_bonding(peer));
        }
        Method::ListBondings => responder.ok(adapter.list_bondings()),
        Method::GetPinCodeLength(peer) => {
            let peer = addr!(peer);
            reply(responder, adapter.get_pin_code_length(peer));
        }
        Method::GetEncryptionKeySize(peer) => {
            let peer = addr!(peer);
            reply(responder, adapter.get_encryption_key_size(peer));
        }

        Method::StartPeriodicDiscovery => {
            reply(responder, adapter.start_periodic_discovery(sender))
        }
        Method::StopPeriodicDiscovery => {
            reply(responder, adapter.stop_periodic_discovery(&sender))
        }
        Method::IsPeriodicDiscovery => responder.ok(adapter.is_periodic_discovery()),
        Method::SetPeriodicDiscoveryNameResolving(resolve) => {
            adapter.set_periodic_discovery_name_resolving(resolve);
            responder.ok(());
        }
        Method::GetPeriodicDiscoveryNameResolving => {
            responder.ok(adapter.get_periodic_discovery_name_resolving())
        }

        Method::DiscoverDevices => reply(responder, adapter.discover_devices(sender, true)),
        Method::DiscoverDevicesWithoutNameResolving => {
            reply(responder, adapter.discover_devices(sender, false))
        }
        Method::CancelDiscovery => adapter.cancel_discovery(&sender, responder),
    }
}

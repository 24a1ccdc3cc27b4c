//! Inquiry, periodic inquiry and remote-name sequencing. One discovery mode
//! runs at a time; while its resolve-name flag is set, found devices are
//! drained through remote-name requests strictly one at a time, oldest
//! first.

use tracing::{error, warn};

use super::{timestamp, Adapter, DiscoveryType, LongRunningOp, NameStatus};
use crate::error::{Error, Result};
use crate::link::{LinkCommand, GIAC, TIMEOUT_DEFAULT, TIMEOUT_SHORT};
use crate::reply::{ClientId, Responder, Signal};
use crate::store::{format_class_record, Category};
use crate::Address;

impl Adapter {
    /// Starts a standard inquiry. The reply is synchronous; results and
    /// completion arrive as events.
    pub fn discover_devices(&mut self, requestor: ClientId, resolve_names: bool) -> Result<()> {
        self.require_up()?;

        if self.discov_active || self.pdiscov_active {
            return Err(Error::DiscoveryInProgress);
        }

        self.pending_remote_name_cancel();

        if self.bonding.is_some() {
            return Err(Error::BondingInProgress);
        }

        let mut link = self.open_link()?;
        let reply = link
            .submit(
                LinkCommand::Inquiry {
                    lap: GIAC,
                    length: 0x08,
                    num_responses: 0x00,
                },
                TIMEOUT_SHORT,
            )
            .map_err(|err| {
                error!(%err, "unable to start inquiry");
                Error::from(err)
            })?;

        if reply.status() != 0 {
            error!(status = reply.status(), "inquiry command failed");
            return Err(Error::failed(reply.status() as i32));
        }

        self.discov_type = DiscoveryType::StdInquiry.into();
        if resolve_names {
            self.discov_type.insert(DiscoveryType::ResolveName);
        }

        self.discov_active = true;
        self.owners.claim(LongRunningOp::Discovery, requestor);

        Ok(())
    }

    pub fn start_periodic_discovery(&mut self, requestor: ClientId) -> Result<()> {
        self.require_up()?;

        if self.discov_active || self.pdiscov_active {
            return Err(Error::DiscoveryInProgress);
        }

        self.pending_remote_name_cancel();

        if self.bonding.is_some() {
            return Err(Error::BondingInProgress);
        }

        let mut link = self.open_link()?;
        let reply = link
            .submit(
                LinkCommand::PeriodicInquiry {
                    lap: GIAC,
                    max_period: 24,
                    min_period: 16,
                    length: 0x08,
                    num_responses: 0x00,
                },
                TIMEOUT_DEFAULT,
            )
            .map_err(|err| {
                error!(%err, "unable to start periodic inquiry");
                Error::from(err)
            })?;

        if reply.status() != 0 {
            error!(status = reply.status(), "periodic inquiry command failed");
            return Err(Error::failed(reply.status() as i32));
        }

        self.discov_type = DiscoveryType::PeriodicInquiry.into();
        if self.pdiscov_resolve_names {
            self.discov_type.insert(DiscoveryType::ResolveName);
        }

        self.pdiscov_active = true;
        self.pinq_idle = false;
        self.owners.claim(LongRunningOp::PeriodicDiscovery, requestor);

        Ok(())
    }

    /// Only the client that started periodic discovery may stop it. The exit
    /// command confirms synchronously, so the reply is synchronous too.
    pub fn stop_periodic_discovery(&mut self, requestor: &ClientId) -> Result<()> {
        self.require_up()?;

        if !self.pdiscov_active {
            return Err(Error::NotAuthorized);
        }

        if !self.owners.owns(LongRunningOp::PeriodicDiscovery, requestor) {
            return Err(Error::NotAuthorized);
        }

        self.halt_periodic()
    }

    pub fn is_periodic_discovery(&self) -> bool {
        self.pdiscov_active
    }

    pub fn set_periodic_discovery_name_resolving(&mut self, resolve: bool) {
        self.pdiscov_resolve_names = resolve;

        if self.pdiscov_active {
            if resolve {
                self.discov_type.insert(DiscoveryType::ResolveName);
            } else {
                self.discov_type.remove(DiscoveryType::ResolveName);
            }
        }
    }

    pub fn get_periodic_discovery_name_resolving(&self) -> bool {
        self.pdiscov_resolve_names
    }

    /// Cancels the running standard discovery. The reply is deferred until
    /// the controller confirms through the matching completion event.
    pub fn cancel_discovery(&mut self, requestor: &ClientId, responder: Responder) {
        if let Err(err) = self.try_cancel_discovery(requestor) {
            responder.err(err);
            return;
        }

        self.discovery_cancel = Some(responder);
    }

    fn try_cancel_discovery(&mut self, requestor: &ClientId) -> Result<()> {
        self.require_up()?;

        // refuse when nothing is running or a cancel is already pending
        if !self.discov_active || self.discovery_cancel.is_some() {
            return Err(Error::NotAuthorized);
        }

        if !self.owners.owns(LongRunningOp::Discovery, requestor) {
            return Err(Error::NotAuthorized);
        }

        self.issue_discovery_cancel()?;
        self.flush_found_devices();

        Ok(())
    }

    /// Resolves a remote device name. Cache hits answer immediately; misses
    /// defer the reply until the name-resolution event fires.
    pub fn get_remote_name(&mut self, peer: Address, responder: Responder) {
        if let Some(name) = self.store.get(Category::Names, &peer.to_string()) {
            responder.ok(name);
            return;
        }

        if !self.is_up() {
            responder.err(Error::NotReady);
            return;
        }

        let device = self.found.enqueue(peer, NameStatus::Required);
        if device.name_status == NameStatus::NotRequested {
            device.name_status = NameStatus::Required;
        }
        device.add_waiter(responder);

        // a running discovery drains the queue itself
        if !(self.discov_active || self.pdiscov_active) {
            self.request_next_name();
        }
    }

    // ---- internals ----

    /// Cancels a lone remote-name request left over from GetRemoteName and
    /// drops the found-devices list, before an operation that needs the link
    /// to itself.
    pub(super) fn pending_remote_name_cancel(&mut self) {
        let peer = match self.found.requested() {
            Some(device) => device.peer,
            None => return,
        };

        match self.open_link() {
            Ok(mut link) => {
                if let Err(err) =
                    link.submit(LinkCommand::RemoteNameRequestCancel(peer), TIMEOUT_DEFAULT)
                {
                    error!(%err, %peer, "remote name cancel failed");
                }
            }
            Err(err) => error!(%err, "remote name cancel failed"),
        }

        self.flush_found_devices();
    }

    /// Answers every pending name waiter and empties the registry.
    pub(super) fn flush_found_devices(&mut self) {
        for mut device in self.found.flush() {
            for waiter in device.take_waiters() {
                waiter.err(Error::NotAvailable);
            }
        }
    }

    /// Issues the next queued remote-name request, skipping peers whose
    /// request cannot be sent. At most one request is outstanding.
    pub(super) fn request_next_name(&mut self) {
        if self.found.requested().is_some() {
            return;
        }

        loop {
            let peer = match self.found.first_required() {
                Some(device) => device.peer,
                None => return,
            };

            match self.issue_name_request(peer) {
                Ok(()) => {
                    if let Some(device) = self.found.get_mut(peer) {
                        device.name_status = NameStatus::Requested;
                    }
                    return;
                }
                Err(err) => {
                    warn!(%peer, %err, "remote name request failed");

                    if let Some(mut device) = self.found.remove(peer) {
                        for waiter in device.take_waiters() {
                            waiter.err(err.clone());
                        }
                    }
                }
            }
        }
    }

    fn issue_name_request(&mut self, peer: Address) -> Result<()> {
        let mut link = self.open_link()?;
        let reply = link.submit(LinkCommand::RemoteNameRequest(peer), TIMEOUT_SHORT)?;

        if reply.status() != 0 {
            return Err(Error::failed(reply.status() as i32));
        }

        Ok(())
    }

    fn issue_discovery_cancel(&mut self) -> Result<()> {
        let mut link = self.open_link()?;

        // cancel whatever phase the discovery is in
        let command = match self.found.requested() {
            Some(device) => LinkCommand::RemoteNameRequestCancel(device.peer),
            None => LinkCommand::InquiryCancel,
        };

        let reply = link.submit(command, TIMEOUT_DEFAULT)?;
        if reply.status() != 0 {
            return Err(Error::failed(reply.status() as i32));
        }

        Ok(())
    }

    fn halt_periodic(&mut self) -> Result<()> {
        let mut link = self.open_link()?;

        if let Some(device) = self.found.requested() {
            let peer = device.peer;
            if let Err(err) =
                link.submit(LinkCommand::RemoteNameRequestCancel(peer), TIMEOUT_DEFAULT)
            {
                warn!(%err, %peer, "remote name cancel failed");
            }
        }

        let reply = link.submit(LinkCommand::ExitPeriodicInquiry, TIMEOUT_DEFAULT)?;
        if reply.status() != 0 {
            error!(status = reply.status(), "exit periodic inquiry failed");
            return Err(Error::failed(reply.status() as i32));
        }

        self.finalize_periodic();

        Ok(())
    }

    fn finalize_discovery(&mut self) {
        self.flush_found_devices();
        self.discov_active = false;
        self.discov_type
            .remove(DiscoveryType::StdInquiry | DiscoveryType::ResolveName);
        self.owners.release(LongRunningOp::Discovery);

        // reply to a pending cancel before announcing completion
        if let Some(responder) = self.discovery_cancel.take() {
            responder.ok(());
        }

        self.emit(Signal::DiscoveryCompleted);
    }

    fn finalize_periodic(&mut self) {
        self.flush_found_devices();
        self.pdiscov_active = false;
        self.pinq_idle = false;
        self.discov_type
            .remove(DiscoveryType::PeriodicInquiry | DiscoveryType::ResolveName);
        self.owners.release(LongRunningOp::PeriodicDiscovery);
        self.emit(Signal::DiscoveryCompleted);
    }

    // ---- event handling ----

    pub(super) fn on_inquiry_result(&mut self, peer: Address, class: u32) {
        if self.pdiscov_active {
            self.pinq_idle = false;
        }

        let key = peer.to_string();
        self.store_put(Category::Classes, &key, &format_class_record(class));
        self.store_put(Category::LastSeen, &key, &timestamp());

        if !self.found.contains(peer) {
            let resolve = self.discov_type.contains(DiscoveryType::ResolveName)
                && self.store.get(Category::Names, &key).is_none();

            let status = if resolve {
                NameStatus::Required
            } else {
                NameStatus::NotRequested
            };

            self.found.enqueue(peer, status);
        }
    }

    pub(super) fn on_inquiry_complete(&mut self) {
        if self.discov_active {
            if self.discovery_cancel.is_some() {
                self.finalize_discovery();
                return;
            }

            self.request_next_name();
            if self.found.requested().is_none() {
                self.finalize_discovery();
            }

            return;
        }

        if self.pdiscov_active {
            self.pinq_idle = true;

            self.request_next_name();
            if self.found.requested().is_none() {
                // round over, nothing left to resolve
                self.flush_found_devices();
            }
        }
    }

    pub(super) fn on_remote_name_complete(
        &mut self,
        peer: Address,
        status: u8,
        name: Option<String>,
    ) {
        if status == 0 {
            if let Some(name) = &name {
                self.store_put(Category::Names, &peer.to_string(), name);
            }
        }

        if let Some(mut device) = self.found.remove(peer) {
            let waiters = device.take_waiters();

            match &name {
                Some(name) if status == 0 => {
                    for waiter in waiters {
                        waiter.ok(name.clone());
                    }
                }
                _ => {
                    for waiter in waiters {
                        waiter.err(Error::failed(status as i32));
                    }
                }
            }
        }

        if self.discov_active && self.discovery_cancel.is_some() {
            self.finalize_discovery();
            return;
        }

        self.request_next_name();

        if self.found.requested().is_none() {
            if self.discov_active {
                self.finalize_discovery();
            } else if self.pdiscov_active {
                self.flush_found_devices();
            }
        }
    }

    // ---- requestor exit ----

    pub(super) fn cancel_discovery_on_exit(&mut self) {
        if !self.discov_active {
            return;
        }

        match self.issue_discovery_cancel() {
            Ok(()) => {
                // the completion event finalizes the session
                self.flush_found_devices();
            }
            Err(err) => {
                error!(%err, "could not cancel discovery after requestor exit");
                self.finalize_discovery();
            }
        }
    }

    pub(super) fn stop_periodic_on_exit(&mut self) {
        if !self.pdiscov_active {
            return;
        }

        if let Err(err) = self.halt_periodic() {
            error!(%err, "could not stop periodic discovery after requestor exit");
            self.finalize_periodic();
        }
    }
}

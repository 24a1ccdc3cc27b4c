//! The pairing state machine. A bonding attempt opens a raw link-layer
//! channel, waits for it to become writable, then requests authentication
//! and watches the channel until the handshake settles. Whatever happens,
//! the original requestor hears back exactly once and the channel is
//! released.

use tracing::{debug, error, warn};

use super::{Adapter, LongRunningOp, PendingPin};
use crate::error::{Error, Result};
use crate::link::{
    ChannelId, HciStatus, IoCondition, IoConditions, LinkCommand, TIMEOUT_DEFAULT, TIMEOUT_SHORT,
};
use crate::reply::{ClientId, Responder, Value};
use crate::store::{Category, LinkKeyRecord};
use crate::Address;

/// An in-flight pairing attempt. At most one exists per adapter.
#[derive(Debug)]
pub struct BondingSession {
    pub peer: Address,
    pub owner: ClientId,
    responder: Option<Responder>,
    pub channel: ChannelId,
    pub handle: Option<u16>,
    pub auth_active: bool,
    pub cancel: bool,
    pub hci_status: Option<u8>,
}

impl Adapter {
    /// Starts pairing with `peer`. The reply is deferred until the handshake
    /// completes, fails, or is cancelled.
    pub fn create_bonding(&mut self, requestor: ClientId, peer: Address, responder: Responder) {
        if let Err(err) = self.check_bonding_preconditions(peer) {
            responder.err(err);
            return;
        }

        let channel = match self.io.raw_connect(self.config.address, peer) {
            Ok(channel) => channel,
            Err(err) => {
                warn!(%err, %peer, "raw connect failed");
                responder.err(Error::ConnectionAttemptFailed { code: 0 });
                return;
            }
        };

        self.io.watch_channel(
            channel,
            IoCondition::Writable | IoCondition::Error | IoCondition::Hangup | IoCondition::Invalid,
        );

        self.bonding = Some(BondingSession {
            peer,
            owner: requestor.clone(),
            responder: Some(responder),
            channel,
            handle: None,
            auth_active: false,
            cancel: false,
            hci_status: None,
        });

        self.owners.claim(LongRunningOp::Bonding, requestor);
    }

    fn check_bonding_preconditions(&mut self, peer: Address) -> Result<()> {
        self.require_up()?;

        // periodic discovery only blocks bonding while an inquiry round is
        // actually on the air
        if self.discov_active || (self.pdiscov_active && !self.pinq_idle) {
            return Err(Error::DiscoveryInProgress);
        }

        self.pending_remote_name_cancel();

        if self.bonding.is_some() {
            return Err(Error::BondingInProgress);
        }

        if self.pin_requests.iter().any(|pin| pin.peer == peer) {
            return Err(Error::BondingInProgress);
        }

        if self
            .store
            .get(Category::LinkKeys, &peer.to_string())
            .is_some()
        {
            return Err(Error::BondingAlreadyExists);
        }

        Ok(())
    }

    /// Cancels the in-flight bonding with `peer`. Only its requestor may
    /// cancel, and only while the PIN exchange has not been answered; past
    /// that point the handshake cannot be aborted safely.
    pub fn cancel_bonding_process(&mut self, requestor: &ClientId, peer: Address) -> Result<()> {
        self.require_up()?;

        let (channel, owner) = match &self.bonding {
            Some(session) if session.peer == peer => (session.channel, session.owner.clone()),
            _ => return Err(Error::BondingDoesNotExist),
        };

        if &owner != requestor {
            return Err(Error::NotAuthorized);
        }

        if let Some(session) = &mut self.bonding {
            session.cancel = true;
        }

        if let Some(index) = self.pin_requests.iter().position(|pin| pin.peer == peer) {
            if self.pin_requests[index].replied {
                self.io.close_channel(channel);
                return Err(Error::NotAuthorized);
            }

            match self.open_link() {
                Ok(mut link) => {
                    if let Err(err) =
                        link.submit(LinkCommand::PinCodeNegativeReply(peer), TIMEOUT_DEFAULT)
                    {
                        warn!(%err, %peer, "pin negative reply failed");
                    }
                }
                Err(err) => warn!(%err, "pin negative reply failed"),
            }

            self.pin_requests.remove(index);
        }

        self.io.close_channel(channel);

        Ok(())
    }

    // ---- event handling ----

    /// Drives the session forward on channel conditions: first waiting for
    /// the connect to finish, then for the authentication phase to settle.
    pub(super) fn on_channel_ready(&mut self, channel: ChannelId, conditions: IoConditions) {
        let (auth_active, hci_status) = match &self.bonding {
            Some(session) if session.channel == channel => {
                (session.auth_active, session.hci_status)
            }
            _ => {
                debug!("channel condition without a pending bonding");
                self.io.close_channel(channel);
                return;
            }
        };

        if conditions.contains(IoCondition::Invalid) {
            // the channel was closed under us, normally by a cancel
            self.terminate_bonding(Err(Error::AuthenticationCanceled), false);
            return;
        }

        if conditions.intersects(IoCondition::Hangup | IoCondition::Error) {
            debug!("hangup or error on bonding channel");

            let reply = if auth_active {
                Err(auth_failure(hci_status))
            } else {
                Err(Error::ConnectionAttemptFailed {
                    code: libc::ENETDOWN,
                })
            };

            self.terminate_bonding(reply, true);
            return;
        }

        // writable: the connect finished, though maybe with an error
        let sock_err = match self.io.channel_error(channel) {
            Ok(code) => code,
            Err(err) => {
                error!(%err, "can't get socket error");
                self.terminate_bonding(Err(err.into()), true);
                return;
            }
        };

        if sock_err != 0 {
            let reply = if auth_active {
                Err(auth_failure(hci_status))
            } else {
                Err(Error::ConnectionAttemptFailed { code: sock_err })
            };

            self.terminate_bonding(reply, true);
            return;
        }

        let info = match self.io.channel_info(channel) {
            Ok(info) => info,
            Err(err) => {
                error!(%err, "can't get connection info");
                self.terminate_bonding(Err(err.into()), true);
                return;
            }
        };

        match self.request_authentication(info.handle) {
            Ok(()) => {
                if let Some(session) = &mut self.bonding {
                    session.handle = Some(info.handle);
                    session.auth_active = true;
                }

                // from here only teardown conditions matter
                self.io.watch_channel(
                    channel,
                    IoCondition::Invalid | IoCondition::Hangup | IoCondition::Error,
                );
            }
            Err(err) => self.terminate_bonding(Err(err), true),
        }
    }

    fn request_authentication(&mut self, handle: u16) -> Result<()> {
        let mut link = self.open_link()?;

        let reply = link
            .submit(LinkCommand::AuthRequested { handle }, TIMEOUT_SHORT)
            .map_err(|err| {
                error!(%err, "unable to send authentication request");
                Error::from(err)
            })?;

        if reply.status() != 0 {
            error!(
                status = reply.status(),
                "authentication request failed"
            );
            return Err(Error::failed(reply.status() as i32));
        }

        Ok(())
    }

    pub(super) fn on_auth_complete(&mut self, handle: u16, status: u8) {
        let matches = matches!(
            &self.bonding,
            Some(session) if session.auth_active && session.handle == Some(handle)
        );

        if !matches {
            return;
        }

        if status != 0 {
            if let Some(session) = &mut self.bonding {
                session.hci_status = Some(status);
            }
            self.terminate_bonding(Err(Error::AuthenticationFailed { status }), true);
        } else {
            self.terminate_bonding(Ok(Value::None), true);
        }
    }

    pub(super) fn on_pin_code_request(&mut self, peer: Address) {
        if !self.pin_requests.iter().any(|pin| pin.peer == peer) {
            self.pin_requests.push(PendingPin {
                peer,
                replied: false,
            });
        }
    }

    pub(super) fn on_pin_code_replied(&mut self, peer: Address) {
        if let Some(pin) = self.pin_requests.iter_mut().find(|pin| pin.peer == peer) {
            pin.replied = true;
        }
    }

    pub(super) fn on_link_key_notify(
        &mut self,
        peer: Address,
        key: [u8; 16],
        key_type: u8,
        pin_length: u8,
    ) {
        let record = LinkKeyRecord {
            key,
            key_type,
            pin_length,
        };

        self.store_put(Category::LinkKeys, &peer.to_string(), &record.to_record());
    }

    /// Tears the session down, answering the original requestor at most
    /// once and releasing the channel.
    pub(super) fn terminate_bonding(&mut self, reply: Result<Value>, close: bool) {
        let mut session = match self.bonding.take() {
            Some(session) => session,
            None => return,
        };

        self.owners.release(LongRunningOp::Bonding);
        self.pin_requests.retain(|pin| pin.peer != session.peer);

        if let Some(responder) = session.responder.take() {
            responder.send(reply);
        }

        if close {
            self.io.close_channel(session.channel);
        }
    }

    pub(super) fn cancel_bonding_on_exit(&mut self) {
        let (peer, channel) = match &self.bonding {
            Some(session) => (session.peer, session.channel),
            None => return,
        };

        if let Some(session) = &mut self.bonding {
            session.cancel = true;
        }

        if let Some(index) = self.pin_requests.iter().position(|pin| pin.peer == peer) {
            if !self.pin_requests[index].replied {
                match self.open_link() {
                    Ok(mut link) => {
                        let _ = link.submit(LinkCommand::PinCodeNegativeReply(peer), TIMEOUT_DEFAULT);
                    }
                    Err(err) => warn!(%err, "pin negative reply failed"),
                }
                self.pin_requests.remove(index);
            }
        }

        self.io.close_channel(channel);
    }
}

fn auth_failure(hci_status: Option<u8>) -> Error {
    Error::AuthenticationFailed {
        status: hci_status.unwrap_or(HciStatus::AuthenticationFailure as u8),
    }
}

//! Linux implementation of the controller link: raw HCI sockets for
//! commands and events, and raw L2CAP sockets for the bonding channel.
//!
//! Commands are written as HCI command packets and the socket is drained
//! until the matching command-complete or command-status event shows up;
//! unrelated events read along the way are forwarded to the adapter's event
//! queue instead of being dropped.

use std::collections::HashMap;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use bytes::{Buf, BufMut, BytesMut};
use enumflags2::BitFlags;
use futures::{Stream, StreamExt};
use num_traits::FromPrimitive;
use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::Address;

use super::{
    AdapterEvent, ChannelId, CommandReply, ConnectionInfo, ControllerHandle, ControllerIo,
    IoCondition, LinkCommand, LinkError,
};

const BTPROTO_L2CAP: libc::c_int = 0;
const BTPROTO_HCI: libc::c_int = 1;

const HCI_CHANNEL_RAW: u16 = 0;
const SOL_HCI: libc::c_int = 0;
const HCI_FILTER: libc::c_int = 2;

const SOL_L2CAP: libc::c_int = 6;
const L2CAP_CONNINFO: libc::c_int = 0x02;

// _IOW('H', 201, int)
const HCIDEVUP: libc::c_ulong = 0x400448c9;

const HCI_COMMAND_PKT: u8 = 0x01;
const HCI_EVENT_PKT: u8 = 0x04;

const OGF_LINK_CTL: u16 = 0x01;
const OGF_HOST_CTL: u16 = 0x03;

#[repr(C)]
struct SockAddrHci {
    hci_family: libc::sa_family_t,
    hci_dev: u16,
    hci_channel: u16,
}

#[repr(C)]
struct SockAddrL2 {
    l2_family: libc::sa_family_t,
    l2_psm: u16,
    l2_bdaddr: [u8; 6],
    l2_cid: u16,
    l2_bdaddr_type: u8,
}

#[repr(C)]
struct HciFilter {
    type_mask: u32,
    event_mask: [u32; 2],
    opcode: u16,
}

#[repr(C)]
#[derive(Copy, Clone, Default)]
struct L2capConnInfo {
    hci_handle: u16,
    dev_class: [u8; 3],
}

/// Event codes this transport decodes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
enum EventCode {
    InquiryComplete = 0x01,
    InquiryResult = 0x02,
    ConnComplete = 0x03,
    DisconnComplete = 0x05,
    AuthComplete = 0x06,
    RemoteNameReqComplete = 0x07,
    CommandComplete = 0x0E,
    CommandStatus = 0x0F,
    PinCodeRequest = 0x16,
    LinkKeyNotify = 0x18,
    InquiryResultWithRssi = 0x22,
}

fn check(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

/// Controller access through the raw HCI socket of one device.
pub struct HciSocket {
    dev_id: u16,
    events: UnboundedSender<AdapterEvent>,
    channels: Mutex<HashMap<ChannelId, RawFd>>,
    next_channel: AtomicU64,
}

impl HciSocket {
    pub fn new(dev_id: u16, events: UnboundedSender<AdapterEvent>) -> HciSocket {
        HciSocket {
            dev_id,
            events,
            channels: Mutex::new(HashMap::new()),
            next_channel: AtomicU64::new(1),
        }
    }

    fn channel_fd(&self, channel: ChannelId) -> Result<RawFd, LinkError> {
        self.channels
            .lock()
            .unwrap()
            .get(&channel)
            .copied()
            .ok_or(LinkError::Io {
                code: libc::EBADF,
            })
    }
}

fn open_raw_hci(dev_id: u16, nonblocking: bool) -> Result<RawFd, LinkError> {
    let mut flags = libc::SOCK_RAW | libc::SOCK_CLOEXEC;
    if nonblocking {
        flags |= libc::SOCK_NONBLOCK;
    }

    let fd = unsafe { libc::socket(libc::AF_BLUETOOTH, flags, BTPROTO_HCI) };
    if fd < 0 {
        return Err(LinkError::NoDevice);
    }

    let addr = SockAddrHci {
        hci_family: libc::AF_BLUETOOTH as libc::sa_family_t,
        hci_dev: dev_id,
        hci_channel: HCI_CHANNEL_RAW,
    };

    if unsafe {
        libc::bind(
            fd,
            &addr as *const SockAddrHci as *const libc::sockaddr,
            std::mem::size_of::<SockAddrHci>() as u32,
        )
    } < 0
    {
        unsafe { libc::close(fd) };
        return Err(LinkError::NoDevice);
    }

    // accept every event packet; command matching happens in userspace
    let filter = HciFilter {
        type_mask: 1 << HCI_EVENT_PKT,
        event_mask: [0xffff_ffff, 0xffff_ffff],
        opcode: 0,
    };

    if unsafe {
        libc::setsockopt(
            fd,
            SOL_HCI,
            HCI_FILTER,
            &filter as *const HciFilter as *const libc::c_void,
            std::mem::size_of::<HciFilter>() as u32,
        )
    } < 0
    {
        let err = io::Error::last_os_error();
        unsafe { libc::close(fd) };
        return Err(err.into());
    }

    Ok(fd)
}

impl ControllerIo for HciSocket {
    fn open(&self) -> Result<Box<dyn ControllerHandle>, LinkError> {
        let fd = open_raw_hci(self.dev_id, false)?;
        Ok(Box::new(HciHandle {
            fd,
            events: self.events.clone(),
        }))
    }

    fn bring_up(&self) -> Result<(), LinkError> {
        let fd = open_raw_hci(self.dev_id, false)?;

        let result = unsafe { libc::ioctl(fd, HCIDEVUP, self.dev_id as libc::c_ulong) };
        let err = io::Error::last_os_error();
        unsafe { libc::close(fd) };

        if result < 0 {
            return Err(LinkError::Io {
                code: err.raw_os_error().unwrap_or(libc::EIO),
            });
        }

        Ok(())
    }

    fn raw_connect(&self, local: Address, peer: Address) -> Result<ChannelId, LinkError> {
        let fd = unsafe {
            libc::socket(
                libc::AF_BLUETOOTH,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC | libc::SOCK_NONBLOCK,
                BTPROTO_L2CAP,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error().into());
        }

        let local_addr = SockAddrL2 {
            l2_family: libc::AF_BLUETOOTH as libc::sa_family_t,
            l2_psm: 0,
            l2_bdaddr: local.into(),
            l2_cid: 0,
            l2_bdaddr_type: 0,
        };

        if unsafe {
            libc::bind(
                fd,
                &local_addr as *const SockAddrL2 as *const libc::sockaddr,
                std::mem::size_of::<SockAddrL2>() as u32,
            )
        } < 0
        {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err.into());
        }

        let peer_addr = SockAddrL2 {
            l2_family: libc::AF_BLUETOOTH as libc::sa_family_t,
            l2_psm: 0,
            l2_bdaddr: peer.into(),
            l2_cid: 0,
            l2_bdaddr_type: 0,
        };

        let result = unsafe {
            libc::connect(
                fd,
                &peer_addr as *const SockAddrL2 as *const libc::sockaddr,
                std::mem::size_of::<SockAddrL2>() as u32,
            )
        };

        if result < 0 {
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINPROGRESS) | Some(libc::EAGAIN) => {}
                _ => {
                    unsafe { libc::close(fd) };
                    return Err(err.into());
                }
            }
        }

        let channel = ChannelId(self.next_channel.fetch_add(1, Ordering::Relaxed));
        self.channels.lock().unwrap().insert(channel, fd);

        Ok(channel)
    }

    fn watch_channel(&self, channel: ChannelId, interest: BitFlags<IoCondition>) {
        let fd = match self.channel_fd(channel) {
            Ok(fd) => fd,
            Err(_) => {
                let _ = self.events.send(AdapterEvent::ChannelReady {
                    channel,
                    conditions: IoCondition::Invalid.into(),
                });
                return;
            }
        };

        let events = self.events.clone();

        // one-shot watch, re-armed by the adapter when it moves phase
        tokio::task::spawn_blocking(move || {
            let mut poll_events: libc::c_short = 0;
            if interest.contains(IoCondition::Writable) {
                poll_events |= libc::POLLOUT;
            }

            let mut pollfd = libc::pollfd {
                fd,
                events: poll_events,
                revents: 0,
            };

            if unsafe { libc::poll(&mut pollfd, 1, -1) } < 0 {
                let _ = events.send(AdapterEvent::ChannelReady {
                    channel,
                    conditions: IoCondition::Error.into(),
                });
                return;
            }

            let mut conditions = BitFlags::<IoCondition>::empty();
            if pollfd.revents & libc::POLLOUT != 0 {
                conditions |= IoCondition::Writable;
            }
            if pollfd.revents & libc::POLLERR != 0 {
                conditions |= IoCondition::Error;
            }
            if pollfd.revents & libc::POLLHUP != 0 {
                conditions |= IoCondition::Hangup;
            }
            if pollfd.revents & libc::POLLNVAL != 0 {
                conditions |= IoCondition::Invalid;
            }

            if !conditions.is_empty() {
                let _ = events.send(AdapterEvent::ChannelReady {
                    channel,
                    conditions,
                });
            }
        });
    }

    fn channel_error(&self, channel: ChannelId) -> Result<i32, LinkError> {
        let fd = self.channel_fd(channel)?;

        let mut error: libc::c_int = 0;
        let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;

        check(unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_ERROR,
                &mut error as *mut libc::c_int as *mut libc::c_void,
                &mut len,
            )
        })
        .map_err(LinkError::from)?;

        Ok(error)
    }

    fn channel_info(&self, channel: ChannelId) -> Result<ConnectionInfo, LinkError> {
        let fd = self.channel_fd(channel)?;

        let mut info = L2capConnInfo::default();
        let mut len = std::mem::size_of::<L2capConnInfo>() as libc::socklen_t;

        check(unsafe {
            libc::getsockopt(
                fd,
                SOL_L2CAP,
                L2CAP_CONNINFO,
                &mut info as *mut L2capConnInfo as *mut libc::c_void,
                &mut len,
            )
        })
        .map_err(LinkError::from)?;

        Ok(ConnectionInfo {
            handle: info.hci_handle,
        })
    }

    fn close_channel(&self, channel: ChannelId) {
        if let Some(fd) = self.channels.lock().unwrap().remove(&channel) {
            unsafe { libc::close(fd) };
        }
    }

    fn encryption_key_size(&self, _peer: Address) -> Result<u8, LinkError> {
        // the raw socket transport has no way to query this
        Err(LinkError::Io {
            code: libc::EOPNOTSUPP,
        })
    }
}

/// One open command session. The socket blocks, gated by `poll` so every
/// wait is bounded.
struct HciHandle {
    fd: RawFd,
    events: UnboundedSender<AdapterEvent>,
}

impl Drop for HciHandle {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

impl ControllerHandle for HciHandle {
    fn submit(&mut self, command: LinkCommand, timeout: Duration) -> Result<CommandReply, LinkError> {
        let (opcode, params) = encode_command(&command);

        let mut packet = BytesMut::with_capacity(4 + params.len());
        packet.put_u8(HCI_COMMAND_PKT);
        packet.put_u16_le(opcode);
        packet.put_u8(params.len() as u8);
        packet.put_slice(&params);

        let written =
            check(unsafe { libc::write(self.fd, packet.as_ptr() as *const libc::c_void, packet.len()) }
                as libc::c_int)
            .map_err(LinkError::from)?;

        if written as usize != packet.len() {
            return Err(LinkError::Io { code: libc::EIO });
        }

        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .ok_or(LinkError::TimedOut)?;

            let mut pollfd = libc::pollfd {
                fd: self.fd,
                events: libc::POLLIN,
                revents: 0,
            };

            let ready = check(unsafe {
                libc::poll(&mut pollfd, 1, remaining.as_millis() as libc::c_int)
            })
            .map_err(LinkError::from)?;

            if ready == 0 {
                return Err(LinkError::TimedOut);
            }

            let mut buf = [0u8; 260];
            let len = check(unsafe {
                libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len())
            } as libc::c_int)
            .map_err(LinkError::from)? as usize;

            let mut packet = &buf[..len];
            if packet.len() < 3 || packet[0] != HCI_EVENT_PKT {
                continue;
            }

            let event = packet[1];
            let plen = packet[2] as usize;
            packet = &packet[3..];

            if packet.len() < plen {
                debug!(event, "truncated event packet");
                continue;
            }

            let params = &packet[..plen];

            match EventCode::from_u8(event) {
                Some(EventCode::CommandComplete) if params.len() >= 3 => {
                    let evt_opcode = u16::from_le_bytes([params[1], params[2]]);
                    if evt_opcode == opcode {
                        return Ok(complete_reply(&command, &params[3..]));
                    }
                }
                Some(EventCode::CommandStatus) if params.len() >= 4 => {
                    let evt_opcode = u16::from_le_bytes([params[2], params[3]]);
                    if evt_opcode == opcode {
                        return Ok(CommandReply::Status(params[0]));
                    }
                }
                _ => {
                    // an unrelated event slipped in; hand it to the queue
                    for event in decode_event(event, params) {
                        let _ = self.events.send(event);
                    }
                }
            }
        }
    }
}

fn opcode(ogf: u16, ocf: u16) -> u16 {
    (ogf << 10) | ocf
}

fn encode_command(command: &LinkCommand) -> (u16, BytesMut) {
    let mut params = BytesMut::new();

    let opcode = match command {
        LinkCommand::ReadScanEnable => opcode(OGF_HOST_CTL, 0x0019),
        LinkCommand::WriteScanEnable(mode) => {
            params.put_u8(mode.bits());
            opcode(OGF_HOST_CTL, 0x001A)
        }
        LinkCommand::ReadClassOfDevice => opcode(OGF_HOST_CTL, 0x0023),
        LinkCommand::WriteClassOfDevice(class) => {
            params.put_u8(*class as u8);
            params.put_u8((*class >> 8) as u8);
            params.put_u8((*class >> 16) as u8);
            opcode(OGF_HOST_CTL, 0x0024)
        }
        LinkCommand::ReadLocalName => opcode(OGF_HOST_CTL, 0x0014),
        LinkCommand::WriteLocalName(name) => {
            let mut raw = [0u8; 248];
            let bytes = name.as_bytes();
            raw[..bytes.len().min(248)].copy_from_slice(&bytes[..bytes.len().min(248)]);
            params.put_slice(&raw);
            opcode(OGF_HOST_CTL, 0x0013)
        }
        LinkCommand::Inquiry {
            lap,
            length,
            num_responses,
        } => {
            params.put_slice(lap);
            params.put_u8(*length);
            params.put_u8(*num_responses);
            opcode(OGF_LINK_CTL, 0x0001)
        }
        LinkCommand::InquiryCancel => opcode(OGF_LINK_CTL, 0x0002),
        LinkCommand::PeriodicInquiry {
            lap,
            max_period,
            min_period,
            length,
            num_responses,
        } => {
            params.put_u16_le(*max_period);
            params.put_u16_le(*min_period);
            params.put_slice(lap);
            params.put_u8(*length);
            params.put_u8(*num_responses);
            opcode(OGF_LINK_CTL, 0x0003)
        }
        LinkCommand::ExitPeriodicInquiry => opcode(OGF_LINK_CTL, 0x0004),
        LinkCommand::RemoteNameRequest(peer) => {
            params.put_slice(peer.as_ref());
            params.put_u8(0x02); // page scan repetition mode R2
            params.put_u8(0x00);
            params.put_u16_le(0x0000);
            opcode(OGF_LINK_CTL, 0x0019)
        }
        LinkCommand::RemoteNameRequestCancel(peer) => {
            params.put_slice(peer.as_ref());
            opcode(OGF_LINK_CTL, 0x001A)
        }
        LinkCommand::AuthRequested { handle } => {
            params.put_u16_le(*handle);
            opcode(OGF_LINK_CTL, 0x0011)
        }
        LinkCommand::DeleteStoredLinkKey { peer, delete_all } => {
            params.put_slice(peer.as_ref());
            params.put_u8(*delete_all as u8);
            opcode(OGF_HOST_CTL, 0x0012)
        }
        LinkCommand::Disconnect { handle, reason } => {
            params.put_u16_le(*handle);
            params.put_u8(*reason);
            opcode(OGF_LINK_CTL, 0x0006)
        }
        LinkCommand::PinCodeNegativeReply(peer) => {
            params.put_slice(peer.as_ref());
            opcode(OGF_LINK_CTL, 0x000E)
        }
    };

    (opcode, params)
}

/// Builds the typed reply for a command-complete event's return parameters.
fn complete_reply(command: &LinkCommand, params: &[u8]) -> CommandReply {
    let status = params.first().copied().unwrap_or(0);

    if status != 0 {
        return CommandReply::Status(status);
    }

    match command {
        LinkCommand::ReadScanEnable if params.len() >= 2 => {
            CommandReply::ScanEnable(BitFlags::from_bits_truncate(params[1]))
        }
        LinkCommand::ReadClassOfDevice if params.len() >= 4 => {
            CommandReply::ClassOfDevice([params[1], params[2], params[3]])
        }
        LinkCommand::ReadLocalName if params.len() >= 2 => {
            CommandReply::LocalName(c_string(&params[1..]))
        }
        _ => CommandReply::Status(status),
    }
}

fn c_string(raw: &[u8]) -> String {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// Decodes one HCI event into adapter events. Inquiry results fan out to one
/// event per response.
fn decode_event(event: u8, params: &[u8]) -> Vec<AdapterEvent> {
    let mut buf = params;
    let mut events = Vec::new();

    let code = match EventCode::from_u8(event) {
        Some(code) => code,
        None => return events,
    };

    match code {
        EventCode::InquiryComplete => {
            events.push(AdapterEvent::InquiryComplete);
        }
        EventCode::InquiryResult => {
            if buf.is_empty() {
                return events;
            }

            let count = buf.get_u8() as usize;
            for _ in 0..count {
                if buf.remaining() < 14 {
                    break;
                }

                let peer = Address::from_buf(&mut buf);
                buf.advance(3); // page scan modes
                let class = buf.get_u8() as u32
                    | ((buf.get_u8() as u32) << 8)
                    | ((buf.get_u8() as u32) << 16);
                buf.advance(2); // clock offset

                events.push(AdapterEvent::InquiryResult { peer, class });
            }
        }
        EventCode::InquiryResultWithRssi => {
            if buf.is_empty() {
                return events;
            }

            let count = buf.get_u8() as usize;
            for _ in 0..count {
                if buf.remaining() < 14 {
                    break;
                }

                let peer = Address::from_buf(&mut buf);
                buf.advance(2); // page scan modes
                let class = buf.get_u8() as u32
                    | ((buf.get_u8() as u32) << 8)
                    | ((buf.get_u8() as u32) << 16);
                buf.advance(3); // clock offset + rssi

                events.push(AdapterEvent::InquiryResult { peer, class });
            }
        }
        EventCode::ConnComplete => {
            if buf.remaining() < 11 {
                return events;
            }

            let status = buf.get_u8();
            let handle = buf.get_u16_le();
            let peer = Address::from_buf(&mut buf);

            if status == 0 {
                events.push(AdapterEvent::ConnectionComplete { peer, handle });
            }
        }
        EventCode::DisconnComplete => {
            if buf.remaining() < 4 {
                return events;
            }

            let status = buf.get_u8();
            let handle = buf.get_u16_le();

            if status == 0 {
                events.push(AdapterEvent::DisconnectComplete { handle });
            }
        }
        EventCode::AuthComplete => {
            if buf.remaining() < 3 {
                return events;
            }

            let status = buf.get_u8();
            let handle = buf.get_u16_le();
            events.push(AdapterEvent::AuthComplete { handle, status });
        }
        EventCode::RemoteNameReqComplete => {
            if buf.remaining() < 7 {
                return events;
            }

            let status = buf.get_u8();
            let peer = Address::from_buf(&mut buf);

            let name = if status == 0 && buf.has_remaining() {
                let raw = buf.copy_to_bytes(buf.remaining());
                Some(c_string(&raw))
            } else {
                None
            };

            events.push(AdapterEvent::RemoteNameComplete { peer, status, name });
        }
        EventCode::PinCodeRequest => {
            if buf.remaining() < 6 {
                return events;
            }

            let peer = Address::from_buf(&mut buf);
            events.push(AdapterEvent::PinCodeRequest { peer });
        }
        EventCode::LinkKeyNotify => {
            if buf.remaining() < 23 {
                return events;
            }

            let peer = Address::from_buf(&mut buf);
            let mut key = [0u8; 16];
            buf.copy_to_slice(&mut key);
            let key_type = buf.get_u8();

            events.push(AdapterEvent::LinkKeyNotify {
                peer,
                key,
                key_type,
                // the PIN length travels with the agent reply, not here
                pin_length: 0,
            });
        }
        EventCode::CommandComplete | EventCode::CommandStatus => {}
    }

    events
}

struct EventSocket {
    fd: RawFd,
}

impl EventSocket {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let len = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if len < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(len as usize)
        }
    }
}

impl AsRawFd for EventSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for EventSocket {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

enum ReadOutcome {
    Packets(Vec<AdapterEvent>),
    Closed,
    Retry,
}

/// Unsolicited controller events (inquiry results, connection changes,
/// authentication completions) as a stream, decoded from a dedicated raw
/// socket.
pub fn event_stream(dev_id: u16) -> Result<impl Stream<Item = AdapterEvent>, LinkError> {
    let fd = open_raw_hci(dev_id, true)?;
    let socket = AsyncFd::new(EventSocket { fd }).map_err(LinkError::from)?;

    let packets = futures::stream::unfold(socket, |socket| async move {
        loop {
            let outcome = {
                let mut guard = match socket.readable().await {
                    Ok(guard) => guard,
                    Err(_) => return None,
                };

                let mut buf = [0u8; 260];
                match guard.try_io(|inner| inner.get_ref().read(&mut buf)) {
                    Ok(Ok(0)) => ReadOutcome::Closed,
                    Ok(Ok(len)) => {
                        let packet = &buf[..len];
                        if packet.len() >= 3 && packet[0] == HCI_EVENT_PKT {
                            let plen = (packet[2] as usize).min(packet.len() - 3);
                            ReadOutcome::Packets(decode_event(packet[1], &packet[3..3 + plen]))
                        } else {
                            ReadOutcome::Retry
                        }
                    }
                    Ok(Err(err)) => {
                        warn!(%err, "event socket read failed");
                        ReadOutcome::Closed
                    }
                    Err(_would_block) => ReadOutcome::Retry,
                }
            };

            match outcome {
                ReadOutcome::Packets(events) => return Some((events, socket)),
                ReadOutcome::Closed => return None,
                ReadOutcome::Retry => continue,
            }
        }
    });

    Ok(packets.map(futures::stream::iter).flatten())
}

/// Forwards the controller's event stream into the adapter's queue until
/// either side goes away.
pub async fn pump_events(
    dev_id: u16,
    events: UnboundedSender<AdapterEvent>,
) -> Result<(), LinkError> {
    let mut stream = Box::pin(event_stream(dev_id)?);

    while let Some(event) = stream.next().await {
        if events.send(event).is_err() {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::ScanFlag;

    #[test]
    fn command_encoding() {
        let (op, params) = encode_command(&LinkCommand::Inquiry {
            lap: super::super::GIAC,
            length: 0x08,
            num_responses: 0,
        });
        assert_eq!(op, (0x01 << 10) | 0x0001);
        assert_eq!(&params[..], &[0x33, 0x8b, 0x9e, 0x08, 0x00]);

        let (op, params) =
            encode_command(&LinkCommand::WriteScanEnable(ScanFlag::PageScan.into()));
        assert_eq!(op, (0x03 << 10) | 0x001A);
        assert_eq!(&params[..], &[0x01]);

        let (op, params) = encode_command(&LinkCommand::WriteClassOfDevice(0x080104));
        assert_eq!(op, (0x03 << 10) | 0x0024);
        assert_eq!(&params[..], &[0x04, 0x01, 0x08]);

        let (op, params) = encode_command(&LinkCommand::AuthRequested { handle: 0x002A });
        assert_eq!(op, (0x01 << 10) | 0x0011);
        assert_eq!(&params[..], &[0x2A, 0x00]);
    }

    #[test]
    fn decode_inquiry_result() {
        // one response: bdaddr, 3 page scan bytes, class 0x080104, clock
        let mut params = vec![0x01];
        params.extend_from_slice(&[0x13, 0x71, 0xDA, 0x7D, 0x1A, 0x00]);
        params.extend_from_slice(&[0x01, 0x00, 0x00]);
        params.extend_from_slice(&[0x04, 0x01, 0x08]);
        params.extend_from_slice(&[0x00, 0x00]);

        let events = decode_event(0x02, &params);
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            AdapterEvent::InquiryResult {
                peer: "00:1A:7D:DA:71:13".parse().unwrap(),
                class: 0x080104,
            }
        );
    }

    #[test]
    fn decode_remote_name_complete() {
        let mut params = vec![0x00];
        params.extend_from_slice(&[0x13, 0x71, 0xDA, 0x7D, 0x1A, 0x00]);
        let mut name = [0u8; 248];
        name[..7].copy_from_slice(b"headset");
        params.extend_from_slice(&name);

        let events = decode_event(0x07, &params);
        assert_eq!(
            events[0],
            AdapterEvent::RemoteNameComplete {
                peer: "00:1A:7D:DA:71:13".parse().unwrap(),
                status: 0,
                name: Some("headset".to_owned()),
            }
        );
    }

    #[test]
    fn decode_auth_and_disconnect() {
        let events = decode_event(0x06, &[0x05, 0x2A, 0x00]);
        assert_eq!(
            events[0],
            AdapterEvent::AuthComplete {
                handle: 0x002A,
                status: 0x05,
            }
        );

        let events = decode_event(0x05, &[0x00, 0x2A, 0x00, 0x13]);
        assert_eq!(events[0], AdapterEvent::DisconnectComplete { handle: 0x002A });
    }

    #[test]
    fn decode_unknown_event_is_empty() {
        assert!(decode_event(0x7F, &[1, 2, 3]).is_empty());
    }
}

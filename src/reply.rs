//! Reply and notification plumbing between the adapter core and the bus
//! glue. A [`Responder`] is the continuation of one inbound request; sending
//! consumes it, so a request can never be answered twice.

use tokio::sync::oneshot;

use crate::{Address, Error};

/// Identity of the bus client that issued a request. Long-running operations
/// are owned by their requestor and may only be cancelled by it, compared by
/// exact match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn new(name: impl Into<String>) -> ClientId {
        ClientId(name.into())
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Values carried in method replies, mirroring the small set of wire types
/// the bus surface uses.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Byte(u8),
    UInt32(u32),
    Str(String),
    StrList(Vec<String>),
}

impl From<()> for Value {
    fn from(_: ()) -> Value {
        Value::None
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Value {
        Value::Byte(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Value {
        Value::UInt32(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Str(v.to_owned())
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Value {
        Value::StrList(v)
    }
}

/// One-shot reply continuation for an inbound request. Operations that
/// complete asynchronously stash this inside their session state and answer
/// it from the event path.
#[derive(Debug)]
pub struct Responder {
    tx: oneshot::Sender<Result<Value, Error>>,
}

impl Responder {
    pub fn new() -> (Responder, oneshot::Receiver<Result<Value, Error>>) {
        let (tx, rx) = oneshot::channel();
        (Responder { tx }, rx)
    }

    /// Answers the request. The receiving side may already be gone (client
    /// disconnected mid-call); that is not an error here.
    pub fn send(self, reply: Result<Value, Error>) {
        let _ = self.tx.send(reply);
    }

    pub fn ok(self, value: impl Into<Value>) {
        self.send(Ok(value.into()));
    }

    pub fn err(self, error: Error) {
        self.send(Err(error));
    }
}

/// Notifications broadcast to all bus clients, as opposed to replies
/// addressed to one requestor.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    MinorClassChanged { minor: String },
    RemoteAliasChanged { peer: Address, alias: String },
    RemoteAliasCleared { peer: Address },
    BondingRemoved { peer: Address },
    DiscoveryCompleted,
}

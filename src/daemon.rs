//! The single-threaded loop that drives an [`Adapter`]: inbound method
//! calls on one channel, controller completions on the other. Each item is
//! handled to completion before the next, so state mutation never
//! interleaves; events win over new calls so completions are observed in
//! arrival order.

use tokio::sync::mpsc;

use crate::adapter::{dispatch, Adapter, MethodCall};
use crate::link::AdapterEvent;

/// Runs the adapter until both channels close.
pub async fn run(
    mut adapter: Adapter,
    mut calls: mpsc::Receiver<MethodCall>,
    mut events: mpsc::UnboundedReceiver<AdapterEvent>,
) {
    loop {
        tokio::select! {
            biased;

            event = events.recv() => match event {
                Some(event) => adapter.handle_event(event),
                None => break,
            },

            call = calls.recv() => match call {
                Some(call) => dispatch(&mut adapter, call),
                None => break,
            },
        }
    }
}

//! Discovery state machine scenarios: inquiry, periodic inquiry, name
//! resolution sequencing, cancellation ownership and requestor exit.

mod common;

use common::*;

use btadapterd::link::AdapterEvent;
use btadapterd::reply::{Signal, Value};
use btadapterd::store::{Category, DeviceStore};
use btadapterd::Error;

fn found(peer: &str) -> AdapterEvent {
    AdapterEvent::InquiryResult {
        peer: addr(peer),
        class: 0x080104,
    }
}

fn name_resolved(peer: &str, name: &str) -> AdapterEvent {
    AdapterEvent::RemoteNameComplete {
        peer: addr(peer),
        status: 0,
        name: Some(name.to_owned()),
    }
}

#[tokio::test]
async fn discovery_requires_powered_adapter() {
    let mut harness = Harness::new();

    assert_eq!(
        harness.adapter.discover_devices(client(":1.1"), true),
        Err(Error::NotReady)
    );
}

#[tokio::test]
async fn discovery_resolves_names_one_at_a_time() {
    let mut harness = Harness::up();

    harness
        .adapter
        .discover_devices(client(":1.1"), true)
        .unwrap();
    assert!(harness.adapter.is_discovering());
    assert_eq!(harness.submitted("inquiry"), 1);

    harness.adapter.handle_event(found("00:00:00:00:00:01"));
    harness.adapter.handle_event(found("00:00:00:00:00:02"));

    // names are not requested until the inquiry finishes
    assert_eq!(harness.submitted("remote_name_request"), 0);

    harness.adapter.handle_event(AdapterEvent::InquiryComplete);
    assert_eq!(harness.submitted("remote_name_request"), 1);

    harness
        .adapter
        .handle_event(name_resolved("00:00:00:00:00:01", "first"));
    assert_eq!(harness.submitted("remote_name_request"), 2);

    // discovery is still running until the last name resolves
    assert!(harness.adapter.is_discovering());
    assert_eq!(harness.next_signal(), None);

    harness
        .adapter
        .handle_event(name_resolved("00:00:00:00:00:02", "second"));

    assert!(!harness.adapter.is_discovering());
    assert_eq!(harness.next_signal(), Some(Signal::DiscoveryCompleted));

    // resolved names went to the cache
    assert_eq!(
        harness
            .store
            .get(Category::Names, "00:00:00:00:00:01")
            .as_deref(),
        Some("first")
    );
}

#[tokio::test]
async fn discovery_without_name_resolving_completes_on_inquiry_end() {
    let mut harness = Harness::up();

    harness
        .adapter
        .discover_devices(client(":1.1"), false)
        .unwrap();

    harness.adapter.handle_event(found("00:00:00:00:00:01"));
    harness.adapter.handle_event(AdapterEvent::InquiryComplete);

    assert_eq!(harness.submitted("remote_name_request"), 0);
    assert!(!harness.adapter.is_discovering());
    assert_eq!(harness.next_signal(), Some(Signal::DiscoveryCompleted));
}

#[tokio::test]
async fn inquiry_results_record_class_and_last_seen() {
    let mut harness = Harness::up();

    harness
        .adapter
        .discover_devices(client(":1.1"), false)
        .unwrap();
    harness.adapter.handle_event(found("00:00:00:00:00:01"));

    assert_eq!(
        harness
            .store
            .get(Category::Classes, "00:00:00:00:00:01")
            .as_deref(),
        Some("0x080104")
    );
    assert!(harness.adapter.last_seen(addr("00:00:00:00:00:01")).is_ok());
}

#[tokio::test]
async fn second_discovery_is_refused_until_the_first_ends() {
    let mut harness = Harness::up();

    harness
        .adapter
        .discover_devices(client(":1.1"), true)
        .unwrap();

    assert_eq!(
        harness.adapter.discover_devices(client(":1.2"), true),
        Err(Error::DiscoveryInProgress)
    );
    assert_eq!(
        harness.adapter.start_periodic_discovery(client(":1.2")),
        Err(Error::DiscoveryInProgress)
    );
}

#[tokio::test]
async fn cancel_discovery_is_owner_only_and_deferred() {
    let mut harness = Harness::up();

    harness
        .adapter
        .discover_devices(client(":1.1"), true)
        .unwrap();

    let (responder, mut rx) = call();
    harness.adapter.cancel_discovery(&client(":1.9"), responder);
    assert_eq!(reply_of(&mut rx), Err(Error::NotAuthorized));
    assert!(harness.adapter.is_discovering());

    let (responder, mut rx) = call();
    harness.adapter.cancel_discovery(&client(":1.1"), responder);

    // hardware cancel issued, reply deferred until the controller confirms
    assert_eq!(harness.submitted("inquiry_cancel"), 1);
    assert_pending(&mut rx);

    // a second cancel while one is pending is refused
    let (responder, mut rx2) = call();
    harness.adapter.cancel_discovery(&client(":1.1"), responder);
    assert_eq!(reply_of(&mut rx2), Err(Error::NotAuthorized));

    harness.adapter.handle_event(AdapterEvent::InquiryComplete);

    assert_eq!(reply_of(&mut rx), Ok(Value::None));
    assert!(!harness.adapter.is_discovering());
    assert_eq!(harness.next_signal(), Some(Signal::DiscoveryCompleted));

    // a fresh discovery may start now
    harness
        .adapter
        .discover_devices(client(":1.2"), true)
        .unwrap();
}

#[tokio::test]
async fn cancel_during_name_resolution_uses_name_cancel() {
    let mut harness = Harness::up();

    harness
        .adapter
        .discover_devices(client(":1.1"), true)
        .unwrap();
    harness.adapter.handle_event(found("00:00:00:00:00:01"));
    harness.adapter.handle_event(AdapterEvent::InquiryComplete);
    assert_eq!(harness.submitted("remote_name_request"), 1);

    let (responder, mut rx) = call();
    harness.adapter.cancel_discovery(&client(":1.1"), responder);

    assert_eq!(harness.submitted("remote_name_cancel"), 1);
    assert_pending(&mut rx);

    // the controller confirms with a failed name completion
    harness.adapter.handle_event(AdapterEvent::RemoteNameComplete {
        peer: addr("00:00:00:00:00:01"),
        status: 0x02,
        name: None,
    });

    assert_eq!(reply_of(&mut rx), Ok(Value::None));
    assert!(!harness.adapter.is_discovering());
    assert_eq!(harness.next_signal(), Some(Signal::DiscoveryCompleted));
}

#[tokio::test]
async fn get_remote_name_cache_hit_answers_immediately() {
    let mut harness = Harness::up();
    let peer = addr("00:1A:7D:DA:71:13");

    harness
        .store
        .put(Category::Names, &peer.to_string(), "headset")
        .unwrap();

    let (responder, mut rx) = call();
    harness.adapter.get_remote_name(peer, responder);

    assert_eq!(reply_of(&mut rx), Ok(Value::Str("headset".to_owned())));
    assert_eq!(harness.submitted("remote_name_request"), 0);
}

#[tokio::test]
async fn get_remote_name_cache_miss_defers_exactly_once() {
    let mut harness = Harness::up();
    let peer = addr("00:1A:7D:DA:71:13");

    let (responder, mut rx) = call();
    harness.adapter.get_remote_name(peer, responder);

    assert_pending(&mut rx);
    assert_eq!(harness.submitted("remote_name_request"), 1);

    harness
        .adapter
        .handle_event(name_resolved("00:1A:7D:DA:71:13", "headset"));

    assert_eq!(reply_of(&mut rx), Ok(Value::Str("headset".to_owned())));
    assert_eq!(
        harness.store.get(Category::Names, &peer.to_string()).as_deref(),
        Some("headset")
    );
}

#[tokio::test]
async fn get_remote_name_requires_up_on_cache_miss() {
    let mut harness = Harness::new();

    let (responder, mut rx) = call();
    harness
        .adapter
        .get_remote_name(addr("00:1A:7D:DA:71:13"), responder);

    assert_eq!(reply_of(&mut rx), Err(Error::NotReady));
}

#[tokio::test]
async fn queued_name_lookup_rides_the_running_discovery() {
    let mut harness = Harness::up();
    let peer = addr("00:00:00:00:00:07");

    harness
        .adapter
        .discover_devices(client(":1.1"), false)
        .unwrap();

    let (responder, mut rx) = call();
    harness.adapter.get_remote_name(peer, responder);

    // queued, not issued, while the inquiry runs
    assert_eq!(harness.submitted("remote_name_request"), 0);
    assert_pending(&mut rx);

    harness.adapter.handle_event(AdapterEvent::InquiryComplete);
    assert_eq!(harness.submitted("remote_name_request"), 1);

    harness
        .adapter
        .handle_event(name_resolved("00:00:00:00:00:07", "printer"));

    assert_eq!(reply_of(&mut rx), Ok(Value::Str("printer".to_owned())));
}

#[tokio::test]
async fn failed_name_resolution_answers_with_the_status() {
    let mut harness = Harness::up();
    let peer = addr("00:1A:7D:DA:71:13");

    let (responder, mut rx) = call();
    harness.adapter.get_remote_name(peer, responder);

    harness.adapter.handle_event(AdapterEvent::RemoteNameComplete {
        peer,
        status: 0x04,
        name: None,
    });

    assert_eq!(reply_of(&mut rx), Err(Error::Failed { code: 0x04 }));
}

#[tokio::test]
async fn periodic_discovery_tracks_inquiry_idle() {
    let mut harness = Harness::up();

    harness
        .adapter
        .start_periodic_discovery(client(":1.1"))
        .unwrap();
    assert!(harness.adapter.is_periodic_discovery());
    assert_eq!(harness.submitted("periodic_inquiry"), 1);

    // a second start of either flavor is refused
    assert_eq!(
        harness.adapter.start_periodic_discovery(client(":1.2")),
        Err(Error::DiscoveryInProgress)
    );
    assert_eq!(
        harness.adapter.discover_devices(client(":1.2"), true),
        Err(Error::DiscoveryInProgress)
    );

    // bonding is blocked while a round is on the air
    let (responder, mut rx) = call();
    harness
        .adapter
        .create_bonding(client(":1.3"), addr("00:00:00:00:00:09"), responder);
    assert_eq!(reply_of(&mut rx), Err(Error::DiscoveryInProgress));

    // the round ends; bonding becomes possible between rounds
    harness.adapter.handle_event(AdapterEvent::InquiryComplete);

    let (responder, mut rx) = call();
    harness
        .adapter
        .create_bonding(client(":1.3"), addr("00:00:00:00:00:09"), responder);
    assert_pending(&mut rx);
}

#[tokio::test]
async fn periodic_name_resolving_follows_the_setting() {
    let mut harness = Harness::up();

    harness
        .adapter
        .set_periodic_discovery_name_resolving(true);
    assert!(harness.adapter.get_periodic_discovery_name_resolving());

    harness
        .adapter
        .start_periodic_discovery(client(":1.1"))
        .unwrap();

    harness.adapter.handle_event(found("00:00:00:00:00:01"));
    harness.adapter.handle_event(AdapterEvent::InquiryComplete);

    assert_eq!(harness.submitted("remote_name_request"), 1);

    harness
        .adapter
        .handle_event(name_resolved("00:00:00:00:00:01", "kbd"));

    // periodic mode keeps running after the round's names resolve
    assert!(harness.adapter.is_periodic_discovery());
    assert_eq!(harness.next_signal(), None);
}

#[tokio::test]
async fn stop_periodic_is_owner_only() {
    let mut harness = Harness::up();

    assert_eq!(
        harness.adapter.stop_periodic_discovery(&client(":1.1")),
        Err(Error::NotAuthorized)
    );

    harness
        .adapter
        .start_periodic_discovery(client(":1.1"))
        .unwrap();

    assert_eq!(
        harness.adapter.stop_periodic_discovery(&client(":1.2")),
        Err(Error::NotAuthorized)
    );

    harness
        .adapter
        .stop_periodic_discovery(&client(":1.1"))
        .unwrap();

    assert_eq!(harness.submitted("exit_periodic_inquiry"), 1);
    assert!(!harness.adapter.is_periodic_discovery());
    assert_eq!(harness.next_signal(), Some(Signal::DiscoveryCompleted));

    // standard discovery may start once periodic mode is gone
    harness
        .adapter
        .discover_devices(client(":1.2"), true)
        .unwrap();
}

#[tokio::test]
async fn requestor_exit_cancels_discovery() {
    let mut harness = Harness::up();

    harness
        .adapter
        .discover_devices(client(":1.1"), true)
        .unwrap();

    harness.adapter.handle_event(AdapterEvent::ClientGone {
        client: client(":1.1"),
    });

    assert_eq!(harness.submitted("inquiry_cancel"), 1);

    harness.adapter.handle_event(AdapterEvent::InquiryComplete);
    assert!(!harness.adapter.is_discovering());
    assert_eq!(harness.next_signal(), Some(Signal::DiscoveryCompleted));
}

#[tokio::test]
async fn requestor_exit_stops_periodic_discovery() {
    let mut harness = Harness::up();

    harness
        .adapter
        .start_periodic_discovery(client(":1.1"))
        .unwrap();

    harness.adapter.handle_event(AdapterEvent::ClientGone {
        client: client(":1.1"),
    });

    assert_eq!(harness.submitted("exit_periodic_inquiry"), 1);
    assert!(!harness.adapter.is_periodic_discovery());
}

#[tokio::test]
async fn unrelated_client_exit_changes_nothing() {
    let mut harness = Harness::up();

    harness
        .adapter
        .discover_devices(client(":1.1"), true)
        .unwrap();

    harness.adapter.handle_event(AdapterEvent::ClientGone {
        client: client(":1.99"),
    });

    assert!(harness.adapter.is_discovering());
    assert_eq!(harness.submitted("inquiry_cancel"), 0);
}

#[tokio::test]
async fn starting_discovery_cancels_lone_name_request() {
    let mut harness = Harness::up();
    let peer = addr("00:1A:7D:DA:71:13");

    let (responder, mut rx) = call();
    harness.adapter.get_remote_name(peer, responder);
    assert_eq!(harness.submitted("remote_name_request"), 1);

    harness
        .adapter
        .discover_devices(client(":1.1"), true)
        .unwrap();

    // the lone lookup was cancelled and its waiter answered
    assert_eq!(harness.submitted("remote_name_cancel"), 1);
    assert_eq!(reply_of(&mut rx), Err(Error::NotAvailable));
}

#[tokio::test]
async fn controller_down_tears_down_discovery() {
    let mut harness = Harness::up();

    harness
        .adapter
        .discover_devices(client(":1.1"), true)
        .unwrap();
    harness.adapter.handle_event(found("00:00:00:00:00:01"));

    harness.adapter.controller_down();

    assert!(!harness.adapter.is_discovering());
    assert_eq!(harness.adapter.get_mode(), "off");
    assert_eq!(harness.next_signal(), Some(Signal::DiscoveryCompleted));

    assert_eq!(
        harness.adapter.discover_devices(client(":1.1"), true),
        Err(Error::NotReady)
    );
}

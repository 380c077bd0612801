//! Sender construction, sending, release and accessors.

mod common;

use std::time::Duration;

use common::{capture_logs, fake_backend, fake_backend_with};
use gpu_interop::BackendConfig;
use liru::{Error, Sender};

#[test]
fn valid_construction_keeps_geometry() {
    let (fake, backend) = fake_backend();
    let mut sender = Sender::with_backend(backend, "Alpha", 1920, 1080).unwrap();
    assert_eq!(sender.name(), "Alpha");
    assert_eq!((sender.width(), sender.height()), (1920, 1080));
    assert!(!sender.is_released());
    assert_eq!(fake.open_publishers(), 1);

    sender.release();
    assert!(sender.is_released());
    assert_eq!(sender.name(), "Alpha");
    assert_eq!((sender.width(), sender.height()), (1920, 1080));
    assert_eq!(fake.open_publishers(), 0);
}

#[test]
fn empty_name_is_rejected_before_registration() {
    let (fake, backend) = fake_backend();
    let before = backend.list_publishers().unwrap();
    let calls = fake.call_count();

    let err = Sender::with_backend(backend.clone(), "", 100, 100).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { parameter: "name", .. }));
    assert!(err.to_string().contains("Sender name cannot be empty"));

    assert_eq!(fake.call_count(), calls);
    assert_eq!(backend.list_publishers().unwrap(), before);
}

#[test]
fn non_positive_dimensions_are_rejected() {
    let (fake, backend) = fake_backend();
    let err = Sender::with_backend(backend.clone(), "X", -1, -1).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));
    assert!(err.to_string().contains("Invalid dimensions: -1x-1"));

    let err = Sender::with_backend(backend, "X", 640, 0).unwrap_err();
    assert!(err.to_string().contains("Invalid dimensions: 640x0"));
    assert_eq!(fake.call_count(), 0);
}

#[test]
fn release_is_idempotent() {
    let (fake, backend) = fake_backend();
    let mut sender = Sender::with_backend(backend, "Twice", 64, 64).unwrap();
    sender.release();
    let calls = fake.call_count();
    sender.release();
    sender.release();
    assert!(sender.is_released());
    assert_eq!(fake.call_count(), calls);
}

#[test]
fn send_after_release_fails() {
    let (_fake, backend) = fake_backend();
    let mut sender = Sender::with_backend(backend, "Gone", 64, 64).unwrap();
    sender.release();
    let err = sender.send(5).unwrap_err();
    assert!(matches!(err, Error::AlreadyReleased { ref name } if name == "Gone"));
    assert_eq!(sender.width(), 64);
}

#[test]
fn invalid_texture_checked_before_release_state() {
    let (fake, backend) = fake_backend();
    let mut sender = Sender::with_backend(backend, "Tex", 64, 64).unwrap();
    let calls = fake.call_count();
    let err = sender.send(0).unwrap_err();
    assert!(err.to_string().contains("Invalid texture ID"));
    assert_eq!(fake.call_count(), calls);

    sender.release();
    assert!(matches!(sender.send(0), Err(Error::InvalidArgument { .. })));
}

#[test]
fn send_copies_and_updates_telemetry() {
    let (fake, backend) = fake_backend();
    fake.set_copy_latency(Duration::from_millis(2));
    let mut sender = Sender::with_backend(backend, "Stats", 320, 240).unwrap();
    assert_eq!(sender.frame_count(), 0);
    assert_eq!(sender.fps(), 0.0);

    sender.send(11).unwrap();
    sender.send(12).unwrap();
    assert_eq!(fake.last_source("Stats"), Some(12));
    assert_eq!(sender.frame_count(), 2);
    assert!((sender.last_send_time_ms() - 2.0).abs() < 1e-9);
    assert!(sender.fps() >= 0.0);
    sender.release();
}

#[test]
fn backend_failures_become_registration_errors() {
    let (fake, backend) = fake_backend();
    fake.set_fail_registration(true);
    let err = Sender::with_backend(backend.clone(), "Nope", 8, 8).unwrap_err();
    match &err {
        Error::Registration {
            sender, operation, ..
        } => {
            assert_eq!(sender, "Nope");
            assert_eq!(*operation, "register");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.is_recoverable());
    fake.set_fail_registration(false);

    let mut sender = Sender::with_backend(backend, "Flaky", 8, 8).unwrap();
    fake.set_fail_copies(true);
    let err = sender.send(3).unwrap_err();
    assert!(matches!(err, Error::Registration { operation: "send", .. }));
    assert!(err.to_string().contains("Flaky"));
    assert_eq!(sender.frame_count(), 0);
    sender.release();
}

#[test]
fn duplicate_live_name_is_rejected() {
    let (_fake, backend) = fake_backend();
    let mut first = Sender::with_backend(backend.clone(), "Same", 8, 8).unwrap();
    let err = Sender::with_backend(backend.clone(), "Same", 8, 8).unwrap_err();
    assert!(matches!(err, Error::Registration { .. }));

    first.release();
    let mut second = Sender::with_backend(backend, "Same", 8, 8).unwrap();
    second.release();
}

#[test]
fn capacity_limit_surfaces_as_registration_error() {
    let (_fake, backend) = fake_backend_with(BackendConfig::default().with_max_senders(1));
    let mut only = Sender::with_backend(backend.clone(), "Only", 8, 8).unwrap();
    let err = Sender::with_backend(backend, "Extra", 8, 8).unwrap_err();
    assert!(err.to_string().contains("full"));
    only.release();
}

#[test]
fn construction_is_deterministic() {
    let (_fake, backend) = fake_backend();
    for _ in 0..3 {
        let mut sender = Sender::with_backend(backend.clone(), "Det", 640, 480).unwrap();
        assert_eq!(sender.name(), "Det");
        assert_eq!((sender.width(), sender.height()), (640, 480));
        assert_eq!(sender.frame_count(), 0);
        sender.send(1).unwrap();
        assert!(backend.list_publishers().unwrap().contains("Det"));
        sender.release();
        assert!(!backend.list_publishers().unwrap().contains("Det"));
    }
}

#[test]
fn display_format() {
    let (_fake, backend) = fake_backend();
    let mut sender = Sender::with_backend(backend, "Show", 1280, 720).unwrap();
    assert_eq!(sender.to_string(), "Sender(name='Show', size=1280x720)");
    sender.release();
    assert_eq!(
        sender.to_string(),
        "Sender(name='Show', size=1280x720, released)"
    );
}

#[test]
fn release_failure_is_logged_not_raised() {
    let (_fake, backend) = fake_backend();
    let mut sender = Sender::with_backend(backend.clone(), "Lost", 8, 8).unwrap();
    // Pull the registration out from under the sender.
    for id in 0..16 {
        let _ = backend.close_publisher(gpu_interop::PublisherId::from_raw(id));
    }
    let ((), logs) = capture_logs(|| sender.release());
    assert!(sender.is_released());
    assert!(logs.contains("failed to unregister sender"));
}

#[cfg(not(target_os = "windows"))]
#[test]
fn default_backend_is_unavailable_off_windows() {
    let err = Sender::new("Alpha", 16, 16).unwrap_err();
    assert!(matches!(err, Error::Registration { .. }));
    assert!(err.to_string().contains(std::env::consts::OS));
}

//! Leak diagnostics and scoped release.

mod common;

use std::panic::{catch_unwind, AssertUnwindSafe};

use common::{capture_logs, fake_backend, leak_warnings};
use liru::{lifecycle, Error, Release, Sender};

#[test]
fn unreleased_sender_warns_once_and_unregisters() {
    let (fake, backend) = fake_backend();
    let ((), logs) = capture_logs(|| {
        let sender = Sender::with_backend(backend.clone(), "Leaky", 32, 32).unwrap();
        assert_eq!(fake.open_publishers(), 1);
        drop(sender);
    });
    assert_eq!(leak_warnings(&logs), 1, "logs:\n{logs}");
    assert!(logs.contains("Leaky"));
    assert_eq!(fake.open_publishers(), 0);
    assert!(!backend.list_publishers().unwrap().contains("Leaky"));
}

#[test]
fn released_sender_does_not_warn() {
    let (_fake, backend) = fake_backend();
    let ((), logs) = capture_logs(|| {
        let mut sender = Sender::with_backend(backend, "Tidy", 32, 32).unwrap();
        sender.send(1).unwrap();
        sender.release();
    });
    assert_eq!(leak_warnings(&logs), 0, "logs:\n{logs}");
}

#[test]
fn scope_releases_on_normal_exit() {
    let (fake, backend) = fake_backend();
    let ((), logs) = capture_logs(|| {
        let mut sender = Sender::with_backend(backend, "Scoped", 16, 16).unwrap();
        sender.scope(|s| s.send(1)).unwrap();
        assert!(sender.is_released());
        assert_eq!(sender.name(), "Scoped");
    });
    assert_eq!(leak_warnings(&logs), 0);
    assert_eq!(fake.open_publishers(), 0);
}

#[test]
fn scope_releases_when_block_returns_error() {
    let (_fake, backend) = fake_backend();
    let ((), logs) = capture_logs(|| {
        let mut sender = Sender::with_backend(backend, "Early", 16, 16).unwrap();
        let result: Result<(), Error> = sender.scope(|s| {
            s.send(1)?;
            s.send(0)?;
            Ok(())
        });
        assert!(result.is_err());
        assert!(sender.is_released());
        assert!(matches!(sender.send(1), Err(Error::AlreadyReleased { .. })));
    });
    assert_eq!(leak_warnings(&logs), 0);
}

#[test]
fn scope_releases_when_block_panics() {
    let (fake, backend) = fake_backend();
    let ((), logs) = capture_logs(|| {
        let mut sender = Sender::with_backend(backend, "Panicky", 16, 16).unwrap();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            sender.scope(|s| {
                s.send(1).unwrap();
                panic!("unrelated failure");
            })
        }));
        assert!(outcome.is_err());
        assert!(sender.is_released());
    });
    assert_eq!(leak_warnings(&logs), 0, "logs:\n{logs}");
    assert_eq!(fake.open_publishers(), 0);
}

#[test]
fn generic_scoped_helper_works_with_senders() {
    let (_fake, backend) = fake_backend();
    let mut sender = Sender::with_backend(backend, "Generic", 16, 16).unwrap();
    let frames = lifecycle::scoped(&mut sender, |s| {
        s.send(3).unwrap();
        s.frame_count()
    });
    assert_eq!(frames, 1);
    assert!(Release::is_released(&sender));
}

#[test]
fn outstanding_counts_unreleased_senders() {
    let (_fake, backend) = fake_backend();
    let base = lifecycle::outstanding();

    let mut a = Sender::with_backend(backend.clone(), "A", 8, 8).unwrap();
    let b = Sender::with_backend(backend.clone(), "B", 8, 8).unwrap();
    assert_eq!(lifecycle::outstanding(), base + 2);

    a.release();
    a.release();
    assert_eq!(lifecycle::outstanding(), base + 1);

    let ((), logs) = capture_logs(|| drop(b));
    assert_eq!(leak_warnings(&logs), 1);
    assert_eq!(lifecycle::outstanding(), base);

    // Failed construction never counts.
    let _ = Sender::with_backend(backend, "", 8, 8);
    assert_eq!(lifecycle::outstanding(), base);
}

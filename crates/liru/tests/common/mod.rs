//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::io;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use gpu_interop::fake::FakeBackend;
use gpu_interop::{BackendConfig, SharedTextureBackend};

/// A fake backend, returned both concretely (for inspection) and as the
/// trait object senders and receivers take.
pub fn fake_backend() -> (Rc<FakeBackend>, Rc<dyn SharedTextureBackend>) {
    fake_backend_with(BackendConfig::default())
}

pub fn fake_backend_with(config: BackendConfig) -> (Rc<FakeBackend>, Rc<dyn SharedTextureBackend>) {
    let fake = Rc::new(FakeBackend::new(config));
    let backend: Rc<dyn SharedTextureBackend> = fake.clone();
    (fake, backend)
}

#[derive(Clone, Default)]
struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a subscriber that records every log line on this thread.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let writer = CaptureWriter::default();
    let sink = writer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || sink.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();
    let value = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&writer.0.lock().unwrap()).into_owned();
    (value, logs)
}

pub fn leak_warnings(logs: &str) -> usize {
    logs.lines()
        .filter(|line| line.contains("not explicitly released"))
        .count()
}

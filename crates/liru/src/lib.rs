//! Real-time GPU texture sharing between processes.
//!
//! A [`Sender`] publishes an OpenGL texture under a machine-wide name; any
//! number of [`Receiver`]s, in this or other processes, list the published
//! names and copy the current frame into their own GL textures. Frames never
//! leave the GPU.
//!
//! - [`Sender`] / [`Receiver`] are the two endpoints.
//! - [`lifecycle`] holds the release discipline senders follow.
//! - [`telemetry::FrameStats`] backs the `fps` and timing accessors.
//! - [`Error`] is the error type of every fallible call.
//!
//! Both endpoints talk to a [`SharedTextureBackend`] from [`gpu_interop`].
//! The plain constructors use a per-thread default backend (Spout on 64-bit
//! Windows); `with_backend` constructors take any backend.
//! Everything must run on the thread that owns the current GL context.

use std::cell::RefCell;
use std::rc::Rc;

pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod receiver;
pub mod sender;
pub mod telemetry;

pub use error::{Error, Result};
pub use gpu_interop::{BackendConfig, PublisherInfo, SharedTextureBackend, TextureFormat};
pub use lifecycle::Release;
pub use receiver::Receiver;
pub use sender::Sender;

thread_local! {
    static DEFAULT_BACKEND: RefCell<Option<Rc<dyn SharedTextureBackend>>> = const { RefCell::new(None) };
}

/// The backend shared by every sender and receiver created on this thread
/// with the plain constructors. Created on first use from
/// [`BackendConfig::from_env`].
pub fn default_backend() -> anyhow::Result<Rc<dyn SharedTextureBackend>> {
    DEFAULT_BACKEND.with(|cell| {
        if let Some(backend) = cell.borrow().as_ref() {
            return Ok(Rc::clone(backend));
        }
        let backend = create_default_backend()?;
        tracing::debug!(
            backend = backend.technology_name(),
            "default backend created"
        );
        *cell.borrow_mut() = Some(Rc::clone(&backend));
        Ok(backend)
    })
}

#[cfg(all(windows, target_pointer_width = "64"))]
fn create_default_backend() -> anyhow::Result<Rc<dyn SharedTextureBackend>> {
    let config = BackendConfig::from_env()?;
    Ok(Rc::new(gpu_interop::spout::SpoutBackend::new(config)?))
}

#[cfg(not(all(windows, target_pointer_width = "64")))]
fn create_default_backend() -> anyhow::Result<Rc<dyn SharedTextureBackend>> {
    anyhow::bail!(
        "no shared texture backend for {} ({}); only 64-bit Windows (Spout) is supported",
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

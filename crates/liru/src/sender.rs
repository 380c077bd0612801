use std::fmt;
use std::rc::Rc;

use gl::types::{GLsizei, GLuint};
use gpu_interop::{PublisherId, SharedTextureBackend};
use tracing::{debug, trace, warn};

use crate::error::{check_name, check_texture, Error, Result};
use crate::lifecycle::{self, Release};
use crate::telemetry::FrameStats;

/// Publishes a fixed-size texture under a machine-wide name.
///
/// The name is registered when the sender is created and stays registered
/// until [`release`](Sender::release) (or drop). Each [`send`](Sender::send)
/// copies a caller-owned GL texture into the shared surface on the GPU.
///
/// ```no_run
/// # fn frame_texture() -> u32 { 1 }
/// let mut sender = liru::Sender::new("Alpha", 1920, 1080)?;
/// sender.send(frame_texture())?;
/// sender.release();
/// # Ok::<(), liru::Error>(())
/// ```
#[must_use = "dropping a Sender unregisters it immediately"]
pub struct Sender {
    backend: Rc<dyn SharedTextureBackend>,
    name: String,
    width: u32,
    height: u32,
    publisher: Option<PublisherId>,
    stats: FrameStats,
}

impl Sender {
    /// Register `name` with a `width`x`height` shared texture on this
    /// thread's default backend.
    pub fn new(name: &str, width: GLsizei, height: GLsizei) -> Result<Self> {
        let (width, height) = check_geometry(name, width, height)?;
        let backend = crate::default_backend()
            .map_err(|e| Error::registration(name, "create backend", e))?;
        Self::register(backend, name, width, height)
    }

    /// Like [`new`](Sender::new), on an explicit backend.
    pub fn with_backend(
        backend: Rc<dyn SharedTextureBackend>,
        name: &str,
        width: GLsizei,
        height: GLsizei,
    ) -> Result<Self> {
        let (width, height) = check_geometry(name, width, height)?;
        Self::register(backend, name, width, height)
    }

    fn register(
        backend: Rc<dyn SharedTextureBackend>,
        name: &str,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let publisher = backend
            .open_or_create_publisher(name, width, height)
            .map_err(|e| Error::registration(name, "register", e))?;
        lifecycle::acquired();
        debug!(
            name,
            width,
            height,
            backend = backend.technology_name(),
            "sender registered"
        );
        Ok(Self {
            backend,
            name: name.to_owned(),
            width,
            height,
            publisher: Some(publisher),
            stats: FrameStats::new(),
        })
    }

    /// Copy `texture` (a GL texture name in the current context) into the
    /// shared surface and announce a new frame.
    pub fn send(&mut self, texture: GLuint) -> Result<()> {
        check_texture(texture)?;
        let Some(publisher) = self.publisher else {
            return Err(Error::AlreadyReleased {
                name: self.name.clone(),
            });
        };
        let elapsed = self
            .backend
            .copy_into_shared(publisher, texture)
            .map_err(|e| Error::registration(&self.name, "send", e))?;
        self.stats.record(elapsed);
        trace!(name = %self.name, texture, ?elapsed, "frame sent");
        Ok(())
    }

    /// Unregister the name and free the shared texture. Safe to call more
    /// than once; backend failures are logged.
    pub fn release(&mut self) {
        let Some(publisher) = self.publisher.take() else {
            return;
        };
        if let Err(e) = self.backend.close_publisher(publisher) {
            warn!(name = %self.name, "failed to unregister sender: {e:#}");
        }
        lifecycle::released();
        debug!(name = %self.name, frames = self.stats.frames(), "sender released");
    }

    /// Run `f`, then release the sender whatever happens inside it.
    pub fn scope<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        lifecycle::scoped(self, f)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Smoothed rate of successful sends.
    pub fn fps(&self) -> f64 {
        self.stats.fps()
    }

    /// Duration of the most recent successful send, in milliseconds.
    pub fn last_send_time_ms(&self) -> f64 {
        self.stats.last_ms()
    }

    pub fn frame_count(&self) -> u64 {
        self.stats.frames()
    }

    pub fn is_released(&self) -> bool {
        self.publisher.is_none()
    }
}

fn check_geometry(name: &str, width: GLsizei, height: GLsizei) -> Result<(u32, u32)> {
    check_name(name)?;
    if width <= 0 || height <= 0 {
        return Err(Error::invalid(
            "dimensions",
            format!("Invalid dimensions: {width}x{height}"),
        ));
    }
    Ok((width as u32, height as u32))
}

impl Release for Sender {
    fn release(&mut self) {
        Sender::release(self);
    }

    fn is_released(&self) -> bool {
        Sender::is_released(self)
    }
}

impl Drop for Sender {
    fn drop(&mut self) {
        if self.publisher.is_some() {
            lifecycle::report_leak("Sender", &self.name);
            self.release();
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sender(name='{}', size={}x{}",
            self.name, self.width, self.height
        )?;
        if self.is_released() {
            f.write_str(", released")?;
        }
        f.write_str(")")
    }
}

impl fmt::Debug for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("name", &self.name)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("publisher", &self.publisher)
            .field("backend", &self.backend.technology_name())
            .finish()
    }
}

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use anyhow::anyhow;
use gl::types::GLuint;
use gpu_interop::{PublisherInfo, SharedTextureBackend, SubscriberId};
use tracing::{debug, trace, warn};

use crate::error::{check_name, check_texture, Error, Result};
use crate::telemetry::FrameStats;

/// Pulls frames published by a [`Sender`](crate::Sender), possibly in
/// another process.
///
/// A receiver is bound to at most one sender name at a time. Binding is
/// optimistic: the named sender does not need to exist yet, and a binding the
/// backend could not establish is retried on the next
/// [`receive`](Receiver::receive).
pub struct Receiver {
    backend: Rc<dyn SharedTextureBackend>,
    active_sender: String,
    subscriber: Option<SubscriberId>,
    width: u32,
    height: u32,
    initialized: bool,
    stats: FrameStats,
}

impl Receiver {
    /// Create a receiver on this thread's default backend, optionally bound
    /// to `sender_name`. An empty name leaves it unbound.
    pub fn new(sender_name: Option<&str>) -> Result<Self> {
        let backend = crate::default_backend().map_err(|e| {
            Error::receive(sender_name.unwrap_or_default(), "create backend", e)
        })?;
        Ok(Self::with_backend(backend, sender_name))
    }

    pub fn with_backend(backend: Rc<dyn SharedTextureBackend>, sender_name: Option<&str>) -> Self {
        let mut receiver = Self {
            backend,
            active_sender: String::new(),
            subscriber: None,
            width: 0,
            height: 0,
            initialized: false,
            stats: FrameStats::new(),
        };
        if let Some(name) = sender_name.filter(|n| !n.is_empty()) {
            receiver.active_sender = name.to_owned();
            if let Err(e) = receiver.bind() {
                warn!(sender = name, "deferring connection: {e:#}");
            }
        }
        receiver
    }

    fn bind(&mut self) -> anyhow::Result<SubscriberId> {
        if let Some(id) = self.subscriber {
            return Ok(id);
        }
        let id = self.backend.bind_subscriber(&self.active_sender)?;
        debug!(sender = %self.active_sender, %id, "receiver bound");
        self.subscriber = Some(id);
        Ok(id)
    }

    fn unbind(&mut self) {
        if let Some(id) = self.subscriber.take() {
            self.backend.release_subscriber(id);
        }
    }

    /// Whether the bound sender has published a frame this receiver has not
    /// copied yet. Never fails; backend trouble reads as `false`.
    pub fn is_updated(&self) -> bool {
        let Some(id) = self.subscriber else {
            return false;
        };
        self.backend.poll_new_frame(id).unwrap_or_else(|e| {
            debug!(sender = %self.active_sender, "poll failed: {e:#}");
            false
        })
    }

    /// Copy the bound sender's current frame into `texture` and return the
    /// frame's size.
    pub fn receive(&mut self, texture: GLuint) -> Result<(u32, u32)> {
        check_texture(texture)?;
        if self.active_sender.is_empty() {
            return Err(Error::receive(
                "",
                "receive",
                anyhow!("no sender is selected"),
            ));
        }
        let subscriber = self
            .bind()
            .map_err(|e| Error::receive(&self.active_sender, "connect", e))?;
        let copy = self
            .backend
            .copy_from_shared(subscriber, texture)
            .map_err(|e| Error::receive(&self.active_sender, "receive", e))?;

        if (copy.width, copy.height) != (self.width, self.height) {
            debug!(
                sender = %self.active_sender,
                width = copy.width,
                height = copy.height,
                "sender geometry changed"
            );
        }
        self.width = copy.width;
        self.height = copy.height;
        self.initialized = true;
        self.stats.record(copy.elapsed);
        trace!(sender = %self.active_sender, texture, elapsed = ?copy.elapsed, "frame received");
        Ok((self.width, self.height))
    }

    /// Switch to `name`. The switch happens even if the backend cannot bind
    /// right away; in that case the error is returned and the connection is
    /// retried by the next [`receive`](Receiver::receive).
    pub fn select_sender(&mut self, name: &str) -> Result<()> {
        check_name(name)?;
        self.unbind();
        self.active_sender = name.to_owned();
        self.width = 0;
        self.height = 0;
        self.initialized = false;
        self.stats.reset();
        self.bind()
            .map(|_| ())
            .map_err(|e| Error::receive(name, "select_sender", e))
    }

    /// Names of every sender currently registered on this machine.
    pub fn get_sender_list(&self) -> HashSet<String> {
        self.backend.list_publishers().unwrap_or_else(|e| {
            warn!("failed to list senders: {e:#}");
            HashSet::new()
        })
    }

    /// What the bound sender currently advertises, without copying.
    pub fn query_sender_info(&self) -> Option<PublisherInfo> {
        if self.active_sender.is_empty() {
            return None;
        }
        self.backend
            .publisher_info(&self.active_sender)
            .unwrap_or_else(|e| {
                debug!(sender = %self.active_sender, "query failed: {e:#}");
                None
            })
    }

    /// Run `f` with the receiver. Receivers hold no registration, so nothing
    /// is released on exit.
    pub fn scope<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        f(self)
    }

    /// Bound sender name, empty when unbound.
    pub fn active_sender(&self) -> &str {
        &self.active_sender
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// True once a receive succeeded on the current binding.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn last_receive_time_ms(&self) -> f64 {
        self.stats.last_ms()
    }

    pub fn fps(&self) -> f64 {
        self.stats.fps()
    }

    pub fn frame_count(&self) -> u64 {
        self.stats.frames()
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.unbind();
    }
}

impl fmt::Display for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sender = if self.active_sender.is_empty() {
            "not connected"
        } else {
            self.active_sender.as_str()
        };
        write!(
            f,
            "Receiver(sender='{sender}', size={}x{})",
            self.width, self.height
        )
    }
}

impl fmt::Debug for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("active_sender", &self.active_sender)
            .field("subscriber", &self.subscriber)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("initialized", &self.initialized)
            .finish()
    }
}

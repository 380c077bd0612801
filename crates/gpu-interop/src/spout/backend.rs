//! [`SpoutBackend`]: shared textures through `SpoutLibrary.dll`.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::ffi::CString;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Result};
use gl::types::GLuint;
use tracing::{debug, trace, warn};

use super::directory::SenderDirectory;
use super::gl_context::{current_framebuffer, load_gl, texture_size};
use super::instance::SpoutInstance;
use super::library::create_instance;
use crate::backend::validate_sender_name;
use crate::{
    BackendConfig, FrameCopy, PublisherId, PublisherInfo, SharedTextureBackend, SubscriberId,
};

struct Publisher {
    name: String,
    instance: SpoutInstance,
    width: u32,
    height: u32,
    frames: u64,
}

struct Subscriber {
    name: String,
    instance: SpoutInstance,
    /// A poll saw a new frame that has not been copied yet.
    pending: bool,
}

#[derive(Default)]
struct State {
    publishers: HashMap<PublisherId, Publisher>,
    subscribers: HashMap<SubscriberId, Subscriber>,
    /// Library objects whose sender or receiver was released, ready for
    /// reuse. SpoutLibrary objects are never destroyed.
    idle: Vec<SpoutInstance>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Shared texture backend speaking the Spout 2 protocol, so senders and
/// receivers interoperate with any other Spout application.
///
/// Must be created and used on the thread whose GL context the caller's
/// textures belong to, with that context current.
pub struct SpoutBackend {
    config: BackendConfig,
    state: RefCell<State>,
    directory: SenderDirectory,
}

impl SpoutBackend {
    /// Create a backend for the GL context current on this thread.
    pub fn new(config: BackendConfig) -> Result<Self> {
        config.validate()?;
        if !load_gl() {
            bail!("OpenGL entry points could not be loaded; is a GL context current?");
        }
        let first = create_instance(config.library_path.as_deref())?;
        let directory = SenderDirectory::new()?;
        debug!(?config, "Spout shared texture backend ready");
        Ok(Self {
            config,
            state: RefCell::new(State {
                idle: vec![first],
                ..State::default()
            }),
            directory,
        })
    }

    fn take_instance(&self) -> Result<SpoutInstance> {
        match self.state.borrow_mut().idle.pop() {
            Some(instance) => Ok(instance),
            None => create_instance(self.config.library_path.as_deref()),
        }
    }

    fn recycle(&self, instance: SpoutInstance) {
        self.state.borrow_mut().idle.push(instance);
    }

    /// Create the Spout sender right away so the name is listed before the
    /// first frame. Spout only registers a sender when it is sent something.
    fn register(&self, instance: &SpoutInstance, name: &str, width: u32, height: u32) -> Result<()> {
        let c_name = CString::new(name)?;
        instance.set_sender_name(&c_name);
        instance.set_sender_format(self.config.format.raw());
        let blank = vec![0u8; width as usize * height as usize * 4];
        let sent = instance.send_image(&blank, width, height, gl::RGBA, false, current_framebuffer());
        if !sent || !instance.is_initialized() {
            bail!("Spout could not create a {width}x{height} sender");
        }
        check_registered_name(name, instance.name().as_deref())
    }
}

/// Spout answers a duplicate name by registering `name_1` instead.
fn check_registered_name(requested: &str, registered: Option<&str>) -> Result<()> {
    match registered {
        Some(actual) if actual == requested => Ok(()),
        Some(actual) => bail!(
            "a sender named '{requested}' is already registered (Spout offered '{actual}')"
        ),
        None => bail!("Spout did not report a name for sender '{requested}'"),
    }
}

impl SharedTextureBackend for SpoutBackend {
    fn technology_name(&self) -> &'static str {
        "Spout"
    }

    fn open_or_create_publisher(
        &self,
        name: &str,
        width: u32,
        height: u32,
    ) -> Result<PublisherId> {
        validate_sender_name(name)?;
        if width == 0 || height == 0 {
            bail!("cannot create a {width}x{height} shared texture");
        }
        let open = self.state.borrow().publishers.len();
        if open >= self.config.max_senders {
            bail!("{open} senders are already open (max_senders = {})", self.config.max_senders);
        }
        if self.directory.contains(name)? {
            bail!("a sender named '{name}' is already registered");
        }

        let instance = self.take_instance()?;
        if let Err(e) = self.register(&instance, name, width, height) {
            instance.release_sender();
            self.recycle(instance);
            return Err(e);
        }

        let mut state = self.state.borrow_mut();
        let id = PublisherId::from_raw(state.next_id());
        state.publishers.insert(
            id,
            Publisher {
                name: name.to_owned(),
                instance,
                width,
                height,
                frames: 0,
            },
        );
        let bytes = u64::from(width) * u64::from(height) * u64::from(self.config.format.bytes_per_pixel());
        debug!(%id, sender = name, width, height, bytes, "publisher opened");
        Ok(id)
    }

    fn close_publisher(&self, publisher: PublisherId) -> Result<()> {
        let entry = self
            .state
            .borrow_mut()
            .publishers
            .remove(&publisher)
            .ok_or_else(|| anyhow!("{publisher} is not open"))?;
        entry.instance.release_sender();
        self.recycle(entry.instance);
        debug!(%publisher, sender = %entry.name, frames = entry.frames, "publisher closed");
        Ok(())
    }

    fn copy_into_shared(&self, publisher: PublisherId, source: GLuint) -> Result<Duration> {
        let start = Instant::now();
        let mut state = self.state.borrow_mut();
        let entry = state
            .publishers
            .get_mut(&publisher)
            .ok_or_else(|| anyhow!("{publisher} is not open"))?;

        let size = texture_size(source)?;
        if size != (entry.width, entry.height) {
            bail!(
                "texture {source} is {}x{}, sender '{}' is {}x{}",
                size.0,
                size.1,
                entry.name,
                entry.width,
                entry.height
            );
        }
        let sent = entry.instance.send_texture(
            source,
            gl::TEXTURE_2D,
            entry.width,
            entry.height,
            false,
            current_framebuffer(),
        );
        if !sent {
            bail!("Spout failed to send texture {source}");
        }
        entry.frames += 1;

        let elapsed = start.elapsed();
        trace!(sender = %entry.name, frame = entry.frames, ?elapsed, "frame published");
        Ok(elapsed)
    }

    fn list_publishers(&self) -> Result<HashSet<String>> {
        self.directory.names()
    }

    fn publisher_info(&self, name: &str) -> Result<Option<PublisherInfo>> {
        validate_sender_name(name)?;
        let frame = self
            .state
            .borrow()
            .publishers
            .values()
            .find(|p| p.name == name)
            .map_or(0, |p| p.frames);
        Ok(self
            .directory
            .record(name)?
            .and_then(|record| record.to_publisher_info(frame)))
    }

    fn bind_subscriber(&self, name: &str) -> Result<SubscriberId> {
        validate_sender_name(name)?;
        let c_name = CString::new(name)?;
        let instance = self.take_instance()?;
        instance.set_receiver_name(&c_name);

        let mut state = self.state.borrow_mut();
        let id = SubscriberId::from_raw(state.next_id());
        state.subscribers.insert(
            id,
            Subscriber {
                name: name.to_owned(),
                instance,
                pending: false,
            },
        );
        debug!(%id, sender = name, "subscriber bound");
        Ok(id)
    }

    fn release_subscriber(&self, subscriber: SubscriberId) {
        let removed = self.state.borrow_mut().subscribers.remove(&subscriber);
        if let Some(entry) = removed {
            entry.instance.release_receiver();
            self.recycle(entry.instance);
            debug!(%subscriber, sender = %entry.name, "subscriber released");
        }
    }

    fn poll_new_frame(&self, subscriber: SubscriberId) -> Result<bool> {
        let mut state = self.state.borrow_mut();
        let sub = state
            .subscribers
            .get_mut(&subscriber)
            .ok_or_else(|| anyhow!("{subscriber} is not bound"))?;
        if sub.pending {
            return Ok(true);
        }
        // A receive without a texture connects and reads the frame count.
        if !sub.instance.receive_texture(0, 0, false, 0) {
            return Ok(false);
        }
        sub.pending = sub.instance.is_frame_new();
        Ok(sub.pending)
    }

    fn copy_from_shared(&self, subscriber: SubscriberId, destination: GLuint) -> Result<FrameCopy> {
        let start = Instant::now();
        let mut state = self.state.borrow_mut();
        let sub = state
            .subscribers
            .get_mut(&subscriber)
            .ok_or_else(|| anyhow!("{subscriber} is not bound"))?;

        let destination_size = texture_size(destination)?;
        let host_fbo = current_framebuffer();
        let receive = |sub: &Subscriber| {
            sub.instance
                .receive_texture(destination, gl::TEXTURE_2D, false, host_fbo)
        };
        if !receive(sub) {
            bail!("sender '{}' is not available", sub.name);
        }
        // After a sender change the first receive only reconnects.
        if sub.instance.is_updated() && !receive(sub) {
            bail!("sender '{}' went away while reconnecting", sub.name);
        }
        sub.pending = false;

        let record = self
            .directory
            .record(&sub.name)?
            .filter(|r| r.is_live())
            .ok_or_else(|| anyhow!("sender '{}' closed during the copy", sub.name))?;
        if (record.width, record.height) != destination_size {
            debug!(
                sender = %sub.name,
                sender_size = ?(record.width, record.height),
                ?destination_size,
                "destination size differs from sender"
            );
        }

        let elapsed = start.elapsed();
        trace!(sender = %sub.name, ?elapsed, "frame received");
        Ok(FrameCopy {
            width: record.width,
            height: record.height,
            elapsed,
        })
    }
}

impl Drop for SpoutBackend {
    fn drop(&mut self) {
        // Senders still open here outlived their backend; unregister them.
        let state = self.state.get_mut();
        for (id, publisher) in state.publishers.drain() {
            warn!(%id, sender = %publisher.name, "releasing sender on backend drop");
            publisher.instance.release_sender();
        }
        for (_, subscriber) in state.subscribers.drain() {
            subscriber.instance.release_receiver();
        }
    }
}

impl std::fmt::Debug for SpoutBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SpoutBackend")
            .field("config", &self.config)
            .field("publishers", &state.publishers.len())
            .field("subscribers", &state.subscribers.len())
            .field("idle", &state.idle.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_name_is_accepted() {
        assert!(check_registered_name("Alpha", Some("Alpha")).is_ok());
    }

    #[test]
    fn renamed_sender_means_duplicate() {
        let err = check_registered_name("Alpha", Some("Alpha_1")).unwrap_err();
        assert!(err.to_string().contains("already registered"), "{err}");
    }

    #[test]
    fn missing_name_is_an_error() {
        assert!(check_registered_name("Alpha", None).is_err());
    }
}

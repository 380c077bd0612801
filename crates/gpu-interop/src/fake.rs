//! In-process backend used as a test double.
//!
//! [`FakeBackend`] keeps the publisher registry in a `RefCell` and never
//! touches the GPU: copies only record which texture ids were involved and
//! bump frame counters. It honours the same contract as the Spout backend
//! (name validation, duplicate rejection, `max_senders` capacity, lazy
//! subscriber connection), and can be told to fail on demand.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use gl::types::GLuint;
use tracing::trace;

use crate::backend::validate_sender_name;
use crate::{
    BackendConfig, FrameCopy, PublisherId, PublisherInfo, SharedTextureBackend, SubscriberId,
};

#[derive(Debug)]
struct FakePublisher {
    name: String,
    width: u32,
    height: u32,
    frame: u64,
    last_source: Option<GLuint>,
}

#[derive(Debug)]
struct FakeSubscriber {
    name: String,
    /// Publisher and frame number of the last copy.
    consumed: Option<(PublisherId, u64)>,
    last_destination: Option<GLuint>,
}

#[derive(Debug, Default)]
struct State {
    publishers: HashMap<PublisherId, FakePublisher>,
    subscribers: HashMap<SubscriberId, FakeSubscriber>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn live(&self, name: &str) -> Option<(PublisherId, &FakePublisher)> {
        self.publishers
            .iter()
            .find(|(_, p)| p.name == name)
            .map(|(id, p)| (*id, p))
    }
}

/// Backend that records calls instead of sharing textures.
#[derive(Debug)]
pub struct FakeBackend {
    config: BackendConfig,
    state: RefCell<State>,
    copy_latency: Cell<Duration>,
    fail_registration: Cell<bool>,
    fail_copies: Cell<bool>,
    fail_binds: Cell<bool>,
    calls: Cell<usize>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new(BackendConfig::default())
    }
}

impl FakeBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            state: RefCell::new(State::default()),
            copy_latency: Cell::new(Duration::from_micros(250)),
            fail_registration: Cell::new(false),
            fail_copies: Cell::new(false),
            fail_binds: Cell::new(false),
            calls: Cell::new(0),
        }
    }

    /// Latency reported by every copy from now on.
    pub fn set_copy_latency(&self, latency: Duration) {
        self.copy_latency.set(latency);
    }

    /// Make publisher creation fail until reset.
    pub fn set_fail_registration(&self, fail: bool) {
        self.fail_registration.set(fail);
    }

    /// Make every copy (in either direction) fail until reset.
    pub fn set_fail_copies(&self, fail: bool) {
        self.fail_copies.set(fail);
    }

    /// Make subscriber binding fail until reset.
    pub fn set_fail_binds(&self, fail: bool) {
        self.fail_binds.set(fail);
    }

    /// Number of trait methods invoked so far.
    pub fn call_count(&self) -> usize {
        self.calls.get()
    }

    /// Number of publishers currently open.
    pub fn open_publishers(&self) -> usize {
        self.state.borrow().publishers.len()
    }

    /// Number of subscriptions currently held.
    pub fn open_subscribers(&self) -> usize {
        self.state.borrow().subscribers.len()
    }

    /// Texture id most recently copied into the publisher named `name`.
    pub fn last_source(&self, name: &str) -> Option<GLuint> {
        self.state.borrow().live(name).and_then(|(_, p)| p.last_source)
    }

    /// Texture id most recently copied into by `subscriber`.
    pub fn last_destination(&self, subscriber: SubscriberId) -> Option<GLuint> {
        self.state
            .borrow()
            .subscribers
            .get(&subscriber)
            .and_then(|s| s.last_destination)
    }

    fn record_call(&self) {
        self.calls.set(self.calls.get() + 1);
    }
}

impl SharedTextureBackend for FakeBackend {
    fn technology_name(&self) -> &'static str {
        "Fake"
    }

    fn open_or_create_publisher(
        &self,
        name: &str,
        width: u32,
        height: u32,
    ) -> Result<PublisherId> {
        self.record_call();
        validate_sender_name(name)?;
        if width == 0 || height == 0 {
            bail!("cannot create a {width}x{height} shared texture");
        }
        if self.fail_registration.get() {
            bail!("injected registration failure");
        }

        let mut state = self.state.borrow_mut();
        if state.live(name).is_some() {
            bail!("a sender named '{name}' is already registered");
        }
        if state.publishers.len() >= self.config.max_senders {
            bail!(
                "sender name list is full ({} entries)",
                self.config.max_senders
            );
        }

        let id = PublisherId::from_raw(state.next_id());
        state.publishers.insert(
            id,
            FakePublisher {
                name: name.to_owned(),
                width,
                height,
                frame: 0,
                last_source: None,
            },
        );
        trace!(%id, name, width, height, "fake publisher opened");
        Ok(id)
    }

    fn close_publisher(&self, publisher: PublisherId) -> Result<()> {
        self.record_call();
        self.state
            .borrow_mut()
            .publishers
            .remove(&publisher)
            .map(|_| ())
            .ok_or_else(|| anyhow!("{publisher} is not open"))
    }

    fn copy_into_shared(&self, publisher: PublisherId, source: GLuint) -> Result<Duration> {
        self.record_call();
        if source == 0 {
            bail!("texture 0 is not a valid source");
        }
        if self.fail_copies.get() {
            bail!("injected copy failure");
        }
        let mut state = self.state.borrow_mut();
        let entry = state
            .publishers
            .get_mut(&publisher)
            .ok_or_else(|| anyhow!("{publisher} is not open"))?;
        entry.frame += 1;
        entry.last_source = Some(source);
        Ok(self.copy_latency.get())
    }

    fn list_publishers(&self) -> Result<HashSet<String>> {
        self.record_call();
        Ok(self
            .state
            .borrow()
            .publishers
            .values()
            .map(|p| p.name.clone())
            .collect())
    }

    fn publisher_info(&self, name: &str) -> Result<Option<PublisherInfo>> {
        self.record_call();
        Ok(self.state.borrow().live(name).map(|(_, p)| PublisherInfo {
            width: p.width,
            height: p.height,
            format: self.config.format,
            frame: p.frame,
        }))
    }

    fn bind_subscriber(&self, name: &str) -> Result<SubscriberId> {
        self.record_call();
        validate_sender_name(name)?;
        if self.fail_binds.get() {
            bail!("injected bind failure");
        }
        let mut state = self.state.borrow_mut();
        let id = SubscriberId::from_raw(state.next_id());
        state.subscribers.insert(
            id,
            FakeSubscriber {
                name: name.to_owned(),
                consumed: None,
                last_destination: None,
            },
        );
        Ok(id)
    }

    fn release_subscriber(&self, subscriber: SubscriberId) {
        self.record_call();
        self.state.borrow_mut().subscribers.remove(&subscriber);
    }

    fn poll_new_frame(&self, subscriber: SubscriberId) -> Result<bool> {
        self.record_call();
        let state = self.state.borrow();
        let sub = state
            .subscribers
            .get(&subscriber)
            .ok_or_else(|| anyhow!("{subscriber} is not bound"))?;
        let Some((id, publisher)) = state.live(&sub.name) else {
            return Ok(false);
        };
        if publisher.frame == 0 {
            return Ok(false);
        }
        Ok(match sub.consumed {
            Some((seen_id, seen_frame)) => seen_id != id || seen_frame < publisher.frame,
            None => true,
        })
    }

    fn copy_from_shared(&self, subscriber: SubscriberId, destination: GLuint) -> Result<FrameCopy> {
        self.record_call();
        if destination == 0 {
            bail!("texture 0 is not a valid destination");
        }
        if self.fail_copies.get() {
            bail!("injected copy failure");
        }
        let mut state = self.state.borrow_mut();
        let name = state
            .subscribers
            .get(&subscriber)
            .map(|s| s.name.clone())
            .ok_or_else(|| anyhow!("{subscriber} is not bound"))?;
        let (id, frame, width, height) = state
            .live(&name)
            .map(|(id, p)| (id, p.frame, p.width, p.height))
            .ok_or_else(|| anyhow!("no sender named '{name}' is registered"))?;

        if let Some(sub) = state.subscribers.get_mut(&subscriber) {
            sub.consumed = Some((id, frame));
            sub.last_destination = Some(destination);
        }
        Ok(FrameCopy {
            width,
            height,
            elapsed: self.copy_latency.get(),
        })
    }
}

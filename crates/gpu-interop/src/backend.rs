//! Common interface for shared texture backends.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use anyhow::{bail, Result};
use gl::types::GLuint;

use crate::{TextureFormat, MAX_NAME_LEN};

/// Opaque handle to a publisher registration owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublisherId(u64);

/// Opaque handle to a subscription owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl PublisherId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl SubscriberId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PublisherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "publisher#{}", self.0)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscriber#{}", self.0)
    }
}

/// Result of copying a shared texture into a caller texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCopy {
    /// Width of the shared texture at the time of the copy.
    pub width: u32,
    /// Height of the shared texture at the time of the copy.
    pub height: u32,
    /// Time spent in the copy.
    pub elapsed: Duration,
}

/// What the registry currently advertises for a publisher name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublisherInfo {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    /// Number of frames published so far.
    pub frame: u64,
}

/// Common interface for cross-process shared texture backends.
///
/// Implementations exist for Spout (64-bit Windows, through
/// `SpoutLibrary.dll`) and, for tests, an in-process fake.
///
/// All methods take `&self`: a backend is shared by every sender and receiver
/// on the thread that owns the GL context, so implementations keep their
/// bookkeeping behind interior mutability. Texture ids are caller-owned GL
/// texture names in the current context; backends never create or delete them.
pub trait SharedTextureBackend {
    /// Technology name for diagnostics (e.g. `"Spout"`).
    fn technology_name(&self) -> &'static str;

    /// Allocate a `width`x`height` shared texture and publish it under `name`.
    fn open_or_create_publisher(&self, name: &str, width: u32, height: u32)
        -> Result<PublisherId>;

    /// Unpublish and free a publisher's shared texture.
    ///
    /// Closing an unknown id is an error; callers are expected to close each
    /// id exactly once.
    fn close_publisher(&self, publisher: PublisherId) -> Result<()>;

    /// Copy the caller's GL texture into the publisher's shared texture and
    /// mark a new frame. Returns the time spent copying.
    fn copy_into_shared(&self, publisher: PublisherId, source: GLuint) -> Result<Duration>;

    /// Names of every publisher currently registered on this machine.
    fn list_publishers(&self) -> Result<HashSet<String>>;

    /// Registry details for `name`, or `None` if nothing is published under it.
    fn publisher_info(&self, name: &str) -> Result<Option<PublisherInfo>>;

    /// Subscribe to `name`. The publisher does not have to exist yet; the
    /// connection to its shared texture is made on the first copy.
    fn bind_subscriber(&self, name: &str) -> Result<SubscriberId>;

    /// Drop a subscription and any texture it opened. Unknown ids are ignored.
    fn release_subscriber(&self, subscriber: SubscriberId);

    /// Whether the subscribed publisher has a frame newer than the last one
    /// this subscription copied.
    fn poll_new_frame(&self, subscriber: SubscriberId) -> Result<bool>;

    /// Copy the subscribed publisher's shared texture into the caller's GL
    /// texture and mark the current frame as consumed.
    fn copy_from_shared(&self, subscriber: SubscriberId, destination: GLuint)
        -> Result<FrameCopy>;
}

/// Check that `name` can be stored in a sender name list: non-empty, at most
/// [`MAX_NAME_LEN`] bytes, no NUL bytes.
pub fn validate_sender_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("sender name is empty");
    }
    if name.len() > MAX_NAME_LEN {
        bail!("sender name is {} bytes, limit is {MAX_NAME_LEN}", name.len());
    }
    if name.contains('\0') {
        bail!("sender name contains a NUL byte");
    }
    Ok(())
}

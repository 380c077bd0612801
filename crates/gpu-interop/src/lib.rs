//! Cross-process GPU texture sharing backends.
//!
//! This crate defines the [`SharedTextureBackend`] trait, the contract between
//! the `liru` sharing core and whatever actually creates shared GPU textures,
//! copies pixels in and out of them, and keeps the system-wide list of
//! publisher names. On 64-bit Windows, the [`spout`] backend speaks the
//! Spout 2 protocol through `SpoutLibrary.dll`. Other platforms have no
//! production backend.

pub mod backend;
pub mod config;
pub mod format;

pub use backend::{FrameCopy, PublisherId, PublisherInfo, SharedTextureBackend, SubscriberId};
pub use config::BackendConfig;
pub use format::TextureFormat;

// Platform-specific implementations.

#[cfg(any(all(windows, target_pointer_width = "64"), test))]
pub mod spout;

#[cfg(any(test, feature = "fake"))]
pub mod fake;

/// Longest sender name (in bytes, excluding the terminating NUL) any backend
/// accepts. Matches the 256-byte slots of Spout's sender name list.
pub const MAX_NAME_LEN: usize = 255;

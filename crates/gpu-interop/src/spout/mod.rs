//! Spout backend (Windows, 64-bit).
//!
//! Senders and receivers are driven through `SpoutLibrary.dll`, loaded at
//! runtime, so liru talks to OBS, Resolume, TouchDesigner and any other Spout
//! application. The sender list and per-sender records are read directly
//! from Spout's shared memory, which lets liru skip names left behind by
//! crashed senders.
//!
//! [`layout`] and [`instance`] have no platform dependencies and are built
//! for tests everywhere.

pub mod instance;
pub mod layout;

#[cfg(all(windows, target_pointer_width = "64"))]
mod backend;
#[cfg(all(windows, target_pointer_width = "64"))]
mod directory;
#[cfg(all(windows, target_pointer_width = "64"))]
mod gl_context;
#[cfg(all(windows, target_pointer_width = "64"))]
mod library;
#[cfg(all(windows, target_pointer_width = "64"))]
mod shm;

#[cfg(all(windows, target_pointer_width = "64"))]
pub use backend::SpoutBackend;
#[cfg(all(windows, target_pointer_width = "64"))]
pub use gl_context::load_gl;
#[cfg(all(windows, target_pointer_width = "64"))]
pub use library::create_instance;

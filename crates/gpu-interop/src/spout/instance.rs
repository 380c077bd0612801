//! Calls into a `SPOUTLIBRARY` object by vtable slot.
//!
//! `SpoutLibrary.dll` hands out C++ objects whose first word points at a
//! table of virtual methods. The slots below follow the declaration order
//! in `SpoutLibrary.h` (Spout 2.007). Only x86_64 is supported, where the
//! C and system calling conventions are the same.

use std::ffi::{c_char, c_void, CStr};
use std::ptr::NonNull;

use gl::types::{GLenum, GLuint};

type This = *mut c_void;

const SET_SENDER_NAME: usize = 0;
const SET_SENDER_FORMAT: usize = 1;
const RELEASE_SENDER: usize = 2;
const SEND_TEXTURE: usize = 4;
const SEND_IMAGE: usize = 5;
const IS_INITIALIZED: usize = 6;
const GET_NAME: usize = 7;
const SET_RECEIVER_NAME: usize = 15;
const RELEASE_RECEIVER: usize = 16;
const RECEIVE_TEXTURE: usize = 17;
const IS_UPDATED: usize = 19;
const IS_CONNECTED: usize = 20;
const IS_FRAME_NEW: usize = 21;

/// One `SPOUTLIBRARY` object. It acts as either a sender or a receiver,
/// depending on which half of the interface was last used.
pub struct SpoutInstance {
    handle: NonNull<c_void>,
}

impl SpoutInstance {
    /// Wrap the pointer returned by `GetSpout`.
    ///
    /// # Safety
    ///
    /// `handle` must be null or point to a live object whose vtable has at
    /// least the slots used here, and must stay valid for the life of the
    /// returned value.
    pub unsafe fn from_raw(handle: *mut c_void) -> Option<Self> {
        NonNull::new(handle).map(|handle| Self { handle })
    }

    unsafe fn method<F: Copy>(&self, index: usize) -> F {
        debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<*const c_void>());
        let vtable = *(self.handle.as_ptr() as *const *const *const c_void);
        std::mem::transmute_copy(&*vtable.add(index))
    }

    fn this(&self) -> This {
        self.handle.as_ptr()
    }

    pub fn set_sender_name(&self, name: &CStr) {
        unsafe {
            let f: extern "C" fn(This, *const c_char) = self.method(SET_SENDER_NAME);
            f(self.this(), name.as_ptr())
        }
    }

    /// `format` is a DXGI format number.
    pub fn set_sender_format(&self, format: u32) {
        unsafe {
            let f: extern "C" fn(This, u32) = self.method(SET_SENDER_FORMAT);
            f(self.this(), format)
        }
    }

    pub fn release_sender(&self) {
        unsafe {
            let f: extern "C" fn(This, u32) = self.method(RELEASE_SENDER);
            f(self.this(), 0)
        }
    }

    pub fn send_texture(
        &self,
        texture: GLuint,
        target: GLenum,
        width: u32,
        height: u32,
        invert: bool,
        host_fbo: GLuint,
    ) -> bool {
        unsafe {
            let f: extern "C" fn(This, GLuint, GLenum, u32, u32, bool, GLuint) -> bool =
                self.method(SEND_TEXTURE);
            f(self.this(), texture, target, width, height, invert, host_fbo)
        }
    }

    /// Send `pixels`, `width`x`height` in `gl_format`. The slice must hold a
    /// full image.
    pub fn send_image(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        gl_format: GLenum,
        invert: bool,
        host_fbo: GLuint,
    ) -> bool {
        debug_assert!(pixels.len() >= width as usize * height as usize * 4);
        unsafe {
            let f: extern "C" fn(This, *const u8, u32, u32, GLenum, bool, GLuint) -> bool =
                self.method(SEND_IMAGE);
            f(self.this(), pixels.as_ptr(), width, height, gl_format, invert, host_fbo)
        }
    }

    pub fn is_initialized(&self) -> bool {
        unsafe {
            let f: extern "C" fn(This) -> bool = self.method(IS_INITIALIZED);
            f(self.this())
        }
    }

    /// Name the sender actually registered under.
    pub fn name(&self) -> Option<String> {
        unsafe {
            let f: extern "C" fn(This) -> *const c_char = self.method(GET_NAME);
            let name = f(self.this());
            if name.is_null() {
                return None;
            }
            Some(CStr::from_ptr(name).to_string_lossy().into_owned())
        }
    }

    pub fn set_receiver_name(&self, name: &CStr) {
        unsafe {
            let f: extern "C" fn(This, *const c_char) = self.method(SET_RECEIVER_NAME);
            f(self.this(), name.as_ptr())
        }
    }

    pub fn release_receiver(&self) {
        unsafe {
            let f: extern "C" fn(This) = self.method(RELEASE_RECEIVER);
            f(self.this())
        }
    }

    /// Connect if needed and copy the sender's texture into `texture`. With
    /// `texture == 0` it only connects and checks for a new frame.
    pub fn receive_texture(
        &self,
        texture: GLuint,
        target: GLenum,
        invert: bool,
        host_fbo: GLuint,
    ) -> bool {
        unsafe {
            let f: extern "C" fn(This, GLuint, GLenum, bool, GLuint) -> bool =
                self.method(RECEIVE_TEXTURE);
            f(self.this(), texture, target, invert, host_fbo)
        }
    }

    /// The sender changed size or was replaced since the last receive.
    pub fn is_updated(&self) -> bool {
        unsafe {
            let f: extern "C" fn(This) -> bool = self.method(IS_UPDATED);
            f(self.this())
        }
    }

    pub fn is_connected(&self) -> bool {
        unsafe {
            let f: extern "C" fn(This) -> bool = self.method(IS_CONNECTED);
            f(self.this())
        }
    }

    pub fn is_frame_new(&self) -> bool {
        unsafe {
            let f: extern "C" fn(This) -> bool = self.method(IS_FRAME_NEW);
            f(self.this())
        }
    }
}

impl std::fmt::Debug for SpoutInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SpoutInstance").field(&self.handle).finish()
    }
}

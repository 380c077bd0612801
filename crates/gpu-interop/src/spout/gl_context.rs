//! The few GL queries the backend makes on the caller's context.

use anyhow::{bail, Result};
use gl::types::{GLint, GLuint};
use once_cell::sync::OnceCell;
use tracing::debug;

static GL_LOADED: OnceCell<bool> = OnceCell::new();

/// Load GL function pointers for the current context. Returns whether the
/// entry points the backend needs were found.
pub fn load_gl() -> bool {
    *GL_LOADED.get_or_init(|| {
        gl_loader::init_gl();
        gl::load_with(|s| gl_loader::get_proc_address(s).cast());
        let loaded = gl::GetIntegerv::is_loaded()
            && gl::IsTexture::is_loaded()
            && gl::GetTexLevelParameteriv::is_loaded();
        debug!(loaded, "GL function pointers loaded");
        loaded
    })
}

/// Framebuffer bound for drawing, which Spout rebinds after its copies.
pub(crate) fn current_framebuffer() -> GLuint {
    let mut fbo: GLint = 0;
    unsafe { gl::GetIntegerv(gl::DRAW_FRAMEBUFFER_BINDING, &mut fbo) };
    fbo as GLuint
}

/// Size of level 0 of a caller texture, or an error if `texture` is not a
/// live 2D texture in the current context. The 2D binding is restored.
pub(crate) fn texture_size(texture: GLuint) -> Result<(u32, u32)> {
    unsafe {
        if gl::IsTexture(texture) == gl::FALSE {
            bail!("{texture} is not a texture in the current GL context");
        }
        let mut bound: GLint = 0;
        gl::GetIntegerv(gl::TEXTURE_BINDING_2D, &mut bound);
        gl::BindTexture(gl::TEXTURE_2D, texture);
        let (mut w, mut h): (GLint, GLint) = (0, 0);
        gl::GetTexLevelParameteriv(gl::TEXTURE_2D, 0, gl::TEXTURE_WIDTH, &mut w);
        gl::GetTexLevelParameteriv(gl::TEXTURE_2D, 0, gl::TEXTURE_HEIGHT, &mut h);
        gl::BindTexture(gl::TEXTURE_2D, bound as GLuint);
        if w <= 0 || h <= 0 {
            bail!("texture {texture} has no storage");
        }
        Ok((w as u32, h as u32))
    }
}

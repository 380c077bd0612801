//! Loading `SpoutLibrary.dll` and creating library objects.

use std::ffi::c_void;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use once_cell::sync::OnceCell;
use tracing::{debug, info};

use super::instance::SpoutInstance;

const DLL_NAME: &str = "SpoutLibrary.dll";

static LIBRARY: OnceCell<libloading::Library> = OnceCell::new();

fn candidates(configured: Option<&Path>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = configured.map(Path::to_path_buf).into_iter().collect();
    paths.push(PathBuf::from(DLL_NAME));
    if let Some(dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
        paths.push(dir.join(DLL_NAME));
    }
    paths
}

/// Load the library once per process. Later calls return the library
/// loaded first, whatever path they ask for.
fn library(configured: Option<&Path>) -> Result<&'static libloading::Library> {
    LIBRARY.get_or_try_init(|| {
        let mut last_error = None;
        for path in candidates(configured) {
            match unsafe { libloading::Library::new(&path) } {
                Ok(library) => {
                    info!(path = %path.display(), "loaded SpoutLibrary");
                    return Ok(library);
                }
                Err(e) => {
                    debug!(path = %path.display(), "SpoutLibrary not loadable: {e}");
                    last_error = Some(e);
                }
            }
        }
        Err(match last_error {
            Some(e) => anyhow!(e),
            None => anyhow!("no candidate paths"),
        })
        .with_context(|| format!("failed to load {DLL_NAME}; put it next to the executable or set LIRU_SPOUT_LIBRARY"))
    })
}

/// Create a fresh library object.
pub fn create_instance(configured: Option<&Path>) -> Result<SpoutInstance> {
    let library = library(configured)?;
    let handle = unsafe {
        let get_spout: libloading::Symbol<unsafe extern "C" fn() -> *mut c_void> = library
            .get(b"GetSpout\0")
            .context("SpoutLibrary has no GetSpout export")?;
        get_spout()
    };
    match unsafe { SpoutInstance::from_raw(handle) } {
        Some(instance) => Ok(instance),
        None => bail!("GetSpout returned null"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_path_is_tried_first() {
        let paths = candidates(Some(Path::new(r"C:\Spout\SpoutLibrary.dll")));
        assert_eq!(paths[0], PathBuf::from(r"C:\Spout\SpoutLibrary.dll"));
        assert_eq!(paths[1], PathBuf::from(DLL_NAME));
    }

    #[test]
    fn default_search_uses_dll_name() {
        assert_eq!(candidates(None)[0], PathBuf::from(DLL_NAME));
    }
}

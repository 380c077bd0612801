//! Named, pagefile-backed file mappings and named mutexes.

use anyhow::{bail, Context, Result};
use tracing::warn;
use windows::core::{HSTRING, PCWSTR};
use windows::Win32::Foundation::{
    CloseHandle, GetLastError, HANDLE, WAIT_ABANDONED, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows::Win32::System::Memory::{
    MapViewOfFile, OpenFileMappingW, UnmapViewOfFile, VirtualQuery, FILE_MAP_ALL_ACCESS,
    MEMORY_BASIC_INFORMATION, MEMORY_MAPPED_VIEW_ADDRESS,
};
use windows::Win32::System::Threading::{CreateMutexW, ReleaseMutex, WaitForSingleObject};

/// How long to wait for a named mutex before giving up.
const MUTEX_TIMEOUT_MS: u32 = 1000;

/// A view of a named shared memory region created by some process on the
/// machine. The region lives as long as any process holds a handle to it.
pub(crate) struct SharedMemory {
    mapping: HANDLE,
    view: MEMORY_MAPPED_VIEW_ADDRESS,
    len: usize,
}

impl SharedMemory {
    /// Map the whole of an existing mapping. Returns `Ok(None)` if nothing is
    /// mapped under `name`.
    ///
    /// The length is whatever the creator asked for, rounded up to a page,
    /// so processes configured with different list sizes still agree.
    pub(crate) fn open(name: &str) -> Result<Option<Self>> {
        let wide = HSTRING::from(name);
        let mapping =
            match unsafe { OpenFileMappingW(FILE_MAP_ALL_ACCESS.0, false, PCWSTR(wide.as_ptr())) } {
                Ok(mapping) => mapping,
                Err(_) => return Ok(None),
            };
        Self::map(mapping)
            .with_context(|| format!("MapViewOfFile({name})"))
            .map(Some)
    }

    /// Create the mapping `name` of `len` bytes, or join it if it exists.
    #[cfg(test)]
    pub(crate) fn create(name: &str, len: usize) -> Result<Self> {
        use windows::Win32::Foundation::INVALID_HANDLE_VALUE;
        use windows::Win32::System::Memory::{CreateFileMappingW, PAGE_READWRITE};

        let wide = HSTRING::from(name);
        let mapping = unsafe {
            CreateFileMappingW(
                INVALID_HANDLE_VALUE,
                None,
                PAGE_READWRITE,
                (len >> 32) as u32,
                len as u32,
                PCWSTR(wide.as_ptr()),
            )
        }
        .with_context(|| format!("CreateFileMappingW({name})"))?;
        Self::map(mapping)
    }

    fn map(mapping: HANDLE) -> Result<Self> {
        let view = unsafe { MapViewOfFile(mapping, FILE_MAP_ALL_ACCESS, 0, 0, 0) };
        if view.Value.is_null() {
            let err = last_error();
            unsafe {
                let _ = CloseHandle(mapping);
            }
            return Err(err.into());
        }
        let mut region = MEMORY_BASIC_INFORMATION::default();
        let written = unsafe {
            VirtualQuery(
                Some(view.Value as *const _),
                &mut region,
                std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
            )
        };
        let memory = Self {
            mapping,
            view,
            len: region.RegionSize,
        };
        if written == 0 {
            return Err(last_error()).context("VirtualQuery");
        }
        Ok(memory)
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Copy the whole region out.
    pub(crate) fn read(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.len];
        // SAFETY: the view is `len` bytes long and stays mapped while `self`
        // lives. Other processes may write concurrently; callers hold the
        // mutex that guards the region when that matters.
        unsafe {
            std::ptr::copy_nonoverlapping(self.view.Value as *const u8, bytes.as_mut_ptr(), self.len)
        };
        bytes
    }

    /// Overwrite the region from offset 0 with `bytes`.
    pub(crate) fn write(&self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.len {
            bail!("{} bytes do not fit a {}-byte mapping", bytes.len(), self.len);
        }
        // SAFETY: bounds checked above.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.view.Value as *mut u8, bytes.len())
        };
        Ok(())
    }
}

impl Drop for SharedMemory {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = UnmapViewOfFile(self.view) {
                warn!("UnmapViewOfFile failed: {e}");
            }
            let _ = CloseHandle(self.mapping);
        }
    }
}

/// A machine-wide mutex.
pub(crate) struct NamedMutex {
    handle: HANDLE,
    name: String,
}

impl NamedMutex {
    pub(crate) fn open_or_create(name: &str) -> Result<Self> {
        let wide = HSTRING::from(name);
        let handle = unsafe { CreateMutexW(None, false, PCWSTR(wide.as_ptr())) }
            .with_context(|| format!("CreateMutexW({name})"))?;
        Ok(Self {
            handle,
            name: name.to_owned(),
        })
    }

    /// Acquire the mutex. A mutex abandoned by a crashed process is taken
    /// over.
    pub(crate) fn lock(&self) -> Result<NamedMutexGuard<'_>> {
        let wait = unsafe { WaitForSingleObject(self.handle, MUTEX_TIMEOUT_MS) };
        if wait == WAIT_OBJECT_0 {
            Ok(NamedMutexGuard { mutex: self })
        } else if wait == WAIT_ABANDONED {
            warn!(mutex = %self.name, "named mutex was abandoned by another process");
            Ok(NamedMutexGuard { mutex: self })
        } else if wait == WAIT_TIMEOUT {
            bail!("timed out after {MUTEX_TIMEOUT_MS}ms waiting for {}", self.name)
        } else {
            Err(last_error()).with_context(|| format!("WaitForSingleObject({})", self.name))
        }
    }
}

impl Drop for NamedMutex {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.handle);
        }
    }
}

pub(crate) struct NamedMutexGuard<'a> {
    mutex: &'a NamedMutex,
}

impl Drop for NamedMutexGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = unsafe { ReleaseMutex(self.mutex.handle) } {
            warn!(mutex = %self.mutex.name, "ReleaseMutex failed: {e}");
        }
    }
}

fn last_error() -> windows::core::Error {
    unsafe { GetLastError() }.to_hresult().into()
}

/// A mapping name no other test or process uses.
#[cfg(test)]
pub(crate) fn unique_name(tag: &str) -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static NEXT: AtomicU32 = AtomicU32::new(0);
    format!(
        "LiruTest_{tag}_{}_{}",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_mapping_opens_as_none() {
        assert!(SharedMemory::open(&unique_name("missing")).unwrap().is_none());
    }

    #[test]
    fn opened_length_follows_the_creator() {
        let name = unique_name("len");
        let _created = SharedMemory::create(&name, 40 * 256).unwrap();
        let opened = SharedMemory::open(&name).unwrap().unwrap();
        assert!(opened.len() >= 40 * 256);
        assert_eq!(opened.len() % 4096, 0);
    }

    #[test]
    fn writes_are_visible_through_other_views() {
        let name = unique_name("rw");
        let created = SharedMemory::create(&name, 512).unwrap();
        let opened = SharedMemory::open(&name).unwrap().unwrap();
        created.write(b"hello").unwrap();
        assert_eq!(&opened.read()[..6], b"hello\0");
    }

    #[test]
    fn oversized_write_is_rejected() {
        let name = unique_name("big");
        let memory = SharedMemory::create(&name, 16).unwrap();
        let too_big = vec![1u8; memory.len() + 1];
        assert!(memory.write(&too_big).is_err());
    }

    #[test]
    fn mutex_can_be_relocked() {
        let mutex = NamedMutex::open_or_create(&unique_name("mutex")).unwrap();
        drop(mutex.lock().unwrap());
        drop(mutex.lock().unwrap());
    }
}

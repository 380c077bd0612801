//! Byte layout of the shared memory Spout keeps for its senders.
//!
//! - `SpoutSenderNames`: a list of 256-byte slots, each a NUL-terminated
//!   sender name. The list ends at the first empty slot. Writers hold the
//!   named mutex `SpoutSenderNames_mutex`.
//! - One mapping per sender, named exactly like the sender, holding a
//!   280-byte `SharedTextureInfo` record.
//!
//! Everything here works on plain byte slices copied out of the mappings.

use tracing::warn;

use crate::{PublisherInfo, TextureFormat, MAX_NAME_LEN};

pub const NAME_LIST_MAPPING: &str = "SpoutSenderNames";
pub const SLOT_LEN: usize = MAX_NAME_LEN + 1;
pub const INFO_LEN: usize = 280;

/// Name of the mutex guarding the mapping `mapping`.
pub fn mutex_name(mapping: &str) -> String {
    format!("{mapping}_mutex")
}

fn slot_name(slot: &[u8]) -> Option<&[u8]> {
    let len = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
    (len > 0).then(|| &slot[..len])
}

/// Names in a name list, in slot order. Stops at the first empty slot.
pub fn parse_name_list(bytes: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    for (index, slot) in bytes.chunks_exact(SLOT_LEN).enumerate() {
        let Some(raw) = slot_name(slot) else {
            break;
        };
        match std::str::from_utf8(raw) {
            Ok(name) => names.push(name.to_owned()),
            Err(_) => warn!(slot = index, "sender name list slot is not UTF-8, skipping"),
        }
    }
    names
}

/// Rewrite the name list in place so it holds only the names for which
/// `is_live` returns true, packed from the first slot. Slots past the end
/// of the original list are not touched. Returns the names dropped.
pub fn prune_name_list(bytes: &mut [u8], mut is_live: impl FnMut(&str) -> bool) -> Vec<String> {
    let mut used = 0;
    let mut kept = 0;
    let mut dropped = Vec::new();
    while (used + 1) * SLOT_LEN <= bytes.len() {
        let slot = &bytes[used * SLOT_LEN..(used + 1) * SLOT_LEN];
        let Some(raw) = slot_name(slot) else {
            break;
        };
        let keep = match std::str::from_utf8(raw) {
            Ok(name) if is_live(name) => true,
            Ok(name) => {
                dropped.push(name.to_owned());
                false
            }
            Err(_) => false,
        };
        if keep {
            if kept != used {
                bytes.copy_within(used * SLOT_LEN..(used + 1) * SLOT_LEN, kept * SLOT_LEN);
            }
            kept += 1;
        }
        used += 1;
    }
    bytes[kept * SLOT_LEN..used * SLOT_LEN].fill(0);
    dropped
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(word)
}

/// The fields of a `SharedTextureInfo` record liru cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderRecord {
    /// 32-bit DXGI share handle; 0 once the sender let go of its texture.
    pub share_handle: u32,
    pub width: u32,
    pub height: u32,
    /// Raw DXGI format; 0 means the Spout default (BGRA8).
    pub format: u32,
    pub usage: u32,
    pub partner_id: u32,
}

impl SenderRecord {
    /// Decode a record. Returns `None` if `bytes` is shorter than a record.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < INFO_LEN {
            return None;
        }
        Some(Self {
            share_handle: read_u32(bytes, 0),
            width: read_u32(bytes, 4),
            height: read_u32(bytes, 8),
            format: read_u32(bytes, 12),
            usage: read_u32(bytes, 16),
            partner_id: read_u32(bytes, 276),
        })
    }

    pub fn is_live(&self) -> bool {
        self.share_handle != 0 && self.width > 0 && self.height > 0
    }

    pub fn texture_format(&self) -> TextureFormat {
        match self.format {
            0 => TextureFormat::default(),
            raw => TextureFormat::from_raw(raw).unwrap_or_else(|| {
                warn!(format = raw, "sender uses an unknown DXGI format");
                TextureFormat::default()
            }),
        }
    }

    pub fn to_publisher_info(self, frame: u64) -> Option<PublisherInfo> {
        self.is_live().then(|| PublisherInfo {
            width: self.width,
            height: self.height,
            format: self.texture_format(),
            frame,
        })
    }
}

#[cfg(test)]
pub(crate) fn encode_name_list(names: &[&str], slots: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; slots * SLOT_LEN];
    for (i, name) in names.iter().enumerate() {
        bytes[i * SLOT_LEN..i * SLOT_LEN + name.len()].copy_from_slice(name.as_bytes());
    }
    bytes
}

#[cfg(test)]
pub(crate) fn encode_record(record: &SenderRecord) -> Vec<u8> {
    let mut bytes = vec![0u8; INFO_LEN];
    for (offset, value) in [
        (0, record.share_handle),
        (4, record.width),
        (8, record.height),
        (12, record.format),
        (16, record.usage),
        (276, record.partner_id),
    ] {
        bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
    bytes
}

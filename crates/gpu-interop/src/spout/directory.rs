//! Read side of Spout's sender registry.

use std::collections::HashSet;

use anyhow::Result;
use tracing::{debug, info};

use super::layout::{self, SenderRecord, NAME_LIST_MAPPING};
use super::shm::{NamedMutex, SharedMemory};

/// Lists senders and reads their records straight from shared memory.
///
/// Senders that crashed leave their name in the list while their record
/// mapping disappears with the process. Such names are never reported and
/// are removed from the list on the next [`names`](Self::names).
pub(crate) struct SenderDirectory {
    mapping: String,
    mutex: NamedMutex,
}

impl SenderDirectory {
    pub(crate) fn new() -> Result<Self> {
        Self::with_mapping(NAME_LIST_MAPPING)
    }

    pub(crate) fn with_mapping(mapping: &str) -> Result<Self> {
        Ok(Self {
            mutex: NamedMutex::open_or_create(&layout::mutex_name(mapping))?,
            mapping: mapping.to_owned(),
        })
    }

    /// The record of `name`, if a process still holds one open.
    pub(crate) fn record(&self, name: &str) -> Result<Option<SenderRecord>> {
        Ok(SharedMemory::open(name)?.and_then(|memory| SenderRecord::parse(&memory.read())))
    }

    fn is_live(&self, name: &str) -> bool {
        matches!(self.record(name), Ok(Some(record)) if record.is_live())
    }

    /// Names of live senders. Dead entries are pruned from the list.
    pub(crate) fn names(&self) -> Result<HashSet<String>> {
        let _guard = self.mutex.lock()?;
        let Some(memory) = SharedMemory::open(&self.mapping)? else {
            return Ok(HashSet::new());
        };
        let mut bytes = memory.read();
        let dropped = layout::prune_name_list(&mut bytes, |name| self.is_live(name));
        if !dropped.is_empty() {
            info!(?dropped, "removed senders that are no longer running");
            memory.write(&bytes)?;
        }
        let names: HashSet<String> = layout::parse_name_list(&bytes).into_iter().collect();
        debug!(count = names.len(), slots = memory.len() / layout::SLOT_LEN, "listed senders");
        Ok(names)
    }

    /// Whether `name` is listed and live.
    pub(crate) fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.names()?.contains(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spout::layout::{encode_name_list, encode_record, INFO_LEN};
    use crate::spout::shm::unique_name;

    fn live_record(width: u32, height: u32) -> Vec<u8> {
        encode_record(&SenderRecord {
            share_handle: 0x1234,
            width,
            height,
            format: 87,
            usage: 0,
            partner_id: 0,
        })
    }

    fn publish_record(name: &str, bytes: &[u8]) -> SharedMemory {
        let memory = SharedMemory::create(name, INFO_LEN).unwrap();
        memory.write(bytes).unwrap();
        memory
    }

    #[test]
    fn missing_name_list_is_empty() {
        let directory = SenderDirectory::with_mapping(&unique_name("nolist")).unwrap();
        assert!(directory.names().unwrap().is_empty());
    }

    #[test]
    fn crashed_sender_is_hidden_and_its_slot_reclaimed() {
        let list_name = unique_name("list");
        let alive = unique_name("alive");
        let crashed = unique_name("crashed");
        let list = SharedMemory::create(&list_name, 10 * layout::SLOT_LEN).unwrap();
        list.write(&encode_name_list(&[&crashed, &alive], 10)).unwrap();
        let _record = publish_record(&alive, &live_record(640, 480));

        let directory = SenderDirectory::with_mapping(&list_name).unwrap();
        assert_eq!(directory.names().unwrap(), HashSet::from([alive.clone()]));
        assert_eq!(layout::parse_name_list(&list.read()), vec![alive.clone()]);
        assert!(directory.contains(&alive).unwrap());
        assert!(!directory.contains(&crashed).unwrap());
    }

    #[test]
    fn closed_sender_with_zero_handle_is_hidden() {
        let list_name = unique_name("list");
        let closed = unique_name("closed");
        let list = SharedMemory::create(&list_name, 4 * layout::SLOT_LEN).unwrap();
        list.write(&encode_name_list(&[&closed], 4)).unwrap();
        let _record = publish_record(&closed, &[0u8; INFO_LEN]);

        let directory = SenderDirectory::with_mapping(&list_name).unwrap();
        assert!(directory.names().unwrap().is_empty());
    }

    #[test]
    fn list_larger_than_default_is_read_whole() {
        let list_name = unique_name("biglist");
        let list = SharedMemory::create(&list_name, 64 * layout::SLOT_LEN).unwrap();
        let senders: Vec<String> = (0..40).map(|i| unique_name(&format!("s{i}"))).collect();
        let refs: Vec<&str> = senders.iter().map(String::as_str).collect();
        list.write(&encode_name_list(&refs, 64)).unwrap();
        let _records: Vec<_> = senders
            .iter()
            .map(|name| publish_record(name, &live_record(8, 8)))
            .collect();

        let directory = SenderDirectory::with_mapping(&list_name).unwrap();
        assert_eq!(directory.names().unwrap().len(), 40);
    }

    #[test]
    fn record_is_read_from_sender_mapping() {
        let name = unique_name("rec");
        let _record = publish_record(&name, &live_record(1920, 1080));
        let directory = SenderDirectory::with_mapping(&unique_name("list")).unwrap();
        let record = directory.record(&name).unwrap().unwrap();
        assert_eq!((record.width, record.height), (1920, 1080));
        assert!(directory.record(&unique_name("absent")).unwrap().is_none());
    }
}

// Per-range byte counting through a per-worker cached open handle.
use std::cell::RefCell;
use std::path::{Path, PathBuf};

use crate::core::clusters::EntryRange;
use crate::core::error::{Error, ErrorKind};
use crate::store::source::SourceHandle;

/// Bytes surfaced by one read: decoded value bytes after decompression,
/// and raw bytes transferred from the storage medium.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ByteStats {
    pub decoded_bytes: u64,
    pub raw_bytes: u64,
}

impl ByteStats {
    /// Associative, commutative fold; task results can be combined in any
    /// completion order.
    pub fn merge(self, other: ByteStats) -> ByteStats {
        ByteStats {
            decoded_bytes: self.decoded_bytes + other.decoded_bytes,
            raw_bytes: self.raw_bytes + other.raw_bytes,
        }
    }
}

thread_local! {
    // One cached open handle per worker thread, keyed by source path.
    // Repeat reads against the same source on the same thread skip the
    // open; a different path drops the old handle and opens the new one.
    // Never shared across threads.
    static OPEN_SOURCE: RefCell<Option<CachedSource>> = const { RefCell::new(None) };
}

struct CachedSource {
    path: PathBuf,
    handle: SourceHandle,
}

/// Reads every row of `range` (whole collection when `None`) for the named
/// columns and returns the byte counts.
pub fn read_rows(
    path: &Path,
    collection: &str,
    columns: &[String],
    range: Option<EntryRange>,
) -> Result<ByteStats, Error> {
    with_cached_handle(path, |handle| {
        handle.collection(collection)?.read_rows(range, columns)
    })
}

fn with_cached_handle<T>(
    path: &Path,
    read: impl FnOnce(&SourceHandle) -> Result<T, Error>,
) -> Result<T, Error> {
    OPEN_SOURCE.with(|slot| {
        let mut slot = slot.borrow_mut();
        let cache_hit = slot.as_ref().is_some_and(|cached| cached.path == path);
        if !cache_hit {
            // Drop the stale handle before opening the next source.
            slot.take();
            let handle = SourceHandle::open(path)?;
            *slot = Some(CachedSource {
                path: path.to_path_buf(),
                handle,
            });
        }
        let cached = slot.as_ref().ok_or_else(|| {
            Error::new(ErrorKind::Internal).with_message("source cache slot is empty")
        })?;
        read(&cached.handle)
    })
}

#[cfg(test)]
mod tests {
    use super::read_rows;
    use crate::core::clusters::EntryRange;
    use crate::store::field::{ColumnData, FieldType};
    use crate::store::writer::{CollectionOptions, SourceWriter};
    use std::path::Path;

    fn write_single_column(path: &Path, rows: i32) {
        let mut writer = SourceWriter::create(path).expect("create source");
        let schema = vec![("x".to_string(), FieldType::I32)];
        let mut collection = writer
            .collection("events", &schema, CollectionOptions::new(16))
            .expect("collection");
        collection
            .append(&[ColumnData::I32((0..rows).collect())])
            .expect("append");
        collection.finish().expect("finish collection");
        writer.finish().expect("finish source");
    }

    #[test]
    fn repeat_and_alternating_reads_stay_consistent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = dir.path().join("first.scol");
        let second = dir.path().join("second.scol");
        write_single_column(&first, 100);
        write_single_column(&second, 40);

        let columns = vec!["x".to_string()];
        let stats_first = read_rows(&first, "events", &columns, None).expect("read first");
        assert_eq!(stats_first.decoded_bytes, 400);

        // Same source again: served through the cached handle, same counts.
        let again = read_rows(&first, "events", &columns, None).expect("read again");
        assert_eq!(again, stats_first);

        // Different source invalidates the slot; counts follow the new file.
        let stats_second = read_rows(&second, "events", &columns, None).expect("read second");
        assert_eq!(stats_second.decoded_bytes, 160);

        // And back, across a partial range.
        let partial = read_rows(
            &first,
            "events",
            &columns,
            Some(EntryRange { start: 16, end: 48 }),
        )
        .expect("read partial");
        assert_eq!(partial.decoded_bytes, 32 * 4);
    }
}

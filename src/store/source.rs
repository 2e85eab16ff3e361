// Read-only source handles: validated open, collection lookup, page reads.
use std::cell::Cell;
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use crate::core::clusters::EntryRange;
use crate::core::counter::ByteStats;
use crate::core::error::{Error, ErrorKind};
use crate::store::format::{self, CollectionMeta, ColumnMeta, PageMeta, SourceFooter};

#[derive(Debug)]
pub struct SourceHandle {
    path: PathBuf,
    file: File,
    footer: SourceFooter,
    /// Monotonic count of bytes transferred from the file through this
    /// handle, metadata reads included. Callers sample deltas around reads.
    raw_bytes: Cell<u64>,
}

impl SourceHandle {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|err| {
            Error::new(ErrorKind::SourceOpen)
                .with_message("could not open source")
                .with_path(&path)
                .with_source(err)
        })?;
        let file_len = file
            .metadata()
            .map(|meta| meta.len())
            .map_err(|err| Error::new(ErrorKind::Io).with_path(&path).with_source(err))?;

        let raw_bytes = Cell::new(0u64);
        if file_len < format::HEADER_SIZE + format::TRAILER_SIZE {
            return Err(Error::new(ErrorKind::SourceOpen)
                .with_message("file too small to be a source")
                .with_path(&path));
        }

        let mut header = [0u8; format::HEADER_SIZE as usize];
        read_counted(&file, &raw_bytes, &mut header, 0, &path)?;
        if header[0..4] != format::MAGIC {
            return Err(Error::new(ErrorKind::SourceOpen)
                .with_message("bad magic")
                .with_path(&path));
        }
        let version = u32::from_le_bytes(read_4(&header, 4));
        if version != format::VERSION {
            return Err(Error::new(ErrorKind::SourceOpen)
                .with_message(format!("unsupported source version {version}"))
                .with_path(&path));
        }

        let mut trailer = [0u8; format::TRAILER_SIZE as usize];
        read_counted(
            &file,
            &raw_bytes,
            &mut trailer,
            file_len - format::TRAILER_SIZE,
            &path,
        )?;
        if trailer[12..16] != format::MAGIC {
            return Err(Error::new(ErrorKind::SourceOpen)
                .with_message("bad trailer magic (truncated or unfinished source)")
                .with_path(&path));
        }
        let footer_crc = u32::from_le_bytes(read_4(&trailer, 0));
        let footer_len = u64::from_le_bytes(read_8(&trailer, 4));
        if footer_len > file_len - format::HEADER_SIZE - format::TRAILER_SIZE {
            return Err(Error::new(ErrorKind::SourceOpen)
                .with_message("invalid footer length")
                .with_path(&path));
        }

        let mut footer_bytes = vec![0u8; footer_len as usize];
        read_counted(
            &file,
            &raw_bytes,
            &mut footer_bytes,
            file_len - format::TRAILER_SIZE - footer_len,
            &path,
        )?;
        if crc32fast::hash(&footer_bytes) != footer_crc {
            return Err(Error::new(ErrorKind::SourceOpen)
                .with_message("footer checksum mismatch")
                .with_path(&path));
        }
        let footer: SourceFooter = serde_json::from_slice(&footer_bytes).map_err(|err| {
            Error::new(ErrorKind::SourceOpen)
                .with_message("invalid footer")
                .with_path(&path)
                .with_source(err)
        })?;
        footer.validate(&path)?;

        Ok(Self {
            path,
            file,
            footer,
            raw_bytes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn collections(&self) -> &[CollectionMeta] {
        &self.footer.collections
    }

    pub fn collection(&self, name: &str) -> Result<Collection<'_>, Error> {
        self.footer
            .collections
            .iter()
            .find(|meta| meta.name == name)
            .map(|meta| Collection { handle: self, meta })
            .ok_or_else(|| {
                Error::new(ErrorKind::CollectionNotFound)
                    .with_message("no such collection in source")
                    .with_collection(name)
                    .with_path(&self.path)
            })
    }

    pub fn raw_bytes_read(&self) -> u64 {
        self.raw_bytes.get()
    }

    fn read_page(&self, page: &PageMeta, column: &ColumnMeta, collection: &str) -> Result<Vec<u8>, Error> {
        let mut compressed = vec![0u8; page.compressed_len as usize];
        read_counted(&self.file, &self.raw_bytes, &mut compressed, page.offset, &self.path)?;
        if crc32fast::hash(&compressed) != page.crc32 {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message("page checksum mismatch")
                .with_column(&column.name)
                .with_collection(collection)
                .with_path(&self.path));
        }
        let values = lz4_flex::block::decompress(&compressed, page.uncompressed_len as usize)
            .map_err(|err| {
                Error::new(ErrorKind::Corrupt)
                    .with_message("page decompression failed")
                    .with_column(&column.name)
                    .with_collection(collection)
                    .with_path(&self.path)
                    .with_source(err)
            })?;
        if values.len() != page.uncompressed_len as usize {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message("page decompressed to the wrong size")
                .with_column(&column.name)
                .with_collection(collection)
                .with_path(&self.path));
        }
        Ok(values)
    }
}

#[derive(Debug)]
pub struct Collection<'h> {
    handle: &'h SourceHandle,
    meta: &'h CollectionMeta,
}

impl Collection<'_> {
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn total_rows(&self) -> u64 {
        self.meta.total_rows
    }

    pub fn clusters(&self) -> Vec<EntryRange> {
        self.meta.clusters.iter().map(|meta| meta.range()).collect()
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.meta.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.meta.columns.iter().map(|column| column.name.as_str())
    }

    /// Reads every row in `range` (whole collection when `None`) for each
    /// named column. Decoded bytes count the value bytes of rows in range;
    /// raw bytes are the handle counter delta across the read.
    pub fn read_rows(&self, range: Option<EntryRange>, columns: &[String]) -> Result<ByteStats, Error> {
        let total_rows = self.meta.total_rows;
        let range = match range {
            None => EntryRange {
                start: 0,
                end: total_rows,
            },
            Some(range) => {
                if range.end > total_rows {
                    return Err(Error::new(ErrorKind::RangeOutOfBounds)
                        .with_message(format!(
                            "range end {} is beyond the end of the collection ({total_rows} rows)",
                            range.end
                        ))
                        .with_collection(&self.meta.name)
                        .with_path(&self.handle.path));
                }
                range
            }
        };

        let mut selected = Vec::with_capacity(columns.len());
        for name in columns {
            let column = self
                .meta
                .columns
                .iter()
                .find(|column| column.name == *name)
                .ok_or_else(|| {
                    Error::new(ErrorKind::ColumnNotFound)
                        .with_message("no such column")
                        .with_column(name)
                        .with_collection(&self.meta.name)
                        .with_path(&self.handle.path)
                })?;
            selected.push(column);
        }

        let raw_before = self.handle.raw_bytes_read();
        let mut decoded_bytes = 0u64;
        for column in &selected {
            let width = column.field.width();
            for (cluster, page) in self.meta.clusters.iter().zip(&column.pages) {
                let cluster = cluster.range();
                if cluster.end <= range.start || cluster.start >= range.end {
                    continue;
                }
                let values = self.handle.read_page(page, column, &self.meta.name)?;
                debug_assert_eq!(values.len() as u64, cluster.rows() * width);
                let lo = range.start.max(cluster.start);
                let hi = range.end.min(cluster.end);
                decoded_bytes += (hi - lo) * width;
            }
        }
        Ok(ByteStats {
            decoded_bytes,
            raw_bytes: self.handle.raw_bytes_read() - raw_before,
        })
    }
}

fn read_counted(
    file: &File,
    raw_bytes: &Cell<u64>,
    buf: &mut [u8],
    offset: u64,
    path: &Path,
) -> Result<(), Error> {
    file.read_exact_at(buf, offset)
        .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))?;
    raw_bytes.set(raw_bytes.get() + buf.len() as u64);
    Ok(())
}

fn read_4(buf: &[u8], offset: usize) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&buf[offset..offset + 4]);
    out
}

fn read_8(buf: &[u8], offset: usize) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf[offset..offset + 8]);
    out
}

// Source file creation: cluster-granular page flushing and footer emission.
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::error::{Error, ErrorKind};
use crate::store::field::{ColumnData, FieldType};
use crate::store::format::{self, ClusterMeta, CollectionMeta, ColumnMeta, PageMeta, SourceFooter};

pub const DEFAULT_ROWS_PER_CLUSTER: u64 = 64 * 1024;

#[derive(Clone, Copy, Debug)]
pub struct CollectionOptions {
    /// Flush granularity; this becomes the collection's natural cluster size.
    pub rows_per_cluster: u64,
}

impl CollectionOptions {
    pub fn new(rows_per_cluster: u64) -> Self {
        Self { rows_per_cluster }
    }
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self::new(DEFAULT_ROWS_PER_CLUSTER)
    }
}

pub struct SourceWriter {
    path: PathBuf,
    file: File,
    pos: u64,
    collections: Vec<CollectionMeta>,
}

impl SourceWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&path)
            .map_err(|err| Error::new(ErrorKind::Io).with_path(&path).with_source(err))?;

        file.write_all(&format::MAGIC)
            .and_then(|()| file.write_all(&format::VERSION.to_le_bytes()))
            .map_err(|err| Error::new(ErrorKind::Io).with_path(&path).with_source(err))?;

        Ok(Self {
            path,
            file,
            pos: format::HEADER_SIZE,
            collections: Vec::new(),
        })
    }

    /// Starts a new collection. Finish the returned writer before starting
    /// the next collection or calling [`SourceWriter::finish`].
    pub fn collection(
        &mut self,
        name: &str,
        schema: &[(String, FieldType)],
        options: CollectionOptions,
    ) -> Result<CollectionWriter<'_>, Error> {
        if name.is_empty() {
            return Err(Error::new(ErrorKind::Validation)
                .with_message("collection name must not be empty")
                .with_path(&self.path));
        }
        if self.collections.iter().any(|meta| meta.name == name) {
            return Err(Error::new(ErrorKind::Validation)
                .with_message("collection already written to this source")
                .with_collection(name)
                .with_path(&self.path));
        }
        if schema.is_empty() {
            return Err(Error::new(ErrorKind::Validation)
                .with_message("collection schema must name at least one column")
                .with_collection(name)
                .with_path(&self.path));
        }
        for (idx, (column, _)) in schema.iter().enumerate() {
            if schema[..idx].iter().any(|(other, _)| other == column) {
                return Err(Error::new(ErrorKind::Validation)
                    .with_message("duplicate column in schema")
                    .with_column(column)
                    .with_collection(name)
                    .with_path(&self.path));
            }
        }
        if options.rows_per_cluster == 0 {
            return Err(Error::new(ErrorKind::Validation)
                .with_message("rows_per_cluster must be at least 1")
                .with_collection(name)
                .with_path(&self.path));
        }

        let buffers = schema
            .iter()
            .map(|(_, field)| ColumnData::empty(*field))
            .collect();
        let pages = schema.iter().map(|_| Vec::new()).collect();
        Ok(CollectionWriter {
            writer: self,
            name: name.to_string(),
            options,
            schema: schema.to_vec(),
            buffers,
            clusters: Vec::new(),
            pages,
            total_rows: 0,
        })
    }

    /// Writes the footer trailer and flushes. The file is not a valid
    /// source until this succeeds.
    pub fn finish(mut self) -> Result<(), Error> {
        let footer = SourceFooter {
            collections: std::mem::take(&mut self.collections),
        };
        let footer_bytes = serde_json::to_vec(&footer).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("footer encode failed")
                .with_path(&self.path)
                .with_source(err)
        })?;
        let footer_crc = crc32fast::hash(&footer_bytes);

        self.file
            .write_all(&footer_bytes)
            .and_then(|()| self.file.write_all(&footer_crc.to_le_bytes()))
            .and_then(|()| self.file.write_all(&(footer_bytes.len() as u64).to_le_bytes()))
            .and_then(|()| self.file.write_all(&format::MAGIC))
            .and_then(|()| self.file.flush())
            .map_err(|err| Error::new(ErrorKind::Io).with_path(&self.path).with_source(err))
    }

    fn write_page(&mut self, value_bytes: &[u8]) -> Result<PageMeta, Error> {
        let compressed = lz4_flex::block::compress(value_bytes);
        let meta = PageMeta {
            offset: self.pos,
            compressed_len: compressed.len() as u32,
            uncompressed_len: value_bytes.len() as u32,
            crc32: crc32fast::hash(&compressed),
        };
        self.file
            .write_all(&compressed)
            .map_err(|err| Error::new(ErrorKind::Io).with_path(&self.path).with_source(err))?;
        self.pos += compressed.len() as u64;
        Ok(meta)
    }
}

pub struct CollectionWriter<'a> {
    writer: &'a mut SourceWriter,
    name: String,
    options: CollectionOptions,
    schema: Vec<(String, FieldType)>,
    buffers: Vec<ColumnData>,
    clusters: Vec<ClusterMeta>,
    pages: Vec<Vec<PageMeta>>,
    total_rows: u64,
}

impl CollectionWriter<'_> {
    /// Appends one batch, one `ColumnData` per schema column, all of equal
    /// length. Full clusters are flushed to disk as they fill.
    pub fn append(&mut self, batch: &[ColumnData]) -> Result<(), Error> {
        if batch.len() != self.schema.len() {
            return Err(Error::new(ErrorKind::Validation)
                .with_message(format!(
                    "batch has {} columns, schema has {}",
                    batch.len(),
                    self.schema.len()
                ))
                .with_collection(&self.name)
                .with_path(&self.writer.path));
        }
        let rows = batch.first().map(ColumnData::len).unwrap_or(0);
        for (idx, column) in batch.iter().enumerate() {
            if column.len() != rows {
                return Err(Error::new(ErrorKind::Validation)
                    .with_message("batch columns have unequal lengths")
                    .with_column(&self.schema[idx].0)
                    .with_collection(&self.name)
                    .with_path(&self.writer.path));
            }
            self.buffers[idx]
                .extend(column)
                .map_err(|err| err.with_column(&self.schema[idx].0).with_collection(&self.name))?;
        }

        while self.buffered_rows() >= self.options.rows_per_cluster {
            self.flush_cluster(self.options.rows_per_cluster)?;
        }
        Ok(())
    }

    /// Flushes any partial tail cluster and records the collection in the
    /// source footer.
    pub fn finish(mut self) -> Result<(), Error> {
        let tail = self.buffered_rows();
        if tail > 0 {
            self.flush_cluster(tail)?;
        }

        let columns = self
            .schema
            .iter()
            .zip(std::mem::take(&mut self.pages))
            .map(|((name, field), pages)| ColumnMeta {
                name: name.clone(),
                field: *field,
                pages,
            })
            .collect();
        self.writer.collections.push(CollectionMeta {
            name: std::mem::take(&mut self.name),
            total_rows: self.total_rows,
            clusters: std::mem::take(&mut self.clusters),
            columns,
        });
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.total_rows + self.buffered_rows()
    }

    fn buffered_rows(&self) -> u64 {
        self.buffers.first().map(ColumnData::len).unwrap_or(0) as u64
    }

    fn flush_cluster(&mut self, rows: u64) -> Result<(), Error> {
        let start_row = self.total_rows;
        for (idx, buffer) in self.buffers.iter_mut().enumerate() {
            let value_bytes = buffer.encode_prefix(rows as usize);
            let page = self.writer.write_page(&value_bytes)?;
            buffer.drop_prefix(rows as usize);
            self.pages[idx].push(page);
        }
        self.clusters.push(ClusterMeta {
            start_row,
            end_row: start_row + rows,
        });
        self.total_rows += rows;
        Ok(())
    }
}

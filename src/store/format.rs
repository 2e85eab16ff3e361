//! Purpose: On-disk layout contract shared by `writer` and `source`.
//! Role: A source file is `[magic][version][cluster pages...][footer JSON][crc32][footer len][magic]`.
//! Invariants: Pages are LZ4 block compressed; one page per (cluster, column).
//! Invariants: The footer fully describes collections; readers never scan the data region.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::clusters::EntryRange;
use crate::core::error::{Error, ErrorKind};
use crate::store::field::FieldType;

pub const MAGIC: [u8; 4] = *b"SCOL";
pub const VERSION: u32 = 1;
pub const HEADER_SIZE: u64 = 8;
/// Footer crc32 (4) + footer length (8) + closing magic (4).
pub const TRAILER_SIZE: u64 = 16;

#[derive(Debug, Serialize, Deserialize)]
pub struct SourceFooter {
    pub collections: Vec<CollectionMeta>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionMeta {
    pub name: String,
    pub total_rows: u64,
    pub clusters: Vec<ClusterMeta>,
    pub columns: Vec<ColumnMeta>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ClusterMeta {
    pub start_row: u64,
    pub end_row: u64,
}

impl ClusterMeta {
    pub fn range(&self) -> EntryRange {
        EntryRange {
            start: self.start_row,
            end: self.end_row,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub field: FieldType,
    /// One page per cluster, in cluster order.
    pub pages: Vec<PageMeta>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PageMeta {
    pub offset: u64,
    pub compressed_len: u32,
    pub uncompressed_len: u32,
    pub crc32: u32,
}

impl SourceFooter {
    pub fn validate(&self, path: &Path) -> Result<(), Error> {
        let malformed = |message: String| {
            Error::new(ErrorKind::SourceOpen)
                .with_message(message)
                .with_path(path)
        };

        for (idx, collection) in self.collections.iter().enumerate() {
            if self.collections[..idx]
                .iter()
                .any(|other| other.name == collection.name)
            {
                return Err(malformed(format!(
                    "duplicate collection '{}' in footer",
                    collection.name
                )));
            }

            let mut next_row = 0u64;
            for cluster in &collection.clusters {
                if cluster.start_row != next_row || cluster.end_row <= cluster.start_row {
                    return Err(malformed(format!(
                        "collection '{}' has a non-contiguous cluster sequence",
                        collection.name
                    )));
                }
                next_row = cluster.end_row;
            }
            if next_row != collection.total_rows {
                return Err(malformed(format!(
                    "collection '{}' clusters cover {next_row} of {} rows",
                    collection.name, collection.total_rows
                )));
            }

            for column in &collection.columns {
                if column.pages.len() != collection.clusters.len() {
                    return Err(malformed(format!(
                        "column '{}' in collection '{}' has {} pages for {} clusters",
                        column.name,
                        collection.name,
                        column.pages.len(),
                        collection.clusters.len()
                    )));
                }
                for (cluster, page) in collection.clusters.iter().zip(&column.pages) {
                    let expected = cluster.range().rows() * column.field.width();
                    if u64::from(page.uncompressed_len) != expected {
                        return Err(malformed(format!(
                            "column '{}' in collection '{}' has a page sized {} for {expected} value bytes",
                            column.name, collection.name, page.uncompressed_len
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

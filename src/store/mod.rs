// Columnar source files: fixed-width typed columns, LZ4 cluster pages, JSON footer.
pub mod field;
pub mod format;
pub mod source;
pub mod writer;

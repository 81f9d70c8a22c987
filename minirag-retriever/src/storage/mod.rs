//! Persistence for the retrieval layer
//!
//! The finished index and the in-progress checkpoint are both plain files written by this
//! module. There is no database: the index is small enough to be loaded into memory whole.
//!
//! ## Key Components
//!
//! - **[`framing`]**: magic + version header, bincode payload, atomic replace
//! - **[`index_file`]**: [`IndexFile`] and its [`IndexFileStore`]
//!
//! ## File layout
//!
//! ```text
//! [magic: 4 bytes][version: u32 LE][bincode payload]
//!  "MRAG" index        1
//!  "MRCP" checkpoint   1
//! ```

pub mod framing;
pub mod index_file;

pub use index_file::{INDEX_MAGIC, IndexFile, IndexFileStore};

//! # exlift core
//!
//! Shared abstractions for reading exFAT filesystems out of disk images:
//!
//! - **Error handling**: the [`Error`] enum and [`Result`] alias used by
//!   every exlift crate.
//! - **Positional reads**: the [`ReadAt`] trait, the only capability the
//!   filesystem layer needs from an image container.
//! - **Entry types**: [`FileEntry`], the directory-listing record handed to
//!   callers, plus human-readable size formatting.
//!
//! ## Example
//!
//! ```rust
//! use exlift_core::{ReadAt, Result};
//! use std::io::Cursor;
//!
//! fn first_sector<R: ReadAt>(source: &mut R) -> Result<Vec<u8>> {
//!     let mut sector = vec![0u8; 512];
//!     let n = source.read_at(&mut sector, 0)?;
//!     sector.truncate(n);
//!     Ok(sector)
//! }
//!
//! let mut image = Cursor::new(vec![0xEBu8; 1024]);
//! assert_eq!(first_sector(&mut image).unwrap().len(), 512);
//! ```

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::ReadAt;
pub use types::{format_size, FileEntry};

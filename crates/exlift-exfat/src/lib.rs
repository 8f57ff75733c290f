//! # exlift exfat
//!
//! Read-only exFAT filesystem reader. Works against any byte source
//! implementing [`exlift_core::ReadAt`] — typically an
//! `exlift_image::Container`, or an in-memory buffer in tests.
//!
//! # Volume layout
//!
//! ```text
//! ┌──────────────────────────┐
//! │   Boot Region            │  Boot sector at offset 0
//! ├──────────────────────────┤
//! │   FAT Region             │  Cluster chain table
//! ├──────────────────────────┤
//! │   Cluster Heap           │  File and directory data,
//! │                          │  including the root directory
//! └──────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use exlift_exfat::ExfatVolume;
//! use exlift_image::open_image;
//!
//! let mut container = open_image("disk.vhd").unwrap();
//! let volume = ExfatVolume::mount(&mut container).unwrap();
//!
//! for entry in volume.list_dir(&mut container, "/").unwrap() {
//!     println!("{}", entry);
//! }
//! let data = volume.read_file(&mut container, "/HELLO.TXT").unwrap();
//! assert_eq!(data.len(), 13);
//! ```

pub mod types;
pub mod volume;

pub use types::{
    cluster, decode_timestamp, BootSector, EntryType, FileAttributes, FileDirectoryEntry,
    FileNameEntry, ResolvedEntry, StreamExtensionEntry,
};
pub use volume::{normalize_path, ExfatVolume};

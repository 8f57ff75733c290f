//! # exlift image
//!
//! Container formats for exlift. A [`Container`] presents a disk image file
//! as a uniform byte-addressable logical disk, regardless of how it is
//! stored on the host:
//!
//! - **Fixed VHD**: data from byte 0 to `current_size`, 512-byte footer at
//!   the end of the file.
//! - **Dynamic VHD**: sparse format; a Block Allocation Table maps logical
//!   blocks to physical sectors, unallocated blocks read as zeros.
//! - **Raw image**: a plain sector dump carrying an exFAT boot signature.
//!
//! The format is autodetected on open.
//!
//! ## Example
//!
//! ```rust,no_run
//! use exlift_core::ReadAt;
//! use exlift_image::open_image;
//!
//! let mut container = open_image("disk.vhd").unwrap();
//! println!("{}: {} bytes", container.identify(), container.size());
//!
//! let mut boot = [0u8; 512];
//! container.read_at(&mut boot, 0).unwrap();
//! ```

pub mod container;
pub mod vhd;

pub use container::{open_image, Container, ContainerKind, SECTOR_SIZE};
pub use vhd::{BlockAllocationTable, VhdDiskType, VhdDynamicHeader, VhdFooter};

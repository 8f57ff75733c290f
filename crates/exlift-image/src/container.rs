//! Logical disk containers with format autodetection
//!
//! A [`Container`] owns the image file handle and translates logical disk
//! offsets to physical file offsets. The three supported layouts are a
//! tagged variant rather than a trait hierarchy; `read_at` branches on the
//! tag.

use crate::vhd::{BlockAllocationTable, VhdDiskType, VhdDynamicHeader, VhdFooter};
use exlift_core::{Error, ReadAt, Result};
use log::{debug, warn};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// VHD sector size; BAT entries count sectors of this size
pub const SECTOR_SIZE: u64 = 512;

const EXFAT_SIGNATURE: &[u8; 8] = b"EXFAT   ";

/// How the logical disk is laid out in the image file
#[derive(Debug)]
pub enum ContainerKind {
    /// Fixed VHD: logical offset equals file offset, footer at the end
    Fixed,
    /// Dynamic VHD: logical blocks mapped through a BAT
    Dynamic { bat: BlockAllocationTable },
    /// Raw sector image: logical offset equals file offset, no footer
    Raw,
}

/// An opened disk image presenting a uniform byte-addressable logical disk
#[derive(Debug)]
pub struct Container {
    file: File,
    length: u64,
    kind: ContainerKind,
    footer: Option<VhdFooter>,
    dynamic_header: Option<VhdDynamicHeader>,
}

/// Open a disk image with format autodetection.
///
/// Convenience wrapper around [`Container::open`].
pub fn open_image<P: AsRef<Path>>(path: P) -> Result<Container> {
    Container::open(path.as_ref())
}

impl Container {
    /// Open an image file, autodetecting its format.
    ///
    /// Detection order:
    /// 1. VHD footer in the last 512 bytes of the file.
    /// 2. VHD footer at offset 0 (some tools write only the head copy).
    /// 3. exFAT boot signature at bytes 3..11, treated as a raw image.
    ///
    /// # Errors
    ///
    /// `InvalidContainer` when none of the probes match,
    /// `UnsupportedDiskType` for VHD types other than fixed and dynamic.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        match probe_footer(&mut file, file_size) {
            Some(footer) => Self::open_vhd(file, footer),
            None => Self::open_raw(file, file_size),
        }
    }

    fn open_vhd(mut file: File, footer: VhdFooter) -> Result<Self> {
        if !footer.verify_checksum() {
            warn!("VHD footer checksum mismatch, continuing anyway");
        }

        match footer.disk_type {
            VhdDiskType::Fixed => {
                debug!("fixed VHD, {} bytes", footer.current_size);
                Ok(Self {
                    file,
                    length: footer.current_size,
                    kind: ContainerKind::Fixed,
                    footer: Some(footer),
                    dynamic_header: None,
                })
            }
            VhdDiskType::Dynamic => {
                let mut header_bytes = [0u8; VhdDynamicHeader::SIZE];
                file.seek(SeekFrom::Start(footer.data_offset))?;
                file.read_exact(&mut header_bytes)?;
                let header = VhdDynamicHeader::parse(&header_bytes)?;
                if !header.verify_checksum() {
                    warn!("VHD dynamic header checksum mismatch, continuing anyway");
                }

                let mut bat_bytes = vec![0u8; header.max_table_entries as usize * 4];
                file.seek(SeekFrom::Start(header.table_offset))?;
                file.read_exact(&mut bat_bytes)?;
                let bat = BlockAllocationTable::parse(&bat_bytes, header.block_size)?;

                debug!(
                    "dynamic VHD, {} bytes in {} blocks of {} bytes",
                    footer.current_size,
                    bat.len(),
                    bat.block_size()
                );
                Ok(Self {
                    file,
                    length: footer.current_size,
                    kind: ContainerKind::Dynamic { bat },
                    footer: Some(footer),
                    dynamic_header: Some(header),
                })
            }
            other => Err(Error::UnsupportedDiskType(other.as_raw())),
        }
    }

    fn open_raw(mut file: File, file_size: u64) -> Result<Self> {
        let mut boot = [0u8; SECTOR_SIZE as usize];
        file.seek(SeekFrom::Start(0))?;
        match file.read_exact(&mut boot) {
            Ok(()) if &boot[3..11] == EXFAT_SIGNATURE => {
                debug!("raw exFAT image, {} bytes", file_size);
                Ok(Self {
                    file,
                    length: file_size,
                    kind: ContainerKind::Raw,
                    footer: None,
                    dynamic_header: None,
                })
            }
            Ok(()) => Err(Error::invalid_container(
                "no VHD footer and no exFAT boot signature",
            )),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(
                Error::invalid_container("file too small for a boot sector"),
            ),
            Err(e) => Err(e.into()),
        }
    }

    /// Logical disk size in bytes
    pub fn size(&self) -> u64 {
        self.length
    }

    /// Container layout
    pub fn kind(&self) -> &ContainerKind {
        &self.kind
    }

    /// Human-readable container type
    pub fn identify(&self) -> &'static str {
        match self.kind {
            ContainerKind::Fixed => "Microsoft VHD (Fixed)",
            ContainerKind::Dynamic { .. } => "Microsoft VHD (Dynamic)",
            ContainerKind::Raw => "Raw sector image",
        }
    }

    /// True for dynamic VHDs
    pub fn is_dynamic(&self) -> bool {
        matches!(self.kind, ContainerKind::Dynamic { .. })
    }

    /// The VHD footer, absent for raw images
    pub fn footer(&self) -> Option<&VhdFooter> {
        self.footer.as_ref()
    }

    /// The dynamic header, present only for dynamic VHDs
    pub fn dynamic_header(&self) -> Option<&VhdDynamicHeader> {
        self.dynamic_header.as_ref()
    }

    /// The BAT, present only for dynamic VHDs
    pub fn bat(&self) -> Option<&BlockAllocationTable> {
        match &self.kind {
            ContainerKind::Dynamic { bat } => Some(bat),
            _ => None,
        }
    }
}

impl ReadAt for Container {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        match &self.kind {
            ContainerKind::Dynamic { bat } => {
                let mut copied = 0;
                let mut pos = offset;

                while copied < buf.len() {
                    let block_index = bat.block_of(pos);
                    let block_offset = bat.offset_in_block(pos);
                    if block_index >= bat.len() {
                        // Past the last mapped block; report what we have
                        return Ok(copied);
                    }

                    let in_block = (bat.block_size() as u64 - block_offset) as usize;
                    let to_read = (buf.len() - copied).min(in_block);
                    let chunk = &mut buf[copied..copied + to_read];

                    match bat.block_offset(block_index) {
                        Some(physical) => {
                            read_full_at(&mut self.file, physical + block_offset, chunk)?;
                        }
                        None => chunk.fill(0),
                    }

                    copied += to_read;
                    pos += to_read as u64;
                }
                Ok(copied)
            }
            ContainerKind::Fixed | ContainerKind::Raw => {
                if offset >= self.length {
                    return Ok(0);
                }
                let want = ((self.length - offset).min(buf.len() as u64)) as usize;
                read_full_at(&mut self.file, offset, &mut buf[..want])
            }
        }
    }
}

/// Positional read that retries until `buf` is full or the file ends.
/// Returns the byte count actually read.
fn read_full_at(file: &mut File, offset: u64, buf: &mut [u8]) -> Result<usize> {
    file.seek(SeekFrom::Start(offset))?;
    let mut total = 0;
    while total < buf.len() {
        let n = file.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

/// Look for a VHD footer at the tail of the file, then at the head.
fn probe_footer(file: &mut File, file_size: u64) -> Option<VhdFooter> {
    if file_size < VhdFooter::SIZE as u64 {
        return None;
    }
    for offset in [file_size - VhdFooter::SIZE as u64, 0] {
        let mut bytes = [0u8; VhdFooter::SIZE];
        if file.seek(SeekFrom::Start(offset)).is_err() {
            continue;
        }
        if file.read_exact(&mut bytes).is_err() {
            continue;
        }
        if let Ok(footer) = VhdFooter::parse(&bytes) {
            return Some(footer);
        }
    }
    None
}

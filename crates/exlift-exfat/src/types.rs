//! On-disk exFAT structures
//!
//! Everything here is little-endian, unlike the big-endian VHD container
//! around it. All records are read-only views produced during parsing.

use chrono::{NaiveDate, NaiveDateTime};
use exlift_core::{Error, Result};

fn le_u16(b: &[u8], o: usize) -> u16 {
    u16::from_le_bytes([b[o], b[o + 1]])
}

fn le_u32(b: &[u8], o: usize) -> u32 {
    u32::from_le_bytes([b[o], b[o + 1], b[o + 2], b[o + 3]])
}

fn le_u64(b: &[u8], o: usize) -> u64 {
    u64::from_le_bytes([
        b[o],
        b[o + 1],
        b[o + 2],
        b[o + 3],
        b[o + 4],
        b[o + 5],
        b[o + 6],
        b[o + 7],
    ])
}

/// Special FAT values and cluster-number bounds
pub mod cluster {
    /// Free cluster marker in the FAT
    pub const FREE: u32 = 0x0000_0000;
    /// Bad cluster marker
    pub const BAD: u32 = 0xFFFF_FFF7;
    /// First of the reserved values; everything from here up is unusable
    pub const RESERVED: u32 = 0xFFFF_FFF8;
    /// End-of-chain marker
    pub const END_OF_CHAIN: u32 = 0xFFFF_FFFF;
    /// Sanity ceiling on cluster numbers; larger values are treated as
    /// corruption rather than addresses
    pub const MAX_SANE: u32 = 0x1000_0000;

    /// True for end-of-chain and the other reserved values
    pub fn is_reserved(value: u32) -> bool {
        value >= RESERVED
    }

    /// True when the value can point at cluster data
    pub fn is_addressable(value: u32) -> bool {
        (2..=MAX_SANE).contains(&value)
    }
}

/// exFAT boot sector (512 bytes)
#[derive(Debug, Clone)]
pub struct BootSector {
    pub jmp_boot: [u8; 3],
    pub fs_name: [u8; 8],
    /// Sector offset of this partition on its parent disk
    pub partition_offset: u64,
    /// Volume length in sectors
    pub volume_length: u64,
    /// FAT start, in sectors from the volume start
    pub fat_offset: u32,
    /// FAT length in sectors
    pub fat_length: u32,
    /// Cluster heap start, in sectors from the volume start
    pub cluster_heap_offset: u32,
    /// Number of clusters in the heap
    pub cluster_count: u32,
    /// First cluster of the root directory
    pub first_cluster_of_root: u32,
    pub volume_serial: u32,
    pub fs_revision: u16,
    pub volume_flags: u16,
    /// Log2 of bytes per sector
    pub bytes_per_sector_shift: u8,
    /// Log2 of sectors per cluster
    pub sectors_per_cluster_shift: u8,
    pub number_of_fats: u8,
    pub drive_select: u8,
    pub percent_in_use: u8,
    pub boot_signature: u16,
}

impl BootSector {
    /// Filesystem name at bytes 3..11
    pub const SIGNATURE: &'static [u8; 8] = b"EXFAT   ";

    /// Boot sector size
    pub const SIZE: usize = 512;

    /// Parse a boot sector, verifying the filesystem signature.
    ///
    /// Only the signature is validated; images without the 0x55AA boot
    /// marker still mount, matching the containers this tool pairs with.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(Error::not_exfat("boot sector too small"));
        }

        let mut jmp_boot = [0u8; 3];
        jmp_boot.copy_from_slice(&bytes[0..3]);
        let mut fs_name = [0u8; 8];
        fs_name.copy_from_slice(&bytes[3..11]);

        if &fs_name != Self::SIGNATURE {
            return Err(Error::not_exfat(format!(
                "signature mismatch: expected 'EXFAT   ', got '{}'",
                String::from_utf8_lossy(&fs_name)
            )));
        }

        Ok(Self {
            jmp_boot,
            fs_name,
            partition_offset: le_u64(bytes, 64),
            volume_length: le_u64(bytes, 72),
            fat_offset: le_u32(bytes, 80),
            fat_length: le_u32(bytes, 84),
            cluster_heap_offset: le_u32(bytes, 88),
            cluster_count: le_u32(bytes, 92),
            first_cluster_of_root: le_u32(bytes, 96),
            volume_serial: le_u32(bytes, 100),
            fs_revision: le_u16(bytes, 104),
            volume_flags: le_u16(bytes, 106),
            bytes_per_sector_shift: bytes[108],
            sectors_per_cluster_shift: bytes[109],
            number_of_fats: bytes[110],
            drive_select: bytes[111],
            percent_in_use: bytes[112],
            boot_signature: le_u16(bytes, 510),
        })
    }

    /// Bytes per sector
    pub fn bytes_per_sector(&self) -> u32 {
        1 << self.bytes_per_sector_shift
    }

    /// Sectors per cluster
    pub fn sectors_per_cluster(&self) -> u32 {
        1 << self.sectors_per_cluster_shift
    }

    /// Bytes per cluster
    pub fn bytes_per_cluster(&self) -> u32 {
        self.bytes_per_sector() * self.sectors_per_cluster()
    }
}

/// Directory slot types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    /// Unused slot; ends the directory
    EndOfDirectory,
    /// Allocation bitmap (0x81)
    AllocationBitmap,
    /// Upcase table (0x82)
    UpcaseTable,
    /// Volume label (0x83)
    VolumeLabel,
    /// File or directory entry (0x85), opens an entry set
    File,
    /// Stream extension (0xC0), second slot of an entry set
    StreamExtension,
    /// File name fragment (0xC1)
    FileName,
    /// Anything else, including deleted entries
    Other(u8),
}

impl EntryType {
    /// Classify a slot's first byte
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => EntryType::EndOfDirectory,
            0x81 => EntryType::AllocationBitmap,
            0x82 => EntryType::UpcaseTable,
            0x83 => EntryType::VolumeLabel,
            0x85 => EntryType::File,
            0xC0 => EntryType::StreamExtension,
            0xC1 => EntryType::FileName,
            other => EntryType::Other(other),
        }
    }
}

/// FileAttributes field of a file entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileAttributes(pub u16);

impl FileAttributes {
    pub const READ_ONLY: u16 = 0x01;
    pub const HIDDEN: u16 = 0x02;
    pub const SYSTEM: u16 = 0x04;
    pub const DIRECTORY: u16 = 0x10;
    pub const ARCHIVE: u16 = 0x20;

    pub fn is_directory(&self) -> bool {
        (self.0 & Self::DIRECTORY) != 0
    }

    pub fn is_read_only(&self) -> bool {
        (self.0 & Self::READ_ONLY) != 0
    }

    pub fn is_hidden(&self) -> bool {
        (self.0 & Self::HIDDEN) != 0
    }
}

/// File entry (0x85), the primary slot of a directory entry set
#[derive(Debug, Clone)]
pub struct FileDirectoryEntry {
    pub entry_type: u8,
    /// Number of secondary slots following this one (stream + names)
    pub secondary_count: u8,
    pub set_checksum: u16,
    pub attributes: FileAttributes,
    pub create_timestamp: u32,
    pub modified_timestamp: u32,
    pub accessed_timestamp: u32,
    pub create_10ms: u8,
    pub modified_10ms: u8,
    pub create_utc_offset: u8,
    pub modified_utc_offset: u8,
    pub accessed_utc_offset: u8,
}

impl FileDirectoryEntry {
    /// Directory slot size
    pub const SIZE: usize = 32;

    /// Parse a file entry slot
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(Error::not_exfat("file entry slot too small"));
        }

        Ok(Self {
            entry_type: bytes[0],
            secondary_count: bytes[1],
            set_checksum: le_u16(bytes, 2),
            attributes: FileAttributes(le_u16(bytes, 4)),
            create_timestamp: le_u32(bytes, 8),
            modified_timestamp: le_u32(bytes, 12),
            accessed_timestamp: le_u32(bytes, 16),
            create_10ms: bytes[20],
            modified_10ms: bytes[21],
            create_utc_offset: bytes[22],
            modified_utc_offset: bytes[23],
            accessed_utc_offset: bytes[24],
        })
    }
}

/// Stream extension (0xC0), the second slot of a directory entry set
#[derive(Debug, Clone)]
pub struct StreamExtensionEntry {
    pub entry_type: u8,
    pub general_secondary_flags: u8,
    /// Name length in UTF-16 code units
    pub name_length: u8,
    pub name_hash: u16,
    pub valid_data_length: u64,
    pub first_cluster: u32,
    pub data_length: u64,
}

impl StreamExtensionEntry {
    /// Directory slot size
    pub const SIZE: usize = 32;

    /// Parse a stream extension slot
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(Error::not_exfat("stream extension slot too small"));
        }

        Ok(Self {
            entry_type: bytes[0],
            general_secondary_flags: bytes[1],
            name_length: bytes[3],
            name_hash: le_u16(bytes, 4),
            valid_data_length: le_u64(bytes, 8),
            first_cluster: le_u32(bytes, 20),
            data_length: le_u64(bytes, 24),
        })
    }

    /// Bit 1 of the flags: clusters are contiguous, the FAT holds no chain
    /// for this stream.
    pub fn no_fat_chain(&self) -> bool {
        (self.general_secondary_flags & 0x02) != 0
    }
}

/// File name fragment (0xC1): 15 UTF-16LE code units per slot
#[derive(Debug, Clone)]
pub struct FileNameEntry {
    pub entry_type: u8,
    pub general_secondary_flags: u8,
    pub units: [u16; 15],
}

impl FileNameEntry {
    /// Directory slot size
    pub const SIZE: usize = 32;

    /// UTF-16 code units carried per slot
    pub const UNITS: usize = 15;

    /// Parse a file name slot
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(Error::not_exfat("file name slot too small"));
        }

        let mut units = [0u16; Self::UNITS];
        for (i, unit) in units.iter_mut().enumerate() {
            *unit = le_u16(bytes, 2 + i * 2);
        }

        Ok(Self {
            entry_type: bytes[0],
            general_secondary_flags: bytes[1],
            units,
        })
    }
}

/// A fully assembled directory entry with its starting cluster.
///
/// This is the resolver's working record; listings convert it to
/// [`exlift_core::FileEntry`], which does not expose the cluster.
#[derive(Debug, Clone)]
pub struct ResolvedEntry {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
    pub mtime: Option<NaiveDateTime>,
    /// First data cluster; 0 for empty directories and empty files
    pub first_cluster: u32,
}

impl ResolvedEntry {
    /// Strip the cluster for external consumption
    pub fn to_file_entry(&self) -> exlift_core::FileEntry {
        exlift_core::FileEntry {
            name: self.name.clone(),
            size: self.size,
            is_dir: self.is_dir,
            mtime: self.mtime,
        }
    }
}

/// Decode an exFAT timestamp into civil time.
///
/// Layout: date in the high 16 bits (`year-1980:7 | month:4 | day:5`), time
/// in the low 16 (`hour:5 | minute:6 | second/2:5`). Returns `None` for the
/// null timestamp and for any out-of-range or calendar-invalid combination.
/// The 10 ms increment and UTC offset fields are ignored; the result is
/// naive local time.
pub fn decode_timestamp(ts: u32) -> Option<NaiveDateTime> {
    if ts == 0 {
        return None;
    }

    let date = ts >> 16;
    let time = ts & 0xFFFF;

    let year = ((date >> 9) & 0x7F) as i32 + 1980;
    let month = (date >> 5) & 0x0F;
    let day = date & 0x1F;
    let hour = (time >> 11) & 0x1F;
    let minute = (time >> 5) & 0x3F;
    let second = (time & 0x1F) * 2;

    if !(1..=12).contains(&month)
        || !(1..=31).contains(&day)
        || hour > 23
        || minute > 59
        || second > 59
    {
        return None;
    }

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

/// Pack civil time into an exFAT timestamp. Test helper for building
/// synthetic directory entries.
#[cfg(test)]
pub fn encode_timestamp(
    year: u32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> u32 {
    let date = ((year - 1980) << 9) | (month << 5) | day;
    let time = (hour << 11) | (minute << 5) | (second / 2);
    (date << 16) | time
}

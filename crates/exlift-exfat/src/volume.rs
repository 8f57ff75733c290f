//! exFAT volume operations: mount, directory walks, path resolution and
//! cluster-chain reads
//!
//! The volume holds only parsed metadata (boot geometry and the FAT). Every
//! operation borrows the image source; the volume never owns it.

use crate::types::{
    cluster, decode_timestamp, BootSector, EntryType, FileDirectoryEntry, FileNameEntry,
    ResolvedEntry, StreamExtensionEntry,
};
use exlift_core::{Error, FileEntry, ReadAt, Result};
use log::{debug, warn};

/// Directory reads are bounded to this many clusters per directory.
const MAX_DIR_CLUSTERS: u64 = 16;

/// Normalize an in-image path: backslashes become forward slashes and a
/// leading slash is ensured. Idempotent; `""` and `"/"` both name the root.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    if path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    }
}

/// A mounted exFAT filesystem
#[derive(Debug)]
pub struct ExfatVolume {
    boot: BootSector,
    bytes_per_cluster: u32,
    cluster_heap_start: u64,
    total_clusters: u32,
    root_cluster: u32,
    fat: Vec<u32>,
}

impl ExfatVolume {
    /// Mount a volume from a logical disk: parse the boot sector and load
    /// the FAT.
    ///
    /// # Errors
    ///
    /// `NotExFat` when the boot signature is missing, `Io` when the boot
    /// sector or FAT cannot be read in full.
    pub fn mount<R: ReadAt>(source: &mut R) -> Result<Self> {
        let mut boot_bytes = [0u8; BootSector::SIZE];
        source.read_exact_at(&mut boot_bytes, 0)?;
        let boot = BootSector::parse(&boot_bytes)?;

        let bytes_per_sector = boot.bytes_per_sector() as u64;
        let fat_offset = boot.fat_offset as u64 * bytes_per_sector;
        let fat_size = boot.fat_length as u64 * bytes_per_sector;

        let mut fat_bytes = vec![0u8; fat_size as usize];
        source.read_exact_at(&mut fat_bytes, fat_offset)?;
        let fat: Vec<u32> = fat_bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        debug!(
            "mounted exFAT: {} clusters of {} bytes, root at cluster {}",
            boot.cluster_count,
            boot.bytes_per_cluster(),
            boot.first_cluster_of_root
        );

        Ok(Self {
            bytes_per_cluster: boot.bytes_per_cluster(),
            cluster_heap_start: boot.cluster_heap_offset as u64 * bytes_per_sector,
            total_clusters: boot.cluster_count,
            root_cluster: boot.first_cluster_of_root,
            fat,
            boot,
        })
    }

    /// The parsed boot sector
    pub fn boot_sector(&self) -> &BootSector {
        &self.boot
    }

    /// Allocation unit size in bytes
    pub fn bytes_per_cluster(&self) -> u32 {
        self.bytes_per_cluster
    }

    /// Number of clusters in the heap
    pub fn cluster_count(&self) -> u32 {
        self.total_clusters
    }

    /// First cluster of the root directory
    pub fn root_cluster(&self) -> u32 {
        self.root_cluster
    }

    /// Byte offset of a cluster in the heap. Callers validate `c >= 2`.
    fn cluster_to_offset(&self, c: u32) -> u64 {
        if c < 2 {
            return 0;
        }
        self.cluster_heap_start + (c - 2) as u64 * self.bytes_per_cluster as u64
    }

    /// Successor of `c` in a data chain.
    ///
    /// When the FAT holds no usable entry for `c` (out of bounds,
    /// end-of-chain, reserved, below 2 or above the sanity ceiling) the
    /// successor is `c + 1`. That contiguous fallback makes NoFatChain
    /// streams read correctly without consulting the flag; chain reads are
    /// bounded by stream size and cluster count, so stray fallthroughs
    /// cannot run away.
    fn next_cluster(&self, c: u32) -> u32 {
        let Some(&next) = self.fat.get(c as usize) else {
            return c + 1;
        };
        if cluster::is_reserved(next) || !cluster::is_addressable(next) {
            c + 1
        } else {
            next
        }
    }

    /// Read up to `size` bytes of the chain starting at `start_cluster`.
    ///
    /// The result is always exactly `size` bytes; if the chain ends before
    /// `size` is reached the tail stays zeroed. Zero-size reads succeed
    /// before any cluster validation, since empty files carry cluster 0.
    pub fn read_cluster_chain<R: ReadAt>(
        &self,
        source: &mut R,
        start_cluster: u32,
        size: u64,
    ) -> Result<Vec<u8>> {
        if size == 0 {
            return Ok(Vec::new());
        }
        if start_cluster == 0 || cluster::is_reserved(start_cluster) {
            return Err(Error::InvalidCluster(start_cluster));
        }

        let mut data = vec![0u8; size as usize];
        let mut filled = 0usize;
        let mut current = start_cluster;

        loop {
            let to_read = (self.bytes_per_cluster as usize).min(data.len() - filled);
            let offset = self.cluster_to_offset(current);
            source.read_exact_at(&mut data[filled..filled + to_read], offset)?;
            filled += to_read;
            if filled >= data.len() {
                break;
            }

            current = self.next_cluster(current);
            if current >= self.total_clusters {
                break;
            }
        }

        Ok(data)
    }

    /// Parse one directory's entry sets into resolved entries.
    ///
    /// Null and implausible directory clusters yield an empty listing
    /// rather than an error; empty subdirectories are stored that way.
    fn read_directory_entries<R: ReadAt>(
        &self,
        source: &mut R,
        dir_cluster: u32,
    ) -> Result<Vec<ResolvedEntry>> {
        if dir_cluster == 0
            || cluster::is_reserved(dir_cluster)
            || dir_cluster > cluster::MAX_SANE
        {
            return Ok(Vec::new());
        }

        let budget = self.bytes_per_cluster as u64 * MAX_DIR_CLUSTERS;
        let dir_data = self.read_cluster_chain(source, dir_cluster, budget)?;

        let mut entries = Vec::new();
        let mut at = 0usize;

        while at + 32 <= dir_data.len() {
            match EntryType::from_byte(dir_data[at]) {
                EntryType::EndOfDirectory => break,
                EntryType::File => {
                    let file_entry = FileDirectoryEntry::parse(&dir_data[at..at + 32])?;
                    let set_len = 32 * (file_entry.secondary_count as usize + 1);

                    // A set needs at least a stream extension and one name
                    // slot, all within the directory buffer.
                    if file_entry.secondary_count < 2 || at + set_len > dir_data.len() {
                        at += 32;
                        continue;
                    }
                    if EntryType::from_byte(dir_data[at + 32]) != EntryType::StreamExtension {
                        at += 32;
                        continue;
                    }
                    let stream = StreamExtensionEntry::parse(&dir_data[at + 32..at + 64])?;

                    let name = assemble_name(
                        &dir_data[at..at + set_len],
                        file_entry.secondary_count,
                        stream.name_length,
                    );
                    at += set_len;

                    if name.is_empty() {
                        continue;
                    }

                    let is_dir = file_entry.attributes.is_directory();
                    let mut first_cluster = stream.first_cluster;
                    if is_dir && (first_cluster == 0 || cluster::is_reserved(first_cluster)) {
                        // Empty directory; keep it visible but unreadable
                        first_cluster = 0;
                    }
                    if first_cluster > cluster::MAX_SANE {
                        if is_dir {
                            first_cluster = 0;
                        } else {
                            warn!(
                                "dropping '{}': implausible first cluster {:#x}",
                                name, first_cluster
                            );
                            continue;
                        }
                    }

                    entries.push(ResolvedEntry {
                        name,
                        size: stream.data_length,
                        is_dir,
                        mtime: decode_timestamp(file_entry.modified_timestamp),
                        first_cluster,
                    });
                }
                _ => at += 32,
            }
        }

        Ok(entries)
    }

    /// Resolve a path to its directory entry.
    ///
    /// Matching is ASCII-case-insensitive. The root resolves to a synthetic
    /// entry named `/`.
    ///
    /// # Errors
    ///
    /// `PathNotFound` when a segment has no match, `NotADirectory` when a
    /// non-final segment names a file.
    pub fn resolve<R: ReadAt>(&self, source: &mut R, path: &str) -> Result<ResolvedEntry> {
        let normalized = normalize_path(path);
        let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();

        if segments.is_empty() {
            return Ok(ResolvedEntry {
                name: "/".to_string(),
                size: 0,
                is_dir: true,
                mtime: None,
                first_cluster: self.root_cluster,
            });
        }

        let mut current = self.root_cluster;
        for (i, segment) in segments.iter().enumerate() {
            let entries = self.read_directory_entries(source, current)?;
            match entries
                .into_iter()
                .find(|e| e.name.eq_ignore_ascii_case(segment))
            {
                Some(entry) => {
                    if i == segments.len() - 1 {
                        return Ok(entry);
                    }
                    if !entry.is_dir {
                        return Err(Error::not_a_directory(normalized));
                    }
                    current = entry.first_cluster;
                }
                None => return Err(Error::path_not_found(normalized)),
            }
        }

        Err(Error::path_not_found(normalized))
    }

    /// List the direct children of a directory.
    ///
    /// # Errors
    ///
    /// `NotADirectory` when the path names a file, plus anything
    /// [`ExfatVolume::resolve`] returns.
    pub fn list_dir<R: ReadAt>(&self, source: &mut R, path: &str) -> Result<Vec<FileEntry>> {
        let normalized = normalize_path(path);
        let dir_cluster = if normalized == "/" {
            self.root_cluster
        } else {
            let entry = self.resolve(source, &normalized)?;
            if !entry.is_dir {
                return Err(Error::not_a_directory(normalized));
            }
            entry.first_cluster
        };

        let entries = self.read_directory_entries(source, dir_cluster)?;
        Ok(entries.iter().map(ResolvedEntry::to_file_entry).collect())
    }

    /// Read a file's full contents.
    ///
    /// # Errors
    ///
    /// `IsDirectory` when the path names a directory, plus anything
    /// [`ExfatVolume::resolve`] returns.
    pub fn read_file<R: ReadAt>(&self, source: &mut R, path: &str) -> Result<Vec<u8>> {
        let entry = self.resolve(source, path)?;
        if entry.is_dir {
            return Err(Error::is_directory(normalize_path(path)));
        }
        self.read_cluster_chain(source, entry.first_cluster, entry.size)
    }
}

/// Concatenate the 0xC1 fragments of one entry set into a file name.
///
/// Collects UTF-16 units until `name_length` is covered, truncates to
/// exactly `name_length` units, then decodes and strips trailing NULs.
fn assemble_name(set: &[u8], secondary_count: u8, name_length: u8) -> String {
    let name_length = name_length as usize;
    let mut units: Vec<u16> = Vec::with_capacity(name_length);

    for slot in 2..=secondary_count as usize {
        let at = slot * 32;
        if EntryType::from_byte(set[at]) != EntryType::FileName {
            continue;
        }
        if let Ok(fragment) = FileNameEntry::parse(&set[at..at + 32]) {
            units.extend_from_slice(&fragment.units);
        }
        if units.len() >= name_length {
            break;
        }
    }

    units.truncate(name_length);
    let name = String::from_utf16_lossy(&units);
    name.trim_end_matches('\u{0}').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::encode_timestamp;
    use chrono::NaiveDate;
    use std::io::Cursor;

    // Fixture geometry: 512-byte sectors, 4096-byte clusters, FAT at
    // sector 24, heap at sector 40, 128 clusters, root at cluster 4.
    const BYTES_PER_CLUSTER: usize = 4096;
    const CLUSTER_COUNT: u32 = 128;
    const FAT_START: usize = 24 * 512;
    const HEAP_START: usize = 40 * 512;
    const ROOT_CLUSTER: u32 = 4;

    struct ImageBuilder {
        image: Vec<u8>,
    }

    impl ImageBuilder {
        fn new() -> Self {
            let mut image = vec![0u8; HEAP_START + CLUSTER_COUNT as usize * BYTES_PER_CLUSTER];
            image[3..11].copy_from_slice(b"EXFAT   ");
            image[80..84].copy_from_slice(&24u32.to_le_bytes());
            image[84..88].copy_from_slice(&8u32.to_le_bytes());
            image[88..92].copy_from_slice(&40u32.to_le_bytes());
            image[92..96].copy_from_slice(&CLUSTER_COUNT.to_le_bytes());
            image[96..100].copy_from_slice(&ROOT_CLUSTER.to_le_bytes());
            image[100..104].copy_from_slice(&0x1234_5678u32.to_le_bytes());
            image[108] = 9;
            image[109] = 3;
            image[110] = 1;
            image[510] = 0x55;
            image[511] = 0xAA;
            Self { image }
        }

        fn set_fat(&mut self, cluster: u32, value: u32) {
            let at = FAT_START + cluster as usize * 4;
            self.image[at..at + 4].copy_from_slice(&value.to_le_bytes());
        }

        fn write_cluster(&mut self, cluster: u32, data: &[u8]) {
            let at = HEAP_START + (cluster as usize - 2) * BYTES_PER_CLUSTER;
            self.image[at..at + data.len()].copy_from_slice(data);
        }

        fn build(self) -> Cursor<Vec<u8>> {
            Cursor::new(self.image)
        }
    }

    /// Build one 0x85 + 0xC0 + 0xC1... entry set.
    fn entry_set(
        name: &str,
        attributes: u16,
        flags: u8,
        first_cluster: u32,
        size: u64,
        mtime: u32,
    ) -> Vec<u8> {
        let units: Vec<u16> = name.encode_utf16().collect();
        let name_slots = units.len().div_ceil(15).max(1);

        let mut file = [0u8; 32];
        file[0] = 0x85;
        file[1] = (1 + name_slots) as u8;
        file[4..6].copy_from_slice(&attributes.to_le_bytes());
        file[12..16].copy_from_slice(&mtime.to_le_bytes());

        let mut stream = [0u8; 32];
        stream[0] = 0xC0;
        stream[1] = flags;
        stream[3] = units.len() as u8;
        stream[8..16].copy_from_slice(&size.to_le_bytes());
        stream[20..24].copy_from_slice(&first_cluster.to_le_bytes());
        stream[24..32].copy_from_slice(&size.to_le_bytes());

        let mut set = Vec::new();
        set.extend_from_slice(&file);
        set.extend_from_slice(&stream);
        for slot in 0..name_slots {
            let mut name_entry = [0u8; 32];
            name_entry[0] = 0xC1;
            for (i, &unit) in units.iter().skip(slot * 15).take(15).enumerate() {
                name_entry[2 + i * 2..4 + i * 2].copy_from_slice(&unit.to_le_bytes());
            }
            set.extend_from_slice(&name_entry);
        }
        set
    }

    fn file_set(name: &str, first_cluster: u32, size: u64) -> Vec<u8> {
        entry_set(name, 0x20, 0x01, first_cluster, size, 0)
    }

    fn dir_set(name: &str, first_cluster: u32) -> Vec<u8> {
        entry_set(name, 0x10, 0x01, first_cluster, 0, 0)
    }

    /// The seed volume used by most tests:
    ///
    /// ```text
    /// /HELLO.TXT            13 bytes, "Hello, world!", cluster 8
    /// /日本語テスト.bin     1 byte, cluster 9
    /// /EMPTY                directory with first cluster 0
    /// /DOCS                 directory at cluster 10
    /// /DOCS/NOTES.TXT       5 bytes, "notes", cluster 11
    /// ```
    fn seed_volume() -> Cursor<Vec<u8>> {
        let mut builder = ImageBuilder::new();

        let mut root = Vec::new();
        root.extend(file_set("HELLO.TXT", 8, 13));
        root.extend(file_set("日本語テスト.bin", 9, 1));
        root.extend(dir_set("EMPTY", 0));
        root.extend(dir_set("DOCS", 10));
        builder.write_cluster(ROOT_CLUSTER, &root);
        builder.set_fat(ROOT_CLUSTER, cluster::END_OF_CHAIN);

        builder.write_cluster(8, b"Hello, world!");
        builder.set_fat(8, cluster::END_OF_CHAIN);

        builder.write_cluster(9, &[0x42]);
        builder.set_fat(9, cluster::END_OF_CHAIN);

        builder.write_cluster(10, &file_set("NOTES.TXT", 11, 5));
        builder.set_fat(10, cluster::END_OF_CHAIN);

        builder.write_cluster(11, b"notes");
        builder.set_fat(11, cluster::END_OF_CHAIN);

        builder.build()
    }

    #[test]
    fn test_mount_geometry() {
        let mut image = seed_volume();
        let volume = ExfatVolume::mount(&mut image).unwrap();

        assert_eq!(volume.bytes_per_cluster(), 4096);
        assert_eq!(volume.cluster_count(), CLUSTER_COUNT);
        assert_eq!(volume.root_cluster(), ROOT_CLUSTER);
        assert_eq!(volume.boot_sector().volume_serial, 0x1234_5678);
        assert_eq!(volume.fat.len(), 8 * 512 / 4);
    }

    #[test]
    fn test_mount_rejects_non_exfat() {
        let mut image = Cursor::new(vec![0u8; 4096]);
        let err = ExfatVolume::mount(&mut image).unwrap_err();
        assert!(matches!(err, Error::NotExFat(_)));
    }

    #[test]
    fn test_read_file_in_root() {
        let mut image = seed_volume();
        let volume = ExfatVolume::mount(&mut image).unwrap();

        let data = volume.read_file(&mut image, "/HELLO.TXT").unwrap();
        assert_eq!(data, b"Hello, world!");
    }

    #[test]
    fn test_resolution_is_ascii_case_insensitive() {
        let mut image = seed_volume();
        let volume = ExfatVolume::mount(&mut image).unwrap();

        for path in ["/hello.txt", "/Hello.Txt", "hello.TXT"] {
            let data = volume.read_file(&mut image, path).unwrap();
            assert_eq!(data, b"Hello, world!", "path {:?}", path);
        }
    }

    #[test]
    fn test_unicode_name_listing_and_read() {
        let mut image = seed_volume();
        let volume = ExfatVolume::mount(&mut image).unwrap();

        let entries = volume.list_dir(&mut image, "/").unwrap();
        assert!(entries.iter().any(|e| e.name == "日本語テスト.bin"));

        let data = volume.read_file(&mut image, "/日本語テスト.bin").unwrap();
        assert_eq!(data, &[0x42]);
    }

    #[test]
    fn test_root_listing() {
        let mut image = seed_volume();
        let volume = ExfatVolume::mount(&mut image).unwrap();

        let entries = volume.list_dir(&mut image, "/").unwrap();
        assert_eq!(entries.len(), 4);
        assert!(entries.iter().all(|e| !e.name.is_empty()));

        let hello = entries.iter().find(|e| e.name == "HELLO.TXT").unwrap();
        assert!(!hello.is_dir);
        assert_eq!(hello.size, 13);

        let docs = entries.iter().find(|e| e.name == "DOCS").unwrap();
        assert!(docs.is_dir);
    }

    #[test]
    fn test_subdirectory_resolution() {
        let mut image = seed_volume();
        let volume = ExfatVolume::mount(&mut image).unwrap();

        let entries = volume.list_dir(&mut image, "/docs").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "NOTES.TXT");

        let data = volume.read_file(&mut image, "/DOCS/notes.txt").unwrap();
        assert_eq!(data, b"notes");
    }

    #[test]
    fn test_read_matches_resolved_size() {
        let mut image = seed_volume();
        let volume = ExfatVolume::mount(&mut image).unwrap();

        for path in ["/HELLO.TXT", "/日本語テスト.bin", "/DOCS/NOTES.TXT"] {
            let entry = volume.resolve(&mut image, path).unwrap();
            let data = volume.read_file(&mut image, path).unwrap();
            assert_eq!(data.len() as u64, entry.size, "path {:?}", path);
        }
    }

    #[test]
    fn test_empty_directory_with_null_cluster() {
        let mut image = seed_volume();
        let volume = ExfatVolume::mount(&mut image).unwrap();

        let entries = volume.list_dir(&mut image, "/EMPTY").unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_root_resolves_to_synthetic_entry() {
        let mut image = seed_volume();
        let volume = ExfatVolume::mount(&mut image).unwrap();

        for path in ["/", ""] {
            let root = volume.resolve(&mut image, path).unwrap();
            assert_eq!(root.name, "/");
            assert!(root.is_dir);
            assert_eq!(root.first_cluster, ROOT_CLUSTER);
        }
    }

    #[test]
    fn test_path_errors() {
        let mut image = seed_volume();
        let volume = ExfatVolume::mount(&mut image).unwrap();

        let err = volume.read_file(&mut image, "/MISSING.TXT").unwrap_err();
        assert!(matches!(err, Error::PathNotFound(_)));

        let err = volume.read_file(&mut image, "/DOCS").unwrap_err();
        assert!(matches!(err, Error::IsDirectory(_)));

        let err = volume.list_dir(&mut image, "/HELLO.TXT").unwrap_err();
        assert!(matches!(err, Error::NotADirectory(_)));

        // A file in the middle of a path cannot be descended into.
        let err = volume.resolve(&mut image, "/HELLO.TXT/X").unwrap_err();
        assert!(matches!(err, Error::NotADirectory(_)));
    }

    #[test]
    fn test_backslash_paths() {
        let mut image = seed_volume();
        let volume = ExfatVolume::mount(&mut image).unwrap();

        let data = volume.read_file(&mut image, "\\DOCS\\NOTES.TXT").unwrap();
        assert_eq!(data, b"notes");
    }

    #[test]
    fn test_multi_cluster_fat_chain() {
        let mut builder = ImageBuilder::new();

        // Three clusters deliberately out of order: 20 -> 22 -> 21.
        let size = 2 * BYTES_PER_CLUSTER + 100;
        let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        builder.write_cluster(20, &data[..BYTES_PER_CLUSTER]);
        builder.write_cluster(22, &data[BYTES_PER_CLUSTER..2 * BYTES_PER_CLUSTER]);
        builder.write_cluster(21, &data[2 * BYTES_PER_CLUSTER..]);
        builder.set_fat(20, 22);
        builder.set_fat(22, 21);
        builder.set_fat(21, cluster::END_OF_CHAIN);

        builder.write_cluster(ROOT_CLUSTER, &file_set("BIG.BIN", 20, size as u64));

        let mut image = builder.build();
        let volume = ExfatVolume::mount(&mut image).unwrap();

        let read = volume.read_file(&mut image, "/BIG.BIN").unwrap();
        assert_eq!(read.len(), size);
        assert_eq!(read, data);
    }

    #[test]
    fn test_no_fat_chain_contiguous_file() {
        let mut builder = ImageBuilder::new();

        // Contiguous clusters 30..=32 with zeroed FAT entries; only the
        // NoFatChain flag and the c+1 fallback make this readable.
        let size = 2 * BYTES_PER_CLUSTER + 512;
        let data: Vec<u8> = (0..size).map(|i| (i % 253) as u8).collect();
        builder.write_cluster(30, &data[..BYTES_PER_CLUSTER]);
        builder.write_cluster(31, &data[BYTES_PER_CLUSTER..2 * BYTES_PER_CLUSTER]);
        builder.write_cluster(32, &data[2 * BYTES_PER_CLUSTER..]);

        let mut root = Vec::new();
        root.extend(entry_set("FLAT.BIN", 0x20, 0x03, 30, size as u64, 0));
        builder.write_cluster(ROOT_CLUSTER, &root);

        let mut image = builder.build();
        let volume = ExfatVolume::mount(&mut image).unwrap();

        let read = volume.read_file(&mut image, "/FLAT.BIN").unwrap();
        assert_eq!(read, data);
    }

    #[test]
    fn test_long_name_spans_multiple_slots() {
        let mut builder = ImageBuilder::new();

        let name = "a-rather-long-file-name-over-15-units.txt";
        assert!(name.encode_utf16().count() > 15);
        let mut root = Vec::new();
        root.extend(file_set(name, 8, 3));
        builder.write_cluster(ROOT_CLUSTER, &root);
        builder.write_cluster(8, b"abc");

        let mut image = builder.build();
        let volume = ExfatVolume::mount(&mut image).unwrap();

        let entries = volume.list_dir(&mut image, "/").unwrap();
        assert_eq!(entries[0].name, name);
        assert_eq!(volume.read_file(&mut image, name).unwrap(), b"abc");
    }

    #[test]
    fn test_zero_size_file_with_null_cluster() {
        let mut builder = ImageBuilder::new();
        builder.write_cluster(ROOT_CLUSTER, &file_set("EMPTY.TXT", 0, 0));

        let mut image = builder.build();
        let volume = ExfatVolume::mount(&mut image).unwrap();

        let data = volume.read_file(&mut image, "/EMPTY.TXT").unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn test_implausible_cluster_validation() {
        let mut builder = ImageBuilder::new();

        let mut root = Vec::new();
        // File with an absurd cluster number: dropped from listings.
        root.extend(file_set("GHOST.BIN", 0x2000_0000, 100));
        // Directory with an absurd cluster number: kept, reads as empty.
        root.extend(dir_set("WILD", 0x2000_0000));
        // Directory with a reserved cluster: kept, reads as empty.
        root.extend(dir_set("RSVD", 0xFFFF_FFF9));
        builder.write_cluster(ROOT_CLUSTER, &root);

        let mut image = builder.build();
        let volume = ExfatVolume::mount(&mut image).unwrap();

        let entries = volume.list_dir(&mut image, "/").unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["WILD", "RSVD"]);

        assert!(volume.list_dir(&mut image, "/WILD").unwrap().is_empty());
        assert!(volume.list_dir(&mut image, "/RSVD").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_slot_types_are_skipped() {
        let mut builder = ImageBuilder::new();

        let mut root = Vec::new();
        let mut label = [0u8; 32];
        label[0] = 0x83; // volume label
        root.extend_from_slice(&label);
        let mut bitmap = [0u8; 32];
        bitmap[0] = 0x81; // allocation bitmap
        root.extend_from_slice(&bitmap);
        root.extend(file_set("DATA.BIN", 8, 4));
        builder.write_cluster(ROOT_CLUSTER, &root);
        builder.write_cluster(8, b"data");

        let mut image = builder.build();
        let volume = ExfatVolume::mount(&mut image).unwrap();

        let entries = volume.list_dir(&mut image, "/").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "DATA.BIN");
    }

    #[test]
    fn test_end_of_directory_stops_the_walk() {
        let mut builder = ImageBuilder::new();

        let mut root = Vec::new();
        root.extend(file_set("SEEN.TXT", 8, 4));
        root.extend_from_slice(&[0u8; 32]); // end marker
        root.extend(file_set("UNSEEN.TXT", 9, 4));
        builder.write_cluster(ROOT_CLUSTER, &root);
        builder.write_cluster(8, b"seen");
        builder.write_cluster(9, b"nope");

        let mut image = builder.build();
        let volume = ExfatVolume::mount(&mut image).unwrap();

        let entries = volume.list_dir(&mut image, "/").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "SEEN.TXT");
    }

    #[test]
    fn test_directory_spanning_two_clusters() {
        let mut builder = ImageBuilder::new();

        // 50 sets of 3 slots each: 4800 bytes, past one 4096-byte cluster.
        let mut dir = Vec::new();
        for i in 0..50 {
            dir.extend(file_set(&format!("FILE{:03}.BIN", i), 0, 0));
        }
        builder.write_cluster(20, &dir[..BYTES_PER_CLUSTER]);
        builder.write_cluster(21, &dir[BYTES_PER_CLUSTER..]);
        builder.set_fat(20, 21);
        builder.set_fat(21, cluster::END_OF_CHAIN);

        builder.write_cluster(ROOT_CLUSTER, &dir_set("MANY", 20));

        let mut image = builder.build();
        let volume = ExfatVolume::mount(&mut image).unwrap();

        let entries = volume.list_dir(&mut image, "/MANY").unwrap();
        assert_eq!(entries.len(), 50);
        assert_eq!(entries[0].name, "FILE000.BIN");
        assert_eq!(entries[49].name, "FILE049.BIN");
    }

    #[test]
    fn test_mtime_decoding_in_listing() {
        let mut builder = ImageBuilder::new();

        let ts = encode_timestamp(2024, 3, 9, 18, 45, 30);
        let mut root = Vec::new();
        root.extend(entry_set("DATED.TXT", 0x20, 0x01, 8, 4, ts));
        root.extend(entry_set("NULLED.TXT", 0x20, 0x01, 9, 4, 0));
        builder.write_cluster(ROOT_CLUSTER, &root);
        builder.write_cluster(8, b"tick");
        builder.write_cluster(9, b"tock");

        let mut image = builder.build();
        let volume = ExfatVolume::mount(&mut image).unwrap();

        let entries = volume.list_dir(&mut image, "/").unwrap();
        let dated = entries.iter().find(|e| e.name == "DATED.TXT").unwrap();
        assert_eq!(
            dated.mtime.unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 9)
                .unwrap()
                .and_hms_opt(18, 45, 30)
                .unwrap()
        );

        let nulled = entries.iter().find(|e| e.name == "NULLED.TXT").unwrap();
        assert!(nulled.mtime.is_none());
    }

    #[test]
    fn test_invalid_start_cluster_rejected() {
        let mut image = seed_volume();
        let volume = ExfatVolume::mount(&mut image).unwrap();

        let err = volume.read_cluster_chain(&mut image, 0, 10).unwrap_err();
        assert!(matches!(err, Error::InvalidCluster(0)));

        let err = volume
            .read_cluster_chain(&mut image, cluster::END_OF_CHAIN, 10)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCluster(_)));
    }

    #[test]
    fn test_chain_ending_early_zero_fills() {
        let mut builder = ImageBuilder::new();
        builder.write_cluster(126, &[0x11; BYTES_PER_CLUSTER]);
        builder.write_cluster(127, &[0x22; BYTES_PER_CLUSTER]);
        // FAT entries stay zero; the c+1 fallback walks off the end of the
        // cluster heap after two clusters.
        let mut image = builder.build();
        let volume = ExfatVolume::mount(&mut image).unwrap();

        let want = 3 * BYTES_PER_CLUSTER as u64;
        let data = volume.read_cluster_chain(&mut image, 126, want).unwrap();
        assert_eq!(data.len() as u64, want);
        assert!(data[..BYTES_PER_CLUSTER].iter().all(|&b| b == 0x11));
        assert!(data[BYTES_PER_CLUSTER..2 * BYTES_PER_CLUSTER]
            .iter()
            .all(|&b| b == 0x22));
        assert!(data[2 * BYTES_PER_CLUSTER..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("a/b"), "/a/b");
        assert_eq!(normalize_path("\\a\\b"), "/a/b");
        // Idempotent
        for p in ["", "/", "a/b", "\\a\\b", "/x/y/"] {
            let once = normalize_path(p);
            assert_eq!(normalize_path(&once), once);
        }
    }
}

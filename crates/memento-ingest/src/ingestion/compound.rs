//! Minimal OLE compound-file (structured storage) reader.
//!
//! Implements just enough of the MS-CFB layout for HWP 5.0 containers: header
//! validation, FAT/DIFAT assembly, the directory red-black tree flattened to
//! `Storage/Stream` paths, and stream reads through either the FAT or the
//! mini FAT depending on the stream size cutoff. Writes are not supported.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};

const SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

const ENDOFCHAIN: u32 = 0xFFFF_FFFE;
/// Largest valid sector id; anything above is a special marker
const MAXREGSECT: u32 = 0xFFFF_FFFA;
const NOSTREAM: u32 = 0xFFFF_FFFF;

const DIR_ENTRY_SIZE: usize = 128;
const MINI_SECTOR_SIZE: usize = 64;
const HEADER_DIFAT_SLOTS: usize = 109;

const TYPE_STORAGE: u8 = 1;
const TYPE_STREAM: u8 = 2;
const TYPE_ROOT: u8 = 5;

#[derive(Debug, Clone)]
struct DirEntry {
    name: String,
    object_type: u8,
    left: u32,
    right: u32,
    child: u32,
    start_sector: u32,
    size: u64,
}

/// Read-only view over an OLE compound file held in memory.
///
/// One instance is scoped to one file parse and discarded afterwards; no state
/// is shared across files.
pub struct CompoundFile {
    data: Vec<u8>,
    sector_size: usize,
    mini_cutoff: u32,
    fat: Vec<u32>,
    mini_fat: Vec<u32>,
    mini_stream: Vec<u8>,
    entries: Vec<DirEntry>,
    paths: HashMap<String, usize>,
}

impl CompoundFile {
    /// Open a compound file from raw bytes.
    ///
    /// Any structural failure (bad signature, broken chains, malformed
    /// directory) is reported as `CorruptContainer` carrying `filename`.
    pub fn open(data: &[u8], filename: &str) -> Result<Self> {
        let corrupt = |message: &str| Error::corrupt_container(filename, message);

        if data.len() < 512 {
            return Err(corrupt("file shorter than compound file header"));
        }
        if data[..8] != SIGNATURE {
            return Err(corrupt("missing OLE signature"));
        }

        let sector_shift = read_u16(data, 30);
        if sector_shift != 9 && sector_shift != 12 {
            return Err(corrupt("unsupported sector size"));
        }
        let sector_size = 1usize << sector_shift;

        let num_fat_sectors = read_u32(data, 44);
        let first_dir_sector = read_u32(data, 48);
        let mini_cutoff = read_u32(data, 56);
        let first_mini_fat = read_u32(data, 60);
        let first_difat = read_u32(data, 68);

        // FAT sector ids: 109 header DIFAT slots plus any chained DIFAT sectors
        let mut fat_sector_ids = Vec::with_capacity(num_fat_sectors as usize);
        for slot in 0..HEADER_DIFAT_SLOTS {
            let id = read_u32(data, 76 + slot * 4);
            if id <= MAXREGSECT {
                fat_sector_ids.push(id);
            }
        }
        let max_sectors = data.len() / sector_size + 1;
        let mut difat_sector = first_difat;
        let mut difat_hops = 0usize;
        while difat_sector <= MAXREGSECT {
            difat_hops += 1;
            if difat_hops > max_sectors {
                return Err(corrupt("DIFAT chain cycle"));
            }
            let sector = sector_bytes(data, sector_size, difat_sector)
                .ok_or_else(|| corrupt("DIFAT sector out of range"))?;
            let entries_per = sector_size / 4;
            for i in 0..entries_per - 1 {
                let id = read_u32(sector, i * 4);
                if id <= MAXREGSECT {
                    fat_sector_ids.push(id);
                }
            }
            difat_sector = read_u32(sector, (entries_per - 1) * 4);
        }

        let mut fat = Vec::with_capacity(fat_sector_ids.len() * (sector_size / 4));
        for id in &fat_sector_ids {
            let sector = sector_bytes(data, sector_size, *id)
                .ok_or_else(|| corrupt("FAT sector out of range"))?;
            for i in 0..sector_size / 4 {
                fat.push(read_u32(sector, i * 4));
            }
        }

        // Directory entries, following the FAT chain from the header
        let dir_sectors = follow_chain(&fat, first_dir_sector, max_sectors)
            .ok_or_else(|| corrupt("directory chain cycle"))?;
        let mut entries = Vec::new();
        for id in dir_sectors {
            let sector = sector_bytes(data, sector_size, id)
                .ok_or_else(|| corrupt("directory sector out of range"))?;
            for i in 0..sector_size / DIR_ENTRY_SIZE {
                entries.push(parse_dir_entry(&sector[i * DIR_ENTRY_SIZE..(i + 1) * DIR_ENTRY_SIZE]));
            }
        }
        let root = entries
            .first()
            .filter(|e| e.object_type == TYPE_ROOT)
            .ok_or_else(|| corrupt("missing root directory entry"))?
            .clone();

        // The mini stream lives in a regular chain owned by the root entry
        let mini_stream = read_chain(data, sector_size, &fat, root.start_sector, root.size, max_sectors)
            .ok_or_else(|| corrupt("mini stream chain broken"))?;

        let mut mini_fat = Vec::new();
        if first_mini_fat <= MAXREGSECT {
            let mini_fat_sectors = follow_chain(&fat, first_mini_fat, max_sectors)
                .ok_or_else(|| corrupt("mini FAT chain cycle"))?;
            for id in mini_fat_sectors {
                let sector = sector_bytes(data, sector_size, id)
                    .ok_or_else(|| corrupt("mini FAT sector out of range"))?;
                for i in 0..sector_size / 4 {
                    mini_fat.push(read_u32(sector, i * 4));
                }
            }
        }

        let mut paths = HashMap::new();
        let mut visited = HashSet::new();
        collect_paths(&entries, root.child, "", &mut paths, &mut visited, 0);

        Ok(Self {
            data: data.to_vec(),
            sector_size,
            mini_cutoff,
            fat,
            mini_fat,
            mini_stream,
            entries,
            paths,
        })
    }

    /// Check whether a stream exists at `path` (e.g. `BodyText/Section0`)
    pub fn has_stream(&self, path: &str) -> bool {
        self.paths.contains_key(path)
    }

    /// Read a stream's full contents; `None` if missing or its chain is broken
    pub fn stream(&self, path: &str) -> Option<Vec<u8>> {
        let entry = &self.entries[*self.paths.get(path)?];
        let max_sectors = self.data.len() / self.sector_size + 1;

        if entry.size < u64::from(self.mini_cutoff) {
            self.read_mini_chain(entry.start_sector, entry.size)
        } else {
            read_chain(
                &self.data,
                self.sector_size,
                &self.fat,
                entry.start_sector,
                entry.size,
                max_sectors,
            )
        }
    }

    /// All stream paths in directory order
    pub fn stream_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.paths.keys().cloned().collect();
        names.sort();
        names
    }

    fn read_mini_chain(&self, start: u32, size: u64) -> Option<Vec<u8>> {
        let max_mini = self.mini_stream.len() / MINI_SECTOR_SIZE + 1;
        let chain = follow_chain(&self.mini_fat, start, max_mini)?;
        let mut out = Vec::with_capacity(chain.len() * MINI_SECTOR_SIZE);
        for id in chain {
            let offset = id as usize * MINI_SECTOR_SIZE;
            let end = offset.checked_add(MINI_SECTOR_SIZE)?;
            if end > self.mini_stream.len() {
                return None;
            }
            out.extend_from_slice(&self.mini_stream[offset..end]);
        }
        out.truncate(size as usize);
        Some(out)
    }
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    let mut buf = [0u8; 2];
    buf.copy_from_slice(&data[offset..offset + 2]);
    u16::from_le_bytes(buf)
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

/// Sector `id`'s bytes; sector 0 starts right after the 512-byte header,
/// so the byte offset is `(id + 1) * sector_size` for both v3 and v4 files
fn sector_bytes(data: &[u8], sector_size: usize, id: u32) -> Option<&[u8]> {
    let offset = (id as usize).checked_add(1)?.checked_mul(sector_size)?;
    let end = offset.checked_add(sector_size)?;
    if end > data.len() {
        return None;
    }
    Some(&data[offset..end])
}

/// Walk a FAT (or mini FAT) chain from `start`, guarding against cycles
fn follow_chain(fat: &[u32], start: u32, max_len: usize) -> Option<Vec<u32>> {
    let mut chain = Vec::new();
    let mut current = start;
    while current <= MAXREGSECT {
        if chain.len() > max_len {
            return None;
        }
        chain.push(current);
        current = *fat.get(current as usize)?;
    }
    if current != ENDOFCHAIN && !chain.is_empty() {
        // Chains must terminate with ENDOFCHAIN; FREESECT mid-chain is corruption
        return None;
    }
    Some(chain)
}

fn read_chain(
    data: &[u8],
    sector_size: usize,
    fat: &[u32],
    start: u32,
    size: u64,
    max_len: usize,
) -> Option<Vec<u8>> {
    if size == 0 {
        return Some(Vec::new());
    }
    let chain = follow_chain(fat, start, max_len)?;
    let mut out = Vec::with_capacity(chain.len() * sector_size);
    for id in chain {
        out.extend_from_slice(sector_bytes(data, sector_size, id)?);
    }
    out.truncate(size as usize);
    Some(out)
}

fn parse_dir_entry(bytes: &[u8]) -> DirEntry {
    let name_len = read_u16(bytes, 64) as usize;
    let name = if (2..=64).contains(&name_len) {
        let units: Vec<u16> = bytes[..name_len - 2]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::new()
    };

    DirEntry {
        name,
        object_type: bytes[66],
        left: read_u32(bytes, 68),
        right: read_u32(bytes, 72),
        child: read_u32(bytes, 76),
        start_sector: read_u32(bytes, 116),
        size: read_u64(bytes, 120),
    }
}

/// Flatten the directory tree into `Storage/Stream` paths.
///
/// Siblings form a binary tree (left/right); storages point at a child
/// subtree. Traversal order does not matter for lookup, only completeness.
fn collect_paths(
    entries: &[DirEntry],
    node: u32,
    prefix: &str,
    paths: &mut HashMap<String, usize>,
    visited: &mut HashSet<u32>,
    depth: usize,
) {
    if node == NOSTREAM || depth > 64 || !visited.insert(node) {
        return;
    }
    let Some(entry) = entries.get(node as usize) else {
        return;
    };

    collect_paths(entries, entry.left, prefix, paths, visited, depth + 1);
    collect_paths(entries, entry.right, prefix, paths, visited, depth + 1);

    let path = if prefix.is_empty() {
        entry.name.clone()
    } else {
        format!("{}/{}", prefix, entry.name)
    };
    match entry.object_type {
        TYPE_STREAM => {
            paths.insert(path, node as usize);
        }
        TYPE_STORAGE => {
            collect_paths(entries, entry.child, &path, paths, visited, depth + 1);
        }
        _ => {}
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::build_hwp_container;
    use super::*;

    #[test]
    fn test_rejects_non_ole_bytes() {
        assert!(CompoundFile::open(b"PK\x03\x04 definitely a zip", "a.hwp").is_err());
        assert!(CompoundFile::open(&[], "empty.hwp").is_err());
    }

    #[test]
    fn test_reads_streams_from_synthetic_container() {
        let header = vec![0xABu8; 256];
        let section = b"section zero payload".to_vec();
        let file = build_hwp_container(&header, &[&section]);

        let cfb = CompoundFile::open(&file, "fixture.hwp").unwrap();
        assert!(cfb.has_stream("FileHeader"));
        assert!(cfb.has_stream("BodyText/Section0"));
        assert!(!cfb.has_stream("BodyText/Section1"));

        assert_eq!(cfb.stream("FileHeader").unwrap(), header);
        assert_eq!(cfb.stream("BodyText/Section0").unwrap(), section);
        assert_eq!(cfb.stream("BodyText/Section9"), None);
    }

    #[test]
    fn test_multiple_sections_enumerate_in_order() {
        let header = vec![0u8; 256];
        let s0 = b"first".to_vec();
        let s1 = vec![0x42u8; 200];
        let file = build_hwp_container(&header, &[&s0, &s1]);

        let cfb = CompoundFile::open(&file, "fixture.hwp").unwrap();
        assert_eq!(cfb.stream("BodyText/Section0").unwrap(), s0);
        assert_eq!(cfb.stream("BodyText/Section1").unwrap(), s1);
        assert_eq!(
            cfb.stream_names(),
            vec![
                "BodyText/Section0".to_string(),
                "BodyText/Section1".to_string(),
                "FileHeader".to_string(),
            ]
        );
    }

    #[test]
    fn test_truncated_container_is_corrupt_not_panic() {
        let file = build_hwp_container(&[0u8; 256], &[b"data"]);
        // Cut the file mid-directory; open must fail cleanly
        let truncated = &file[..600];
        assert!(CompoundFile::open(truncated, "cut.hwp").is_err());
    }
}

//! Git pack files and their version 2 (and legacy version 1) indexes.

use std::io::Read;

use bytes::Bytes;
use flate2::read::ZlibDecoder;
use sha1::{Digest, Sha1};
use twig_types::object::OID_LEN;
use twig_types::ObjectId;

use crate::delta::apply_delta;
use crate::error::{ReaderError, ReaderResult};
use crate::object::{ObjectKind, RawObject};

const IDX_MAGIC: [u8; 4] = [0xff, b't', b'O', b'c'];
const PACK_MAGIC: &[u8; 4] = b"PACK";
const FAN_OUT_LEN: usize = 256 * 4;
/// Offsets with this bit set index into the 64-bit offset table.
const LARGE_OFFSET_FLAG: u32 = 0x8000_0000;

/// Longest delta chain followed before the pack is treated as corrupt.
pub const MAX_DELTA_CHAIN: usize = 4096;

pub const OFS_DELTA: u8 = 6;
pub const REF_DELTA: u8 = 7;

fn be_u32(data: &[u8], pos: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&data[pos..pos + 4]);
    u32::from_be_bytes(buf)
}

fn be_u64(data: &[u8], pos: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[pos..pos + 8]);
    u64::from_be_bytes(buf)
}

/// Pack index for random access into a pack.
///
/// - Fan-out table: 256 entries counting objects with first byte <= index
/// - Sorted object id array
/// - CRC32 array (parallel; absent in version 1)
/// - Offset array (parallel)
/// - Pack checksum
#[derive(Clone, Debug)]
pub struct PackIndex {
    pub fan_out: [u32; 256],
    pub object_ids: Vec<ObjectId>,
    pub crc32s: Option<Vec<u32>>,
    pub offsets: Vec<u64>,
    pub pack_checksum: [u8; OID_LEN],
}

impl PackIndex {
    /// Build a version 2 index from (id, crc32, offset) entries.
    pub fn build(mut entries: Vec<(ObjectId, u32, u64)>, pack_checksum: [u8; OID_LEN]) -> Self {
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut fan_out = [0u32; 256];
        for (id, _, _) in &entries {
            fan_out[id.as_bytes()[0] as usize] += 1;
        }
        let mut running = 0;
        for slot in fan_out.iter_mut() {
            running += *slot;
            *slot = running;
        }

        Self {
            fan_out,
            object_ids: entries.iter().map(|e| e.0).collect(),
            crc32s: Some(entries.iter().map(|e| e.1).collect()),
            offsets: entries.iter().map(|e| e.2).collect(),
            pack_checksum,
        }
    }

    /// Parse an `.idx` file. `path` is only used in error messages.
    pub fn parse(path: &str, data: &[u8]) -> ReaderResult<Self> {
        let corrupt = |reason: &str| ReaderError::corrupt_pack(path, 0, reason);

        if data.len() >= 8 && data[..4] == IDX_MAGIC {
            let version = be_u32(data, 4);
            if version != 2 {
                return Err(ReaderError::Unsupported(format!(
                    "pack index version {version} in {path}"
                )));
            }
            return Self::parse_v2(data).ok_or_else(|| corrupt("truncated version 2 index"));
        }
        Self::parse_v1(data).ok_or_else(|| corrupt("truncated version 1 index"))
    }

    fn read_fan_out(data: &[u8], start: usize) -> Option<[u32; 256]> {
        if data.len() < start + FAN_OUT_LEN {
            return None;
        }
        let mut fan_out = [0u32; 256];
        for (i, slot) in fan_out.iter_mut().enumerate() {
            *slot = be_u32(data, start + i * 4);
        }
        let monotonic = fan_out.windows(2).all(|w| w[0] <= w[1]);
        monotonic.then_some(fan_out)
    }

    fn parse_v2(data: &[u8]) -> Option<Self> {
        let fan_out = Self::read_fan_out(data, 8)?;
        let count = fan_out[255] as usize;
        let ids_at = 8 + FAN_OUT_LEN;
        let crcs_at = ids_at + count * OID_LEN;
        let offsets_at = crcs_at + count * 4;
        let large_at = offsets_at + count * 4;
        if data.len() < large_at + 2 * OID_LEN {
            return None;
        }

        let object_ids = read_ids(data, ids_at, count, OID_LEN);
        let crc32s = (0..count).map(|i| be_u32(data, crcs_at + i * 4)).collect();

        let large_len = data.len() - 2 * OID_LEN - large_at;
        let mut offsets = Vec::with_capacity(count);
        for i in 0..count {
            let raw = be_u32(data, offsets_at + i * 4);
            if raw & LARGE_OFFSET_FLAG == 0 {
                offsets.push(raw as u64);
            } else {
                let slot = ((raw & !LARGE_OFFSET_FLAG) as usize) * 8;
                if slot + 8 > large_len {
                    return None;
                }
                offsets.push(be_u64(data, large_at + slot));
            }
        }

        let mut pack_checksum = [0u8; OID_LEN];
        let checksum_at = data.len() - 2 * OID_LEN;
        pack_checksum.copy_from_slice(&data[checksum_at..checksum_at + OID_LEN]);

        Some(Self {
            fan_out,
            object_ids,
            crc32s: Some(crc32s),
            offsets,
            pack_checksum,
        })
    }

    fn parse_v1(data: &[u8]) -> Option<Self> {
        let fan_out = Self::read_fan_out(data, 0)?;
        let count = fan_out[255] as usize;
        let entry_len = 4 + OID_LEN;
        let entries_at = FAN_OUT_LEN;
        if data.len() < entries_at + count * entry_len + 2 * OID_LEN {
            return None;
        }
        let mut object_ids = Vec::with_capacity(count);
        let mut offsets = Vec::with_capacity(count);
        for i in 0..count {
            let at = entries_at + i * entry_len;
            offsets.push(be_u32(data, at) as u64);
            object_ids.extend(read_ids(data, at + 4, 1, entry_len));
        }
        let mut pack_checksum = [0u8; OID_LEN];
        let checksum_at = data.len() - 2 * OID_LEN;
        pack_checksum.copy_from_slice(&data[checksum_at..checksum_at + OID_LEN]);
        Some(Self {
            fan_out,
            object_ids,
            crc32s: None,
            offsets,
            pack_checksum,
        })
    }

    /// Position of `id` in the sorted id table.
    pub fn position(&self, id: &ObjectId) -> Option<usize> {
        let first_byte = id.as_bytes()[0] as usize;
        let start = if first_byte == 0 {
            0
        } else {
            self.fan_out[first_byte - 1] as usize
        };
        let end = (self.fan_out[first_byte] as usize).min(self.object_ids.len());
        if start > end {
            return None;
        }
        self.object_ids[start..end]
            .binary_search(id)
            .ok()
            .map(|pos| start + pos)
    }

    /// Look up an object's pack offset.
    pub fn lookup(&self, id: &ObjectId) -> Option<u64> {
        self.position(id).map(|pos| self.offsets[pos])
    }

    pub fn object_count(&self) -> usize {
        self.object_ids.len()
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.position(id).is_some()
    }

    /// Serialize as a version 2 `.idx` file.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&IDX_MAGIC);
        buf.extend_from_slice(&2u32.to_be_bytes());
        for count in &self.fan_out {
            buf.extend_from_slice(&count.to_be_bytes());
        }
        for id in &self.object_ids {
            buf.extend_from_slice(id.as_bytes());
        }
        match &self.crc32s {
            Some(crcs) => crcs.iter().for_each(|c| buf.extend_from_slice(&c.to_be_bytes())),
            None => buf.extend(std::iter::repeat(0u8).take(4 * self.object_ids.len())),
        }
        let mut large = Vec::new();
        for &offset in &self.offsets {
            if offset < LARGE_OFFSET_FLAG as u64 {
                buf.extend_from_slice(&(offset as u32).to_be_bytes());
            } else {
                let slot = large.len() as u32 | LARGE_OFFSET_FLAG;
                buf.extend_from_slice(&slot.to_be_bytes());
                large.push(offset);
            }
        }
        for offset in large {
            buf.extend_from_slice(&offset.to_be_bytes());
        }
        buf.extend_from_slice(&self.pack_checksum);
        let checksum = Sha1::digest(&buf);
        buf.extend_from_slice(&checksum);
        buf
    }
}

fn read_ids(data: &[u8], start: usize, count: usize, stride: usize) -> Vec<ObjectId> {
    (0..count)
        .map(|i| {
            let mut hash = [0u8; OID_LEN];
            let at = start + i * stride;
            hash.copy_from_slice(&data[at..at + OID_LEN]);
            ObjectId::from_hash(hash)
        })
        .collect()
}

/// How a pack entry stores its content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EntryRepr {
    Full(ObjectKind),
    /// Delta against the entry at this absolute offset.
    OfsDelta(u64),
    /// Delta against the object with this id.
    RefDelta(ObjectId),
}

/// A decoded pack entry header.
#[derive(Debug)]
struct EntryHeader {
    repr: EntryRepr,
    size: usize,
    /// Offset of the zlib stream.
    data_start: usize,
    /// Offset of the next entry (or the trailing checksum).
    end: usize,
}

/// A pack file held in memory together with its index.
#[derive(Debug)]
pub struct PackFile {
    path: String,
    data: Bytes,
    index: PackIndex,
    /// (offset, index position), sorted by offset.
    by_offset: Vec<(u64, usize)>,
}

impl PackFile {
    /// Validate `data` as a pack described by `index`.
    pub fn open(path: impl Into<String>, data: Bytes, index: PackIndex) -> ReaderResult<Self> {
        let path = path.into();
        if data.len() < 12 + OID_LEN || &data[..4] != PACK_MAGIC {
            return Err(ReaderError::corrupt_pack(&path, 0, "missing PACK header"));
        }
        let version = be_u32(&data, 4);
        if version != 2 && version != 3 {
            return Err(ReaderError::Unsupported(format!(
                "pack version {version} in {path}"
            )));
        }
        let count = be_u32(&data, 8) as usize;
        if count != index.object_count() {
            return Err(ReaderError::corrupt_pack(
                &path,
                8,
                format!(
                    "pack holds {count} objects but its index lists {}",
                    index.object_count()
                ),
            ));
        }
        let trailer = &data[data.len() - OID_LEN..];
        if trailer != index.pack_checksum {
            return Err(ReaderError::corrupt_pack(
                &path,
                (data.len() - OID_LEN) as u64,
                "pack checksum does not match its index",
            ));
        }

        let mut by_offset: Vec<(u64, usize)> = index
            .offsets
            .iter()
            .copied()
            .enumerate()
            .map(|(pos, offset)| (offset, pos))
            .collect();
        by_offset.sort_unstable();

        Ok(Self {
            path,
            data,
            index,
            by_offset,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.index.contains(id)
    }

    pub fn object_count(&self) -> usize {
        self.index.object_count()
    }

    /// Read an object by id.
    ///
    /// `resolve_base` is called for `REF_DELTA` bases that live outside
    /// this pack. Returns `Ok(None)` when the pack does not hold `id`.
    pub fn read_object<F>(&self, id: &ObjectId, resolve_base: F) -> ReaderResult<Option<RawObject>>
    where
        F: Fn(&ObjectId) -> ReaderResult<RawObject>,
    {
        match self.index.lookup(id) {
            Some(offset) => self.read_at(offset, resolve_base).map(Some),
            None => Ok(None),
        }
    }

    /// Read the object stored at `offset`, applying any delta chain.
    pub fn read_at<F>(&self, offset: u64, resolve_base: F) -> ReaderResult<RawObject>
    where
        F: Fn(&ObjectId) -> ReaderResult<RawObject>,
    {
        let mut deltas: Vec<Vec<u8>> = Vec::new();
        let mut at = offset;
        let base = loop {
            if deltas.len() > MAX_DELTA_CHAIN {
                return Err(self.corrupt(offset, "delta chain too long"));
            }
            let header = self.entry_header(at)?;
            let payload = self.inflate_entry(at, &header)?;
            match header.repr {
                EntryRepr::Full(kind) => break RawObject::new(kind, payload),
                EntryRepr::OfsDelta(base_offset) => {
                    deltas.push(payload);
                    at = base_offset;
                }
                EntryRepr::RefDelta(base_id) => {
                    deltas.push(payload);
                    match self.index.lookup(&base_id) {
                        Some(base_offset) => at = base_offset,
                        None => break resolve_base(&base_id)?,
                    }
                }
            }
        };

        if deltas.is_empty() {
            return Ok(base);
        }
        let mut data = base.data.to_vec();
        for delta in deltas.iter().rev() {
            data = apply_delta(&data, delta).map_err(|reason| self.corrupt(offset, reason))?;
        }
        Ok(RawObject::new(base.kind, data))
    }

    fn corrupt(&self, offset: u64, reason: impl Into<String>) -> ReaderError {
        ReaderError::corrupt_pack(&self.path, offset, reason)
    }

    fn entry_header(&self, offset: u64) -> ReaderResult<EntryHeader> {
        let slot = self
            .by_offset
            .binary_search_by(|(o, _)| o.cmp(&offset))
            .map_err(|_| self.corrupt(offset, "no index entry at this offset"))?;
        let position = self.by_offset[slot].1;
        let end = self
            .by_offset
            .get(slot + 1)
            .map(|(o, _)| *o as usize)
            .unwrap_or(self.data.len() - OID_LEN);
        let start = offset as usize;
        if start >= end || end > self.data.len() - OID_LEN {
            return Err(self.corrupt(offset, "entry outside pack data"));
        }
        let entry = &self.data[start..end];

        if let Some(crcs) = &self.index.crc32s {
            let actual = crc32fast::hash(entry);
            if actual != crcs[position] {
                return Err(self.corrupt(
                    offset,
                    format!("CRC32 mismatch: index {:08x}, entry {actual:08x}", crcs[position]),
                ));
            }
        }

        let truncated = || self.corrupt(offset, "truncated entry header");
        let mut pos = 0;
        let first = *entry.get(pos).ok_or_else(truncated)?;
        pos += 1;
        let type_code = (first >> 4) & 0x07;
        let mut size = (first & 0x0f) as usize;
        let mut shift = 4;
        let mut byte = first;
        while byte & 0x80 != 0 {
            byte = *entry.get(pos).ok_or_else(truncated)?;
            pos += 1;
            if shift >= usize::BITS - 7 {
                return Err(self.corrupt(offset, "entry size overflows"));
            }
            size |= ((byte & 0x7f) as usize) << shift;
            shift += 7;
        }

        let repr = match type_code {
            OFS_DELTA => {
                let mut byte = *entry.get(pos).ok_or_else(truncated)?;
                pos += 1;
                let mut distance = (byte & 0x7f) as u64;
                while byte & 0x80 != 0 {
                    byte = *entry.get(pos).ok_or_else(truncated)?;
                    pos += 1;
                    distance = ((distance + 1) << 7) | (byte & 0x7f) as u64;
                }
                let base = offset
                    .checked_sub(distance)
                    .filter(|_| distance > 0)
                    .ok_or_else(|| self.corrupt(offset, "delta base offset out of range"))?;
                EntryRepr::OfsDelta(base)
            }
            REF_DELTA => {
                let raw = entry.get(pos..pos + OID_LEN).ok_or_else(truncated)?;
                pos += OID_LEN;
                EntryRepr::RefDelta(ObjectId::from_slice(raw)?)
            }
            code => EntryRepr::Full(
                ObjectKind::from_pack_type(code)
                    .ok_or_else(|| self.corrupt(offset, format!("unknown entry type {code}")))?,
            ),
        };

        Ok(EntryHeader {
            repr,
            size,
            data_start: start + pos,
            end,
        })
    }

    fn inflate_entry(&self, offset: u64, header: &EntryHeader) -> ReaderResult<Vec<u8>> {
        let compressed = &self.data[header.data_start..header.end];
        // zlib expands at most ~1032:1, so a larger header size is a lie
        let mut out = Vec::with_capacity(header.size.min(compressed.len().saturating_mul(1032)));
        ZlibDecoder::new(compressed)
            .take((header.size as u64).saturating_add(1))
            .read_to_end(&mut out)
            .map_err(|e| self.corrupt(offset, format!("inflate failed: {e}")))?;
        if out.len() != header.size {
            return Err(self.corrupt(
                offset,
                format!("size mismatch: header says {}, inflated {}", header.size, out.len()),
            ));
        }
        Ok(out)
    }
}

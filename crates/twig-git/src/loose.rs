//! Loose objects: one zlib stream per object under `objects/xx/yyyy…`.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use twig_types::ObjectId;
use twig_vfs::path::join;

use crate::error::{ReaderError, ReaderResult};
use crate::object::{ObjectKind, RawObject};

/// Path of a loose object inside `objects_dir`.
pub fn object_path(objects_dir: &str, id: &ObjectId) -> String {
    let hex = id.to_hex();
    join(objects_dir, &format!("{}/{}", &hex[..2], &hex[2..]))
}

pub fn inflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

pub fn deflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Decode an inflated loose object: `"<kind> <size>\0<payload>"`.
pub fn parse(id: &ObjectId, inflated: &[u8]) -> ReaderResult<RawObject> {
    let nul = inflated
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| ReaderError::corrupt(*id, "missing header terminator"))?;
    let header = std::str::from_utf8(&inflated[..nul])
        .map_err(|_| ReaderError::corrupt(*id, "non-ascii header"))?;
    let (kind, size) = header
        .split_once(' ')
        .ok_or_else(|| ReaderError::corrupt(*id, format!("malformed header {header:?}")))?;
    let kind = ObjectKind::parse(kind)
        .ok_or_else(|| ReaderError::corrupt(*id, format!("unknown object kind {kind:?}")))?;
    let size: usize = size
        .parse()
        .map_err(|_| ReaderError::corrupt(*id, format!("invalid size {size:?}")))?;

    let payload = &inflated[nul + 1..];
    if payload.len() != size {
        return Err(ReaderError::corrupt(
            *id,
            format!("size mismatch: header says {size}, payload is {}", payload.len()),
        ));
    }
    Ok(RawObject::new(kind, payload.to_vec()))
}

/// Encode and compress an object for the loose store.
pub fn encode(object: &RawObject) -> std::io::Result<Vec<u8>> {
    let mut raw = format!("{} {}\0", object.kind, object.data.len()).into_bytes();
    raw.extend_from_slice(&object.data);
    deflate(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_splits_fanout_directory() {
        let id = ObjectId::hash_object("blob", b"hello\n");
        assert_eq!(
            object_path("/.git/objects", &id),
            "/.git/objects/ce/013625030ba8dba906f756967f9e9ca394464a"
        );
    }

    #[test]
    fn encode_then_parse() {
        let object = RawObject::new(ObjectKind::Blob, b"hello\n".to_vec());
        let compressed = encode(&object).unwrap();
        let inflated = inflate(&compressed).unwrap();
        assert!(inflated.starts_with(b"blob 6\0"));
        assert_eq!(parse(&object.id(), &inflated).unwrap(), object);
    }

    #[test]
    fn size_mismatch_is_corrupt() {
        let id = ObjectId::null();
        let err = parse(&id, b"blob 10\0short").unwrap_err();
        assert!(matches!(err, ReaderError::CorruptObject { .. }));
    }

    #[test]
    fn unknown_kind_is_corrupt() {
        let err = parse(&ObjectId::null(), b"widget 0\0").unwrap_err();
        assert!(matches!(err, ReaderError::CorruptObject { .. }));
    }

    #[test]
    fn garbage_fails_to_inflate() {
        assert!(inflate(b"definitely not zlib").is_err());
    }
}

//! Git's binary delta format.
//!
//! A delta is two size varints (base length, result length) followed by
//! instructions: a byte with the high bit set copies a range out of the
//! base, any other non-zero byte `n` inserts the next `n` literal bytes.

/// Largest copy a single instruction can express when its size bytes are all zero.
const DEFAULT_COPY_SIZE: usize = 0x10000;

/// Read a little-endian base-128 varint. Returns the value and bytes consumed.
pub fn read_size(data: &[u8]) -> Option<(usize, usize)> {
    let mut value = 0usize;
    let mut shift = 0u32;
    for (i, &byte) in data.iter().enumerate() {
        if shift >= usize::BITS {
            return None;
        }
        value |= ((byte & 0x7f) as usize) << shift;
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
        shift += 7;
    }
    None
}

/// Append a little-endian base-128 varint.
pub fn write_size(out: &mut Vec<u8>, mut value: usize) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Apply `delta` to `base`, returning the reconstructed object.
pub fn apply_delta(base: &[u8], delta: &[u8]) -> Result<Vec<u8>, String> {
    let (base_len, n) = read_size(delta).ok_or("truncated base size")?;
    let mut pos = n;
    if base_len != base.len() {
        return Err(format!(
            "base size mismatch: delta expects {base_len}, base has {}",
            base.len()
        ));
    }
    let (result_len, n) = read_size(&delta[pos..]).ok_or("truncated result size")?;
    pos += n;

    // result_len is untrusted; never reserve more than the inputs could expand to
    let mut out = Vec::with_capacity(result_len.min(base.len().saturating_add(delta.len())));
    while pos < delta.len() {
        if out.len() > result_len {
            break;
        }
        let op = delta[pos];
        pos += 1;
        if op & 0x80 != 0 {
            let mut offset = 0usize;
            let mut size = 0usize;
            for i in 0..4 {
                if op & (1 << i) != 0 {
                    let byte = *delta.get(pos).ok_or("truncated copy offset")?;
                    offset |= (byte as usize) << (8 * i);
                    pos += 1;
                }
            }
            for i in 0..3 {
                if op & (0x10 << i) != 0 {
                    let byte = *delta.get(pos).ok_or("truncated copy size")?;
                    size |= (byte as usize) << (8 * i);
                    pos += 1;
                }
            }
            if size == 0 {
                size = DEFAULT_COPY_SIZE;
            }
            let chunk = offset
                .checked_add(size)
                .and_then(|end| base.get(offset..end))
                .ok_or_else(|| format!("copy {offset}+{size} outside base of {}", base.len()))?;
            out.extend_from_slice(chunk);
        } else if op != 0 {
            let len = op as usize;
            let chunk = delta
                .get(pos..pos + len)
                .ok_or("truncated insert data")?;
            out.extend_from_slice(chunk);
            pos += len;
        } else {
            return Err("reserved delta opcode 0".into());
        }
    }

    if out.len() != result_len {
        return Err(format!(
            "result size mismatch: expected {result_len}, got {}",
            out.len()
        ));
    }
    Ok(out)
}

/// Encode `target` as a delta against `base`.
///
/// Emits a copy for the shared prefix and suffix and inserts the middle.
/// Not as compact as git's encoder, but every delta it writes is valid.
pub fn encode_delta(base: &[u8], target: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    write_size(&mut out, base.len());
    write_size(&mut out, target.len());

    let prefix = base
        .iter()
        .zip(target)
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = base.len().min(target.len()) - prefix;
    let suffix = base
        .iter()
        .rev()
        .zip(target.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    push_copy(&mut out, 0, prefix);
    push_insert(&mut out, &target[prefix..target.len() - suffix]);
    push_copy(&mut out, base.len() - suffix, suffix);
    out
}

fn push_copy(out: &mut Vec<u8>, mut offset: usize, mut len: usize) {
    while len > 0 {
        let size = len.min(0xffff);
        let mut op = 0x80u8;
        let mut args = Vec::with_capacity(7);
        for i in 0..4 {
            let byte = ((offset >> (8 * i)) & 0xff) as u8;
            if byte != 0 {
                op |= 1 << i;
                args.push(byte);
            }
        }
        for i in 0..3 {
            let byte = ((size >> (8 * i)) & 0xff) as u8;
            if byte != 0 {
                op |= 0x10 << i;
                args.push(byte);
            }
        }
        out.push(op);
        out.extend_from_slice(&args);
        offset += size;
        len -= size;
    }
}

fn push_insert(out: &mut Vec<u8>, data: &[u8]) {
    for chunk in data.chunks(0x7f) {
        out.push(chunk.len() as u8);
        out.extend_from_slice(chunk);
    }
}

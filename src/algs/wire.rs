//! Fixed, versioned, little-endian wire records for the binding exchanges.
//!
//! All multi-byte integers are stored pre-LE with `.to_le()` and decoded with
//! `.from_le()`, so ranks of different endianness agree on the bytes.

use crate::geometry::coord_key::{CoordKey, MAX_DIM};
use crate::mesh_error::MeshDofsError;
use bytemuck::{Pod, Zeroable};
use std::mem::size_of;

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// Coordinate key of a DOF (point-based) or element centroid.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct WireKey {
    pub k_le: [i64; MAX_DIM],
}

impl WireKey {
    pub fn new(key: CoordKey) -> Self {
        Self {
            k_le: key.0.map(i64::to_le),
        }
    }
    pub fn key(&self) -> CoordKey {
        CoordKey(self.k_le.map(i64::from_le))
    }
}

/// Element centroid key plus the number of states behind it.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct WireElementKey {
    pub key: WireKey,
    pub states_le: u64,
}

impl WireElementKey {
    pub fn new(key: CoordKey, states: usize) -> Self {
        Self {
            key: WireKey::new(key),
            states_le: (states as u64).to_le(),
        }
    }
    pub fn states(&self) -> usize {
        u64::from_le(self.states_le) as usize
    }
}

/// Answer to the `index`-th entry of a peer's gathered request list.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct WireReply {
    pub index_le: u64,
    pub value_le: u64,
}

impl WireReply {
    pub fn new(index: usize, value: usize) -> Self {
        Self {
            index_le: (index as u64).to_le(),
            value_le: (value as u64).to_le(),
        }
    }
    pub fn index(&self) -> usize {
        u64::from_le(self.index_le) as usize
    }
    pub fn value(&self) -> usize {
        u64::from_le(self.value_le) as usize
    }
}

/// Contiguous run of global ids answering an element request.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct WireRun {
    pub index_le: u64,
    pub start_le: u64,
    pub len_le: u64,
}

impl WireRun {
    pub fn new(index: usize, start: usize, len: usize) -> Self {
        Self {
            index_le: (index as u64).to_le(),
            start_le: (start as u64).to_le(),
            len_le: (len as u64).to_le(),
        }
    }
    pub fn index(&self) -> usize {
        u64::from_le(self.index_le) as usize
    }
    pub fn start(&self) -> usize {
        u64::from_le(self.start_le) as usize
    }
    pub fn len(&self) -> usize {
        u64::from_le(self.len_le) as usize
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u64,
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u64).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u64::from_le(self.n_le) as usize
    }
}

/// Leading record of every message; lets a receiver reject foreign layouts.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16,
    pub record_le: u16,
    pub reserved_le: u32, // keep zero
}

impl WireHdr {
    pub fn new(record_size: usize) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            record_le: (record_size as u16).to_le(),
            reserved_le: 0,
        }
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn record_size(&self) -> usize {
        u16::from_le(self.record_le) as usize
    }
}

/// Header followed by `records`.
pub fn encode<T: Pod>(records: &[T]) -> Vec<u8> {
    let hdr = WireHdr::new(size_of::<T>());
    let mut out = Vec::with_capacity(size_of::<WireHdr>() + size_of_val(records));
    out.extend_from_slice(bytemuck::bytes_of(&hdr));
    out.extend_from_slice(bytemuck::cast_slice(records));
    out
}

/// Inverse of [`encode`]. Received buffers carry no alignment guarantee, so
/// records are read unaligned.
pub fn decode<T: Pod>(bytes: &[u8], neighbor: usize) -> Result<Vec<T>, MeshDofsError> {
    let hdr_len = size_of::<WireHdr>();
    if bytes.len() < hdr_len {
        return Err(MeshDofsError::BufferSizeMismatch {
            neighbor,
            expected: hdr_len,
            got: bytes.len(),
        });
    }
    let (head, body) = bytes.split_at(hdr_len);
    let hdr: WireHdr = bytemuck::pod_read_unaligned(head);
    if hdr.version() != WIRE_VERSION || hdr.record_size() != size_of::<T>() {
        return Err(MeshDofsError::CommError {
            neighbor,
            reason: format!(
                "wire header v{} with {}-byte records, expected v{WIRE_VERSION} with {}",
                hdr.version(),
                hdr.record_size(),
                size_of::<T>()
            ),
        });
    }
    let rec = size_of::<T>();
    if body.len() % rec != 0 {
        return Err(MeshDofsError::BufferSizeMismatch {
            neighbor,
            expected: (body.len() / rec + 1) * rec + hdr_len,
            got: bytes.len(),
        });
    }
    Ok(body
        .chunks_exact(rec)
        .map(bytemuck::pod_read_unaligned)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::{assert_eq_align, assert_eq_size};

    assert_eq_size!(WireHdr, u64);
    assert_eq_size!(WireKey, [i64; 3]);
    assert_eq_size!(WireReply, [u64; 2]);
    assert_eq_size!(WireRun, [u64; 3]);
    assert_eq_size!(WireElementKey, [u64; 4]);
    assert_eq_align!(WireCount, u64);

    #[test]
    fn decode_rejects_truncated_body() {
        let mut bytes = encode(&[WireReply::new(1, 2), WireReply::new(3, 4)]);
        let back: Vec<WireReply> = decode(&bytes, 0).unwrap();
        assert_eq!(back[1].value(), 4);
        bytes.pop();
        assert!(matches!(
            decode::<WireReply>(&bytes, 5),
            Err(MeshDofsError::BufferSizeMismatch { neighbor: 5, .. })
        ));
    }

    #[test]
    fn decode_rejects_foreign_record_size() {
        let bytes = encode(&[WireCount::new(9)]);
        assert!(matches!(
            decode::<WireReply>(&bytes, 1),
            Err(MeshDofsError::CommError { neighbor: 1, .. })
        ));
        let empty = encode::<WireKey>(&[]);
        assert!(decode::<WireKey>(&empty, 0).unwrap().is_empty());
    }

    #[test]
    fn negative_keys_survive() {
        let key = CoordKey([-3, 0, i64::MAX / 4]);
        let bytes = encode(&[WireKey::new(key)]);
        let back: Vec<WireKey> = decode(&bytes, 0).unwrap();
        assert_eq!(back[0].key(), key);
    }
}

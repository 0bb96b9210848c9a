use crc::{Crc, CRC_32_ISCSI};

const CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

pub(crate) fn calc_checksum(data: &[u8]) -> u32 {
    CRC.checksum(data)
}

pub(crate) fn push_u8(into: &mut Vec<u8>, val: u8) {
    into.push(val);
}

pub(crate) fn push_bool(into: &mut Vec<u8>, val: bool) {
    into.push(val as u8);
}

pub(crate) fn push_i16(into: &mut Vec<u8>, val: i16) {
    into.extend_from_slice(&val.to_le_bytes());
}

pub(crate) fn push_i32(into: &mut Vec<u8>, val: i32) {
    into.extend_from_slice(&val.to_le_bytes());
}

pub(crate) fn push_f32(into: &mut Vec<u8>, val: f32) {
    into.extend_from_slice(&val.to_le_bytes());
}

pub(crate) fn push_f64(into: &mut Vec<u8>, val: f64) {
    into.extend_from_slice(&val.to_le_bytes());
}

/// Lengths on the wire are int32. Anything bigger than that can't be represented, and trying to
/// write it is a bug in the caller.
pub(crate) fn push_len(into: &mut Vec<u8>, len: usize) {
    assert!(len <= i32::MAX as usize, "length {} does not fit in an int32", len);
    push_i32(into, len as i32);
}

pub(crate) fn push_len_prefixed(into: &mut Vec<u8>, bytes: &[u8]) {
    push_len(into, bytes.len());
    into.extend_from_slice(bytes);
}

pub(crate) fn push_str(into: &mut Vec<u8>, val: &str) {
    push_len_prefixed(into, val.as_bytes());
}

/// Write a length-prefixed block without knowing its length up front. We reserve the 4 length
/// bytes, let `f` write the body, then fill the length in.
pub(crate) fn push_with_len<F: FnOnce(&mut Vec<u8>)>(into: &mut Vec<u8>, f: F) {
    let start = into.len();
    into.extend_from_slice(&[0u8; 4]);
    f(into);
    let len = into.len() - start - 4;
    assert!(len <= i32::MAX as usize);
    into[start..start + 4].copy_from_slice(&(len as i32).to_le_bytes());
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn push_with_len_backfills() {
        let mut out = vec![9];
        push_with_len(&mut out, |out| out.extend_from_slice(b"abc"));
        assert_eq!(out, vec![9, 3, 0, 0, 0, b'a', b'b', b'c']);
    }

    #[test]
    fn checksum_is_crc32c() {
        // Standard check value for CRC-32/ISCSI.
        assert_eq!(calc_checksum(b"123456789"), 0xe3069283);
    }
}

use super::*;

pub fn pack_u32_le(n: u32) -> [u8; 4] {
    let mut buf = [0u8; 4];
    LittleEndian::write_u32(&mut buf, n);
    buf
}

pub fn pack_u32_be(n: u32) -> [u8; 4] {
    let mut buf = [0u8; 4];
    BigEndian::write_u32(&mut buf, n);
    buf
}

pub fn pack_i32_be(n: i32) -> [u8; 4] {
    let mut buf = [0u8; 4];
    BigEndian::write_i32(&mut buf, n);
    buf
}

pub fn pack_i32_le(n: i32) -> [u8; 4] {
    let mut buf = [0u8; 4];
    LittleEndian::write_i32(&mut buf, n);
    buf
}

pub fn pack_i64_le(n: i64) -> [u8; 8] {
    let mut buf = [0u8; 8];
    LittleEndian::write_i64(&mut buf, n);
    buf
}

pub fn pack_u64_le(n: u64) -> [u8; 8] {
    let mut buf = [0u8; 8];
    LittleEndian::write_u64(&mut buf, n);
    buf
}

/// Bitcoin CompactSize encoding.
pub fn var_int(n: u64) -> Vec<u8> {
    if n < 0xfd {
        vec![n as u8]
    } else if n < 0x1_0000 {
        let mut buf = vec![0xfd, 0, 0];
        LittleEndian::write_u16(&mut buf[1..], n as u16);
        buf
    } else if n < 0x1_0000_0000 {
        let mut buf = vec![0xfe, 0, 0, 0, 0];
        LittleEndian::write_u32(&mut buf[1..], n as u32);
        buf
    } else {
        let mut buf = vec![0xff];
        buf.extend_from_slice(&pack_u64_le(n));
        buf
    }
}

/// A CompactSize-prefixed UTF-8 string.
pub fn var_string(s: &str) -> Vec<u8> {
    let mut buf = var_int(s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
    buf
}

pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256d::Hash::hash(data).to_byte_array()
}

/// Reverses the bytes within each 32-bit word, leaving word order alone.
/// This is the byte order Stratum transmits the previous block hash in.
pub fn reverse_words(buf: &[u8]) -> Vec<u8> {
    let mut out = buf.to_vec();
    for word in out.chunks_exact_mut(4) {
        word.reverse();
    }
    out
}

pub fn reverse_bytes(buf: &[u8]) -> Vec<u8> {
    let mut out = buf.to_vec();
    out.reverse();
    out
}

/// Decodes a display-order hash into internal (hashing) byte order.
pub fn uint256_from_hex(s: &str) -> Result<[u8; 32]> {
    ensure!(s.len() == 64, "expected 64 hex characters, got {}", s.len());
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(s, &mut bytes).with_context(|| format!("invalid hash hex `{s}`"))?;
    bytes.reverse();
    Ok(bytes)
}

/// Expands the compact `(exponent, mantissa)` representation into the full
/// 256-bit target: `mantissa * 256^(exponent - 3)`.
pub fn target_from_bits(bits: u32) -> U256 {
    let exponent = (bits >> 24) as usize;
    let mantissa = U256::from(bits & 0x00ff_ffff);

    if exponent <= 3 {
        mantissa >> (8 * (3 - exponent))
    } else {
        mantissa << (8 * (exponent - 3))
    }
}

pub fn target_from_bits_hex(bits: &str) -> Result<U256> {
    let mut raw = [0u8; 4];
    hex::decode_to_slice(bits, &mut raw).with_context(|| format!("invalid bits hex `{bits}`"))?;
    Ok(target_from_bits(BigEndian::read_u32(&raw)))
}

use bytes::Bytes;

/// Deterministic payload of `len` bytes; `seed` shifts the pattern.
pub fn get_test_bytes(seed: u8, len: usize) -> Bytes {
    let mut buf = Vec::with_capacity(len);
    let mut state = seed as u32 ^ 0x9e37_79b9;
    for _ in 0..len {
        // xorshift32
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        buf.push(state as u8);
    }
    Bytes::from(buf)
}

/// Payload whose every byte is `tag`, handy for spotting which writer produced a region.
pub fn get_tagged_bytes(tag: u8, len: usize) -> Bytes {
    Bytes::from(vec![tag; len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_test_bytes() {
        assert_eq!(get_test_bytes(7, 0).len(), 0);
        assert_eq!(get_test_bytes(7, 100).len(), 100);
        assert_eq!(get_test_bytes(7, 100), get_test_bytes(7, 100));
        assert_ne!(get_test_bytes(7, 100), get_test_bytes(8, 100));

        // prefix-stable, so shorter payloads are slices of longer ones
        assert_eq!(get_test_bytes(3, 10), get_test_bytes(3, 50).slice(0..10));
    }

    #[test]
    fn test_get_tagged_bytes() {
        assert_eq!(get_tagged_bytes(b'a', 3), Bytes::from("aaa"));
    }
}

//! Variable-length integers.
//!
//! The first generation uses a big-endian VLQ: the most significant
//! 7-bit group comes first and every byte except the last has its
//! high bit set. The second generation uses little-endian LEB128.

use crate::Error;

pub fn encode_u64(mut value: u64) -> Vec<u8> {
    if value == 0 {
        return vec![0]
    }

    let mut vec = Vec::with_capacity(4);
    while value > 0 {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;

        if !vec.is_empty() {
            byte |= 0x80;
        }

        vec.push(byte);
    }

    vec.reverse();
    vec
}

pub fn decode_u64(bytes: &[u8]) -> Result<(u64, &[u8]), Error> {
    let mut value: u64 = 0;
    for (i, byte) in bytes.iter().enumerate() {
        try_assert!(value >> 57 == 0, Error::InvalidValue);
        value = (value << 7) + u64::from(byte & 0x7F);

        if byte < &0x80 {
            return Ok((value, &bytes[i+1..]));
        }
    }
    Err(Error::VLQNoTerminatingByte)
}

pub fn encode_leb128(mut value: u64) -> Vec<u8> {
    let mut vec = Vec::with_capacity(4);
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            vec.push(byte);
            return vec
        }
        vec.push(byte | 0x80);
    }
}

pub fn decode_leb128(bytes: &[u8]) -> Result<(u64, &[u8]), Error> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, byte) in bytes.iter().enumerate() {
        try_assert!(shift < 64, Error::InvalidValue);
        value |= u64::from(byte & 0x7F) << shift;
        shift += 7;

        if byte < &0x80 {
            return Ok((value, &bytes[i+1..]));
        }
    }
    Err(Error::VLQNoTerminatingByte)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_zero() {
        assert!(encode_u64(0) == vec![0]);
        assert!(encode_leb128(0) == vec![0]);
    }

    #[test]
    fn test_encode_single_byte_values() {
        assert!(encode_u64(43) == vec![43]);
        assert!(encode_leb128(43) == vec![43]);
    }

    #[test]
    fn test_encode_multibyte_values() {
        assert!(encode_u64(48323) == vec![130, 249, 67]);
        assert!(encode_leb128(48323) == vec![195, 249, 2]);
    }

    #[test]
    fn test_decode_multibyte_value() {
        let (value, rest) = decode_u64(&[130, 249, 67]).unwrap();
        assert!(value == 48323);
        assert!(rest.is_empty());

        let (value, rest) = decode_leb128(&[195, 249, 2]).unwrap();
        assert!(value == 48323);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_decode_multiple_values() {
        let bytes = vec![130, 249, 67, 124, 0];

        let (value1, rest1) = decode_u64(&bytes).unwrap();
        let (value2, rest2) = decode_u64(&rest1).unwrap();
        let (value3, rest3) = decode_u64(&rest2).unwrap();

        assert!(value1 == 48323);
        assert!(value2 == 124);
        assert!(value3 == 0);
        assert!(rest1 == &bytes[3..5]);
        assert!(rest2 == &bytes[4..5]);
        assert!(rest3.is_empty());
    }

    #[test]
    fn test_decode_invalid_value() {
        assert_matches!(decode_u64(&[130, 249, 129]), Err(Error::VLQNoTerminatingByte));
        assert_matches!(decode_leb128(&[130, 249, 129]), Err(Error::VLQNoTerminatingByte));
        assert_matches!(decode_u64(&[0xff; 12]), Err(Error::InvalidValue));
        assert_matches!(decode_leb128(&[0xff; 12]), Err(Error::InvalidValue));
    }

    #[test]
    fn test_encode_and_decode_max() {
        let (value, _) = decode_u64(&encode_u64(u64::max_value())).unwrap();
        assert!(value == u64::max_value());
        let (value, _) = decode_leb128(&encode_leb128(u64::max_value())).unwrap();
        assert!(value == u64::max_value());
    }
}

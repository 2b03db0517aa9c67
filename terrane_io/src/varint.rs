// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! LEB128 varints.
//!
//! Seven payload bits per byte, least significant group first, high bit set on every byte but the
//! last. Signed values go through zigzag so small negative numbers stay short.

use std::io::{self, Read, Write};

use crate::error::{IoError, Result};

/// Longest encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Append the encoding of `value` to `buf`, returning the number of bytes written.
pub fn encode_u64(mut value: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = 0;
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf[i] = byte;
            return i + 1;
        }
        buf[i] = byte | 0x80;
        i += 1;
    }
}

/// Write `value` as a varint.
pub fn write_u64<W: Write + ?Sized>(w: &mut W, value: u64) -> io::Result<usize> {
    let mut buf = [0_u8; MAX_VARINT_LEN];
    let n = encode_u64(value, &mut buf);
    w.write_all(&buf[..n])?;
    Ok(n)
}

/// Read one varint.
///
/// Returns `Ok(None)` if the reader is at end of input before the first byte. End of input after
/// the first byte, or an encoding longer than a `u64`, is [`IoError::CorruptStream`].
pub fn read_u64<R: Read + ?Sized>(r: &mut R) -> Result<Option<u64>> {
    let mut value: u64 = 0;
    let mut shift = 0_u32;
    let mut byte = [0_u8; 1];
    loop {
        let n = read_byte(r, &mut byte)?;
        if n == 0 {
            if shift == 0 {
                return Ok(None);
            }
            return Err(IoError::CorruptStream("truncated varint".into()));
        }
        let b = byte[0];
        if shift == 63 && b > 1 {
            return Err(IoError::CorruptStream("varint overflows 64 bits".into()));
        }
        value |= u64::from(b & 0x7f) << shift;
        if b & 0x80 == 0 {
            return Ok(Some(value));
        }
        shift += 7;
        if shift > 63 {
            return Err(IoError::CorruptStream("varint overflows 64 bits".into()));
        }
    }
}

fn read_byte<R: Read + ?Sized>(r: &mut R, byte: &mut [u8; 1]) -> Result<usize> {
    loop {
        match r.read(byte) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
}

/// Map a signed value onto the unsigned range, small magnitudes first.
pub const fn zigzag(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

/// Inverse of [`zigzag`].
pub const fn unzigzag(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_encodings() {
        let mut buf = [0_u8; MAX_VARINT_LEN];
        assert_eq!(encode_u64(0, &mut buf), 1);
        assert_eq!(buf[0], 0);
        assert_eq!(encode_u64(300, &mut buf), 2);
        assert_eq!(&buf[..2], &[0xac, 0x02]);
        assert_eq!(encode_u64(u64::MAX, &mut buf), MAX_VARINT_LEN);
    }

    #[test]
    fn clean_eof_is_none() {
        let mut r: &[u8] = &[];
        assert!(read_u64(&mut r).unwrap().is_none());
    }

    #[test]
    fn truncated_varint_is_corrupt() {
        let mut r: &[u8] = &[0x80, 0x80];
        assert!(matches!(read_u64(&mut r), Err(IoError::CorruptStream(_))));
    }

    #[test]
    fn overlong_varint_is_corrupt() {
        let mut r: &[u8] = &[0xff; 11];
        assert!(matches!(read_u64(&mut r), Err(IoError::CorruptStream(_))));
    }

    #[test]
    fn zigzag_small_values() {
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
        assert_eq!(unzigzag(zigzag(i64::MIN)), i64::MIN);
        assert_eq!(unzigzag(zigzag(i64::MAX)), i64::MAX);
    }

    proptest! {
        #[test]
        fn any_u64_survives(v in any::<u64>()) {
            let mut out = Vec::new();
            write_u64(&mut out, v).unwrap();
            let mut r = out.as_slice();
            prop_assert_eq!(read_u64(&mut r).unwrap(), Some(v));
            prop_assert!(r.is_empty());
        }
    }
}

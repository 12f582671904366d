//! Fixed little-endian wire records for the colouring handshake.

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::size_of;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

/// Decode one record from a possibly unaligned byte buffer.
pub fn read_record<T: Pod>(bytes: &[u8]) -> Result<T, String> {
    expect_exact_len(bytes.len(), size_of::<T>())?;
    Ok(bytemuck::pod_read_unaligned(bytes))
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// A colouring weight.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireWeight {
    pub w_le: u64,
}

impl WireWeight {
    pub fn new(w: u64) -> Self {
        Self { w_le: w.to_le() }
    }
    pub fn get(&self) -> u64 {
        u64::from_le(self.w_le)
    }
}

/// A chosen colour.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireColor {
    pub c_le: u32,
}

impl WireColor {
    pub fn new(c: u32) -> Self {
        Self { c_le: c.to_le() }
    }
    pub fn get(&self) -> u32 {
        u32::from_le(self.c_le)
    }
}

const_assert_eq!(size_of::<WireWeight>(), 8);
const_assert_eq!(size_of::<WireColor>(), 4);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_bytes_are_little_endian() {
        let w = WireWeight::new(0x0102_0304_0506_0708);
        let bytes = cast_slice(std::slice::from_ref(&w));
        assert_eq!(bytes, &[8, 7, 6, 5, 4, 3, 2, 1]);
        let back: WireWeight = read_record(bytes).unwrap();
        assert_eq!(back.get(), 0x0102_0304_0506_0708);
    }

    #[test]
    fn short_buffer_is_rejected() {
        assert_eq!(
            read_record::<WireColor>(&[1, 2]).unwrap_err(),
            "expected 4 bytes, got 2"
        );
    }
}

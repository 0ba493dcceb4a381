//! Pixel sample types accepted by the engine.
//!
//! The engine is generic over the in-memory sample type; the tile reader is
//! responsible for casting from whatever is stored on disk. Anything that is
//! a plain numeric value of 1, 2, 4 or 8 bytes qualifies.

/// Marker trait for numeric pixel samples.
///
/// Implemented for the signed and unsigned integers of 8–64 bits and for
/// `f32`/`f64`. The engine itself only copies and compares samples; all
/// arithmetic stays on the consumer side.
pub trait Pixel:
    Copy + Default + PartialEq + PartialOrd + Send + Sync + std::fmt::Debug + 'static
{
    /// Width of one sample in bytes.
    const BYTES: u32;

    /// Width of one sample in bits, as reported by default tile readers.
    const BITS: u32 = Self::BYTES * 8;
}

macro_rules! impl_pixel {
    ($($ty:ty),*) => {
        $(impl Pixel for $ty {
            const BYTES: u32 = std::mem::size_of::<$ty>() as u32;
        })*
    };
}

impl_pixel!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_widths() {
        assert_eq!(u8::BYTES, 1);
        assert_eq!(i16::BYTES, 2);
        assert_eq!(f32::BYTES, 4);
        assert_eq!(u64::BYTES, 8);
        assert_eq!(u16::BITS, 16);
    }
}

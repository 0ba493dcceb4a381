//! Finalized features: bounding box plus packed bitmask.

use crate::error::{Error, Result};
use crate::features::blob::Blob;
use crate::features::bounding_box::BoundingBox;

/// Bits per bitmask word.
const WORD_BITS: u32 = 32;

/// One labeled region of the mask.
///
/// The bitmask covers the bounding-box-local rectangle row-major: the bit
/// for linear position `p = row * width + col` lives in word `p / 32` at
/// bit `31 - (p % 32)`, big-endian within each word. This layout is
/// normative for the on-disk format and must not change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    id: u32,
    bounding_box: BoundingBox,
    bitmask: Vec<u32>,
}

/// Number of 32-bit words needed for an `height x width` bitmask.
pub(crate) fn bitmask_words(bounding_box: &BoundingBox) -> usize {
    (bounding_box.height() as usize * bounding_box.width() as usize).div_ceil(WORD_BITS as usize)
}

impl Feature {
    /// Build a feature from a prepared bitmask.
    ///
    /// Fails with `InvalidArgument` when the bitmask length does not match
    /// the bounding box.
    pub fn new(id: u32, bounding_box: BoundingBox, bitmask: Vec<u32>) -> Result<Self> {
        let expected = bitmask_words(&bounding_box);
        if bitmask.len() != expected {
            return Err(Error::InvalidArgument(format!(
                "feature {id}: bitmask holds {} words, expected {expected}",
                bitmask.len()
            )));
        }
        Ok(Self {
            id,
            bounding_box,
            bitmask,
        })
    }

    /// Pack a merged blob into a feature.
    pub fn from_blob(id: u32, blob: &Blob) -> Self {
        let bounding_box = blob.bounding_box();
        let width = bounding_box.width();
        let mut bitmask = vec![0u32; bitmask_words(&bounding_box)];
        for (row, col) in blob.pixels() {
            let local_row = row - bounding_box.ul_row();
            let local_col = col - bounding_box.ul_col();
            let position = local_row * width + local_col;
            let word = (position / WORD_BITS) as usize;
            let bit = WORD_BITS - position % WORD_BITS;
            bitmask[word] |= 1 << (bit - 1);
        }
        Self {
            id,
            bounding_box,
            bitmask,
        }
    }

    /// Feature identifier.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Bounding box in image coordinates.
    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bounding_box
    }

    /// Packed bitmask words.
    pub fn bitmask(&self) -> &[u32] {
        &self.bitmask
    }

    /// True if `(row, col)` falls inside the bounding box.
    pub fn contains(&self, row: u32, col: u32) -> bool {
        self.bounding_box.contains(row, col)
    }

    /// True if the pixel at global `(row, col)` belongs to the feature.
    pub fn is_in_bitmask(&self, row: u32, col: u32) -> bool {
        if !self.contains(row, col) {
            return false;
        }
        let local_row = row - self.bounding_box.ul_row();
        let local_col = col - self.bounding_box.ul_col();
        let position = local_row * self.bounding_box.width() + local_col;
        let word = (position / WORD_BITS) as usize;
        let bit = WORD_BITS - position % WORD_BITS;
        self.bitmask[word] & (1 << (bit - 1)) != 0
    }

    /// Append the feature's tokens to a serialization stream.
    pub(crate) fn serialize_into(&self, out: &mut String) {
        use std::fmt::Write;
        write!(
            out,
            "{} {} {} {} {} {} ",
            self.id,
            self.bitmask.len(),
            self.bounding_box.ul_row(),
            self.bounding_box.ul_col(),
            self.bounding_box.br_row(),
            self.bounding_box.br_col(),
        )
        .expect("writing to a String cannot fail");
        for word in &self.bitmask {
            write!(out, "{word} ").expect("writing to a String cannot fail");
        }
    }

    /// Read one feature from a whitespace token stream.
    pub(crate) fn deserialize_from<'a>(
        tokens: &mut impl Iterator<Item = &'a str>,
    ) -> Result<Self> {
        let mut next = |what: &str| -> Result<u32> {
            tokens
                .next()
                .ok_or_else(|| Error::Format(format!("feature stream truncated at {what}")))?
                .parse::<u32>()
                .map_err(|_| Error::Format(format!("feature stream: invalid {what}")))
        };

        let id = next("id")?;
        let num_words = next("word count")? as usize;
        let ul_row = next("ul_row")?;
        let ul_col = next("ul_col")?;
        let br_row = next("br_row")?;
        let br_col = next("br_col")?;
        if br_row < ul_row || br_col < ul_col {
            return Err(Error::Format(format!("feature {id}: inverted bounding box")));
        }
        let bounding_box = BoundingBox::new(ul_row, ul_col, br_row, br_col);
        if num_words != bitmask_words(&bounding_box) {
            return Err(Error::Format(format!(
                "feature {id}: {num_words} bitmask words do not match its bounding box"
            )));
        }
        let mut bitmask = Vec::with_capacity(num_words);
        for _ in 0..num_words {
            bitmask.push(next("bitmask word")?);
        }
        Ok(Self {
            id,
            bounding_box,
            bitmask,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_layout_is_big_endian_within_words() {
        // One 5x7 = 35 pixel box: positions 0 and 34 set.
        let mut blob = Blob::new(0);
        blob.add_pixel(10, 20); // local (0, 0) -> word 0, bit 31
        blob.add_pixel(14, 26); // local (4, 6) -> position 34, word 1, bit 29
        let feature = Feature::from_blob(1, &blob);
        assert_eq!(feature.bitmask().len(), 2);
        assert_eq!(feature.bitmask()[0], 1 << 31);
        assert_eq!(feature.bitmask()[1], 1 << 29);
        assert!(feature.is_in_bitmask(10, 20));
        assert!(feature.is_in_bitmask(14, 26));
        assert!(!feature.is_in_bitmask(10, 21));
    }

    #[test]
    fn test_alternating_pattern_word() {
        // 0xAAAAAAAA sets every even linear position of the first word.
        let bbox = BoundingBox::new(0, 0, 10, 3);
        let feature = Feature::new(1, bbox, vec![0xAAAA_AAAA]).unwrap();
        assert!(feature.is_in_bitmask(0, 0));
        assert!(!feature.is_in_bitmask(0, 1));
        assert!(feature.is_in_bitmask(0, 2));
        assert!(!feature.is_in_bitmask(1, 0)); // position 3
        assert!(feature.is_in_bitmask(1, 1)); // position 4
    }

    #[test]
    fn test_wrong_word_count_is_rejected() {
        let bbox = BoundingBox::new(0, 0, 10, 3);
        assert!(matches!(
            Feature::new(1, bbox, vec![0, 0]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_token_round_trip() {
        let mut blob = Blob::new(0);
        for col in 3..9 {
            blob.add_pixel(5, col);
        }
        let feature = Feature::from_blob(7, &blob);

        let mut out = String::new();
        feature.serialize_into(&mut out);
        let mut tokens = out.split_whitespace();
        let restored = Feature::deserialize_from(&mut tokens).unwrap();
        assert_eq!(feature, restored);
        assert!(tokens.next().is_none());
    }

    #[test]
    fn test_truncated_stream_is_a_format_error() {
        let mut tokens = "1 1 0 0 2".split_whitespace();
        assert!(matches!(
            Feature::deserialize_from(&mut tokens),
            Err(Error::Format(_))
        ));
    }
}

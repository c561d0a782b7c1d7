//! Bit-per-row evaluation results
//!
//! `Bitmap` is the currency passed between operators: one bit per evaluated
//! row, in row order. `BitmapView` is a mutable window over a sub-range used
//! by kernels to write a window's results in place.
//!
//! # Invariants
//!
//! - Bits past `len` in the last word are always zero
//! - AND/OR require equal lengths

mod view;

pub use view::BitmapView;

use crate::exec::{EvalResult, EvaluationError};
use crate::segment::RowRange;

const WORD_BITS: usize = 64;

#[inline]
fn words_for(len: usize) -> usize {
    (len + WORD_BITS - 1) / WORD_BITS
}

/// Dense bitmap over evaluated rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Bitmap {
    words: Vec<u64>,
    len: usize,
}

impl Bitmap {
    /// All bits false
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; words_for(len)],
            len,
        }
    }

    /// All bits true
    pub fn all_set(len: usize) -> Self {
        let mut bitmap = Self {
            words: vec![u64::MAX; words_for(len)],
            len,
        };
        bitmap.clear_tail();
        bitmap
    }

    pub fn from_bools(values: &[bool]) -> Self {
        values.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read bit `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.len, "bit {} out of {}", index, self.len);
        (self.words[index / WORD_BITS] >> (index % WORD_BITS)) & 1 == 1
    }

    /// Write bit `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    #[inline]
    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < self.len, "bit {} out of {}", index, self.len);
        let mask = 1u64 << (index % WORD_BITS);
        if value {
            self.words[index / WORD_BITS] |= mask;
        } else {
            self.words[index / WORD_BITS] &= !mask;
        }
    }

    /// Mutable view over `[offset, offset + len)`
    pub fn view_mut(&mut self, offset: usize, len: usize) -> EvalResult<BitmapView<'_>> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| EvaluationError::range(offset, usize::MAX, self.len))?;
        if end > self.len {
            return Err(EvaluationError::range(offset, end, self.len));
        }
        Ok(BitmapView::new(self, offset, len))
    }

    /// Number of set bits
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// True if no bit is set
    pub fn none(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Lazily iterate the positions of set bits in ascending order.
    ///
    /// Each call starts a fresh pass.
    pub fn iter_ones(&self) -> SetBits<'_> {
        SetBits {
            words: &self.words,
            word_index: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }

    /// Bitwise AND of two same-length bitmaps
    pub fn and(&self, other: &Bitmap) -> EvalResult<Bitmap> {
        let mut out = self.clone();
        out.and_assign(other)?;
        Ok(out)
    }

    /// Bitwise OR of two same-length bitmaps
    pub fn or(&self, other: &Bitmap) -> EvalResult<Bitmap> {
        let mut out = self.clone();
        out.or_assign(other)?;
        Ok(out)
    }

    pub fn and_assign(&mut self, other: &Bitmap) -> EvalResult<()> {
        self.check_shape(other)?;
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a &= *b;
        }
        Ok(())
    }

    pub fn or_assign(&mut self, other: &Bitmap) -> EvalResult<()> {
        self.check_shape(other)?;
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= *b;
        }
        Ok(())
    }

    /// Bitwise NOT
    pub fn not(&self) -> Bitmap {
        let mut out = Bitmap {
            words: self.words.iter().map(|w| !w).collect(),
            len: self.len,
        };
        out.clear_tail();
        out
    }

    /// Append `other`'s bits after the last bit of `self`
    pub fn append(&mut self, other: &Bitmap) {
        let shift = self.len % WORD_BITS;
        if shift == 0 {
            self.words.extend_from_slice(&other.words);
        } else {
            for &word in &other.words {
                let last = self.words.len() - 1;
                self.words[last] |= word << shift;
                self.words.push(word >> (WORD_BITS - shift));
            }
        }
        self.len += other.len;
        self.words.truncate(words_for(self.len));
    }

    /// Copy of the bits in `range`
    pub fn slice(&self, range: RowRange) -> EvalResult<Bitmap> {
        if range.start > range.end || range.end > self.len {
            return Err(EvaluationError::range(range.start, range.end, self.len));
        }
        Ok((range.start..range.end).map(|i| self.get(i)).collect())
    }

    pub fn to_bools(&self) -> Vec<bool> {
        (0..self.len).map(|i| self.get(i)).collect()
    }

    fn check_shape(&self, other: &Bitmap) -> EvalResult<()> {
        if self.len != other.len {
            return Err(EvaluationError::ShapeMismatch {
                left: self.len,
                right: other.len,
            });
        }
        Ok(())
    }

    fn clear_tail(&mut self) {
        let used = self.len % WORD_BITS;
        if used != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << used) - 1;
            }
        }
    }
}

impl FromIterator<bool> for Bitmap {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut words = Vec::new();
        let mut len = 0;
        for value in iter {
            if len % WORD_BITS == 0 {
                words.push(0);
            }
            if value {
                let last = words.len() - 1;
                words[last] |= 1u64 << (len % WORD_BITS);
            }
            len += 1;
        }
        Self { words, len }
    }
}

/// Lazy iterator over set bit positions
#[derive(Debug, Clone)]
pub struct SetBits<'a> {
    words: &'a [u64],
    word_index: usize,
    current: u64,
}

impl Iterator for SetBits<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(self.word_index * WORD_BITS + bit);
            }
            self.word_index += 1;
            if self.word_index >= self.words.len() {
                return None;
            }
            self.current = self.words[self.word_index];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bools(bits: &str) -> Bitmap {
        bits.chars().map(|c| c == '1').collect()
    }

    #[test]
    fn test_new_is_all_false() {
        let bitmap = Bitmap::new(130);
        assert_eq!(bitmap.len(), 130);
        assert_eq!(bitmap.count_ones(), 0);
        assert!(bitmap.none());
    }

    #[test]
    fn test_all_set_clears_tail() {
        let bitmap = Bitmap::all_set(70);
        assert_eq!(bitmap.count_ones(), 70);
        assert_eq!(bitmap.not().count_ones(), 0);
    }

    #[test]
    fn test_set_get() {
        let mut bitmap = Bitmap::new(100);
        bitmap.set(0, true);
        bitmap.set(64, true);
        bitmap.set(99, true);
        bitmap.set(64, false);
        assert!(bitmap.get(0));
        assert!(!bitmap.get(64));
        assert!(bitmap.get(99));
        assert_eq!(bitmap.count_ones(), 2);
    }

    #[test]
    fn test_and_or_not() {
        let a = bools("1100");
        let b = bools("1010");
        assert_eq!(a.and(&b).unwrap(), bools("1000"));
        assert_eq!(a.or(&b).unwrap(), bools("1110"));
        assert_eq!(a.not(), bools("0011"));
    }

    #[test]
    fn test_shape_mismatch() {
        let a = Bitmap::new(3);
        let b = Bitmap::new(4);
        assert_eq!(
            a.and(&b),
            Err(EvaluationError::ShapeMismatch { left: 3, right: 4 })
        );
        assert!(matches!(
            a.or(&b),
            Err(EvaluationError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_iter_ones_is_lazy_and_restartable() {
        let mut bitmap = Bitmap::new(200);
        for i in [3, 63, 64, 128, 199] {
            bitmap.set(i, true);
        }
        let mut iter = bitmap.iter_ones();
        assert_eq!(iter.next(), Some(3));

        let all: Vec<_> = bitmap.iter_ones().collect();
        assert_eq!(all, vec![3, 63, 64, 128, 199]);
        assert_eq!(bitmap.iter_ones().count(), 5);
        assert_eq!(Bitmap::new(0).iter_ones().next(), None);
    }

    #[test]
    fn test_append_unaligned() {
        let mut left = bools("101");
        let mut right = Bitmap::new(70);
        right.set(0, true);
        right.set(69, true);
        left.append(&right);

        assert_eq!(left.len(), 73);
        let ones: Vec<_> = left.iter_ones().collect();
        assert_eq!(ones, vec![0, 2, 3, 72]);
    }

    #[test]
    fn test_append_aligned_and_empty() {
        let mut left = Bitmap::all_set(64);
        left.append(&bools("01"));
        assert_eq!(left.len(), 66);
        assert!(left.get(65));
        assert!(!left.get(64));

        let mut empty = Bitmap::new(0);
        empty.append(&bools("11"));
        assert_eq!(empty, bools("11"));
    }

    #[test]
    fn test_append_matches_from_iter() {
        let a: Vec<bool> = (0..77).map(|i| i % 3 == 0).collect();
        let b: Vec<bool> = (0..91).map(|i| i % 5 == 1).collect();
        let mut joined = Bitmap::from_bools(&a);
        joined.append(&Bitmap::from_bools(&b));

        let expected: Bitmap = a.iter().chain(b.iter()).copied().collect();
        assert_eq!(joined, expected);
    }

    #[test]
    fn test_slice() {
        let bitmap = bools("0110100");
        assert_eq!(bitmap.slice(RowRange::new(1, 5)).unwrap(), bools("1101"));
        assert!(bitmap.slice(RowRange::new(5, 9)).is_err());
    }

    #[test]
    fn test_view_mut_bounds() {
        let mut bitmap = Bitmap::new(10);
        assert!(bitmap.view_mut(8, 2).is_ok());
        assert_eq!(
            bitmap.view_mut(8, 3).err(),
            Some(EvaluationError::range(8, 11, 10))
        );
    }
}

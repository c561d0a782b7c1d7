//! Mutable window over a sub-range of a bitmap

use super::Bitmap;
use crate::exec::{EvalResult, EvaluationError};

/// Writable view over `[offset, offset + len)` of a [`Bitmap`].
///
/// Indexes passed to the view are relative to `offset`.
#[derive(Debug)]
pub struct BitmapView<'a> {
    base: &'a mut Bitmap,
    offset: usize,
    len: usize,
}

impl<'a> BitmapView<'a> {
    pub(super) fn new(base: &'a mut Bitmap, offset: usize, len: usize) -> Self {
        Self { base, offset, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of this view inside the base bitmap
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < self.len, "bit {} out of view of {}", index, self.len);
        self.base.set(self.offset + index, value);
    }

    #[inline]
    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.len, "bit {} out of view of {}", index, self.len);
        self.base.get(self.offset + index)
    }

    pub fn fill(&mut self, value: bool) {
        for i in 0..self.len {
            self.set(i, value);
        }
    }

    /// Narrower view over `[offset, offset + len)` relative to this view
    pub fn sub_view(&mut self, offset: usize, len: usize) -> EvalResult<BitmapView<'_>> {
        let end = offset + len;
        if end > self.len {
            return Err(EvaluationError::range(offset, end, self.len));
        }
        Ok(BitmapView {
            base: &mut *self.base,
            offset: self.offset + offset,
            len,
        })
    }

    /// Overwrite the whole view with `src`
    pub fn copy_from(&mut self, src: &Bitmap) -> EvalResult<()> {
        if src.len() != self.len {
            return Err(EvaluationError::ShapeMismatch {
                left: self.len,
                right: src.len(),
            });
        }
        for i in 0..self.len {
            self.set(i, src.get(i));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_writes_at_offset() {
        let mut bitmap = Bitmap::new(8);
        {
            let mut view = bitmap.view_mut(4, 3).unwrap();
            view.set(0, true);
            view.set(2, true);
            assert!(view.get(2));
        }
        assert_eq!(bitmap.to_bools(), vec![false, false, false, false, true, false, true, false]);
    }

    #[test]
    fn test_sub_view_and_fill() {
        let mut bitmap = Bitmap::new(10);
        {
            let mut view = bitmap.view_mut(2, 6).unwrap();
            let mut inner = view.sub_view(1, 2).unwrap();
            assert_eq!(inner.offset(), 3);
            inner.fill(true);
            assert!(view.sub_view(5, 2).is_err());
        }
        assert_eq!(bitmap.iter_ones().collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn test_copy_from_requires_equal_length() {
        let mut bitmap = Bitmap::new(5);
        let src = Bitmap::from_bools(&[true, false, true]);
        {
            let mut view = bitmap.view_mut(1, 3).unwrap();
            view.copy_from(&src).unwrap();
            assert!(view.copy_from(&Bitmap::new(2)).is_err());
        }
        assert_eq!(bitmap.iter_ones().collect::<Vec<_>>(), vec![1, 3]);
    }
}

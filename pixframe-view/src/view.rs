//! Typed read-only access to an image's samples.

use crate::sample::Sample;

/// Borrowed, typed view of an [`crate::Image`].
///
/// Obtained through [`crate::Image::view`]; the sample type is checked once
/// there, so element access needs no conversion.
#[derive(Clone, Copy)]
pub struct ImageView<'a, T> {
    data: &'a [T],
    sizes: &'a [usize],
    strides: &'a [isize],
    tensor_elements: usize,
    tensor_stride: isize,
    offset: isize,
}

impl<T: std::fmt::Debug> std::fmt::Debug for ImageView<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageView")
            .field("sizes", &self.sizes)
            .field("strides", &self.strides)
            .field("tensor_elements", &self.tensor_elements)
            .field("offset", &self.offset)
            .finish()
    }
}

impl<'a, T: Sample> ImageView<'a, T> {
    pub(crate) fn new(
        data: &'a [T],
        sizes: &'a [usize],
        strides: &'a [isize],
        tensor_elements: usize,
        tensor_stride: isize,
        offset: isize,
    ) -> Self {
        Self {
            data,
            sizes,
            strides,
            tensor_elements,
            tensor_stride,
            offset,
        }
    }

    pub fn sizes(&self) -> &'a [usize] {
        self.sizes
    }

    pub fn strides(&self) -> &'a [isize] {
        self.strides
    }

    pub fn tensor_elements(&self) -> usize {
        self.tensor_elements
    }

    /// Underlying buffer, including samples outside the view.
    pub fn data(&self) -> &'a [T] {
        self.data
    }

    fn index(&self, coords: &[usize], t: usize) -> usize {
        assert_eq!(coords.len(), self.sizes.len(), "wrong number of coordinates");
        assert!(t < self.tensor_elements, "tensor element {} out of range", t);
        let mut idx = self.offset + t as isize * self.tensor_stride;
        for (d, (&c, &st)) in coords.iter().zip(self.strides.iter()).enumerate() {
            assert!(c < self.sizes[d], "coordinate {} out of bounds for dimension {}", c, d);
            idx += c as isize * st;
        }
        idx as usize
    }

    /// First tensor element at `coords`.
    pub fn get(&self, coords: &[usize]) -> T {
        self.data[self.index(coords, 0)]
    }

    pub fn get_tensor(&self, coords: &[usize], t: usize) -> T {
        self.data[self.index(coords, t)]
    }
}

#[cfg(test)]
mod tests {
    use crate::{DataType, FrameError, Image};

    #[test]
    fn test_view_type_is_checked() {
        let img = Image::from_fn(&[2, 2], |c| (c[0] + 2 * c[1]) as f32);
        assert!(matches!(
            img.view::<f64>(),
            Err(FrameError::DataTypeMismatch { found: DataType::F32, requested: DataType::F64 })
        ));
        let v = img.view::<f32>().unwrap();
        assert_eq!(v.get(&[1, 1]), 3.0);
        assert_eq!(v.sizes(), &[2, 2]);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_view_bounds() {
        let img = Image::from_fn(&[2, 2], |_| 1u8);
        let v = img.view::<u8>().unwrap();
        let _ = v.get(&[2, 0]);
    }
}

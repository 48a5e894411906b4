//! Scalar types that can live in a block.

use crate::layout::StorageFormat;
use num_complex::Complex;
use num_traits::Float;

/// Element type of a block.
///
/// Every element type has a natural [`StorageFormat`]: real scalars are
/// stored as a plain array, complex scalars interleaved (`re, im, re, im`).
pub trait Element: Copy + Default + PartialEq + std::fmt::Debug + 'static {
    /// Storage format of a buffer of `Self` elements.
    const FORMAT: StorageFormat;
}

macro_rules! impl_real_element {
    ($($t:ty),*) => {
        $(
            impl Element for $t {
                const FORMAT: StorageFormat = StorageFormat::Array;
            }
        )*
    };
}

impl_real_element!(f32, f64, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl<R: Float + Default + std::fmt::Debug + 'static> Element for Complex<R> {
    const FORMAT: StorageFormat = StorageFormat::InterleavedComplex;
}

/// Complex element that can be split into separate real and imaginary planes.
pub trait ComplexElement: Element {
    /// Real component type.
    type Real: Element + Float;

    fn re(self) -> Self::Real;
    fn im(self) -> Self::Real;
    fn from_parts(re: Self::Real, im: Self::Real) -> Self;
}

impl<R: Float + Element> ComplexElement for Complex<R> {
    type Real = R;

    #[inline]
    fn re(self) -> R {
        self.re
    }

    #[inline]
    fn im(self) -> R {
        self.im
    }

    #[inline]
    fn from_parts(re: R, im: R) -> Self {
        Complex::new(re, im)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex32;

    #[test]
    fn test_natural_formats() {
        assert_eq!(<f32 as Element>::FORMAT, StorageFormat::Array);
        assert_eq!(<i16 as Element>::FORMAT, StorageFormat::Array);
        assert_eq!(
            <Complex32 as Element>::FORMAT,
            StorageFormat::InterleavedComplex
        );
    }

    #[test]
    fn test_complex_parts() {
        let z = Complex32::from_parts(1.5, -2.0);
        assert_eq!(z.re(), 1.5);
        assert_eq!(z.im(), -2.0);
    }
}

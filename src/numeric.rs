//! Basic numerical concepts used throughout the program

#![allow(missing_docs)]

// Floating-point precision is configured here
#[cfg(feature = "f32")]
pub type Float = f32;
#[cfg(feature = "f32")]
pub use std::f32 as reals;
#[cfg(not(feature = "f32"))]
pub type Float = f64;
#[cfg(not(feature = "f32"))]
pub use std::f64 as reals;

/// Vector of per-bin values (contents or uncertainties)
pub type BinVector = nalgebra::DVector<Float>;

/// Mathematical functions
pub mod functions {
    use super::Float;

    /// Round to the nearest integer, sending halfway cases to the even one
    pub fn nint(x: Float) -> Float {
        let rounded = x.round();
        if (rounded - x).abs() == 0.5 && rounded % 2. != 0. {
            rounded - x.signum()
        } else {
            rounded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::functions::nint;

    #[test]
    fn nint_rounds_halfway_to_even() {
        assert_eq!(nint(2.5), 2.);
        assert_eq!(nint(3.5), 4.);
        assert_eq!(nint(-2.5), -2.);
        assert_eq!(nint(2.4), 2.);
        assert_eq!(nint(2.6), 3.);
    }
}

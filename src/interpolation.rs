//! One-dimensional lookups used by the radiative property table.
//!
//! Two methods are provided: [`NearestNeighborInterp`], which returns the
//! tabulated value closest in x, and [`LinearInterp`], which interpolates
//! linearly and clamps to the end values outside the table. Both work on
//! plain slices so they can be fed ndarray columns directly.
use std::fmt::Debug;

use ndarray::{ArrayD, ArrayViewD, Zip};
use num_traits::Float;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InterpolationError {
    #[error("Input arrays were different lengths (x.len() = {x_len}, y.len() = {y_len})")]
    InputLengthMismatch { x_len: usize, y_len: usize },
    #[error(
        "Input arrays were too short, needed at least {req_len} elements but got only {actual_len}"
    )]
    InputTooShort { req_len: usize, actual_len: usize },
    #[error("Input x values must be strictly increasing, but x[{index}] = {next} follows {prev}")]
    NotIncreasing {
        index: usize,
        prev: String,
        next: String,
    },
}

pub trait InterpolationMethod {
    /// Minimum number of input points this method needs.
    fn min_len(&self) -> usize;

    /// Evaluate the method at `output_x` without checking the inputs.
    ///
    /// Callers must have already passed `input_x` and `input_y` through
    /// [`InterpolationMethod::check_1d_inputs`].
    fn interp1d_unchecked<F: Float>(&self, input_x: &[F], input_y: &[F], output_x: F) -> F;

    fn interp1d<F: Float + Debug>(
        &self,
        input_x: &[F],
        input_y: &[F],
        output_x: F,
    ) -> Result<F, InterpolationError> {
        self.check_1d_inputs(input_x, input_y)?;
        Ok(self.interp1d_unchecked(input_x, input_y, output_x))
    }

    /// Interpolate to every element of `output_x`, preserving its shape.
    ///
    /// The inputs are checked once, then the elements are evaluated in parallel.
    fn interp_array<F: Float + Debug + Send + Sync>(
        &self,
        input_x: &[F],
        input_y: &[F],
        output_x: ArrayViewD<'_, F>,
    ) -> Result<ArrayD<F>, InterpolationError>
    where
        Self: Sync,
    {
        self.check_1d_inputs(input_x, input_y)?;
        let out = Zip::from(&output_x)
            .par_map_collect(|&x| self.interp1d_unchecked(input_x, input_y, x));
        Ok(out)
    }

    fn check_1d_inputs<F: Float + Debug>(
        &self,
        input_x: &[F],
        input_y: &[F],
    ) -> Result<(), InterpolationError> {
        if input_x.len() != input_y.len() {
            return Err(InterpolationError::InputLengthMismatch {
                x_len: input_x.len(),
                y_len: input_y.len(),
            });
        }

        // Now we know both are the same length, so only need to test 1
        let min_len = self.min_len();
        if input_x.len() < min_len {
            return Err(InterpolationError::InputTooShort {
                req_len: min_len,
                actual_len: input_x.len(),
            });
        }

        Ok(())
    }
}

/// Return the index of the element of `input_x` closest to `output_x`.
///
/// Ties go to the lowest index. Returns `None` only if `input_x` is empty.
pub fn nearest_index<F: Float>(input_x: &[F], output_x: F) -> Option<usize> {
    input_x
        .iter()
        .enumerate()
        .fold(None, |acc, (i, x)| {
            let new_diff = (*x - output_x).abs();
            match acc {
                Some((curr_i, curr_diff)) if !(new_diff < curr_diff) => Some((curr_i, curr_diff)),
                _ => Some((i, new_diff)),
            }
        })
        .map(|(i, _)| i)
}

/// Interpolator that returns the y value of the closest x value.
///
/// There is no notion of "outside the domain" here; any `output_x` maps to
/// the nearest tabulated point.
#[derive(Debug, Default, Clone, Copy)]
pub struct NearestNeighborInterp;

impl InterpolationMethod for NearestNeighborInterp {
    fn min_len(&self) -> usize {
        1
    }

    fn interp1d_unchecked<F: Float>(&self, input_x: &[F], input_y: &[F], output_x: F) -> F {
        let i_closest = nearest_index(input_x, output_x).expect("Inputs must have at least 1 element");
        input_y[i_closest]
    }
}

/// Piecewise linear interpolation over strictly increasing x values.
///
/// Outside the tabulated range, the first or last y value is returned. No
/// extrapolation is done.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinearInterp;

impl LinearInterp {
    /// Verify that `input_x` is strictly increasing. [`InterpolationMethod::interp1d`]
    /// does not do this for every call, so check once when the x values are first loaded.
    pub fn check_increasing<F: Float + Debug>(input_x: &[F]) -> Result<(), InterpolationError> {
        for (i, (prev, next)) in input_x.iter().zip(input_x.iter().skip(1)).enumerate() {
            if !(next > prev) {
                return Err(InterpolationError::NotIncreasing {
                    index: i + 1,
                    prev: format!("{prev:?}"),
                    next: format!("{next:?}"),
                });
            }
        }
        Ok(())
    }
}

impl InterpolationMethod for LinearInterp {
    fn min_len(&self) -> usize {
        2
    }

    fn interp1d_unchecked<F: Float>(&self, input_x: &[F], input_y: &[F], output_x: F) -> F {
        let n = input_x.len();
        if output_x.is_nan() {
            return output_x;
        }
        if output_x <= input_x[0] {
            return input_y[0];
        }
        if output_x >= input_x[n - 1] {
            return input_y[n - 1];
        }

        // First index whose x is strictly greater than output_x; the bounds checks
        // above guarantee 1 <= i_right <= n - 1.
        let i_right = input_x.partition_point(|&x| x <= output_x);
        let i_left = i_right - 1;
        let (x0, x1) = (input_x[i_left], input_x[i_right]);
        let (y0, y1) = (input_y[i_left], input_y[i_right]);

        // Slope form keeps tabulated nodes and flat segments exact.
        let slope = (y1 - y0) / (x1 - x0);
        y0 + slope * (output_x - x0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rstest::rstest;

    #[test]
    fn test_error_checks() {
        let interpolator = LinearInterp;

        let err = interpolator.interp1d(&[1.0], &[1.0, 1.0], 2.0).unwrap_err();
        match err {
            InterpolationError::InputLengthMismatch { x_len, y_len } => {
                assert_eq!(x_len, 1, "x_len in error is incorrect");
                assert_eq!(y_len, 2, "y_len in error is incorrect");
            }
            _ => assert!(
                false,
                "Expected InputLengthMismatch error, did not get that"
            ),
        }

        let err = interpolator.interp1d(&[1.0], &[1.0], 2.0).unwrap_err();
        match err {
            InterpolationError::InputTooShort {
                req_len,
                actual_len,
            } => {
                assert_eq!(req_len, 2, "req_len in error is incorrect");
                assert_eq!(actual_len, 1, "actual_len in error is incorrect");
            }
            _ => assert!(false, "Expected InputTooShort error, did not get that"),
        }

        let err = NearestNeighborInterp
            .interp1d::<f64>(&[], &[], 2.0)
            .unwrap_err();
        assert_eq!(
            err,
            InterpolationError::InputTooShort {
                req_len: 1,
                actual_len: 0
            }
        );
    }

    #[test]
    fn test_check_increasing() {
        LinearInterp::check_increasing(&[1.0, 2.0, 3.0]).unwrap();
        let err = LinearInterp::check_increasing(&[1.0, 2.0, 2.0]).unwrap_err();
        match err {
            InterpolationError::NotIncreasing { index, .. } => assert_eq!(index, 2),
            _ => assert!(false, "Expected NotIncreasing error, did not get that"),
        }
    }

    #[rstest]
    #[case(0.6, 0)]
    #[case(0.75, 0)]
    #[case(0.8, 1)]
    #[case(-10.0, 0)]
    #[case(10.0, 2)]
    fn test_nearest_index(#[case] value: f64, #[case] expected: usize) {
        let x = [0.5, 1.0, 2.0];
        assert_eq!(nearest_index(&x, value), Some(expected));
    }

    #[test]
    fn test_nearest_index_empty() {
        assert_eq!(nearest_index::<f64>(&[], 1.0), None);
    }

    #[test]
    fn test_nearest_value() {
        let interpolator = NearestNeighborInterp;
        let x = [1.0, 2.0, 3.0];
        let y = [2.0, 4.0, 6.0];

        let y_out = interpolator.interp1d(&x, &y, 1.25).unwrap();
        assert_abs_diff_eq!(y_out, 2.0);

        let y_out = interpolator.interp1d(&x, &y, 10.0).unwrap();
        assert_abs_diff_eq!(y_out, 6.0);
    }

    #[rstest]
    #[case(1.0, 2.0)]
    #[case(1.5, 3.0)]
    #[case(2.0, 4.0)]
    #[case(2.25, 4.5)]
    #[case(3.0, 6.0)]
    #[case(0.0, 2.0)]
    #[case(100.0, 6.0)]
    fn test_linear(#[case] value: f64, #[case] expected: f64) {
        let x = [1.0, 2.0, 3.0];
        let y = [2.0, 4.0, 6.0];
        let y_out = LinearInterp.interp1d(&x, &y, value).unwrap();
        assert_abs_diff_eq!(y_out, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_linear_exact_at_nodes() {
        let x = [0.1, 0.37, 1.9, 4.2];
        let y = [0.713, 1.0 / 3.0, 2.0_f64.sqrt(), 7.1];
        for (xi, yi) in x.iter().zip(y.iter()) {
            assert_eq!(LinearInterp.interp1d(&x, &y, *xi).unwrap(), *yi);
        }
    }

    #[test]
    fn test_linear_flat_curve_is_exact() {
        let x = [0.1, 0.37, 1.9, 4.2];
        let y = [1.0; 4];
        for q in [0.2, 0.3333, 1.2, 3.9999] {
            assert_eq!(LinearInterp.interp1d(&x, &y, q).unwrap(), 1.0);
        }
    }

    #[test]
    fn test_interp_array_keeps_shape() {
        let x = [1.0, 2.0, 3.0];
        let y = [2.0, 4.0, 6.0];
        let q = array![[1.5, 2.5], [0.0, 4.0]].into_dyn();
        let out = LinearInterp.interp_array(&x, &y, q.view()).unwrap();
        let expected = array![[3.0, 5.0], [2.0, 6.0]].into_dyn();
        assert_abs_diff_eq!(out, expected, epsilon = 1e-12);
    }
}

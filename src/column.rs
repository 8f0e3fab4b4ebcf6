//! Vertical integration of per-layer optical depth.
use ndarray::{ArrayD, ArrayViewD, Axis, Slice, Zip};

use crate::{error::OpticalDepthError, pressure::VERTICAL_AXIS};

/// Integrate a per-layer optical depth field over pressure.
///
/// `pressure` holds level-edge pressures and `optical_depth` per-layer values, both
/// with the vertical dimension on [`VERTICAL_AXIS`]. Layer `k` is weighted by
/// `(p[k+1] - p[k]) / gravity`, so `optical_depth` must have exactly one fewer
/// vertical element than `pressure` and identical lengths on every other axis.
/// The returned array drops the vertical axis.
pub fn integrate_column(
    pressure: ArrayViewD<'_, f64>,
    optical_depth: ArrayViewD<'_, f64>,
    gravity: f64,
) -> Result<ArrayD<f64>, OpticalDepthError> {
    if !(gravity.is_finite() && gravity > 0.0) {
        return Err(OpticalDepthError::NumericDegenerate {
            quantity: "gravity",
            location: format!("value {gravity} (must be positive)"),
        });
    }
    if pressure.ndim() <= VERTICAL_AXIS {
        return Err(OpticalDepthError::WrongDimensionality {
            what: "pressure".to_string(),
            expected: VERTICAL_AXIS + 1,
            actual: pressure.ndim(),
        });
    }

    let nlev = pressure.len_of(Axis(VERTICAL_AXIS));
    let mut expected = pressure.shape().to_vec();
    expected[VERTICAL_AXIS] = nlev.saturating_sub(1);
    if nlev == 0 || optical_depth.shape() != expected.as_slice() {
        return Err(OpticalDepthError::shape_mismatch(
            "optical depth (one fewer vertical element than pressure)",
            &expected,
            optical_depth.shape(),
        ));
    }

    let upper = pressure.slice_axis(Axis(VERTICAL_AXIS), Slice::new(0, Some(-1), 1));
    let lower = pressure.slice_axis(Axis(VERTICAL_AXIS), Slice::new(1, None, 1));

    let mut weighted = ArrayD::<f64>::zeros(optical_depth.raw_dim());
    Zip::from(&mut weighted)
        .and(&optical_depth)
        .and(&upper)
        .and(&lower)
        .par_for_each(|w, &od, &p_top, &p_bottom| *w = od * (p_bottom - p_top) / gravity);

    Ok(weighted.sum_axis(Axis(VERTICAL_AXIS)))
}

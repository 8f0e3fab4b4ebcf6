//! Seasonal and grid coordinate helpers for GCM output.
use itertools::Itertools;
use ndarray::{Array1, ArrayD, ArrayViewD, Axis};

/// Degrees in one orbit
pub const FULL_CIRCLE: f64 = 360.0;

/// Wrap `value` into `[0, period)`.
///
/// `rem_euclid` can round up to exactly `period` for tiny negative inputs,
/// which would fall outside the half-open range, so that case maps to 0.
fn wrap(value: f64, period: f64) -> f64 {
    let w = value.rem_euclid(period);
    if w >= period {
        0.0
    } else {
        w
    }
}

/// Convert the GCM's `areo` (cumulative solar longitude in degrees) to solar
/// longitude in `[0, 360)`.
///
/// Trailing length-1 axes are removed, so a `(sol, local time, 1)` input becomes
/// `(sol, local time)`.
pub fn solar_longitude(areo: ArrayViewD<'_, f64>) -> ArrayD<f64> {
    let mut ls = areo;
    while ls.ndim() > 0 && ls.len_of(Axis(ls.ndim() - 1)) == 1 {
        let last = ls.ndim() - 1;
        ls = ls.index_axis_move(Axis(last), 0);
    }
    ls.mapv(|a| wrap(a, FULL_CIRCLE))
}

/// Convert simulation time (sols since the start of the run) to sol of year in
/// `[0, sols_per_year)`.
pub fn sol_of_year(time: ArrayViewD<'_, f64>, sols_per_year: f64) -> ArrayD<f64> {
    time.mapv(|t| wrap(t, sols_per_year))
}

/// `n + 1` evenly spaced cell edges from `start` to `stop` inclusive.
pub fn uniform_edges(start: f64, stop: f64, n: usize) -> Array1<f64> {
    Array1::linspace(start, stop, n + 1)
}

/// The distinct values in `values`, sorted ascending. NaNs are dropped.
///
/// Used to flatten a `(n, 2)` bounds array into `n + 1` edges.
pub fn unique_sorted(values: ArrayViewD<'_, f64>) -> Array1<f64> {
    let v = values
        .iter()
        .copied()
        .filter(|x| !x.is_nan())
        .sorted_by(|a, b| a.total_cmp(b))
        .dedup()
        .collect_vec();
    Array1::from_vec(v)
}

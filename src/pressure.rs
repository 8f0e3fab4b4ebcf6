//! Pressure on the GCM's hybrid vertical coordinate.
//!
//! The level pressures are `p = ak + bk * ps`, so the full 5-D pressure field can
//! always be rebuilt from the 4-D surface pressure and two short coefficient
//! vectors. For long, high resolution runs the 5-D field is large enough that it
//! is cheaper to recompute it whenever it is needed than to keep or store it.
use ndarray::{Array1, Array5, ArrayViewD, Ix1, Ix4};

use crate::{
    error::OpticalDepthError,
    store::{ArraySource, StoreError},
};

/// Axis of the vertical coordinate in every 5-D (sol, local time, vertical, lat, lon) field.
pub const VERTICAL_AXIS: usize = 2;

/// Name of the surface pressure variable in the GCM output
pub static SURFACE_PRESSURE_VAR: &'static str = "ps";
/// Name of the GCM variable holding the `ak` coefficients. The Ames output calls
/// it `pk`, but it is the pressure term of the hybrid coordinate.
pub static AK_VAR: &'static str = "pk";
pub static BK_VAR: &'static str = "bk";

/// Hybrid coordinate coefficients, one value per vertical level edge.
#[derive(Debug, Clone, PartialEq)]
pub struct HybridCoefficients {
    /// Pressure term, Pa
    ak: Array1<f64>,
    /// Surface pressure fraction, unitless
    bk: Array1<f64>,
}

impl HybridCoefficients {
    pub fn new(ak: Array1<f64>, bk: Array1<f64>) -> Result<Self, OpticalDepthError> {
        if ak.len() != bk.len() {
            return Err(OpticalDepthError::shape_mismatch(
                "hybrid coefficient bk (must match ak)",
                &[ak.len()],
                &[bk.len()],
            ));
        }
        if ak.is_empty() {
            return Err(OpticalDepthError::RangeDegenerate {
                axis: "hybrid level",
                len: 0,
            });
        }
        Ok(Self { ak, bk })
    }

    /// Read the coefficients from GCM output, taking `ak` from the `pk` variable.
    pub fn from_source<S: ArraySource + ?Sized>(source: &S) -> Result<Self, HybridReadError> {
        let ak = read_coefficient(source, AK_VAR)?;
        let bk = read_coefficient(source, BK_VAR)?;
        let coeffs = Self::new(ak, bk)?;
        Ok(coeffs)
    }

    pub fn ak(&self) -> &Array1<f64> {
        &self.ak
    }

    pub fn bk(&self) -> &Array1<f64> {
        &self.bk
    }

    /// Number of level edges, i.e. one more than the number of layers.
    pub fn n_levels(&self) -> usize {
        self.ak.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HybridReadError {
    #[error("Could not read hybrid coefficient '{0}'")]
    Read(&'static str, #[source] StoreError),
    #[error("Hybrid coefficient '{0}' must be 1-D")]
    NotOneD(&'static str),
    #[error(transparent)]
    Invalid(#[from] OpticalDepthError),
}

fn read_coefficient<S: ArraySource + ?Sized>(source: &S, name: &'static str) -> Result<Array1<f64>, HybridReadError> {
    source
        .get_array(name)
        .map_err(|e| HybridReadError::Read(name, e))?
        .into_dimensionality::<Ix1>()
        .map_err(|_| HybridReadError::NotOneD(name))
}

/// Compute the pressure at every level edge.
///
/// `surface_pressure` must be 4-D with dimensions (sol, local time, lat, lon).
/// The result has dimensions (sol, local time, vertical, lat, lon), with the
/// vertical axis at [`VERTICAL_AXIS`] and length `coeffs.n_levels()`.
pub fn compute_pressure(
    surface_pressure: ArrayViewD<'_, f64>,
    coeffs: &HybridCoefficients,
) -> Result<Array5<f64>, OpticalDepthError> {
    let ndim = surface_pressure.ndim();
    let ps = surface_pressure.into_dimensionality::<Ix4>().map_err(|_| {
        OpticalDepthError::WrongDimensionality {
            what: "surface pressure (sol, local time, lat, lon)".to_string(),
            expected: 4,
            actual: ndim,
        }
    })?;

    let (nt, nlt, nlat, nlon) = ps.dim();
    let nlev = coeffs.n_levels();
    log::debug!("Computing pressure on a ({nt}, {nlt}, {nlev}, {nlat}, {nlon}) grid");

    let pressure = Array5::from_shape_fn((nt, nlt, nlev, nlat, nlon), |(i, j, k, l, m)| {
        ps[[i, j, l, m]] * coeffs.bk[k] + coeffs.ak[k]
    });
    Ok(pressure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array4, Axis};

    #[test]
    fn test_two_level_column() {
        let coeffs = HybridCoefficients::new(array![0.0, 0.0], array![0.0, 1.0]).unwrap();
        let ps = Array4::from_elem((1, 1, 1, 1), 600.0).into_dyn();
        let p = compute_pressure(ps.view(), &coeffs).unwrap();
        assert_eq!(p.shape(), &[1, 1, 2, 1, 1]);
        assert_eq!(p[[0, 0, 0, 0, 0]], 0.0);
        assert_eq!(p[[0, 0, 1, 0, 0]], 600.0);
    }

    #[test]
    fn test_vertical_axis_placement() {
        let coeffs =
            HybridCoefficients::new(array![0.0, 10.0, 20.0], array![0.0, 0.5, 1.0]).unwrap();
        let ps = Array4::from_shape_fn((2, 3, 4, 5), |(i, j, l, m)| {
            500.0 + (i * 1000 + j * 100 + l * 10 + m) as f64
        });
        let p = compute_pressure(ps.view().into_dyn(), &coeffs).unwrap();
        assert_eq!(p.shape(), &[2, 3, 3, 4, 5]);

        for k in 0..3 {
            let level = p.index_axis(Axis(VERTICAL_AXIS), k);
            let expected = ps.mapv(|s| s * coeffs.bk()[k] + coeffs.ak()[k]);
            assert_abs_diff_eq!(level, expected.view(), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_pressure_increases_downward() {
        let coeffs =
            HybridCoefficients::new(array![0.0, 50.0, 20.0, 0.0], array![0.0, 0.2, 0.7, 1.0])
                .unwrap();
        let ps = Array4::from_elem((1, 2, 2, 2), 650.0);
        let p = compute_pressure(ps.view().into_dyn(), &coeffs).unwrap();
        for lane in p.lanes(Axis(VERTICAL_AXIS)) {
            for w in lane.to_vec().windows(2) {
                assert!(w[1] > w[0]);
            }
        }
    }

    #[test]
    fn test_wrong_surface_pressure_rank() {
        let coeffs = HybridCoefficients::new(array![0.0, 0.0], array![0.0, 1.0]).unwrap();
        let ps = array![[600.0]].into_dyn();
        let err = compute_pressure(ps.view(), &coeffs).unwrap_err();
        assert!(matches!(
            err,
            OpticalDepthError::WrongDimensionality {
                expected: 4,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_mismatched_coefficients() {
        let err = HybridCoefficients::new(array![0.0, 0.0], array![0.0, 0.5, 1.0]).unwrap_err();
        assert!(matches!(err, OpticalDepthError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_ak_read_from_pk() {
        let store = MemoryStore::new()
            .with("pk", array![1.0, 2.0])
            .with("bk", array![0.0, 1.0]);
        let coeffs = HybridCoefficients::from_source(&store).unwrap();
        assert_eq!(coeffs.ak(), &array![1.0, 2.0]);

        let store = MemoryStore::new().with("ak", array![1.0, 2.0]).with("bk", array![0.0, 1.0]);
        let err = HybridCoefficients::from_source(&store).unwrap_err();
        assert!(matches!(err, HybridReadError::Read("pk", _)));
    }
}

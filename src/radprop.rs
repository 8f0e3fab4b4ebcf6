//! Tabulated aerosol radiative properties.
//!
//! A property table gives extinction and scattering cross sections on a grid of
//! particle sizes × wavelengths. The two axes are deliberately treated differently:
//! wavelengths are discrete bins, so a query picks the nearest tabulated wavelength,
//! while particle size is continuous, so values are linearly interpolated (and
//! clamped at the ends of the table).
use ndarray::{Array1, Array2, ArrayD, ArrayView1, ArrayViewD, Axis, Ix1, Ix2};

use crate::{
    error::OpticalDepthError,
    interpolation::{nearest_index, InterpolationError, InterpolationMethod, LinearInterp},
    store::{ArraySource, StoreError},
};

pub static PARTICLE_SIZES_VAR: &'static str = "particle_sizes";
pub static WAVELENGTHS_VAR: &'static str = "wavelengths";
pub static EXTINCTION_VAR: &'static str = "extinction_cross_section";
pub static SCATTERING_VAR: &'static str = "scattering_cross_section";

#[derive(Debug, thiserror::Error)]
pub enum RadpropReadError {
    #[error("Could not read '{0}' from the radiative property source")]
    Read(&'static str, #[source] StoreError),
    #[error("'{name}' should be {expected}-D but is {actual}-D")]
    Dimensionality {
        name: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Table(#[from] OpticalDepthError),
}

/// Extinction and scattering cross sections indexed by `[particle_size, wavelength]`.
///
/// Immutable once built; the constructor enforces the table's invariants.
#[derive(Debug, Clone)]
pub struct RadiativePropertyTable {
    particle_sizes: Array1<f64>,
    wavelengths: Array1<f64>,
    extinction: Array2<f64>,
    scattering: Array2<f64>,
}

impl RadiativePropertyTable {
    /// Build a table, checking that:
    ///
    /// - there are at least two particle sizes and two wavelengths,
    /// - both cross section arrays have shape `(n_sizes, n_wavelengths)`,
    /// - the particle sizes are strictly increasing,
    /// - the wavelengths are finite and positive, and
    /// - the cross sections are finite, with extinction at least as large as a
    ///   non-negative scattering everywhere.
    pub fn new(
        particle_sizes: Array1<f64>,
        wavelengths: Array1<f64>,
        extinction: Array2<f64>,
        scattering: Array2<f64>,
    ) -> Result<Self, OpticalDepthError> {
        if particle_sizes.len() < 2 {
            return Err(OpticalDepthError::RangeDegenerate {
                axis: "particle size",
                len: particle_sizes.len(),
            });
        }
        if wavelengths.len() < 2 {
            return Err(OpticalDepthError::RangeDegenerate {
                axis: "wavelength",
                len: wavelengths.len(),
            });
        }

        let expected = [particle_sizes.len(), wavelengths.len()];
        if extinction.shape() != &expected[..] {
            return Err(OpticalDepthError::shape_mismatch(
                "extinction cross section",
                &expected,
                extinction.shape(),
            ));
        }
        if scattering.shape() != &expected[..] {
            return Err(OpticalDepthError::shape_mismatch(
                "scattering cross section",
                &expected,
                scattering.shape(),
            ));
        }

        LinearInterp::check_increasing(&particle_sizes.to_vec()).map_err(|e| match e {
            InterpolationError::NotIncreasing { index, .. } => OpticalDepthError::NotIncreasing {
                axis: "particle size",
                index,
                prev: particle_sizes[index - 1],
                next: particle_sizes[index],
            },
            other => OpticalDepthError::InvalidTable(other.to_string()),
        })?;

        if let Some(j) = wavelengths.iter().position(|w| !(w.is_finite() && *w > 0.0)) {
            return Err(OpticalDepthError::InvalidTable(format!(
                "wavelengths must be finite and positive, got {} at index {j}",
                wavelengths[j]
            )));
        }

        for (((i, j), &cext), &csca) in extinction.indexed_iter().zip(scattering.iter()) {
            if !(cext.is_finite() && csca.is_finite() && csca >= 0.0) {
                return Err(OpticalDepthError::InvalidTable(format!(
                    "cross sections must be finite and non-negative, got extinction {cext} and scattering {csca} for particle size {} and wavelength {}",
                    particle_sizes[i], wavelengths[j]
                )));
            }
            if !(cext >= csca) {
                return Err(OpticalDepthError::InvalidTable(format!(
                    "extinction ({cext}) is less than scattering ({csca}) for particle size {} and wavelength {}",
                    particle_sizes[i], wavelengths[j]
                )));
            }
        }

        Ok(Self {
            particle_sizes,
            wavelengths,
            extinction,
            scattering,
        })
    }

    /// Read the four table arrays from `source`.
    pub fn from_source<S: ArraySource + ?Sized>(source: &S) -> Result<Self, RadpropReadError> {
        let particle_sizes = read_1d(source, PARTICLE_SIZES_VAR)?;
        let wavelengths = read_1d(source, WAVELENGTHS_VAR)?;
        let extinction = read_2d(source, EXTINCTION_VAR)?;
        let scattering = read_2d(source, SCATTERING_VAR)?;
        let table = Self::new(particle_sizes, wavelengths, extinction, scattering)?;

        let (n_size, n_wl) = (table.particle_sizes.len(), table.wavelengths.len());
        log::debug!(
            "Read radiative property table with {n_size} particle sizes ({} to {} um) and {n_wl} wavelengths ({} to {} um)",
            table.particle_sizes[0],
            table.particle_sizes[n_size - 1],
            table.wavelengths[0],
            table.wavelengths[n_wl - 1],
        );
        Ok(table)
    }

    pub fn particle_sizes(&self) -> ArrayView1<'_, f64> {
        self.particle_sizes.view()
    }

    pub fn wavelengths(&self) -> ArrayView1<'_, f64> {
        self.wavelengths.view()
    }

    /// Index of the tabulated wavelength closest to `wavelength`; ties go to the lower index.
    ///
    /// Wavelengths outside the table are not an error; they simply map to the closest end.
    pub fn nearest_wavelength_index(&self, wavelength: f64) -> usize {
        let wavelengths = self.wavelengths.to_vec();
        let idx = nearest_index(&wavelengths, wavelength)
            .expect("the table always has at least two wavelengths");
        let first = wavelengths[0].min(wavelengths[wavelengths.len() - 1]);
        let last = wavelengths[0].max(wavelengths[wavelengths.len() - 1]);
        if wavelength < first || wavelength > last {
            log::warn!(
                "Wavelength {wavelength} is outside the tabulated range ({first} to {last}), using {}",
                wavelengths[idx]
            );
        }
        idx
    }

    /// Extinction cross sections for every particle size at the tabulated wavelength nearest `wavelength`.
    pub fn extinction_at(&self, wavelength: f64) -> ArrayView1<'_, f64> {
        let idx = self.nearest_wavelength_index(wavelength);
        self.extinction.index_axis(Axis(1), idx)
    }

    /// Scattering cross sections for every particle size at the tabulated wavelength nearest `wavelength`.
    pub fn scattering_at(&self, wavelength: f64) -> ArrayView1<'_, f64> {
        let idx = self.nearest_wavelength_index(wavelength);
        self.scattering.index_axis(Axis(1), idx)
    }

    /// Linearly interpolate a per-particle-size `curve` (e.g. a column from
    /// [`RadiativePropertyTable::extinction_at`]) to each element of `sizes`.
    ///
    /// Sizes outside the tabulated range take the value at the nearer end.
    pub fn interp_over_size(
        &self,
        curve: ArrayView1<'_, f64>,
        sizes: ArrayViewD<'_, f64>,
    ) -> Result<ArrayD<f64>, OpticalDepthError> {
        if curve.len() != self.particle_sizes.len() {
            return Err(OpticalDepthError::shape_mismatch(
                "particle size curve",
                &[self.particle_sizes.len()],
                &[curve.len()],
            ));
        }
        let x = self.particle_sizes.to_vec();
        let y = curve.to_vec();
        LinearInterp
            .interp_array(&x, &y, sizes)
            .map_err(|e| OpticalDepthError::InvalidTable(e.to_string()))
    }
}

fn read_1d<S: ArraySource + ?Sized>(source: &S, name: &'static str) -> Result<Array1<f64>, RadpropReadError> {
    let arr = source
        .get_array(name)
        .map_err(|e| RadpropReadError::Read(name, e))?;
    let ndim = arr.ndim();
    arr.into_dimensionality::<Ix1>()
        .map_err(|_| RadpropReadError::Dimensionality {
            name,
            expected: 1,
            actual: ndim,
        })
}

fn read_2d<S: ArraySource + ?Sized>(source: &S, name: &'static str) -> Result<Array2<f64>, RadpropReadError> {
    let arr = source
        .get_array(name)
        .map_err(|e| RadpropReadError::Read(name, e))?;
    let ndim = arr.ndim();
    arr.into_dimensionality::<Ix2>()
        .map_err(|_| RadpropReadError::Dimensionality {
            name,
            expected: 2,
            actual: ndim,
        })
}

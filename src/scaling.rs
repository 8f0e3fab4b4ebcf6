//! Rescaling per-layer optical depths from the GCM's reference wavelength to another wavelength.
//!
//! For a fixed particle size, optical depth is proportional to the extinction cross
//! section, so moving from the reference wavelength to a target wavelength means
//! multiplying by `Cext(target) / Cext(reference)`. That ratio is formed on the table's
//! particle size grid first and only then interpolated to the particle size of each cell.
//!
//! Water ice optical depths from the Ames GCM are absorption optical depths, so they
//! are first converted to extinction with `Cext / (Cext - Csca)` at the reference wavelength.
use ndarray::{Array1, ArrayD, ArrayView1, ArrayViewD, Zip};

use crate::{config::OpticalDepthKind, error::OpticalDepthError, radprop::RadiativePropertyTable};

/// Rescales optical depth fields using one radiative property table.
#[derive(Debug, Clone, Copy)]
pub struct WavelengthScaler<'t> {
    table: &'t RadiativePropertyTable,
}

impl<'t> WavelengthScaler<'t> {
    pub fn new(table: &'t RadiativePropertyTable) -> Self {
        Self { table }
    }

    /// Convert an extinction optical depth at `reference_wavelength` to `target_wavelength`.
    ///
    /// `particle_sizes` gives the particle size in every cell and must have the
    /// same shape as `optical_depth`.
    pub fn scale_extinction(
        &self,
        optical_depth: ArrayViewD<'_, f64>,
        particle_sizes: ArrayViewD<'_, f64>,
        reference_wavelength: f64,
        target_wavelength: f64,
    ) -> Result<ArrayD<f64>, OpticalDepthError> {
        check_same_shape(&optical_depth, &particle_sizes)?;

        let i_ref = self.table.nearest_wavelength_index(reference_wavelength);
        let i_target = self.table.nearest_wavelength_index(target_wavelength);
        log::debug!(
            "Scaling extinction from {} um (table index {i_ref}) to {} um (table index {i_target})",
            self.table.wavelengths()[i_ref],
            self.table.wavelengths()[i_target],
        );

        let reference_cext = self.table.extinction_at(reference_wavelength);
        let target_cext = self.table.extinction_at(target_wavelength);
        let ratio = self.ratio_curve(
            target_cext,
            reference_cext,
            "reference wavelength extinction cross section",
        )?;

        let factor = self.table.interp_over_size(ratio.view(), particle_sizes)?;
        Ok(multiply(optical_depth, factor))
    }

    /// Convert an absorption optical depth at `reference_wavelength` to the
    /// equivalent extinction optical depth at the same wavelength.
    pub fn absorption_to_extinction(
        &self,
        optical_depth: ArrayViewD<'_, f64>,
        particle_sizes: ArrayViewD<'_, f64>,
        reference_wavelength: f64,
    ) -> Result<ArrayD<f64>, OpticalDepthError> {
        check_same_shape(&optical_depth, &particle_sizes)?;

        let cext = self.table.extinction_at(reference_wavelength);
        let csca = self.table.scattering_at(reference_wavelength);
        let cabs: Array1<f64> = &cext - &csca;
        let factor_curve = self.ratio_curve(
            cext,
            cabs.view(),
            "reference wavelength absorption cross section (extinction - scattering)",
        )?;

        let factor = self
            .table
            .interp_over_size(factor_curve.view(), particle_sizes)?;
        Ok(multiply(optical_depth, factor))
    }

    /// Convert an absorption optical depth at `reference_wavelength` to an
    /// extinction optical depth at `target_wavelength`.
    pub fn scale_absorption(
        &self,
        optical_depth: ArrayViewD<'_, f64>,
        particle_sizes: ArrayViewD<'_, f64>,
        reference_wavelength: f64,
        target_wavelength: f64,
    ) -> Result<ArrayD<f64>, OpticalDepthError> {
        let extinction =
            self.absorption_to_extinction(optical_depth, particle_sizes.view(), reference_wavelength)?;
        self.scale_extinction(
            extinction.view(),
            particle_sizes,
            reference_wavelength,
            target_wavelength,
        )
    }

    /// Dispatch to [`WavelengthScaler::scale_extinction`] or
    /// [`WavelengthScaler::scale_absorption`] depending on what `optical_depth` holds.
    pub fn scale(
        &self,
        kind: OpticalDepthKind,
        optical_depth: ArrayViewD<'_, f64>,
        particle_sizes: ArrayViewD<'_, f64>,
        reference_wavelength: f64,
        target_wavelength: f64,
    ) -> Result<ArrayD<f64>, OpticalDepthError> {
        match kind {
            OpticalDepthKind::Extinction => self.scale_extinction(
                optical_depth,
                particle_sizes,
                reference_wavelength,
                target_wavelength,
            ),
            OpticalDepthKind::Absorption => self.scale_absorption(
                optical_depth,
                particle_sizes,
                reference_wavelength,
                target_wavelength,
            ),
        }
    }

    fn ratio_curve(
        &self,
        numerator: ArrayView1<'_, f64>,
        denominator: ArrayView1<'_, f64>,
        denominator_name: &'static str,
    ) -> Result<Array1<f64>, OpticalDepthError> {
        if let Some(i) = denominator.iter().position(|&d| d == 0.0) {
            return Err(OpticalDepthError::NumericDegenerate {
                quantity: denominator_name,
                location: format!("particle size {}", self.table.particle_sizes()[i]),
            });
        }
        Ok(&numerator / &denominator)
    }
}

fn check_same_shape(
    optical_depth: &ArrayViewD<'_, f64>,
    particle_sizes: &ArrayViewD<'_, f64>,
) -> Result<(), OpticalDepthError> {
    if optical_depth.shape() != particle_sizes.shape() {
        return Err(OpticalDepthError::shape_mismatch(
            "particle sizes (must match optical depth)",
            optical_depth.shape(),
            particle_sizes.shape(),
        ));
    }
    Ok(())
}

fn multiply(optical_depth: ArrayViewD<'_, f64>, mut factor: ArrayD<f64>) -> ArrayD<f64> {
    Zip::from(&mut factor)
        .and(&optical_depth)
        .par_for_each(|f, &od| *f *= od);
    factor
}

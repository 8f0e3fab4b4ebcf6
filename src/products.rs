//! Assemble the processed GCM products.
//!
//! This is the glue between a GCM output file, the dust and water ice property
//! tables, and an output sink. The output is organized in four groups:
//!
//! - `grid`: latitude, longitude, sol and local time centers and edges, plus the
//!   hybrid coordinate coefficients (the pressure field itself is not written; it
//!   can be rebuilt from `ak`, `bk` and the surface pressure),
//! - `time`: solar longitude,
//! - `surface`: surface temperature and pressure, and
//! - `atmosphere`: atmospheric temperature and the column integrated dust and
//!   water ice optical depths at the target wavelength.
use error_stack::ResultExt;
use ndarray::{ArrayD, ArrayViewD, IxDyn};

use crate::{
    calendar::{sol_of_year, solar_longitude, uniform_edges, unique_sorted},
    column::integrate_column,
    config::{PlanetConfig, RunConfig, SpeciesConfig},
    error::OpticalDepthError,
    pressure::{compute_pressure, HybridCoefficients, SURFACE_PRESSURE_VAR},
    radprop::RadiativePropertyTable,
    scaling::WavelengthScaler,
    store::{ArraySink, ArraySource, OutputVariable},
};

pub static AREO_VAR: &'static str = "areo";
pub static TIME_VAR: &'static str = "time";
pub static TIME_BOUNDS_VAR: &'static str = "time_bnds";
pub static LAT_VAR: &'static str = "lat";
pub static LON_VAR: &'static str = "lon";
pub static LOCAL_TIME_VAR: &'static str = "time_of_day_24";
pub static LOCAL_TIME_EDGES_VAR: &'static str = "time_of_day_edges_24";
pub static SURFACE_TEMPERATURE_VAR: &'static str = "ts";
pub static TEMPERATURE_VAR: &'static str = "temp";

pub static GRID_GROUP: &'static str = "grid";
pub static TIME_GROUP: &'static str = "time";
pub static SURFACE_GROUP: &'static str = "surface";
pub static ATMOSPHERE_GROUP: &'static str = "atmosphere";

static SOL_DIM: &'static str = "sol";
static SOL_EDGE_DIM: &'static str = "sol_edge";
static LOCAL_TIME_DIM: &'static str = "local_time";
static LOCAL_TIME_EDGE_DIM: &'static str = "local_time_edge";
static LAT_DIM: &'static str = "latitude";
static LAT_EDGE_DIM: &'static str = "latitude_edge";
static LON_DIM: &'static str = "longitude";
static LON_EDGE_DIM: &'static str = "longitude_edge";
static LAYER_DIM: &'static str = "layer";
static LEVEL_DIM: &'static str = "level";

static PRESSURE_COMMENT: &'static str = "The pressure is the outer product of the surface pressure and bk, plus ak. \
    The full 5-D pressure array is too large to store for long or high resolution runs, so compute it when needed.";
static COLUMN_OD_COMMENT: &'static str = "Total column integrated optical depth";

#[derive(Debug, thiserror::Error)]
pub enum ProductError {
    #[error("Could not read '{0}' from the GCM output")]
    MissingInput(String),
    #[error("GCM variable '{name}' has an unexpected shape: {reason}")]
    BadInput { name: String, reason: String },
    #[error("Could not write '{0}'")]
    Write(String),
    #[error("An error occurred while {0}")]
    Context(String),
}

impl ProductError {
    fn context<S: ToString>(msg: S) -> Self {
        Self::Context(msg.to_string())
    }

    fn bad_input<N: ToString, R: ToString>(name: N, reason: R) -> Self {
        Self::BadInput {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// The GCM fields needed to turn a per-layer optical depth into a column value.
#[derive(Debug, Clone)]
pub struct ColumnInputs {
    /// Surface pressure, Pa, (sol, local time, lat, lon)
    pub surface_pressure: ArrayD<f64>,
    pub hybrid: HybridCoefficients,
}

impl ColumnInputs {
    pub fn from_source<S: ArraySource + ?Sized>(sim: &S) -> error_stack::Result<Self, ProductError> {
        let surface_pressure = read_input(sim, SURFACE_PRESSURE_VAR)?;
        if surface_pressure.ndim() != 4 {
            return Err(ProductError::bad_input(
                SURFACE_PRESSURE_VAR,
                format!("expected 4 dimensions, got {}", surface_pressure.ndim()),
            )
            .into());
        }
        let hybrid = HybridCoefficients::from_source(sim)
            .change_context_lazy(|| ProductError::context("reading the hybrid coordinate coefficients"))?;
        Ok(Self {
            surface_pressure,
            hybrid,
        })
    }
}

/// Rescale one species' native per-layer optical depth to `target_wavelength`
/// and integrate it over the column.
///
/// The particle size is taken as uniform (`species.particle_size`) over the whole
/// field. The pressure field is rebuilt here and dropped once the column is done.
pub fn species_column_optical_depth(
    inputs: &ColumnInputs,
    native_optical_depth: ArrayViewD<'_, f64>,
    species: &SpeciesConfig,
    table: &RadiativePropertyTable,
    planet: &PlanetConfig,
    target_wavelength: f64,
) -> Result<ArrayD<f64>, OpticalDepthError> {
    let particle_sizes = ArrayD::from_elem(native_optical_depth.raw_dim(), species.particle_size);
    let scaled = WavelengthScaler::new(table).scale(
        species.kind,
        native_optical_depth,
        particle_sizes.view(),
        species.reference_wavelength,
        target_wavelength,
    )?;
    drop(particle_sizes);

    let pressure = compute_pressure(inputs.surface_pressure.view(), &inputs.hybrid)?;
    integrate_column(pressure.view().into_dyn(), scaled.view(), planet.gravity)
}

/// Read `species.source_variable` from `sim` and compute its column optical depth.
pub fn compute_species_product<S: ArraySource + ?Sized>(
    sim: &S,
    inputs: &ColumnInputs,
    species: &SpeciesConfig,
    table: &RadiativePropertyTable,
    config: &RunConfig,
) -> error_stack::Result<ArrayD<f64>, ProductError> {
    let native = read_input(sim, &species.source_variable)?;
    log::info!(
        "Scaling '{}' from {} um to {} um and integrating over the column",
        species.source_variable,
        species.reference_wavelength,
        config.target_wavelength
    );
    species_column_optical_depth(
        inputs,
        native.view(),
        species,
        table,
        &config.planet,
        config.target_wavelength,
    )
    .change_context_lazy(|| {
        ProductError::context(format!("computing {}", species.output_variable))
    })
}

/// Every output array, computed and held in memory so that nothing is written
/// until all of it has been computed successfully.
#[derive(Debug, Clone)]
pub struct GcmProducts {
    pub latitude_centers: ArrayD<f64>,
    pub latitude_edges: ArrayD<f64>,
    pub longitude_centers: ArrayD<f64>,
    pub longitude_edges: ArrayD<f64>,
    pub sol_centers: ArrayD<f64>,
    pub sol_edges: ArrayD<f64>,
    pub local_time_centers: ArrayD<f64>,
    pub local_time_edges: ArrayD<f64>,
    pub ak: ArrayD<f64>,
    pub bk: ArrayD<f64>,
    /// (sol, local time)
    pub solar_longitude: ArrayD<f64>,
    pub surface_temperature: ArrayD<f64>,
    pub surface_pressure: ArrayD<f64>,
    pub temperature: ArrayD<f64>,
    pub dust_column: ArrayD<f64>,
    pub ice_column: ArrayD<f64>,
}

impl GcmProducts {
    /// Read the GCM fields from `sim` and compute every product.
    pub fn compute<S: ArraySource + ?Sized>(
        sim: &S,
        dust_table: &RadiativePropertyTable,
        ice_table: &RadiativePropertyTable,
        config: &RunConfig,
    ) -> error_stack::Result<Self, ProductError> {
        log::info!("Reading grid variables");
        let latitude_centers = read_input(sim, LAT_VAR)?;
        let longitude_centers = read_input(sim, LON_VAR)?;
        let latitude_edges = uniform_edges(-90.0, 90.0, latitude_centers.len()).into_dyn();
        let longitude_edges = uniform_edges(0.0, 360.0, longitude_centers.len()).into_dyn();

        let time = read_input(sim, TIME_VAR)?;
        let sol_centers = sol_of_year(time.view(), config.planet.sols_per_year);
        let sol_edges = unique_sorted(read_input(sim, TIME_BOUNDS_VAR)?.view()).into_dyn();
        let local_time_centers = read_input(sim, LOCAL_TIME_VAR)?;
        let local_time_edges = read_input(sim, LOCAL_TIME_EDGES_VAR)?;

        log::info!("Reading time variables");
        let solar_longitude = compute_solar_longitude(sim)?;

        log::info!("Reading surface and atmosphere variables");
        let inputs = ColumnInputs::from_source(sim)?;
        let surface_temperature = read_input(sim, SURFACE_TEMPERATURE_VAR)?;
        let temperature = read_input(sim, TEMPERATURE_VAR)?;
        let ak = inputs.hybrid.ak().to_owned().into_dyn();
        let bk = inputs.hybrid.bk().to_owned().into_dyn();

        // Everything is read up front so that the two species can be computed in parallel
        // without needing a thread-safe source.
        let dust_native = read_input(sim, &config.dust.source_variable)?;
        let ice_native = read_input(sim, &config.ice.source_variable)?;

        let (ice_column, dust_column) = rayon::join(
            || {
                species_column_optical_depth(
                    &inputs,
                    ice_native.view(),
                    &config.ice,
                    ice_table,
                    &config.planet,
                    config.target_wavelength,
                )
            },
            || {
                species_column_optical_depth(
                    &inputs,
                    dust_native.view(),
                    &config.dust,
                    dust_table,
                    &config.planet,
                    config.target_wavelength,
                )
            },
        );
        let ice_column = ice_column.change_context_lazy(|| {
            ProductError::context(format!("computing {}", config.ice.output_variable))
        })?;
        let dust_column = dust_column.change_context_lazy(|| {
            ProductError::context(format!("computing {}", config.dust.output_variable))
        })?;

        Ok(Self {
            latitude_centers,
            latitude_edges,
            longitude_centers,
            longitude_edges,
            sol_centers,
            sol_edges,
            local_time_centers,
            local_time_edges,
            ak,
            bk,
            solar_longitude,
            surface_temperature,
            surface_pressure: inputs.surface_pressure,
            temperature,
            dust_column,
            ice_column,
        })
    }

    /// Write the products to `sink`, grouped as described in the module docs.
    pub fn write<W: ArraySink + ?Sized>(&self, config: &RunConfig, sink: &mut W) -> error_stack::Result<(), ProductError> {
        log::info!("Writing grid variables");
        self.write_grid(sink)?;
        log::info!("Writing time variables");
        put(
            sink,
            OutputVariable::new(TIME_GROUP, "solar_longitude", &[SOL_DIM, LOCAL_TIME_DIM], self.solar_longitude.view())
                .with_attribute("unit", "degrees"),
        )?;
        log::info!("Writing surface variables");
        self.write_surface(sink)?;
        log::info!("Writing atmosphere variables");
        self.write_atmosphere(config, sink)?;
        Ok(())
    }

    fn write_grid<W: ArraySink + ?Sized>(&self, sink: &mut W) -> error_stack::Result<(), ProductError> {
        put(sink, OutputVariable::new(GRID_GROUP, "latitude_centers", &[LAT_DIM], self.latitude_centers.view()))?;
        put(sink, OutputVariable::new(GRID_GROUP, "latitude_edges", &[LAT_EDGE_DIM], self.latitude_edges.view()))?;
        put(sink, OutputVariable::new(GRID_GROUP, "longitude_centers", &[LON_DIM], self.longitude_centers.view()))?;
        put(sink, OutputVariable::new(GRID_GROUP, "longitude_edges", &[LON_EDGE_DIM], self.longitude_edges.view()))?;
        put(sink, OutputVariable::new(GRID_GROUP, "sol_centers", &[SOL_DIM], self.sol_centers.view()))?;
        put(sink, OutputVariable::new(GRID_GROUP, "sol_edges", &[SOL_EDGE_DIM], self.sol_edges.view()))?;
        put(sink, OutputVariable::new(GRID_GROUP, "local_time_centers", &[LOCAL_TIME_DIM], self.local_time_centers.view()))?;
        put(sink, OutputVariable::new(GRID_GROUP, "local_time_edges", &[LOCAL_TIME_EDGE_DIM], self.local_time_edges.view()))?;
        put(
            sink,
            OutputVariable::new(GRID_GROUP, "bk", &[LEVEL_DIM], self.bk.view())
                .with_attribute("unit", "Unitless")
                .with_attribute("comment", PRESSURE_COMMENT),
        )?;
        put(
            sink,
            OutputVariable::new(GRID_GROUP, "ak", &[LEVEL_DIM], self.ak.view())
                .with_attribute("unit", "Pa")
                .with_attribute("comment", PRESSURE_COMMENT),
        )?;
        Ok(())
    }

    fn write_surface<W: ArraySink + ?Sized>(&self, sink: &mut W) -> error_stack::Result<(), ProductError> {
        let dims_4d = [SOL_DIM, LOCAL_TIME_DIM, LAT_DIM, LON_DIM];
        put(
            sink,
            OutputVariable::new(SURFACE_GROUP, "temperature", &dims_4d, self.surface_temperature.view())
                .with_attribute("unit", "K")
                .compressed(),
        )?;
        put(
            sink,
            OutputVariable::new(SURFACE_GROUP, "pressure", &dims_4d, self.surface_pressure.view())
                .with_attribute("unit", "Pa"),
        )?;
        Ok(())
    }

    fn write_atmosphere<W: ArraySink + ?Sized>(&self, config: &RunConfig, sink: &mut W) -> error_stack::Result<(), ProductError> {
        let dims_5d = [SOL_DIM, LOCAL_TIME_DIM, LAYER_DIM, LAT_DIM, LON_DIM];
        let column_dims = [SOL_DIM, LOCAL_TIME_DIM, LAT_DIM, LON_DIM];

        put(
            sink,
            OutputVariable::new(ATMOSPHERE_GROUP, "temperature", &dims_5d, self.temperature.view())
                .with_attribute("unit", "K")
                .compressed(),
        )?;
        put(
            sink,
            OutputVariable::new(ATMOSPHERE_GROUP, &config.ice.output_variable, &column_dims, self.ice_column.view())
                .with_attribute("comment", COLUMN_OD_COMMENT)
                .with_attribute("wavelength_um", config.target_wavelength)
                .compressed(),
        )?;
        put(
            sink,
            OutputVariable::new(ATMOSPHERE_GROUP, &config.dust.output_variable, &column_dims, self.dust_column.view())
                .with_attribute("comment", COLUMN_OD_COMMENT)
                .with_attribute("wavelength_um", config.target_wavelength)
                .compressed(),
        )?;
        Ok(())
    }
}

/// Compute all products, then write them to `sink`.
///
/// Nothing is written if reading an input or computing a product fails.
pub fn write_gcm_products<S, W>(
    sim: &S,
    dust_table: &RadiativePropertyTable,
    ice_table: &RadiativePropertyTable,
    config: &RunConfig,
    sink: &mut W,
) -> error_stack::Result<(), ProductError>
where
    S: ArraySource + ?Sized,
    W: ArraySink + ?Sized,
{
    let products = GcmProducts::compute(sim, dust_table, ice_table, config)?;
    products.write(config, sink)
}

/// Solar longitude on the (sol, local time) grid.
///
/// `areo` is (sol, local time, 1). [`solar_longitude`] drops every trailing length-1
/// axis, which would also drop a length-1 local time or sol axis, so the result is
/// put back into two dimensions here.
fn compute_solar_longitude<S: ArraySource + ?Sized>(sim: &S) -> error_stack::Result<ArrayD<f64>, ProductError> {
    let areo = read_input(sim, AREO_VAR)?;
    let (n_sol, n_lt) = match areo.shape() {
        &[n_sol, n_lt, 1] => (n_sol, n_lt),
        other => {
            return Err(ProductError::bad_input(
                AREO_VAR,
                format!("expected shape (sol, local time, 1), got {other:?}"),
            )
            .into())
        }
    };
    solar_longitude(areo.view())
        .into_shape(IxDyn(&[n_sol, n_lt]))
        .map_err(|e| ProductError::bad_input(AREO_VAR, e).into())
}

fn read_input<S: ArraySource + ?Sized>(sim: &S, name: &str) -> error_stack::Result<ArrayD<f64>, ProductError> {
    log::debug!("Reading '{name}'");
    sim.get_array(name)
        .change_context_lazy(|| ProductError::MissingInput(name.to_string()))
}

fn put<W: ArraySink + ?Sized>(sink: &mut W, var: OutputVariable<'_>) -> error_stack::Result<(), ProductError> {
    let path = var.path();
    log::debug!("Writing '{path}' with shape {:?}", var.data.shape());
    sink.put_array(var)
        .change_context_lazy(|| ProductError::Write(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        store::MemoryStore,
        test_utils::{gcm_store, mie_like_table, N_LAT, N_LON, N_LT, N_SOL},
    };
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, Array3};
    use rstest::rstest;

    #[rstest]
    fn test_species_column_matches_manual_pipeline(
        gcm_store: MemoryStore,
        mie_like_table: RadiativePropertyTable,
    ) {
        let config = RunConfig::default();
        let inputs = ColumnInputs::from_source(&gcm_store).unwrap();
        let dust = compute_species_product(&gcm_store, &inputs, &config.dust, &mie_like_table, &config)
            .unwrap();
        assert_eq!(dust.shape(), &[N_SOL, N_LT, N_LAT, N_LON]);

        let native = gcm_store.get_array("dustref").unwrap();
        let sizes = ArrayD::from_elem(native.raw_dim(), 1.2);
        let scaled = WavelengthScaler::new(&mie_like_table)
            .scale_extinction(native.view(), sizes.view(), 0.69, 0.25)
            .unwrap();
        let p = compute_pressure(inputs.surface_pressure.view(), &inputs.hybrid).unwrap();
        let expected = integrate_column(p.into_dyn().view(), scaled.view(), 3.72076).unwrap();
        assert_abs_diff_eq!(dust, expected, epsilon = 1e-12);
    }

    #[rstest]
    fn test_target_equal_reference_is_plain_column(
        gcm_store: MemoryStore,
        mie_like_table: RadiativePropertyTable,
    ) {
        let mut config = RunConfig::default();
        config.target_wavelength = config.dust.reference_wavelength;
        let inputs = ColumnInputs::from_source(&gcm_store).unwrap();
        let dust = compute_species_product(&gcm_store, &inputs, &config.dust, &mie_like_table, &config)
            .unwrap();

        let native = gcm_store.get_array("dustref").unwrap();
        let p = compute_pressure(inputs.surface_pressure.view(), &inputs.hybrid).unwrap();
        let unscaled = integrate_column(p.into_dyn().view(), native.view(), 3.72076).unwrap();
        assert_eq!(dust, unscaled);
    }

    #[rstest]
    fn test_write_products(gcm_store: MemoryStore, mie_like_table: RadiativePropertyTable) {
        let config = RunConfig::default();
        let mut out = MemoryStore::new();
        write_gcm_products(&gcm_store, &mie_like_table, &mie_like_table, &config, &mut out).unwrap();

        let expected_paths = [
            "grid/latitude_centers",
            "grid/latitude_edges",
            "grid/longitude_centers",
            "grid/longitude_edges",
            "grid/sol_centers",
            "grid/sol_edges",
            "grid/local_time_centers",
            "grid/local_time_edges",
            "grid/bk",
            "grid/ak",
            "time/solar_longitude",
            "surface/temperature",
            "surface/pressure",
            "atmosphere/temperature",
            "atmosphere/uv_ice_optical_depth",
            "atmosphere/uv_dust_optical_depth",
        ];
        for path in expected_paths {
            assert!(out.get(path).is_some(), "{path} missing from output");
        }

        let lat_edges = out.get_array("grid/latitude_edges").unwrap();
        assert_eq!(lat_edges.len(), N_LAT + 1);
        assert_abs_diff_eq!(lat_edges[[0]], -90.0);

        let sols = out.get_array("grid/sol_centers").unwrap();
        assert_abs_diff_eq!(sols[[0]], 3704.0 - 5.0 * 668.0, epsilon = 1e-9);
        assert_eq!(out.get_array("grid/sol_edges").unwrap().len(), 3);

        let ak = out.get("grid/ak").unwrap();
        assert_eq!(ak.data, gcm_store.get_array("pk").unwrap());
        assert_eq!(ak.attributes.get("unit").map(|s| s.as_str()), Some("Pa"));

        let ls = out.get_array("time/solar_longitude").unwrap();
        assert_eq!(ls.shape(), &[N_SOL, N_LT]);
        assert!(ls.iter().all(|&v| (0.0..360.0).contains(&v)));

        let ice = out.get("atmosphere/uv_ice_optical_depth").unwrap();
        assert!(ice.compress);
        assert_eq!(ice.data.shape(), &[N_SOL, N_LT, N_LAT, N_LON]);
        assert!(ice.data.iter().all(|&v| v.is_finite() && v > 0.0));
        assert!(!out.get("surface/pressure").unwrap().compress);
    }

    #[rstest]
    fn test_dust_and_ice_use_own_paths(gcm_store: MemoryStore, mie_like_table: RadiativePropertyTable) {
        let config = RunConfig::default();
        let mut out = MemoryStore::new();
        write_gcm_products(&gcm_store, &mie_like_table, &mie_like_table, &config, &mut out).unwrap();

        let inputs = ColumnInputs::from_source(&gcm_store).unwrap();
        let dust = compute_species_product(&gcm_store, &inputs, &config.dust, &mie_like_table, &config)
            .unwrap();
        let ice = compute_species_product(&gcm_store, &inputs, &config.ice, &mie_like_table, &config)
            .unwrap();
        assert_eq!(out.get_array("atmosphere/uv_dust_optical_depth").unwrap(), dust);
        assert_eq!(out.get_array("atmosphere/uv_ice_optical_depth").unwrap(), ice);
    }

    #[rstest]
    fn test_missing_input_is_reported(mie_like_table: RadiativePropertyTable) {
        let sim = MemoryStore::new();
        let mut out = MemoryStore::new();
        let err = write_gcm_products(&sim, &mie_like_table, &mie_like_table, &RunConfig::default(), &mut out)
            .unwrap_err();
        assert!(matches!(err.current_context(), ProductError::MissingInput(_)));
        assert!(out.is_empty());
    }

    #[rstest]
    fn test_nothing_written_when_a_product_fails(gcm_store: MemoryStore, mie_like_table: RadiativePropertyTable) {
        // A pure scatterer has no absorption to convert from
        let scatterer = RadiativePropertyTable::new(
            mie_like_table.particle_sizes().to_owned(),
            mie_like_table.wavelengths().to_owned(),
            Array2::from_elem((12, 11), 1.0),
            Array2::from_elem((12, 11), 1.0),
        )
        .unwrap();
        let mut out = MemoryStore::new();
        let err = write_gcm_products(&gcm_store, &mie_like_table, &scatterer, &RunConfig::default(), &mut out)
            .unwrap_err();
        assert!(matches!(err.current_context(), ProductError::Context(_)));
        assert!(out.is_empty(), "products were written before the failure: {:?}", out.paths().collect::<Vec<_>>());
    }

    #[rstest]
    #[case(2, 1)]
    #[case(1, 1)]
    #[case(1, 3)]
    #[case(2, 3)]
    fn test_solar_longitude_keeps_sol_and_local_time(#[case] n_sol: usize, #[case] n_lt: usize) {
        let areo = Array3::from_shape_fn((n_sol, n_lt, 1), |(i, j, _)| 355.0 + 3.0 * i as f64 + j as f64);
        let sim = MemoryStore::new().with(AREO_VAR, areo);
        let ls = compute_solar_longitude(&sim).unwrap();
        assert_eq!(ls.shape(), &[n_sol, n_lt]);
        assert_abs_diff_eq!(ls[[n_sol - 1, n_lt - 1]], (355.0 + 3.0 * (n_sol - 1) as f64 + (n_lt - 1) as f64) % 360.0, epsilon = 1e-9);

        let mut out = MemoryStore::new();
        put(
            &mut out,
            OutputVariable::new(TIME_GROUP, "solar_longitude", &[SOL_DIM, LOCAL_TIME_DIM], ls.view()),
        )
        .unwrap();
    }

    #[test]
    fn test_solar_longitude_bad_areo_shape() {
        let sim = MemoryStore::new().with(AREO_VAR, Array2::<f64>::zeros((2, 3)));
        let err = compute_solar_longitude(&sim).unwrap_err();
        assert!(matches!(err.current_context(), ProductError::BadInput { .. }));
    }
}

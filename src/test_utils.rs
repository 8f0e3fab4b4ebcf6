//! Synthetic inputs shared by the unit tests.
use ndarray::{array, Array1, Array2, Array3, Array4, Array5};
use rstest::fixture;

use crate::{radprop::RadiativePropertyTable, store::MemoryStore};

/// Two sizes (1 and 2 um) by two wavelengths (0.5 and 1 um).
#[fixture]
pub(crate) fn small_table() -> RadiativePropertyTable {
    RadiativePropertyTable::new(
        array![1.0, 2.0],
        array![0.5, 1.0],
        array![[1.0, 2.0], [3.0, 4.0]],
        array![[0.5, 1.0], [1.5, 2.0]],
    )
    .expect("small test table should be valid")
}

/// A larger table with smoothly varying, strictly positive cross sections
/// covering the UV to thermal IR, roughly shaped like a Mie calculation.
#[fixture]
pub(crate) fn mie_like_table() -> RadiativePropertyTable {
    let sizes = Array1::linspace(0.2, 4.0, 12);
    let wavelengths = array![0.2, 0.25, 0.3, 0.5, 0.69, 0.9, 1.5, 3.0, 9.3, 12.0, 20.0];
    let extinction = Array2::from_shape_fn((sizes.len(), wavelengths.len()), |(i, j)| {
        let x = 2.0 * std::f64::consts::PI * sizes[i] / wavelengths[j];
        sizes[i] * sizes[i] * (2.0 - (x.sin() / x) * 1.5).max(0.05)
    });
    let scattering = Array2::from_shape_fn(extinction.raw_dim(), |(i, j)| {
        let albedo = 0.95 - 0.5 * (wavelengths[j] / 20.0);
        extinction[[i, j]] * albedo
    });
    RadiativePropertyTable::new(sizes, wavelengths, extinction, scattering)
        .expect("mie-like test table should be valid")
}

pub(crate) const N_SOL: usize = 2;
pub(crate) const N_LT: usize = 3;
pub(crate) const N_LAYER: usize = 4;
pub(crate) const N_LAT: usize = 3;
pub(crate) const N_LON: usize = 4;

/// A small stand-in for an Ames GCM diurnal output file.
#[fixture]
pub(crate) fn gcm_store() -> MemoryStore {
    let ps = Array4::from_shape_fn((N_SOL, N_LT, N_LAT, N_LON), |(i, j, l, m)| {
        600.0 + 5.0 * i as f64 - 2.0 * j as f64 + 10.0 * l as f64 + m as f64
    });
    let pk = array![0.0, 40.0, 30.0, 10.0, 0.0];
    let bk = array![0.0, 0.1, 0.4, 0.8, 1.0];
    let dustref = Array5::from_shape_fn((N_SOL, N_LT, N_LAYER, N_LAT, N_LON), |(i, j, k, l, m)| {
        1e-4 * (1 + i + j + k + l + m) as f64
    });
    let cldref = dustref.mapv(|v| 0.5 * v);
    let temp = Array5::from_elem((N_SOL, N_LT, N_LAYER, N_LAT, N_LON), 200.0);
    let ts = Array4::from_elem((N_SOL, N_LT, N_LAT, N_LON), 220.0);
    let areo = Array3::from_shape_fn((N_SOL, N_LT, 1), |(i, j, _)| 700.0 + i as f64 + 0.1 * j as f64);
    let time = array![3704.0, 3705.0];
    let time_bnds = array![[3703.5, 3704.5], [3704.5, 3705.5]];

    MemoryStore::new()
        .with("ps", ps)
        .with("pk", pk)
        .with("bk", bk)
        .with("dustref", dustref)
        .with("cldref", cldref)
        .with("temp", temp)
        .with("ts", ts)
        .with("areo", areo)
        .with("time", time)
        .with("time_bnds", time_bnds)
        .with("lat", Array1::linspace(-60.0, 60.0, N_LAT))
        .with("lon", Array1::linspace(45.0, 315.0, N_LON))
        .with("time_of_day_24", Array1::linspace(4.0, 20.0, N_LT))
        .with("time_of_day_edges_24", Array1::linspace(0.0, 24.0, N_LT + 1))
}

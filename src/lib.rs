pub mod error;
pub mod logging;
pub mod config;
pub mod interpolation;
pub mod radprop;
pub mod pressure;
pub mod scaling;
pub mod column;
pub mod calendar;
pub mod store;
#[cfg(feature = "netcdf")]
pub mod nc_store;
pub mod products;

#[cfg(test)]
pub(crate) mod test_utils;

//! Convert an Ames Mars GCM diurnal output file into gridded products with
//! column dust and water ice optical depths rescaled to a UV wavelength.
use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use ames_rs::{
    config::RunConfig,
    logging::init_logging,
    nc_store::{NcSink, NcSource},
    products::write_gcm_products,
    radprop::RadiativePropertyTable,
};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use error_stack::ResultExt;

fn main() -> ExitCode {
    let clargs = Cli::parse();
    init_logging(clargs.verbosity.log_level_filter(), clargs.log_file.as_deref());
    log::debug!("DEBUG level logging active");
    match driver(clargs) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("gcm_optical_depth did not complete successfully:\n{e:?}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Debug, clap::Parser)]
struct Cli {
    /// The GCM output file (e.g. "03704.atmos_diurn.nc") to read from
    gcm_file: PathBuf,

    /// HDF5/netCDF-4 file with the dust radiative properties
    dust_radprop_file: PathBuf,

    /// HDF5/netCDF-4 file with the water ice radiative properties
    ice_radprop_file: PathBuf,

    /// File to write the products to. Overwritten unless --append is given.
    output: PathBuf,

    /// Wavelength in micrometers to rescale the optical depths to. Overrides
    /// the value from the configuration.
    #[clap(short, long)]
    target_wavelength: Option<f64>,

    /// TOML configuration file. Defaults are for Mars and the Ames GCM; any
    /// value can also be set with AMES_* environment variables.
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Add to an existing output file instead of overwriting it. Variables that
    /// already exist in it cause an error.
    #[clap(short, long)]
    append: bool,

    /// Print the configuration that would be used and exit.
    #[clap(long)]
    check_config_only: bool,

    /// Also write log messages to this file.
    #[clap(long)]
    log_file: Option<PathBuf>,

    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Error loading the configuration")]
    Config,
    #[error("Error opening {}", .0.display())]
    Open(PathBuf),
    #[error("Error reading the radiative properties from {}", .0.display())]
    Radprop(PathBuf),
    #[error("Error creating the products")]
    Products,
}

fn driver(clargs: Cli) -> error_stack::Result<(), CliError> {
    let mut config = RunConfig::load(clargs.config.as_deref()).change_context(CliError::Config)?;
    if let Some(wl) = clargs.target_wavelength {
        config.target_wavelength = wl;
        config.validate().change_context(CliError::Config)?;
    }

    if clargs.check_config_only {
        println!("Loaded configuration:\n{config:#?}");
        return Ok(());
    }

    log::info!("Reading GCM output from {}", clargs.gcm_file.display());
    let gcm = NcSource::open(&clargs.gcm_file)
        .change_context_lazy(|| CliError::Open(clargs.gcm_file.clone()))?;

    log::info!("Reading dust properties from {}", clargs.dust_radprop_file.display());
    let dust_table = read_table(&clargs.dust_radprop_file)?;
    log::info!("Reading water ice properties from {}", clargs.ice_radprop_file.display());
    let ice_table = read_table(&clargs.ice_radprop_file)?;

    let mut sink = if clargs.append {
        log::info!("Appending products to {}", clargs.output.display());
        NcSink::append(&clargs.output, config.compression)
    } else {
        log::info!("Writing products to {} (overwriting if present)", clargs.output.display());
        NcSink::create(&clargs.output, config.compression)
    }
    .change_context_lazy(|| CliError::Open(clargs.output.clone()))?;

    write_gcm_products(&gcm, &dust_table, &ice_table, &config, &mut sink)
        .change_context(CliError::Products)?;
    log::info!("Done");
    Ok(())
}

fn read_table(path: &Path) -> error_stack::Result<RadiativePropertyTable, CliError> {
    let source = NcSource::open(path).change_context_lazy(|| CliError::Open(path.to_path_buf()))?;
    RadiativePropertyTable::from_source(&source)
        .change_context_lazy(|| CliError::Radprop(path.to_path_buf()))
}

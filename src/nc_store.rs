//! netCDF-4 (and HDF5 files readable by the netCDF library) implementations of
//! [`ArraySource`] and [`ArraySink`].
use std::path::{Path, PathBuf};

use ndarray::ArrayD;
use netcdf::Extents;

use crate::{
    config::CompressionConfig,
    store::{ArraySink, ArraySource, OutputVariable, StoreError},
};

/// Read-only access to the variables in the root group of a netCDF-4/HDF5 file.
pub struct NcSource {
    file: netcdf::File,
    path: PathBuf,
}

impl NcSource {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let file = netcdf::open(path)
            .map_err(|e| StoreError::backend(format!("opening {}: {e}", path.display())))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArraySource for NcSource {
    /// Read a numeric variable, converting it to `f64` whatever its stored type.
    fn get_array(&self, name: &str) -> Result<ArrayD<f64>, StoreError> {
        let var = self
            .file
            .variable(name)
            .ok_or_else(|| StoreError::MissingVariable(name.to_string()))?;
        var.get::<f64, _>(Extents::All).map_err(|e| {
            StoreError::backend(format!(
                "reading variable '{name}' from {}: {e}",
                self.path.display()
            ))
        })
    }

    fn has_array(&self, name: &str) -> bool {
        self.file.variable(name).is_some()
    }
}

/// Writes arrays into groups of a netCDF-4 file, creating groups and
/// dimensions as needed.
pub struct NcSink {
    file: netcdf::FileMut,
    path: PathBuf,
    compression: CompressionConfig,
}

impl NcSink {
    /// Create `path`, overwriting it if it exists.
    pub fn create(path: &Path, compression: CompressionConfig) -> Result<Self, StoreError> {
        let file = netcdf::create(path)
            .map_err(|e| StoreError::backend(format!("creating {}: {e}", path.display())))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            compression,
        })
    }

    /// Open an existing file to add variables to it.
    pub fn append(path: &Path, compression: CompressionConfig) -> Result<Self, StoreError> {
        let file = netcdf::append(path)
            .map_err(|e| StoreError::backend(format!("opening {} for appending: {e}", path.display())))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            compression,
        })
    }

    fn group_mut(&mut self, group: &str) -> Result<netcdf::GroupMut<'_>, StoreError> {
        let path = self.path.display().to_string();
        if group.is_empty() {
            return self.file.root_mut().ok_or_else(|| {
                StoreError::backend(format!("getting the root group of {path} (not a netCDF-4 file)"))
            });
        }

        let exists = self
            .file
            .group(group)
            .map_err(|e| StoreError::backend(format!("looking up group '{group}' in {path}: {e}")))?
            .is_some();
        if exists {
            self.file
                .group_mut(group)
                .map_err(|e| StoreError::backend(format!("opening group '{group}' in {path}: {e}")))?
                .ok_or_else(|| StoreError::backend(format!("opening group '{group}' in {path}")))
        } else {
            self.file
                .add_group(group)
                .map_err(|e| StoreError::backend(format!("creating group '{group}' in {path}: {e}")))
        }
    }
}

impl ArraySink for NcSink {
    fn put_array(&mut self, var: OutputVariable<'_>) -> Result<(), StoreError> {
        var.check_dims()?;
        let var_path = var.path();
        let compression = self.compression;
        let mut grp = self.group_mut(var.group)?;

        for (dim, &len) in var.dims.iter().zip(var.data.shape()) {
            let existing = grp.dimension(dim).map(|d| d.len());
            match existing {
                Some(n) if n != len => {
                    return Err(StoreError::dimension_mismatch(
                        &var_path,
                        format!("dimension '{dim}' already has length {n}, cannot use it for an axis of length {len}"),
                    ));
                }
                Some(_) => (),
                None => {
                    grp.add_dimension(dim, len).map_err(|e| {
                        StoreError::backend(format!("creating dimension '{dim}' for '{var_path}': {e}"))
                    })?;
                }
            }
        }

        let dims = var.dims.iter().map(|d| d.as_str()).collect::<Vec<_>>();
        let mut nc_var = grp
            .add_variable::<f64>(var.name, &dims)
            .map_err(|e| StoreError::backend(format!("creating variable '{var_path}': {e}")))?;

        if var.compress {
            nc_var
                .set_compression(compression.deflate_level, compression.shuffle)
                .map_err(|e| StoreError::backend(format!("setting compression on '{var_path}': {e}")))?;
        }

        for (key, value) in var.attributes.iter() {
            nc_var.put_attribute(key, value.as_str()).map_err(|e| {
                StoreError::backend(format!("adding the '{key}' attribute to '{var_path}': {e}"))
            })?;
        }

        let data = var.data.as_standard_layout();
        nc_var
            .put(data.view(), Extents::All)
            .map_err(|e| StoreError::backend(format!("writing '{var_path}': {e}")))?;
        Ok(())
    }
}

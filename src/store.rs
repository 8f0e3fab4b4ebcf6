//! Named-array collaborators.
//!
//! The numerical code never touches a file format directly. It reads inputs from
//! something implementing [`ArraySource`] and hands its outputs to something
//! implementing [`ArraySink`]. [`MemoryStore`] implements both and is what the
//! tests use; the netCDF-4/HDF5 implementations live in `nc_store` behind the
//! `netcdf` feature.
use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::{ArrayD, ArrayViewD};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Variable '{0}' not found")]
    MissingVariable(String),
    #[error("Dimension mismatch for '{name}': {reason}")]
    DimensionMismatch { name: String, reason: String },
    #[error("An error occurred while {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend<S: ToString>(msg: S) -> Self {
        Self::Backend(msg.to_string())
    }

    pub fn dimension_mismatch<N: ToString, R: ToString>(name: N, reason: R) -> Self {
        Self::DimensionMismatch {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A source of named, fully materialized arrays.
pub trait ArraySource {
    fn get_array(&self, name: &str) -> Result<ArrayD<f64>, StoreError>;

    fn has_array(&self, name: &str) -> bool;
}

/// One variable to persist, plus the metadata the writer needs to lay it out.
#[derive(Debug, Clone)]
pub struct OutputVariable<'a> {
    /// Group to place the variable in; an empty string means the root group
    pub group: &'a str,
    pub name: &'a str,
    /// One dimension name per axis of `data`
    pub dims: Vec<String>,
    pub data: ArrayViewD<'a, f64>,
    pub attributes: Vec<(&'static str, String)>,
    /// Whether the sink should apply its configured compression
    pub compress: bool,
}

impl<'a> OutputVariable<'a> {
    pub fn new<D: ToString>(group: &'a str, name: &'a str, dims: &[D], data: ArrayViewD<'a, f64>) -> Self {
        Self {
            group,
            name,
            dims: dims.iter().map(|d| d.to_string()).collect(),
            data,
            attributes: vec![],
            compress: false,
        }
    }

    pub fn with_attribute<V: ToString>(mut self, key: &'static str, value: V) -> Self {
        self.attributes.push((key, value.to_string()));
        self
    }

    pub fn compressed(mut self) -> Self {
        self.compress = true;
        self
    }

    /// `group/name`, or just `name` for the root group.
    pub fn path(&self) -> String {
        if self.group.is_empty() {
            self.name.to_string()
        } else {
            format!("{}/{}", self.group, self.name)
        }
    }

    pub fn check_dims(&self) -> Result<(), StoreError> {
        if self.dims.len() != self.data.ndim() {
            return Err(StoreError::dimension_mismatch(
                self.path(),
                format!(
                    "{} dimension names ({}) given for a {}-D array",
                    self.dims.len(),
                    self.dims.iter().join(", "),
                    self.data.ndim()
                ),
            ));
        }
        Ok(())
    }
}

/// A sink accepting named arrays.
pub trait ArraySink {
    fn put_array(&mut self, var: OutputVariable<'_>) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredArray {
    pub dims: Vec<String>,
    pub data: ArrayD<f64>,
    pub attributes: IndexMap<String, String>,
    pub compress: bool,
}

/// In-memory, insertion-ordered array store.
///
/// As a source, arrays are looked up by their full path (`group/name`, or just
/// `name` at the root). As a sink, dimension lengths are tracked per group the
/// same way a netCDF file would, so a dimension reused with a different length
/// is rejected.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    arrays: IndexMap<String, StoredArray>,
    dimensions: IndexMap<(String, String), usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input array at the root, with placeholder dimension names.
    pub fn insert(&mut self, name: &str, data: ArrayD<f64>) {
        let dims = (0..data.ndim()).map(|i| format!("{name}_dim{i}")).collect();
        self.arrays.insert(
            name.to_string(),
            StoredArray {
                dims,
                data,
                attributes: IndexMap::new(),
                compress: false,
            },
        );
    }

    /// Builder form of [`MemoryStore::insert`].
    pub fn with<D: ndarray::Dimension>(mut self, name: &str, data: ndarray::Array<f64, D>) -> Self {
        self.insert(name, data.into_dyn());
        self
    }

    pub fn get(&self, path: &str) -> Option<&StoredArray> {
        self.arrays.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }
}

impl ArraySource for MemoryStore {
    fn get_array(&self, name: &str) -> Result<ArrayD<f64>, StoreError> {
        self.arrays
            .get(name)
            .map(|a| a.data.clone())
            .ok_or_else(|| StoreError::MissingVariable(name.to_string()))
    }

    fn has_array(&self, name: &str) -> bool {
        self.arrays.contains_key(name)
    }
}

impl ArraySink for MemoryStore {
    fn put_array(&mut self, var: OutputVariable<'_>) -> Result<(), StoreError> {
        var.check_dims()?;
        let path = var.path();
        if self.arrays.contains_key(&path) {
            return Err(StoreError::backend(format!(
                "writing '{path}': a variable with that name already exists"
            )));
        }

        for (dim, &len) in var.dims.iter().zip(var.data.shape()) {
            let key = (var.group.to_string(), dim.clone());
            match self.dimensions.get(&key) {
                Some(&existing) if existing != len => {
                    return Err(StoreError::dimension_mismatch(
                        &path,
                        format!("dimension '{dim}' already has length {existing}, cannot use it for an axis of length {len}"),
                    ));
                }
                Some(_) => (),
                None => {
                    self.dimensions.insert(key, len);
                }
            }
        }

        let attributes = var
            .attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        self.arrays.insert(
            path,
            StoredArray {
                dims: var.dims,
                data: var.data.to_owned(),
                attributes,
                compress: var.compress,
            },
        );
        Ok(())
    }
}

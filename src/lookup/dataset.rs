/*
Copyright 2022 Jakub Lewandowski

This file is part of NWP Extract.

NWP Extract is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

NWP Extract is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with NWP Extract. If not, see https://www.gnu.org/licenses/.
*/

//! Module with a thin abstraction over self-describing
//! gridded array files, so that the lookup engine does not
//! depend on any particular file format.

use crate::{errors::InputError, Float};
use ndarray::{Array, Array1, Array2, ArrayD, Dimension, Ix1, Ix2, IxDyn};
use rustc_hash::FxHashMap;

/// Read-only access to named variables and their attributes.
///
/// Coordinate arrays are always read in full, while data fields
/// are read element by element at resolved indices.
pub trait Dataset {
    fn has_variable(&self, name: &str) -> bool;

    /// Names of all variables in the dataset.
    fn variable_names(&self) -> Vec<String>;

    fn shape(&self, name: &str) -> Result<Vec<usize>, InputError>;

    fn read_1d(&self, name: &str) -> Result<Array1<Float>, InputError>;

    fn read_2d(&self, name: &str) -> Result<Array2<Float>, InputError>;

    fn read_value(&self, name: &str, index: &[usize]) -> Result<Float, InputError>;

    fn read_attribute(&self, name: &str, attribute: &str) -> Result<String, InputError>;

    /// Returns the first of `names` present in the dataset.
    fn find_variable<'a>(&self, names: &'a [String]) -> Option<&'a str> {
        names
            .iter()
            .map(String::as_str)
            .find(|name| self.has_variable(name))
    }
}

/// Checks that `index` addresses an element inside `shape`.
pub(super) fn check_index(name: &str, index: &[usize], shape: &[usize]) -> Result<(), InputError> {
    if index.len() != shape.len() || index.iter().zip(shape).any(|(i, n)| i >= n) {
        return Err(InputError::OutOfRange {
            name: name.to_string(),
            index: index.to_vec(),
            shape: shape.to_vec(),
        });
    }

    Ok(())
}

/// Dataset kept entirely in memory as `ndarray` arrays.
#[cfg_attr(not(test), allow(dead_code))]
#[derive(Clone, Debug, Default)]
pub struct MemoryDataset {
    variables: FxHashMap<String, ArrayD<Float>>,
    attributes: FxHashMap<(String, String), String>,
}

#[cfg_attr(not(test), allow(dead_code))]
impl MemoryDataset {
    pub fn new() -> Self {
        MemoryDataset::default()
    }

    pub fn with_variable<D: Dimension>(mut self, name: &str, data: Array<Float, D>) -> Self {
        self.variables.insert(name.to_string(), data.into_dyn());
        self
    }

    pub fn with_attribute(mut self, name: &str, attribute: &str, value: &str) -> Self {
        self.attributes.insert(
            (name.to_string(), attribute.to_string()),
            value.to_string(),
        );
        self
    }

    fn variable(&self, name: &str) -> Result<&ArrayD<Float>, InputError> {
        self.variables
            .get(name)
            .ok_or_else(|| InputError::MissingVariable(name.to_string()))
    }
}

impl Dataset for MemoryDataset {
    fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    fn variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.variables.keys().cloned().collect();
        names.sort();
        names
    }

    fn shape(&self, name: &str) -> Result<Vec<usize>, InputError> {
        Ok(self.variable(name)?.shape().to_vec())
    }

    fn read_1d(&self, name: &str) -> Result<Array1<Float>, InputError> {
        self.variable(name)?
            .clone()
            .into_dimensionality::<Ix1>()
            .map_err(|_| InputError::IncorrectType(name.to_string()))
    }

    fn read_2d(&self, name: &str) -> Result<Array2<Float>, InputError> {
        self.variable(name)?
            .clone()
            .into_dimensionality::<Ix2>()
            .map_err(|_| InputError::IncorrectType(name.to_string()))
    }

    fn read_value(&self, name: &str, index: &[usize]) -> Result<Float, InputError> {
        let variable = self.variable(name)?;
        check_index(name, index, variable.shape())?;

        variable
            .get(IxDyn(index))
            .copied()
            .ok_or_else(|| InputError::OutOfRange {
                name: name.to_string(),
                index: index.to_vec(),
                shape: variable.shape().to_vec(),
            })
    }

    fn read_attribute(&self, name: &str, attribute: &str) -> Result<String, InputError> {
        self.variable(name)?;

        self.attributes
            .get(&(name.to_string(), attribute.to_string()))
            .cloned()
            .ok_or_else(|| InputError::MissingAttribute(name.to_string(), attribute.to_string()))
    }
}

#[cfg(feature = "netcdf")]
pub use self::netcdf_file::NetcdfDataset;

#[cfg(feature = "netcdf")]
mod netcdf_file {
    use super::{check_index, Dataset};
    use crate::{errors::InputError, Float};
    use log::debug;
    use ndarray::{Array1, Array2};
    use netcdf::AttributeValue;
    use std::path::{Path, PathBuf};

    /// Dataset backed by an opened NetCDF file.
    ///
    /// The file handle lives as long as this struct
    /// and is closed on drop.
    pub struct NetcdfDataset {
        file: netcdf::File,
        path: PathBuf,
    }

    impl std::fmt::Debug for NetcdfDataset {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("NetcdfDataset")
                .field("path", &self.path)
                .finish()
        }
    }

    /// Packing attributes of a variable (CF conventions).
    struct Packing {
        scale: Float,
        offset: Float,
        fill: Option<Float>,
    }

    impl Packing {
        fn of(variable: &netcdf::Variable) -> Self {
            Packing {
                scale: attribute_as_float(variable, "scale_factor").unwrap_or(1.0),
                offset: attribute_as_float(variable, "add_offset").unwrap_or(0.0),
                fill: attribute_as_float(variable, "_FillValue"),
            }
        }

        fn unpack(&self, raw: Float) -> Float {
            match self.fill {
                Some(fill) if raw == fill => Float::NAN,
                _ => raw * self.scale + self.offset,
            }
        }
    }

    fn attribute_as_float(variable: &netcdf::Variable, name: &str) -> Option<Float> {
        variable
            .attribute_value(name)
            .and_then(|r| r.ok())
            .and_then(|v| match v {
                AttributeValue::Double(d) => Some(d),
                AttributeValue::Float(f) => Some(Float::from(f)),
                AttributeValue::Int(i) => Some(Float::from(i)),
                AttributeValue::Short(s) => Some(Float::from(s)),
                AttributeValue::Schar(c) => Some(Float::from(c)),
                _ => None,
            })
    }

    impl NetcdfDataset {
        pub fn open(path: &Path) -> Result<Self, InputError> {
            debug!("Opening NetCDF dataset {}", path.display());
            let file = netcdf::open(path)?;

            Ok(NetcdfDataset {
                file,
                path: path.to_path_buf(),
            })
        }

        fn variable(&self, name: &str) -> Result<netcdf::Variable<'_>, InputError> {
            self.file
                .variable(name)
                .ok_or_else(|| InputError::MissingVariable(name.to_string()))
        }

        fn read_all(&self, name: &str) -> Result<(Vec<usize>, Vec<Float>), InputError> {
            let variable = self.variable(name)?;
            let shape: Vec<usize> = variable.dimensions().iter().map(|d| d.len()).collect();
            let packing = Packing::of(&variable);

            let raw: Vec<Float> = variable.get_values::<Float, _>(..)?;
            let values = raw.into_iter().map(|v| packing.unpack(v)).collect();

            Ok((shape, values))
        }
    }

    impl Dataset for NetcdfDataset {
        fn has_variable(&self, name: &str) -> bool {
            self.file.variable(name).is_some()
        }

        fn variable_names(&self) -> Vec<String> {
            self.file.variables().map(|v| v.name()).collect()
        }

        fn shape(&self, name: &str) -> Result<Vec<usize>, InputError> {
            let variable = self.variable(name)?;
            Ok(variable.dimensions().iter().map(|d| d.len()).collect())
        }

        fn read_1d(&self, name: &str) -> Result<Array1<Float>, InputError> {
            let (shape, values) = self.read_all(name)?;

            if shape.len() != 1 {
                return Err(InputError::IncorrectType(name.to_string()));
            }

            Ok(Array1::from(values))
        }

        fn read_2d(&self, name: &str) -> Result<Array2<Float>, InputError> {
            let (shape, values) = self.read_all(name)?;

            if shape.len() != 2 {
                return Err(InputError::IncorrectType(name.to_string()));
            }

            Ok(Array2::from_shape_vec((shape[0], shape[1]), values)?)
        }

        fn read_value(&self, name: &str, index: &[usize]) -> Result<Float, InputError> {
            let variable = self.variable(name)?;
            let shape: Vec<usize> = variable.dimensions().iter().map(|d| d.len()).collect();
            check_index(name, index, &shape)?;

            let raw: Float = variable.get_value::<Float, _>(index)?;

            Ok(Packing::of(&variable).unpack(raw))
        }

        fn read_attribute(&self, name: &str, attribute: &str) -> Result<String, InputError> {
            let variable = self.variable(name)?;

            match variable.attribute_value(attribute) {
                Some(Ok(AttributeValue::Str(value))) => Ok(value),
                Some(Ok(_)) => Err(InputError::IncorrectType(format!("{}:{}", name, attribute))),
                Some(Err(err)) => Err(err.into()),
                None => Err(InputError::MissingAttribute(
                    name.to_string(),
                    attribute.to_string(),
                )),
            }
        }
    }
}


#[cfg(all(test, feature = "netcdf"))]
mod netcdf_tests {
    use super::{Dataset, NetcdfDataset};
    use crate::errors::InputError;

    #[test]
    fn reads_packed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast.nc");

        {
            let mut file = netcdf::create(&path).unwrap();
            file.add_dimension("y", 2).unwrap();
            file.add_dimension("x", 3).unwrap();

            let mut hs = file.add_variable::<f64>("hs", &["y", "x"]).unwrap();
            hs.put_values(&[1.0, 2.0, 3.0, 4.0, 5.0, -999.0], ..).unwrap();
            hs.put_attribute("scale_factor", 0.5).unwrap();
            hs.put_attribute("add_offset", 10.0).unwrap();
            hs.put_attribute("_FillValue", -999.0).unwrap();
            hs.put_attribute("grid_mapping", "crs").unwrap();

            let mut x = file.add_variable::<f64>("x", &["x"]).unwrap();
            x.put_values(&[0.1, 0.2, 0.3], ..).unwrap();
        }

        let ds = NetcdfDataset::open(&path).unwrap();

        assert!(ds.has_variable("hs"));
        assert_eq!(ds.shape("hs").unwrap(), vec![2, 3]);
        assert_eq!(ds.read_value("hs", &[1, 0]).unwrap(), 12.0);
        assert!(ds.read_value("hs", &[1, 2]).unwrap().is_nan());
        assert_eq!(ds.read_2d("hs").unwrap()[[0, 2]], 11.5);
        assert_eq!(ds.read_1d("x").unwrap().len(), 3);
        assert_eq!(ds.read_attribute("hs", "grid_mapping").unwrap(), "crs");

        let mut names = ds.variable_names();
        names.sort();
        assert_eq!(names, vec!["hs", "x"]);

        assert!(matches!(
            ds.read_value("hs", &[2, 0]),
            Err(InputError::OutOfRange { .. })
        ));
        assert!(matches!(
            ds.read_attribute("hs", "units"),
            Err(InputError::MissingAttribute(..))
        ));
    }
}

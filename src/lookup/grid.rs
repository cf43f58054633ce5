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

//! Module responsible for loading grid coordinates from
//! a dataset and resolving query points into grid cells.
//!
//! Two grid topologies are supported:
//!
//! - regular grids with evenly spaced 1D axes in a projected or
//! rotated reference system, searched analytically per axis,
//! - irregular grids with 2D longitude and latitude of every cell,
//! searched with nearest neighbour over the whole mesh.

use super::{bucket, dataset::Dataset, neighbours::NeighbourIndex, projection, QueryPoints};
use crate::{
    configuration::Lookup,
    constants::WGS84_DESCRIPTOR,
    errors::{InputError, LookupError},
    Float,
};
use log::debug;
use ndarray::Array2;

/// Axis variable pairs of regular grids, checked in order.
const AXIS_PAIRS: [(&str, &str); 2] = [("x", "y"), ("rlon", "rlat")];

/// Grid mapping variables holding the `proj4` attribute, checked in order.
const GRID_MAPPINGS: [&str; 2] = ["projection_lambert", "projection_3"];

/// Grid topology selector.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, clap::ValueEnum)]
pub enum Topology {
    /// Regular when 1D axes are present, irregular otherwise
    Auto,
    Regular,
    Irregular,
}

/// Grid cell resolved for a query point.
///
/// `flat` is the row-major position of `(row, col)` and `distance`
/// (in meters) is known only for nearest neighbour search.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct CellIndex {
    pub row: usize,
    pub col: usize,
    pub flat: usize,
    pub distance: Option<Float>,
}

/// Regular grid: evenly spaced `x_coords` and `y_coords`
/// in the reference system given by `projection`.
#[derive(Clone, Debug)]
pub struct RegularGrid {
    x_coords: Vec<Float>,
    y_coords: Vec<Float>,
    projection: String,
}

/// Irregular grid: geographic coordinates of every cell.
#[derive(Clone, Debug)]
pub struct IrregularGrid {
    lons: Array2<Float>,
    lats: Array2<Float>,
}

#[derive(Clone, Debug)]
pub enum Grid {
    Regular(RegularGrid),
    Irregular(IrregularGrid),
}

impl Grid {
    /// Reads the grid of requested topology from the dataset.
    /// Coordinates are read in full as they are used by every query point.
    pub fn load(
        dataset: &dyn Dataset,
        topology: Topology,
        settings: &Lookup,
    ) -> Result<Self, LookupError> {
        let topology = match topology {
            Topology::Auto if find_axis_pair(dataset).is_some() => Topology::Regular,
            Topology::Auto => Topology::Irregular,
            other => other,
        };

        let grid = match topology {
            Topology::Irregular => Grid::Irregular(IrregularGrid::load(dataset, settings)?),
            _ => Grid::Regular(RegularGrid::load(dataset, settings)?),
        };

        let (rows, cols) = grid.shape();
        debug!("Loaded {:?} grid of shape {}x{}", topology, rows, cols);

        Ok(grid)
    }

    /// Grid shape as (rows, columns).
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Grid::Regular(grid) => (grid.y_coords.len(), grid.x_coords.len()),
            Grid::Irregular(grid) => grid.lons.dim(),
        }
    }

    /// Resolves every query point into a grid cell,
    /// keeping the order of query points.
    pub fn resolve(
        &self,
        query: &QueryPoints,
        settings: &Lookup,
    ) -> Result<Vec<CellIndex>, LookupError> {
        match self {
            Grid::Regular(grid) => grid.resolve(query),
            Grid::Irregular(grid) => grid.resolve(query, settings.search_radius),
        }
    }
}

fn find_axis_pair(dataset: &dyn Dataset) -> Option<(&'static str, &'static str)> {
    AXIS_PAIRS
        .iter()
        .copied()
        .find(|(x, y)| dataset.has_variable(x) && dataset.has_variable(y))
}

impl RegularGrid {
    pub fn new(
        x_coords: Vec<Float>,
        y_coords: Vec<Float>,
        projection: &str,
        spacing_tolerance: Float,
    ) -> Result<Self, InputError> {
        for (name, axis) in [("x", &x_coords), ("y", &y_coords)] {
            if bucket::even_spacing(axis, spacing_tolerance).is_none() {
                return Err(InputError::UnevenSpacing(name.to_string()));
            }
        }

        Ok(RegularGrid {
            x_coords,
            y_coords,
            projection: projection.to_string(),
        })
    }

    fn load(dataset: &dyn Dataset, settings: &Lookup) -> Result<Self, InputError> {
        let (x_name, y_name) = find_axis_pair(dataset).ok_or_else(|| {
            InputError::MissingVariable("x and y or rlon and rlat".to_string())
        })?;

        let x_coords = dataset.read_1d(x_name)?.to_vec();
        let y_coords = dataset.read_1d(y_name)?.to_vec();
        let projection = read_projection(dataset, settings)?;

        debug!("Grid projection: {}", projection);

        RegularGrid::new(x_coords, y_coords, &projection, settings.spacing_tolerance).map_err(
            |err| match err {
                InputError::UnevenSpacing(axis) if axis == "x" => {
                    InputError::UnevenSpacing(x_name.to_string())
                }
                InputError::UnevenSpacing(_) => InputError::UnevenSpacing(y_name.to_string()),
                other => other,
            },
        )
    }

    fn resolve(&self, query: &QueryPoints) -> Result<Vec<CellIndex>, LookupError> {
        let (xs, ys) =
            projection::reproject(query.lons(), query.lats(), WGS84_DESCRIPTOR, &self.projection)?;

        xs.iter()
            .zip(&ys)
            .map(|(&x, &y)| {
                let col = bucket::find_cell(&self.x_coords, x).map_err(|source| {
                    LookupError::IndexNotFound {
                        axis: "x",
                        coord: x,
                        source,
                    }
                })?;

                let row = bucket::find_cell(&self.y_coords, y).map_err(|source| {
                    LookupError::IndexNotFound {
                        axis: "y",
                        coord: y,
                        source,
                    }
                })?;

                Ok(CellIndex {
                    row,
                    col,
                    flat: row * self.x_coords.len() + col,
                    distance: None,
                })
            })
            .collect()
    }
}

/// Reads projection descriptor from the grid mapping variable.
///
/// The mapping named in `grid_mapping` of a requested field is preferred,
/// then the one named by any other variable, then a known mapping variable.
fn read_projection(dataset: &dyn Dataset, settings: &Lookup) -> Result<String, InputError> {
    let declared = settings
        .fields
        .iter()
        .cloned()
        .chain(dataset.variable_names())
        .filter_map(|name| dataset.read_attribute(&name, "grid_mapping").ok());

    let mapping = declared
        .chain(GRID_MAPPINGS.iter().map(|name| name.to_string()))
        .find(|name| dataset.has_variable(name))
        .ok_or_else(|| InputError::MissingVariable(GRID_MAPPINGS.join(" or ")))?;

    debug!("Reading projection from {}", mapping);

    dataset.read_attribute(&mapping, "proj4")
}

impl IrregularGrid {
    pub fn new(lons: Array2<Float>, lats: Array2<Float>) -> Result<Self, InputError> {
        if lons.dim() != lats.dim() {
            return Err(InputError::IncorrectType(
                "longitude and latitude of different shapes".to_string(),
            ));
        }

        Ok(IrregularGrid { lons, lats })
    }

    fn load(dataset: &dyn Dataset, settings: &Lookup) -> Result<Self, InputError> {
        let (lons, lats) = geographic_mesh(dataset, settings)?;
        IrregularGrid::new(lons, lats)
    }

    fn resolve(&self, query: &QueryPoints, radius: Float) -> Result<Vec<CellIndex>, LookupError> {
        let index = NeighbourIndex::new(&self.lons, &self.lats);
        let cols = self.lons.ncols();

        query
            .iter()
            .map(|(lon, lat)| {
                let neighbour = index
                    .nearest(lon, lat, radius)
                    .ok_or(LookupError::NoNeighborWithinRadius { lon, lat, radius })?;

                Ok(CellIndex {
                    row: neighbour.index / cols,
                    col: neighbour.index % cols,
                    flat: neighbour.index,
                    distance: Some(neighbour.distance),
                })
            })
            .collect()
    }
}

/// Reads 2D longitude and latitude of every grid cell.
pub fn geographic_mesh(
    dataset: &dyn Dataset,
    settings: &Lookup,
) -> Result<(Array2<Float>, Array2<Float>), InputError> {
    let lon_name = dataset
        .find_variable(&settings.longitude_names)
        .ok_or_else(|| InputError::MissingVariable(settings.longitude_names.join(" or ")))?;
    let lat_name = dataset
        .find_variable(&settings.latitude_names)
        .ok_or_else(|| InputError::MissingVariable(settings.latitude_names.join(" or ")))?;

    let lons = dataset.read_2d(lon_name)?;
    let lats = dataset.read_2d(lat_name)?;

    if lons.dim() != lats.dim() {
        return Err(InputError::IncorrectType(format!("{}/{}", lon_name, lat_name)));
    }

    Ok((lons, lats))
}

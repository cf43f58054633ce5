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

//! Module containing the point lookup engine.
//!
//! For each query point given in geographic coordinates the engine
//! finds the grid cell containing it (or the nearest one for irregular
//! grids), finds the requested timestamp on the time axis and reads
//! values of requested fields at that cell and time.
//!
//! The control flow of a single lookup is linear:
//! grid loading, reprojection and cell search, time search, value gathering.
//! Any failure aborts the whole lookup and no partial results are returned.

pub mod bucket;
pub mod dataset;
pub mod gather;
pub mod grid;
pub mod neighbours;
pub mod projection;
pub mod temporal;

use self::{dataset::Dataset, gather::PointRecord, grid::Grid, grid::Topology};
use crate::{
    configuration::Lookup,
    errors::{InputError, LookupError},
    Float,
};
use log::debug;
use std::path::Path;

/// Name of the time axis variable (seconds since Unix epoch).
const TIME_VARIABLE: &str = "time";

/// Query points given as parallel sequences of WGS84
/// longitudes and latitudes (in degrees).
#[derive(Clone, PartialEq, Debug, Default)]
pub struct QueryPoints {
    lons: Vec<Float>,
    lats: Vec<Float>,
}

impl QueryPoints {
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn new(lons: Vec<Float>, lats: Vec<Float>) -> Result<Self, LookupError> {
        if lons.len() != lats.len() {
            return Err(LookupError::MismatchedQuery(lons.len(), lats.len()));
        }

        Ok(QueryPoints { lons, lats })
    }

    pub fn from_pairs(pairs: &[(Float, Float)]) -> Self {
        let (lons, lats) = pairs.iter().copied().unzip();
        QueryPoints { lons, lats }
    }

    pub fn len(&self) -> usize {
        self.lons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lons.is_empty()
    }

    pub fn lons(&self) -> &[Float] {
        &self.lons
    }

    pub fn lats(&self) -> &[Float] {
        &self.lats
    }

    pub fn iter(&self) -> impl Iterator<Item = (Float, Float)> + '_ {
        self.lons.iter().copied().zip(self.lats.iter().copied())
    }
}

/// Extracts values of configured fields at query points for one timestamp.
///
/// Returns exactly one record per query point, in the order of query points.
/// Duplicated query points produce duplicated records.
pub fn extract_at_points(
    dataset: &dyn Dataset,
    query: &QueryPoints,
    timestamp: &str,
    topology: Topology,
    settings: &Lookup,
) -> Result<Vec<PointRecord>, LookupError> {
    gather::check_fields(dataset, settings)?;

    let grid = Grid::load(dataset, topology, settings)?;
    let cells = grid.resolve(query, settings)?;

    for cell in &cells {
        if let Some(distance) = cell.distance {
            debug!("Nearest grid vertex {} is {:.1} m away", cell.flat, distance);
        }
    }

    let time_axis = dataset.read_1d(TIME_VARIABLE)?.to_vec();
    let (time_index, timestamp) = temporal::find_time_index(&time_axis, timestamp)?;

    debug!(
        "Resolved {} points, reading time index {}",
        cells.len(),
        time_index
    );

    Ok(gather::gather_values(
        dataset, &cells, time_index, timestamp, settings,
    )?)
}

/// Opens the dataset file and extracts values at query points.
/// The file is closed before returning, also on failure.
pub fn extract_from_file(
    path: &Path,
    query: &QueryPoints,
    timestamp: &str,
    topology: Topology,
    settings: &Lookup,
) -> Result<Vec<PointRecord>, LookupError> {
    let dataset = open_dataset(path)?;
    extract_at_points(dataset.as_ref(), query, timestamp, topology, settings)
}

/// Opens a dataset file for reading.
#[cfg(feature = "netcdf")]
pub fn open_dataset(path: &Path) -> Result<Box<dyn Dataset>, InputError> {
    Ok(Box::new(dataset::NetcdfDataset::open(path)?))
}

/// Opens a dataset file for reading.
#[cfg(not(feature = "netcdf"))]
pub fn open_dataset(path: &Path) -> Result<Box<dyn Dataset>, InputError> {
    debug!("Cannot open {}: built without NetCDF", path.display());
    Err(InputError::NotSupported(
        "NetCDF files, rebuild with the netcdf feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::QueryPoints;
    use crate::errors::LookupError;

    #[test]
    fn query_points_must_pair() {
        assert!(matches!(
            QueryPoints::new(vec![1.0, 2.0], vec![3.0]),
            Err(LookupError::MismatchedQuery(2, 1))
        ));

        let query = QueryPoints::from_pairs(&[(1.0, 3.0), (2.0, 4.0)]);
        assert_eq!(query, QueryPoints::new(vec![1.0, 2.0], vec![3.0, 4.0]).unwrap());
        assert_eq!(query.iter().collect::<Vec<_>>(), vec![(1.0, 3.0), (2.0, 4.0)]);
        assert_eq!(query.len(), 2);
    }
}

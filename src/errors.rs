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

use crate::Float;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Error while reading configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Error while creating ThreadPool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Point extraction failed: {0}")]
    Lookup(#[from] LookupError),

    #[error("Archive retrieval failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot write CSV output: {0}")]
    Csv(#[from] csv::Error),

    #[error("Cannot set memory limit of {0} MB")]
    MemoryLimit(usize),

    #[error("Incorrect command line argument: {0}")]
    Argument(String),

    #[error("{0} of {1} dates failed, check the log for details")]
    PartialFailure(usize, usize),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot open configuration file: {0}")]
    CantOpenFile(#[from] std::io::Error),

    #[error("Cannot deserialize configuration file: {0}")]
    CantDeserialize(#[from] serde_yaml::Error),

    #[error("Configuration component is out of bounds: {0}")]
    OutOfBounds(&'static str),

    #[error("URL template contains unknown placeholder {{{0}}}")]
    UnknownPlaceholder(String),
}

/// Failures of the point lookup engine.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Cannot access dataset: {0}")]
    DataAccess(#[from] InputError),

    #[error("Coordinate {coord} has no matching cell on {axis} axis: {source}")]
    IndexNotFound {
        axis: &'static str,
        coord: Float,
        source: SearchError,
    },

    #[error("No grid point within {radius} m of lon {lon} lat {lat}")]
    NoNeighborWithinRadius {
        lon: Float,
        lat: Float,
        radius: Float,
    },

    #[error("Timestamp {0} is not present on the time axis")]
    TimestampNotFound(String),

    #[error("Cannot parse timestamp {0}")]
    InvalidTimestamp(String),

    #[error("Coordinate transformation failed: {0}")]
    Transform(#[from] ProjectionError),

    #[error("Query longitudes and latitudes differ in length ({0} and {1})")]
    MismatchedQuery(usize, usize),
}

#[derive(Error, Debug)]
pub enum InputError {
    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),

    #[error("Variable {0} not found in dataset")]
    MissingVariable(String),

    #[error("Attribute {1} of variable {0} not found")]
    MissingAttribute(String, String),

    #[error("Variable {0} has unexpected type or dimensionality")]
    IncorrectType(String),

    #[error("Index {index:?} out of range for variable {name} with shape {shape:?}")]
    OutOfRange {
        name: String,
        index: Vec<usize>,
        shape: Vec<usize>,
    },

    #[error("Axis {0} is not evenly spaced")]
    UnevenSpacing(String),

    #[error("Cannot reshape data: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Dataset support not available: {0}")]
    NotSupported(&'static str),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchError {
    #[error("searched axis is empty")]
    EmptyArray,

    #[error("value lies outside of every cell")]
    OutOfBounds,
}

#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error("Incorrect projection parameters: {0}")]
    IncorrectParams(&'static str),

    #[error("Unrecognized reference system descriptor: {0}")]
    UnknownDescriptor(String),

    #[error("PROJ transformation error: {0}")]
    Proj4(String),

    #[error("Coordinates ({0}, {1}) outside of projection domain")]
    OutOfDomain(Float, Float),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server responded with status {0}")]
    Status(u16),

    #[error("Cannot write downloaded file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot construct archive URL: {0}")]
    Template(#[from] ConfigError),
}

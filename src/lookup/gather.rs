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

//! Module responsible for reading field values
//! and actual grid coordinates at resolved cells.

use super::{dataset::Dataset, grid::CellIndex};
use crate::{configuration::Lookup, errors::InputError, Float};
use chrono::{DateTime, Utc};

/// Values extracted for a single query point.
///
/// `lon_out` and `lat_out` are coordinates of the grid cell
/// that was actually sampled, not of the query point.
#[derive(Clone, PartialEq, Debug)]
pub struct PointRecord {
    pub timestamp: DateTime<Utc>,
    pub lon_out: Float,
    pub lat_out: Float,
    pub values: Vec<Float>,
}

/// Dimensions layout of a data field.
struct FieldLayout<'a> {
    name: &'a str,
    levelled: bool,
}

impl<'a> FieldLayout<'a> {
    /// Accepts `[time, y, x]` fields and `[time, level, y, x]`
    /// fields with a single level.
    fn of(dataset: &dyn Dataset, name: &'a str) -> Result<Self, InputError> {
        let shape = dataset.shape(name)?;

        let levelled = match shape.len() {
            3 => false,
            4 if shape[1] == 1 => true,
            _ => return Err(InputError::IncorrectType(name.to_string())),
        };

        Ok(FieldLayout { name, levelled })
    }

    fn index(&self, time_index: usize, cell: &CellIndex) -> Vec<usize> {
        if self.levelled {
            vec![time_index, 0, cell.row, cell.col]
        } else {
            vec![time_index, cell.row, cell.col]
        }
    }
}

fn field_layouts<'a>(
    dataset: &dyn Dataset,
    settings: &'a Lookup,
) -> Result<Vec<FieldLayout<'a>>, InputError> {
    settings
        .fields
        .iter()
        .map(|name| FieldLayout::of(dataset, name))
        .collect()
}

/// Checks that every requested field is present
/// and has one of the supported layouts.
pub fn check_fields(dataset: &dyn Dataset, settings: &Lookup) -> Result<(), InputError> {
    field_layouts(dataset, settings).map(|_| ())
}

/// Reads actual coordinates and values of requested fields
/// at every cell for one time index.
///
/// Returns exactly one record per cell, in order of `cells`.
pub fn gather_values(
    dataset: &dyn Dataset,
    cells: &[CellIndex],
    time_index: usize,
    timestamp: DateTime<Utc>,
    settings: &Lookup,
) -> Result<Vec<PointRecord>, InputError> {
    let lon_name = dataset
        .find_variable(&settings.longitude_names)
        .ok_or_else(|| InputError::MissingVariable(settings.longitude_names.join(" or ")))?;
    let lat_name = dataset
        .find_variable(&settings.latitude_names)
        .ok_or_else(|| InputError::MissingVariable(settings.latitude_names.join(" or ")))?;

    let fields = field_layouts(dataset, settings)?;

    cells
        .iter()
        .map(|cell| {
            let values = fields
                .iter()
                .map(|field| dataset.read_value(field.name, &field.index(time_index, cell)))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(PointRecord {
                timestamp,
                lon_out: dataset.read_value(lon_name, &[cell.row, cell.col])?,
                lat_out: dataset.read_value(lat_name, &[cell.row, cell.col])?,
                values,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::gather_values;
    use crate::{
        configuration::Lookup,
        errors::InputError,
        lookup::{dataset::MemoryDataset, grid::CellIndex},
    };
    use chrono::{TimeZone, Utc};
    use ndarray::{Array2, Array3, Array4};

    fn cell(row: usize, col: usize) -> CellIndex {
        CellIndex {
            row,
            col,
            flat: row * 3 + col,
            distance: None,
        }
    }

    fn dataset() -> MemoryDataset {
        MemoryDataset::new()
            .with_variable(
                "longitude",
                Array2::from_shape_fn((2, 3), |(_, c)| 10.0 + c as f64),
            )
            .with_variable(
                "latitude",
                Array2::from_shape_fn((2, 3), |(r, _)| 59.0 + r as f64),
            )
            .with_variable(
                "hs_sea",
                Array3::from_shape_fn((4, 2, 3), |(t, r, c)| (t * 100 + r * 10 + c) as f64),
            )
            .with_variable(
                "tp_sea",
                Array4::from_shape_fn((4, 1, 2, 3), |(t, _, r, c)| -((t * 100 + r * 10 + c) as f64)),
            )
    }

    #[test]
    fn records_follow_cells_order() {
        let timestamp = Utc.with_ymd_and_hms(2019, 1, 1, 2, 0, 0).unwrap();
        let settings = Lookup {
            fields: vec!["hs_sea".to_string(), "tp_sea".to_string()],
            ..Lookup::default()
        };

        let cells = [cell(1, 2), cell(0, 0), cell(1, 2)];
        let records = gather_values(&dataset(), &cells, 2, timestamp, &settings).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].values, vec![212.0, -212.0]);
        assert_eq!(records[0].lon_out, 12.0);
        assert_eq!(records[0].lat_out, 60.0);
        assert_eq!(records[1].values, vec![200.0, -200.0]);
        assert_eq!(records[0], records[2]);
        assert!(records.iter().all(|r| r.timestamp == timestamp));
    }

    #[test]
    fn rejects_fields_of_other_dimensionality() {
        let timestamp = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
        let settings = Lookup {
            fields: vec!["longitude".to_string()],
            ..Lookup::default()
        };

        assert!(matches!(
            gather_values(&dataset(), &[cell(0, 0)], 0, timestamp, &settings),
            Err(InputError::IncorrectType(name)) if name == "longitude"
        ));
    }

    #[test]
    fn time_index_out_of_range() {
        let timestamp = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();

        assert!(matches!(
            gather_values(&dataset(), &[cell(0, 0)], 7, timestamp, &Lookup::default()),
            Err(InputError::OutOfRange { .. })
        ));
    }
}

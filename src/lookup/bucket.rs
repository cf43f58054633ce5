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

//! Module containing methods for finding the cell
//! of an evenly spaced grid axis into which a coordinate falls.
//!
//! Cells are centred on the axis values and extend half
//! of the spacing to each side. Each cell is treated as a half-open
//! interval `[lower, upper)` so a coordinate lying exactly on the edge
//! shared by two cells belongs to the cell above it.

use crate::{errors::SearchError, Float};
use float_cmp::approx_eq;

/// Checks if consecutive differences of `axis` are all equal
/// to the first one within `tolerance` relative to it.
/// Returns that spacing when the axis is evenly spaced.
pub fn even_spacing(axis: &[Float], tolerance: Float) -> Option<Float> {
    if axis.len() < 2 {
        return None;
    }

    let dx = axis[1] - axis[0];

    if !dx.is_finite() || dx == 0.0 {
        return None;
    }

    let margin = tolerance * dx.abs();

    let even = axis
        .windows(2)
        .all(|pair| approx_eq!(Float, pair[1] - pair[0], dx, epsilon = margin));

    if even {
        Some(dx)
    } else {
        None
    }
}

/// Coordinates closer to a cell edge than this fraction
/// of the spacing are taken as lying on the edge.
const EDGE_TOLERANCE: Float = 1e-9;

/// Finds the index of the axis cell containing `coord`.
///
/// The spacing is taken from the first consecutive difference and
/// the position of `coord` is measured in cells from the first edge, so
/// both cells sharing an edge see exactly the same edge value. A coordinate
/// on an edge (within rounding) goes to the cell with greater values.
///
/// The axis can be sorted in either direction.
pub fn find_cell(axis: &[Float], coord: Float) -> Result<usize, SearchError> {
    if axis.len() < 2 {
        return Err(SearchError::EmptyArray);
    }

    let dx = axis[1] - axis[0];

    if !coord.is_finite() || !dx.is_finite() || dx == 0.0 {
        return Err(SearchError::OutOfBounds);
    }

    // edge k lies between cells k-1 and k
    let position = (coord - axis[0]) / dx + 0.5;
    let nearest_edge = position.round();

    let cell = if approx_eq!(Float, position, nearest_edge, epsilon = EDGE_TOLERANCE) {
        if dx > 0.0 {
            nearest_edge
        } else {
            nearest_edge - 1.0
        }
    } else {
        position.floor()
    };

    if cell < 0.0 || cell >= axis.len() as Float {
        return Err(SearchError::OutOfBounds);
    }

    Ok(cell as usize)
}

#[cfg(test)]
mod tests {
    use super::{even_spacing, find_cell};
    use crate::errors::SearchError;

    #[test]
    fn finds_cell_inside_axis() {
        let axis = [0.1, 0.2, 0.3, 0.4];

        assert_eq!(find_cell(&axis, 0.32), Ok(2));
        assert_eq!(find_cell(&axis, 0.08), Ok(0));
        assert_eq!(find_cell(&axis, 0.44), Ok(3));

        for (i, centre) in axis.iter().enumerate() {
            assert_eq!(find_cell(&axis, *centre), Ok(i));
            assert_eq!(find_cell(&axis, centre + 0.049), Ok(i));
            assert_eq!(find_cell(&axis, centre - 0.049), Ok(i));
        }
    }

    #[test]
    fn finds_cell_on_descending_axis() {
        let axis = [60.0, 59.5, 59.0, 58.5];

        assert_eq!(find_cell(&axis, 59.1), Ok(2));
        assert_eq!(find_cell(&axis, 60.2), Ok(0));
        assert_eq!(find_cell(&axis, 58.3), Ok(3));
    }

    #[test]
    fn edge_belongs_to_upper_cell() {
        let ascending = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(find_cell(&ascending, 1.5), Ok(2));
        assert_eq!(find_cell(&ascending, -0.5), Ok(0));
        assert_eq!(find_cell(&ascending, 3.5), Err(SearchError::OutOfBounds));

        let descending = [3.0, 2.0, 1.0, 0.0];
        assert_eq!(find_cell(&descending, 1.5), Ok(1));
        assert_eq!(find_cell(&descending, 3.5), Err(SearchError::OutOfBounds));
        assert_eq!(find_cell(&descending, -0.5), Ok(3));
    }

    #[test]
    fn rejects_coordinates_outside_axis() {
        let axis = [0.1, 0.2, 0.3, 0.4];

        assert_eq!(find_cell(&axis, 0.0), Err(SearchError::OutOfBounds));
        assert_eq!(find_cell(&axis, 10.0), Err(SearchError::OutOfBounds));
        assert_eq!(find_cell(&axis, -10.0), Err(SearchError::OutOfBounds));
        assert_eq!(find_cell(&axis, f64::NAN), Err(SearchError::OutOfBounds));
        assert_eq!(find_cell(&[0.1], 0.1), Err(SearchError::EmptyArray));
        assert_eq!(find_cell(&[], 0.1), Err(SearchError::EmptyArray));
    }

    #[test]
    fn inexact_edges_belong_to_upper_cell() {
        let ascending = [0.1, 0.2, 0.3, 0.4];
        assert_eq!(find_cell(&ascending, 0.05), Ok(0));
        assert_eq!(find_cell(&ascending, 0.15), Ok(1));
        assert_eq!(find_cell(&ascending, 0.25), Ok(2));
        assert_eq!(find_cell(&ascending, 0.35), Ok(3));
        assert_eq!(find_cell(&ascending, 0.45), Err(SearchError::OutOfBounds));

        let descending = [0.4, 0.3, 0.2, 0.1];
        assert_eq!(find_cell(&descending, 0.45), Err(SearchError::OutOfBounds));
        assert_eq!(find_cell(&descending, 0.35), Ok(0));
        assert_eq!(find_cell(&descending, 0.25), Ok(1));
        assert_eq!(find_cell(&descending, 0.15), Ok(2));
        assert_eq!(find_cell(&descending, 0.05), Ok(3));
    }

    #[test]
    fn every_point_inside_axis_has_a_cell() {
        let axis = [0.1, 0.2, 0.3, 0.4];

        for step in 0..400 {
            let coord = 0.05 + step as f64 * 0.001;
            let cell = find_cell(&axis, coord).unwrap();
            assert!((coord - axis[cell]).abs() <= 0.05 + 1e-9);
        }
    }

    #[test]
    fn checks_spacing() {
        assert_eq!(even_spacing(&[0.1, 0.2, 0.3, 0.4], 1e-3), Some(0.2 - 0.1));
        assert_eq!(even_spacing(&[4.0, 3.0, 2.0], 1e-3), Some(-1.0));
        assert_eq!(even_spacing(&[0.0, 1.0, 2.5], 1e-3), None);
        assert_eq!(even_spacing(&[0.0, 0.0, 0.0], 1e-3), None);
        assert_eq!(even_spacing(&[0.0], 1e-3), None);
    }
}

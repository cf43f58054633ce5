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

//! Module with the nearest grid point search
//! over irregular (curvilinear) longitude-latitude meshes.
//!
//! Mesh vertices are placed on a unit sphere and indexed
//! with an R-tree, so the search runs on chord distance which
//! is monotonic with the great-circle distance.

use crate::{constants::MEAN_EARTH_RADIUS, Float};
use ndarray::Array2;
use rstar::{primitives::GeomWithData, PointDistance, RTree};

type MeshVertex = GeomWithData<[Float; 3], usize>;

/// Spatial index of a mesh, built once per lookup
/// and queried for every requested point.
pub struct NeighbourIndex {
    tree: RTree<MeshVertex>,
}

/// Nearest mesh vertex: its flat index and
/// great-circle distance in meters.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Neighbour {
    pub index: usize,
    pub distance: Float,
}

impl NeighbourIndex {
    /// Builds the index from 2D longitude and latitude fields of identical shape.
    /// Flat indices follow row-major order. Vertices with non-finite
    /// coordinates are left out.
    pub fn new(lons: &Array2<Float>, lats: &Array2<Float>) -> Self {
        let vertices: Vec<MeshVertex> = lons
            .iter()
            .zip(lats.iter())
            .enumerate()
            .filter(|(_, (lon, lat))| lon.is_finite() && lat.is_finite())
            .map(|(index, (&lon, &lat))| GeomWithData::new(to_unit_sphere(lon, lat), index))
            .collect();

        NeighbourIndex {
            tree: RTree::bulk_load(vertices),
        }
    }

    /// Finds the mesh vertex nearest to the given point
    /// if it lies within `radius` meters.
    pub fn nearest(&self, lon: Float, lat: Float, radius: Float) -> Option<Neighbour> {
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }

        let query = to_unit_sphere(lon, lat);
        let vertex = self.tree.nearest_neighbor(&query)?;

        let distance = chord_to_arc(vertex.distance_2(&query).sqrt());

        if distance <= radius {
            Some(Neighbour {
                index: vertex.data,
                distance,
            })
        } else {
            None
        }
    }
}

fn to_unit_sphere(lon: Float, lat: Float) -> [Float; 3] {
    let (lon, lat) = (lon.to_radians(), lat.to_radians());

    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

/// Converts chord length on unit sphere to arc length on Earth.
fn chord_to_arc(chord: Float) -> Float {
    2.0 * MEAN_EARTH_RADIUS * (chord / 2.0).min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::NeighbourIndex;
    use float_cmp::approx_eq;
    use ndarray::Array2;

    fn mesh() -> (Array2<f64>, Array2<f64>) {
        let lons = Array2::from_shape_fn((4, 5), |(j, i)| 10.0 + 0.1 * i as f64 + 0.01 * j as f64);
        let lats = Array2::from_shape_fn((4, 5), |(j, i)| 59.0 + 0.05 * j as f64 + 0.001 * i as f64);
        (lons, lats)
    }

    #[test]
    fn coincident_point_has_zero_distance() {
        let (lons, lats) = mesh();
        let index = NeighbourIndex::new(&lons, &lats);

        let found = index.nearest(lons[[2, 3]], lats[[2, 3]], 50_000.0).unwrap();

        assert_eq!(found.index, 2 * 5 + 3);
        assert!(approx_eq!(f64, found.distance, 0.0, epsilon = 1e-6));
    }

    #[test]
    fn finds_closest_vertex() {
        let (lons, lats) = mesh();
        let index = NeighbourIndex::new(&lons, &lats);

        let found = index.nearest(10.21, 59.101, 50_000.0).unwrap();

        assert_eq!(found.index, 2 * 5 + 2);
        assert!(found.distance > 0.0 && found.distance < 1_000.0);
    }

    #[test]
    fn distance_is_great_circle() {
        let lons = Array2::from_elem((1, 1), 0.0);
        let lats = Array2::from_elem((1, 1), 0.0);
        let index = NeighbourIndex::new(&lons, &lats);

        // one degree of arc on the mean sphere
        let found = index.nearest(0.0, 1.0, 200_000.0).unwrap();
        assert!(approx_eq!(f64, found.distance, 111_194.93, epsilon = 0.1));
    }

    #[test]
    fn nothing_beyond_radius() {
        let (lons, lats) = mesh();
        let index = NeighbourIndex::new(&lons, &lats);

        assert!(index.nearest(10.2, 60.2, 50_000.0).is_none());
        assert!(index.nearest(f64::NAN, 59.0, 50_000.0).is_none());
    }

    #[test]
    fn skips_missing_vertices() {
        let (mut lons, lats) = mesh();
        lons[[2, 3]] = f64::NAN;
        let index = NeighbourIndex::new(&lons, &lats);

        let found = index.nearest(10.31, 59.103, 50_000.0).unwrap();
        assert_ne!(found.index, 2 * 5 + 3);
    }
}

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

//! Module containing constants used by the lookup engine.

use crate::Float;

///Mean Earth radius (IUGG) used for great-circle distances
pub const MEAN_EARTH_RADIUS: Float = 6_371_000.0;

///Default radius (in meters) of the nearest grid point search
pub const DEFAULT_SEARCH_RADIUS: Float = 50_000.0;

///Default relative tolerance of grid axis spacing check
pub const DEFAULT_SPACING_TOLERANCE: Float = 1e-3;

///EPSG code of WGS84 geographic coordinates
pub const EPSG_WGS84: u32 = 4326;

///EPSG code of Web Mercator
pub const EPSG_WEB_MERCATOR: u32 = 3857;

///Descriptor of the reference system in which query points are given
pub const WGS84_DESCRIPTOR: &str = "EPSG:4326";

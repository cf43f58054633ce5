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

//! Module with methods to transform coordinates between
//! geographic (WGS84) coordinates and native reference systems
//! of the model grids.
//!
//! Rotated-pole grids (`+proj=ob_tran` with geographic `o_proj`) are
//! handled natively with a rotation of the sphere, other PROJ descriptors
//! are delegated to `proj4rs`. All transformations pass through
//! geographic longitude and latitude in degrees.

use crate::constants::{EPSG_WEB_MERCATOR, EPSG_WGS84};
use crate::{errors::ProjectionError, Float};
use nalgebra::{Rotation3, Vector3};
use proj4rs::proj::Proj;
use rustc_hash::FxHashMap;

const WGS84_LONLAT: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// PROJ parameters describing the figure of the Earth and datum.
const EARTH_PARAMS: [&str; 8] = ["R", "a", "b", "rf", "f", "ellps", "datum", "towgs84"];

/// Transforms parallel sequences of coordinates from `src` to `dst`
/// reference system, preserving their order and length.
///
/// The transformation object lives only for the duration of the call.
pub fn reproject(
    xs: &[Float],
    ys: &[Float],
    src: &str,
    dst: &str,
) -> Result<(Vec<Float>, Vec<Float>), ProjectionError> {
    if xs.len() != ys.len() {
        return Err(ProjectionError::IncorrectParams(
            "coordinate sequences differ in length",
        ));
    }

    let source = ReferenceSystem::from_descriptor(src)?;
    let target = ReferenceSystem::from_descriptor(dst)?;

    let mut out_xs = Vec::with_capacity(xs.len());
    let mut out_ys = Vec::with_capacity(ys.len());

    for (&x, &y) in xs.iter().zip(ys) {
        if !x.is_finite() || !y.is_finite() {
            return Err(ProjectionError::OutOfDomain(x, y));
        }

        let (lon, lat) = source.native_to_lonlat(x, y)?;
        let (out_x, out_y) = target.lonlat_to_native(lon, lat)?;

        if !out_x.is_finite() || !out_y.is_finite() {
            return Err(ProjectionError::OutOfDomain(x, y));
        }

        out_xs.push(out_x);
        out_ys.push(out_y);
    }

    Ok((out_xs, out_ys))
}

/// Reference system parsed from descriptor.
enum ReferenceSystem {
    Geographic,
    RotatedPole(RotatedPole),
    Proj {
        proj: Box<Proj>,
        lonlat: Box<Proj>,
        geographic: bool,
    },
}

impl ReferenceSystem {
    fn from_descriptor(descriptor: &str) -> Result<Self, ProjectionError> {
        let descriptor = descriptor.trim();

        let proj_string = if let Some(code) = parse_epsg(descriptor) {
            if code == EPSG_WGS84 {
                return Ok(ReferenceSystem::Geographic);
            }

            epsg_proj_string(code)
                .ok_or_else(|| ProjectionError::UnknownDescriptor(descriptor.to_string()))?
        } else if descriptor.starts_with('+') {
            descriptor.to_string()
        } else {
            return Err(ProjectionError::UnknownDescriptor(descriptor.to_string()));
        };

        let params = parse_proj_params(&proj_string);

        match params.get("proj").map(String::as_str) {
            Some("ob_tran") => Ok(ReferenceSystem::RotatedPole(RotatedPole::from_params(
                &params,
            )?)),
            Some(name) => {
                let geographic = matches!(name, "longlat" | "latlong" | "lonlat" | "latlon");
                let proj = Proj::from_proj_string(&proj_string)
                    .map_err(|e| ProjectionError::Proj4(format!("{:?}", e)))?;
                let lonlat = Proj::from_proj_string(&geographic_counterpart(&params))
                    .map_err(|e| ProjectionError::Proj4(format!("{:?}", e)))?;

                Ok(ReferenceSystem::Proj {
                    proj: Box::new(proj),
                    lonlat: Box::new(lonlat),
                    geographic,
                })
            }
            None => Err(ProjectionError::UnknownDescriptor(descriptor.to_string())),
        }
    }

    fn native_to_lonlat(&self, x: Float, y: Float) -> Result<(Float, Float), ProjectionError> {
        match self {
            ReferenceSystem::Geographic => Ok((x, y)),
            ReferenceSystem::RotatedPole(pole) => Ok(pole.unrotate(x, y)),
            ReferenceSystem::Proj {
                proj,
                lonlat,
                geographic,
            } => {
                let mut point = if *geographic {
                    (x.to_radians(), y.to_radians(), 0.0)
                } else {
                    (x, y, 0.0)
                };

                proj4rs::transform::transform(proj, lonlat, &mut point)
                    .map_err(|e| ProjectionError::Proj4(format!("{:?}", e)))?;

                Ok((point.0.to_degrees(), point.1.to_degrees()))
            }
        }
    }

    fn lonlat_to_native(&self, lon: Float, lat: Float) -> Result<(Float, Float), ProjectionError> {
        match self {
            ReferenceSystem::Geographic => Ok((lon, lat)),
            ReferenceSystem::RotatedPole(pole) => Ok(pole.rotate(lon, lat)),
            ReferenceSystem::Proj {
                proj,
                lonlat,
                geographic,
            } => {
                let mut point = (lon.to_radians(), lat.to_radians(), 0.0);

                proj4rs::transform::transform(lonlat, proj, &mut point)
                    .map_err(|e| ProjectionError::Proj4(format!("{:?}", e)))?;

                if *geographic {
                    Ok((point.0.to_degrees(), point.1.to_degrees()))
                } else {
                    Ok((point.0, point.1))
                }
            }
        }
    }
}

/// Parses `EPSG:<code>` descriptors (case insensitive).
fn parse_epsg(descriptor: &str) -> Option<u32> {
    let (authority, code) = descriptor.split_once(':')?;

    if !authority.eq_ignore_ascii_case("epsg") {
        return None;
    }

    code.trim().parse().ok()
}

fn epsg_proj_string(code: u32) -> Option<String> {
    match code {
        EPSG_WEB_MERCATOR => Some(
            "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs"
                .to_string(),
        ),
        32601..=32660 => Some(format!(
            "+proj=utm +zone={} +datum=WGS84 +units=m +no_defs",
            code - 32600
        )),
        32701..=32760 => Some(format!(
            "+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs",
            code - 32700
        )),
        _ => None,
    }
}

/// Geographic system on the same figure of the Earth as `params`,
/// so that moving to and from it involves no datum shift.
fn geographic_counterpart(params: &FxHashMap<String, String>) -> String {
    let earth: Vec<String> = EARTH_PARAMS
        .iter()
        .filter_map(|key| params.get(*key).map(|value| format!("+{}={}", key, value)))
        .collect();

    if earth.is_empty() {
        WGS84_LONLAT.to_string()
    } else {
        format!("+proj=longlat {} +no_defs", earth.join(" "))
    }
}

/// Splits PROJ string into `key -> value` pairs,
/// flags without value are stored with empty value.
fn parse_proj_params(proj_string: &str) -> FxHashMap<String, String> {
    proj_string
        .split_whitespace()
        .filter_map(|token| token.strip_prefix('+'))
        .map(|token| match token.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (token.to_string(), String::new()),
        })
        .collect()
}

/// Rotated latitude-longitude system on a sphere, defined
/// by the geographic position of its north pole.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct RotatedPole {
    rotation: Rotation3<Float>,
}

impl RotatedPole {
    /// Constructor from geographic longitude and latitude (in degrees)
    /// of the rotated north pole.
    pub fn new(pole_lon: Float, pole_lat: Float) -> Result<Self, ProjectionError> {
        if !pole_lon.is_finite() || !pole_lat.is_finite() {
            return Err(ProjectionError::IncorrectParams(
                "one of params is not finite",
            ));
        }

        if !(-90.0..=90.0).contains(&pole_lat) {
            return Err(ProjectionError::IncorrectParams("latitude out of bounds"));
        }

        // first bring the pole meridian to zero longitude,
        // then tilt the pole onto the z axis
        let rotation = Rotation3::from_axis_angle(&Vector3::y_axis(), (pole_lat - 90.0).to_radians())
            * Rotation3::from_axis_angle(&Vector3::z_axis(), -pole_lon.to_radians());

        Ok(RotatedPole { rotation })
    }

    /// Constructor from `ob_tran` parameters, following
    /// the PROJ convention `lon_0 = pole_lon + 180`.
    fn from_params(params: &FxHashMap<String, String>) -> Result<Self, ProjectionError> {
        match params.get("o_proj").map(String::as_str) {
            Some("longlat" | "latlong" | "lonlat" | "latlon") => (),
            _ => {
                return Err(ProjectionError::IncorrectParams(
                    "only geographic o_proj is supported for ob_tran",
                ))
            }
        }

        let value = |key: &str| -> Result<Float, ProjectionError> {
            match params.get(key) {
                Some(v) => v
                    .parse::<Float>()
                    .map_err(|_| ProjectionError::IncorrectParams("cannot parse ob_tran parameter")),
                None => Ok(0.0),
            }
        };

        if !params.contains_key("o_lat_p") {
            return Err(ProjectionError::IncorrectParams("o_lat_p is missing"));
        }

        if value("o_lon_p")? != 0.0 {
            return Err(ProjectionError::IncorrectParams(
                "o_lon_p other than 0 is not supported",
            ));
        }

        RotatedPole::new(value("lon_0")? - 180.0, value("o_lat_p")?)
    }

    /// Geographic to rotated coordinates (degrees).
    pub fn rotate(&self, lon: Float, lat: Float) -> (Float, Float) {
        let rotated = self.rotation * unit_vector(lon, lat);

        let rlat = rotated.z.clamp(-1.0, 1.0).asin();
        let rlon = (-rotated.y).atan2(-rotated.x);

        (normalize_lon(rlon.to_degrees()), rlat.to_degrees())
    }

    /// Rotated to geographic coordinates (degrees).
    pub fn unrotate(&self, rlon: Float, rlat: Float) -> (Float, Float) {
        let rotated = -unit_vector(rlon, rlat);
        let rotated = Vector3::new(rotated.x, rotated.y, -rotated.z);
        let geographic = self.rotation.inverse() * rotated;

        let lat = geographic.z.clamp(-1.0, 1.0).asin();
        let lon = geographic.y.atan2(geographic.x);

        (normalize_lon(lon.to_degrees()), lat.to_degrees())
    }
}

fn unit_vector(lon: Float, lat: Float) -> Vector3<Float> {
    let (lon, lat) = (lon.to_radians(), lat.to_radians());

    Vector3::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
}

fn normalize_lon(lon: Float) -> Float {
    let lon = (lon + 180.0).rem_euclid(360.0) - 180.0;

    if lon == -180.0 {
        180.0
    } else {
        lon
    }
}

#[cfg(test)]
mod tests {
    use super::{reproject, RotatedPole};
    use crate::errors::ProjectionError;
    use float_cmp::approx_eq;

    #[test]
    fn utm_round_trip() {
        let (lon, lat) = reproject(&[499_980.0], &[9_000_000.0], "EPSG:32622", "EPSG:4326").unwrap();

        assert!(approx_eq!(f64, lon[0], -51.001_152_923_6, epsilon = 1e-6));
        assert!(approx_eq!(f64, lat[0], 81.060_880_973_2, epsilon = 1e-6));

        let (x, y) = reproject(&lon, &lat, "epsg:4326", "epsg:32622").unwrap();

        assert!(approx_eq!(f64, x[0], 499_980.0, epsilon = 1e-3));
        assert!(approx_eq!(f64, y[0], 9_000_000.0, epsilon = 1e-3));
    }

    #[test]
    fn lambert_round_trip() {
        let lcc = "+proj=lcc +lat_0=63.3 +lon_0=15 +lat_1=63.3 +lat_2=63.3 +no_defs +R=6.371e+06";
        let lons = [10.5, 10.6, 11.8];
        let lats = [59.5, 59.6, 60.1];

        let (x, y) = reproject(&lons, &lats, "EPSG:4326", lcc).unwrap();
        let (lon, lat) = reproject(&x, &y, lcc, "EPSG:4326").unwrap();

        for i in 0..lons.len() {
            assert!(approx_eq!(f64, lon[i], lons[i], epsilon = 1e-6));
            assert!(approx_eq!(f64, lat[i], lats[i], epsilon = 1e-6));
        }
    }

    #[test]
    fn rotated_pole_centre() {
        // EURO-CORDEX rotated pole, its origin lies over central Europe
        let pole = RotatedPole::new(-162.0, 39.25).unwrap();
        let (lon, lat) = pole.unrotate(0.0, 0.0);

        assert!(approx_eq!(f64, lon, 18.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, lat, 50.75, epsilon = 1e-9));

        let (rlon, rlat) = pole.rotate(-162.0, 39.25);
        assert!(approx_eq!(f64, rlat, 90.0, epsilon = 1e-6));
        let _ = rlon;
    }

    #[test]
    fn unrotated_pole_is_identity() {
        let pole = RotatedPole::new(180.0, 90.0).unwrap();
        let (rlon, rlat) = pole.rotate(10.5, 59.5);

        assert!(approx_eq!(f64, rlon, 10.5, epsilon = 1e-9));
        assert!(approx_eq!(f64, rlat, 59.5, epsilon = 1e-9));
    }

    #[test]
    fn ob_tran_round_trip() {
        let ob_tran = "+proj=ob_tran +o_proj=longlat +lon_0=-40 +o_lat_p=22 +R=6.371e+06 +no_defs";
        let lons = [10.0, 10.5, 11.8328];
        let lats = [59.0, 59.5, 60.3968];

        let (rlon, rlat) = reproject(&lons, &lats, "EPSG:4326", ob_tran).unwrap();
        let (lon, lat) = reproject(&rlon, &rlat, ob_tran, "EPSG:4326").unwrap();

        for i in 0..lons.len() {
            assert!(approx_eq!(f64, lon[i], lons[i], epsilon = 1e-9));
            assert!(approx_eq!(f64, lat[i], lats[i], epsilon = 1e-9));
        }
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            reproject(&[1.0], &[1.0], "EPSG:4326", "not a projection"),
            Err(ProjectionError::UnknownDescriptor(_))
        ));
        assert!(matches!(
            reproject(&[1.0], &[1.0], "EPSG:4326", "EPSG:99999"),
            Err(ProjectionError::UnknownDescriptor(_))
        ));
        assert!(matches!(
            reproject(&[f64::NAN], &[1.0], "EPSG:4326", "EPSG:32633"),
            Err(ProjectionError::OutOfDomain(_, _))
        ));
        assert!(matches!(
            reproject(&[1.0, 2.0], &[1.0], "EPSG:4326", "EPSG:4326"),
            Err(ProjectionError::IncorrectParams(_))
        ));
        assert!(RotatedPole::new(0.0, 95.0).is_err());
    }
}

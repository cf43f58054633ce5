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

//! Module responsible for parsing and checking the configuration file.
//!
//! The configuration file uses [YAML](https://en.wikipedia.org/wiki/YAML)
//! and `serde` to enforce strong typing and automatic type checking.
//! Every section is optional and falls back to the defaults describing
//! the MyWaveWAM 800 m wave model archive of MET Norway.
//!
//! The structures and their fields in this module directly correspond to
//! the fields inside the configuration file so you can check this documentation
//! for more details how to set it.

use crate::constants::{DEFAULT_SEARCH_RADIUS, DEFAULT_SPACING_TOLERANCE};
use crate::errors::ConfigError;
use crate::Float;
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::{fs, path::Path};

/// Geographic extent (in degrees) requested from the archive.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Deserialize)]
pub struct BoundingBox {
    pub north: Float,
    pub south: Float,
    pub west: Float,
    pub east: Float,
}

impl BoundingBox {
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if !(-90.0..=90.0).contains(&self.north) || !(-90.0..=90.0).contains(&self.south) {
            return Err(ConfigError::OutOfBounds(
                "Bounding box latitude is too low or too high",
            ));
        }

        if !(-180.0..=360.0).contains(&self.west) || !(-180.0..=360.0).contains(&self.east) {
            return Err(ConfigError::OutOfBounds(
                "Bounding box longitude is too low or too high",
            ));
        }

        if self.south >= self.north {
            return Err(ConfigError::OutOfBounds(
                "Bounding box south edge must lie below north edge",
            ));
        }

        Ok(())
    }
}

/// Fields describing the archived NWP product.
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct Product {
    /// Product name, used as the prefix of downloaded files
    /// (`<name>_<YYYY>-<MM>-<DD>.nc`).
    pub name: String,

    /// Template of the archive URL. Following placeholders are substituted:
    ///
    /// - `{yyyy}`, `{mm}`, `{dd}`, `{hh}`: requested date and hour
    /// - `{vars}`: `var=<name>` pairs of all `variables` joined with `&`
    /// - `{north}`, `{south}`, `{west}`, `{east}`: edges of `bbox`
    pub url_template: String,

    /// Variables requested from the archive.
    pub variables: Vec<String>,

    /// Requested geographic extent.
    pub bbox: BoundingBox,
}

impl Product {
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::OutOfBounds("Product name cannot be empty"));
        }

        self.bbox.check_bounds()?;

        // rendering with any date reveals unknown placeholders
        if let Some(date) = NaiveDate::from_ymd_opt(2000, 1, 1) {
            self.render_url(date, 0)?;
        }

        Ok(())
    }

    /// Fills the URL template for given date and hour.
    pub fn render_url(&self, date: NaiveDate, hour: u32) -> Result<String, ConfigError> {
        render_template(&self.url_template, |name| match name {
            "yyyy" => Some(format!("{:04}", date.year())),
            "mm" => Some(format!("{:02}", date.month())),
            "dd" => Some(format!("{:02}", date.day())),
            "hh" => Some(format!("{:02}", hour)),
            "vars" => Some(
                self.variables
                    .iter()
                    .map(|v| format!("var={}", v))
                    .collect::<Vec<_>>()
                    .join("&"),
            ),
            "north" => Some(self.bbox.north.to_string()),
            "south" => Some(self.bbox.south.to_string()),
            "west" => Some(self.bbox.west.to_string()),
            "east" => Some(self.bbox.east.to_string()),
            _ => None,
        })
    }
}

impl Default for Product {
    fn default() -> Self {
        let variables = [
            "latitude", "longitude", "Pdir", "dd", "ds", "ds_sea", "ds_swell", "ff", "hs",
            "hs_sea", "hs_swell", "kurtosis", "mHs", "msqs", "mwp", "thq", "thq_sea", "thq_swell",
        ];

        Product {
            name: "mywavewam800s_be".to_string(),
            url_template: concat!(
                "https://thredds.met.no/thredds/ncss/fou-hi/mywavewam800s_be?",
                "{vars}&north={north}&west={west}&east={east}&south={south}",
                "&disableProjSubset=on&horizStride=1",
                "&time_start={yyyy}-{mm}-{dd}T00:00:00Z",
                "&time_end={yyyy}-{mm}-{dd}T23:00:00Z",
                "&timeStride=1&addLatLon=true"
            )
            .to_string(),
            variables: variables.iter().map(|v| v.to_string()).collect(),
            bbox: BoundingBox {
                north: 60.3968,
                south: 59.0,
                west: 10.0,
                east: 11.8328,
            },
        }
    }
}

/// Replaces every `{name}` in `template` with the value returned by `lookup`.
fn render_template<F>(template: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        rendered.push_str(&rest[..start]);

        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| ConfigError::UnknownPlaceholder(after.to_string()))?;

        let name = &after[..end];
        let value = lookup(name).ok_or_else(|| ConfigError::UnknownPlaceholder(name.to_string()))?;

        rendered.push_str(&value);
        rest = &after[end + 1..];
    }

    rendered.push_str(rest);

    Ok(rendered)
}

/// _(Optional)_ Fields controlling the point lookup.
#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(default)]
pub struct Lookup {
    /// Names of data fields extracted at requested points.
    ///
    /// Defaults to `[hs_sea]`. Cannot be empty.
    pub fields: Vec<String>,

    /// Maximum distance (in meters) between requested point
    /// and the nearest vertex of an irregular grid.
    ///
    /// Defaults to `50000`. Must be positive.
    pub search_radius: Float,

    /// Relative tolerance of the even spacing check of regular grid axes.
    ///
    /// Defaults to `0.001`. Must be between `0` and `0.5`.
    pub spacing_tolerance: Float,

    /// Candidate names of 2D longitude field, first present is used.
    pub longitude_names: Vec<String>,

    /// Candidate names of 2D latitude field, first present is used.
    pub latitude_names: Vec<String>,
}

impl Lookup {
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.fields.is_empty() {
            return Err(ConfigError::OutOfBounds(
                "At least one field must be requested",
            ));
        }

        if self.search_radius <= 0.0 || !self.search_radius.is_finite() {
            return Err(ConfigError::OutOfBounds("Search radius must be positive"));
        }

        if !(self.spacing_tolerance > 0.0 && self.spacing_tolerance < 0.5) {
            return Err(ConfigError::OutOfBounds(
                "Spacing tolerance must be between 0 and 0.5",
            ));
        }

        if self.longitude_names.is_empty() || self.latitude_names.is_empty() {
            return Err(ConfigError::OutOfBounds(
                "Longitude and latitude names cannot be empty",
            ));
        }

        Ok(())
    }
}

impl Default for Lookup {
    fn default() -> Self {
        Lookup {
            fields: vec!["hs_sea".to_string()],
            search_radius: DEFAULT_SEARCH_RADIUS,
            spacing_tolerance: DEFAULT_SPACING_TOLERANCE,
            longitude_names: vec!["longitude".to_string(), "lon".to_string()],
            latitude_names: vec!["latitude".to_string(), "lat".to_string()],
        }
    }
}

/// _(Optional)_ Fields with information about
/// resources available for the program.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize)]
pub struct Resources {
    /// _(Optional)_ Thread count used when extracting
    /// points from many dates at once.
    ///
    /// Cannot be less than `1`. Defaults to `1`.
    #[serde(default = "Resources::default_threads")]
    pub threads: u16,

    /// _(Optional)_ Heap memory limit in MB.
    ///
    /// Irregular grids are indexed in memory as a whole, so for
    /// large meshes the limit turns an unresponsive system into
    /// an out-of-memory error.
    ///
    /// Cannot be less than `128`. Defaults to whole addressable-space.
    #[serde(default = "Resources::default_memory")]
    pub memory: usize,
}

impl Resources {
    fn default_threads() -> u16 {
        1
    }

    fn default_memory() -> usize {
        usize::MAX / (1024 * 1024)
    }

    /// Checks if thread count and memory limit are
    /// above limits.
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.threads < 1 {
            return Err(ConfigError::OutOfBounds(
                "Available threads cannot be less than 1",
            ));
        }

        if self.memory < 128 {
            return Err(ConfigError::OutOfBounds(
                "Available memory cannot be less than 128 MB",
            ));
        }

        Ok(())
    }
}

impl Default for Resources {
    fn default() -> Self {
        Resources {
            threads: Resources::default_threads(),
            memory: Resources::default_memory(),
        }
    }
}

/// Main config structure representing the fields in
/// configuration file.
#[derive(Clone, PartialEq, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub product: Product,

    #[serde(default)]
    pub lookup: Lookup,

    #[serde(default)]
    pub resources: Resources,
}

impl Config {
    /// Config structure constructor, responsible for
    /// deserializing configuration and checking it.
    pub fn new_from_file(file_path: &Path) -> Result<Config, ConfigError> {
        let data = fs::read(file_path)?;
        Config::new_from_slice(data.as_slice())
    }

    pub fn new_from_slice(data: &[u8]) -> Result<Config, ConfigError> {
        let config: Config = serde_yaml::from_slice(data)?;
        config.check_bounds()?;

        Ok(config)
    }

    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        self.product.check_bounds()?;
        self.lookup.check_bounds()?;
        self.resources.check_bounds()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, Product};
    use crate::errors::ConfigError;
    use chrono::NaiveDate;

    #[test]
    fn default_url_matches_archive_request() {
        let product = Product::default();
        let url = product
            .render_url(NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(), 0)
            .unwrap();

        assert_eq!(
            url,
            "https://thredds.met.no/thredds/ncss/fou-hi/mywavewam800s_be?\
             var=latitude&var=longitude&var=Pdir&var=dd&var=ds&var=ds_sea&var=ds_swell\
             &var=ff&var=hs&var=hs_sea&var=hs_swell&var=kurtosis&var=mHs&var=msqs&var=mwp\
             &var=thq&var=thq_sea&var=thq_swell\
             &north=60.3968&west=10&east=11.8328&south=59\
             &disableProjSubset=on&horizStride=1\
             &time_start=2019-01-01T00:00:00Z&time_end=2019-01-01T23:00:00Z\
             &timeStride=1&addLatLon=true"
        );
    }

    #[test]
    fn renders_hourly_template() {
        let product = Product {
            url_template: "https://thredds.met.no/thredds/dodsC/meps25epsarchive/\
                           {yyyy}/{mm}/{dd}/meps_det_2_5km_{yyyy}{mm}{dd}T{hh}Z.nc"
                .to_string(),
            ..Product::default()
        };

        let url = product
            .render_url(NaiveDate::from_ymd_opt(2022, 12, 1).unwrap(), 6)
            .unwrap();

        assert_eq!(
            url,
            "https://thredds.met.no/thredds/dodsC/meps25epsarchive/2022/12/01/meps_det_2_5km_20221201T06Z.nc"
        );
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::new_from_slice(
            b"lookup:\n  fields: [hs, hs_swell]\nresources:\n  threads: 4\n",
        )
        .unwrap();

        assert_eq!(config.lookup.fields, vec!["hs", "hs_swell"]);
        assert_eq!(config.lookup.search_radius, 50_000.0);
        assert_eq!(config.resources.threads, 4);
        assert_eq!(config.product, Product::default());
    }

    #[test]
    fn rejects_out_of_bounds() {
        assert!(matches!(
            Config::new_from_slice(b"lookup:\n  search_radius: -1.0\n"),
            Err(ConfigError::OutOfBounds(_))
        ));
        assert!(matches!(
            Config::new_from_slice(b"resources:\n  threads: 0\n"),
            Err(ConfigError::OutOfBounds(_))
        ));
        assert!(matches!(
            Config::new_from_slice(b"lookup:\n  fields: []\n"),
            Err(ConfigError::OutOfBounds(_))
        ));
    }

    #[test]
    fn rejects_unknown_placeholder() {
        let yaml = b"product:\n  name: test\n  url_template: \"https://example.org/{year}.nc\"\n  variables: []\n  bbox: {north: 1.0, south: 0.0, west: 0.0, east: 1.0}\n";

        assert!(matches!(
            Config::new_from_slice(yaml),
            Err(ConfigError::UnknownPlaceholder(name)) if name == "year"
        ));
    }
}

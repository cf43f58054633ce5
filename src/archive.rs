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

//! Module responsible for retrieving daily forecast files
//! from the remote archive into a local directory.

use crate::{configuration::Product, errors::FetchError};
use chrono::{Datelike, NaiveDate};
use log::{debug, info};
use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Local mirror of the product archive.
#[derive(Clone, Debug)]
pub struct Archive {
    product: Product,
    basedir: PathBuf,
}

impl Archive {
    pub fn new(product: Product, basedir: &Path) -> Self {
        Archive {
            product,
            basedir: basedir.to_path_buf(),
        }
    }

    /// Path of the daily file: `<basedir>/<product>_<YYYY>-<MM>-<DD>.nc`.
    pub fn local_path(&self, date: NaiveDate) -> PathBuf {
        self.basedir.join(format!(
            "{}_{:04}-{:02}-{:02}.nc",
            self.product.name,
            date.year(),
            date.month(),
            date.day()
        ))
    }

    pub fn url(&self, date: NaiveDate, hour: u32) -> Result<String, FetchError> {
        Ok(self.product.render_url(date, hour)?)
    }

    /// Downloads the daily file unless it is already present.
    ///
    /// The response body is written to a `.part` file which is renamed
    /// to the final path only when the whole body has been received.
    pub fn fetch(&self, date: NaiveDate, force: bool) -> Result<PathBuf, FetchError> {
        let path = self.local_path(date);

        if path.exists() && !force {
            info!("File {} exists, skipping download", path.display());
            return Ok(path);
        }

        if path.exists() {
            info!("Overwriting {}", path.display());
        }

        fs::create_dir_all(&self.basedir)?;

        let url = self.url(date, 0)?;
        info!("Downloading {} to {}", date, path.display());
        debug!("Request URL: {}", url);

        let part_path = path.with_extension("nc.part");

        match download(&url, &part_path) {
            Ok(bytes) => {
                fs::rename(&part_path, &path)?;
                debug!("Received {} bytes for {}", bytes, date);
                Ok(path)
            }
            Err(err) => {
                if part_path.exists() {
                    fs::remove_file(&part_path)?;
                }
                Err(err)
            }
        }
    }
}

/// Streams the response body into `target`, returns number of bytes written.
fn download(url: &str, target: &Path) -> Result<u64, FetchError> {
    // archive subsets can take minutes to prepare on the server side
    let client = reqwest::blocking::Client::builder()
        .timeout(None)
        .build()?;

    let mut response = client.get(url).send()?;

    if !response.status().is_success() {
        return Err(FetchError::Status(response.status().as_u16()));
    }

    let mut writer = BufWriter::new(File::create(target)?);
    let bytes = io::copy(&mut response, &mut writer)?;
    writer.flush()?;

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::Archive;
    use crate::configuration::Product;
    use chrono::NaiveDate;
    use std::fs;

    #[test]
    fn daily_file_path() {
        let archive = Archive::new(Product::default(), std::path::Path::new("/data"));
        let date = NaiveDate::from_ymd_opt(2019, 3, 7).unwrap();

        assert_eq!(
            archive.local_path(date),
            std::path::PathBuf::from("/data/mywavewam800s_be_2019-03-07.nc")
        );
        assert!(archive.url(date, 0).unwrap().contains("time_start=2019-03-07T00:00:00Z"));
    }

    #[test]
    fn existing_file_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let product = Product {
            url_template: "http://127.0.0.1:9/unreachable/{yyyy}{mm}{dd}".to_string(),
            ..Product::default()
        };
        let archive = Archive::new(product, dir.path());
        let date = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();

        let path = archive.local_path(date);
        fs::write(&path, b"cached").unwrap();

        assert_eq!(archive.fetch(date, false).unwrap(), path);
        assert_eq!(fs::read(&path).unwrap(), b"cached");
    }

    #[test]
    fn failed_download_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let product = Product {
            url_template: "http://127.0.0.1:9/unreachable/{yyyy}{mm}{dd}".to_string(),
            ..Product::default()
        };
        let archive = Archive::new(product, dir.path());
        let date = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();

        assert!(archive.fetch(date, true).is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

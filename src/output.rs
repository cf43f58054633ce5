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

//! Module writing extraction results as CSV.

use crate::{errors::RunError, lookup::gather::PointRecord, Float};
use chrono::SecondsFormat;
use ndarray::Array2;
use std::{
    fs::File,
    io::{self, Write},
    path::Path,
};

/// CSV writer of [`PointRecord`]s with header `ts,lon_out,lat_out,<fields>`.
pub struct RecordWriter {
    writer: csv::Writer<Box<dyn Write>>,
}

impl RecordWriter {
    /// Writes to the file at `path` or to stdout when `path` is `None`.
    pub fn new(path: Option<&Path>, fields: &[String]) -> Result<Self, RunError> {
        let sink: Box<dyn Write> = match path {
            Some(path) => Box::new(File::create(path)?),
            None => Box::new(io::stdout()),
        };

        RecordWriter::from_writer(sink, fields)
    }

    pub fn from_writer(sink: Box<dyn Write>, fields: &[String]) -> Result<Self, RunError> {
        let mut writer = csv::Writer::from_writer(sink);

        let mut header = vec!["ts", "lon_out", "lat_out"];
        header.extend(fields.iter().map(String::as_str));
        writer.write_record(&header)?;

        Ok(RecordWriter { writer })
    }

    pub fn write(&mut self, records: &[PointRecord]) -> Result<(), RunError> {
        for record in records {
            let mut row = vec![
                record
                    .timestamp
                    .to_rfc3339_opts(SecondsFormat::Secs, true),
                record.lon_out.to_string(),
                record.lat_out.to_string(),
            ];
            row.extend(record.values.iter().map(Float::to_string));

            self.writer.write_record(&row)?;
        }

        Ok(())
    }

    pub fn finish(mut self) -> Result<(), RunError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes the flattened (row-major) mesh of grid coordinates
/// as `longitude,latitude` rows.
pub fn write_grid<W: Write>(
    sink: W,
    lons: &Array2<Float>,
    lats: &Array2<Float>,
) -> Result<(), RunError> {
    let mut writer = csv::Writer::from_writer(sink);
    writer.write_record(&["longitude", "latitude"])?;

    for (lon, lat) in lons.iter().zip(lats.iter()) {
        writer.write_record(&[lon.to_string(), lat.to_string()])?;
    }

    writer.flush()?;

    Ok(())
}

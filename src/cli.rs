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

//! Module containing the command-line interface
//! and the driver of extraction over many dates.

use crate::{
    archive::Archive,
    configuration::{Config, Lookup},
    errors::{LookupError, RunError},
    lookup::{self, gather::PointRecord, grid, grid::Topology, QueryPoints},
    output::{self, RecordWriter},
    Float, ALLOCATOR,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info};
use rayon::{prelude::*, ThreadPoolBuilder};
use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

/// Point extraction from gridded NWP archives.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// Configuration file in YAML, built-in defaults are used when absent
    #[arg(long, global = true, env = "NWP_EXTRACT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download the daily archive file
    Download {
        #[arg(long)]
        date: NaiveDate,

        /// Directory of downloaded files
        #[arg(long, default_value = ".")]
        basedir: PathBuf,

        /// Download even if the file exists
        #[arg(long)]
        force: bool,
    },

    /// Download daily archive files between two dates (inclusive)
    DownloadRange {
        #[arg(long)]
        start: NaiveDate,

        #[arg(long)]
        end: NaiveDate,

        #[arg(long, default_value = ".")]
        basedir: PathBuf,

        #[arg(long)]
        force: bool,
    },

    /// Extract field values at points
    Extract(ExtractArgs),

    /// Write longitude and latitude of every grid cell to CSV
    GridCsv {
        #[arg(long)]
        file: PathBuf,

        /// Output file, stdout when absent
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
pub struct ExtractArgs {
    /// Single date to extract from
    #[arg(long, conflicts_with_all = ["start", "end", "file"])]
    pub date: Option<NaiveDate>,

    /// First date of the range
    #[arg(long, requires = "end")]
    pub start: Option<NaiveDate>,

    /// Last date of the range (inclusive)
    #[arg(long, requires = "start")]
    pub end: Option<NaiveDate>,

    /// Read this dataset file instead of the archive
    #[arg(long, conflicts_with_all = ["start", "end"])]
    pub file: Option<PathBuf>,

    /// Query point as `lon,lat` in degrees, can be repeated
    #[arg(long = "coords", required = true, allow_hyphen_values = true, value_parser = parse_coords)]
    pub coords: Vec<(Float, Float)>,

    /// Requested timestamp, midnight UTC of the date when absent
    #[arg(long, conflicts_with = "start")]
    pub time: Option<String>,

    #[arg(long, value_enum, default_value_t = Topology::Auto)]
    pub grid: Topology,

    /// Field to extract, can be repeated, overrides configuration
    #[arg(long = "field")]
    pub fields: Vec<String>,

    /// Output file, stdout when absent
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value = ".")]
    pub basedir: PathBuf,

    /// Download archive files even if they exist
    #[arg(long)]
    pub force: bool,
}

/// Parses `lon,lat` pair.
fn parse_coords(text: &str) -> Result<(Float, Float), String> {
    let (lon, lat) = text
        .split_once(',')
        .ok_or_else(|| format!("expected lon,lat but got {}", text))?;

    let lon: Float = lon
        .trim()
        .parse()
        .map_err(|_| format!("cannot parse longitude {}", lon))?;
    let lat: Float = lat
        .trim()
        .parse()
        .map_err(|_| format!("cannot parse latitude {}", lat))?;

    if !(-90.0..=90.0).contains(&lat) {
        return Err(format!("latitude {} outside of [-90, 90]", lat));
    }

    Ok((lon, lat))
}

/// Inclusive list of dates from `start` to `end`.
fn date_range(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, RunError> {
    if start > end {
        return Err(RunError::Argument(format!(
            "start date {} is after end date {}",
            start, end
        )));
    }

    Ok(start
        .iter_days()
        .take_while(|date| *date <= end)
        .collect())
}

/// Single extraction task: one dataset and one timestamp.
#[derive(Clone, PartialEq, Debug)]
struct Job {
    date: Option<NaiveDate>,
    file: Option<PathBuf>,
    time: String,
}

impl Job {
    fn source(&self, archive: &Archive, force: bool) -> Result<PathBuf, RunError> {
        match (&self.file, self.date) {
            (Some(file), _) => Ok(file.clone()),
            (None, Some(date)) => Ok(archive.fetch(date, force)?),
            (None, None) => Err(RunError::Argument(
                "either --date or --file is required".to_string(),
            )),
        }
    }
}

fn midnight(date: NaiveDate) -> String {
    format!("{}T00:00:00Z", date.format("%Y-%m-%d"))
}

fn plan_jobs(args: &ExtractArgs) -> Result<Vec<Job>, RunError> {
    if let (Some(start), Some(end)) = (args.start, args.end) {
        return Ok(date_range(start, end)?
            .into_iter()
            .map(|date| Job {
                date: Some(date),
                file: None,
                time: midnight(date),
            })
            .collect());
    }

    let time = match (&args.time, args.date) {
        (Some(time), _) => time.clone(),
        (None, Some(date)) => midnight(date),
        (None, None) => {
            return Err(RunError::Argument(
                "--time is required when --date is not given".to_string(),
            ))
        }
    };

    if args.date.is_none() && args.file.is_none() {
        return Err(RunError::Argument(
            "one of --date, --start and --end or --file is required".to_string(),
        ));
    }

    Ok(vec![Job {
        date: args.date,
        file: args.file.clone(),
        time,
    }])
}

fn run_job(
    job: &Job,
    archive: &Archive,
    query: &QueryPoints,
    topology: Topology,
    settings: &Lookup,
    force: bool,
) -> Result<Vec<PointRecord>, RunError> {
    let path = job.source(archive, force)?;
    debug!("Extracting {} from {}", job.time, path.display());

    Ok(lookup::extract_from_file(
        &path, query, &job.time, topology, settings,
    )?)
}

/// Main program function, dispatching the requested command.
pub fn main(args: Args) -> Result<(), RunError> {
    let config = match &args.config {
        Some(path) => {
            debug!("Reading configuration from {}", path.display());
            Config::new_from_file(path)?
        }
        None => Config::default(),
    };

    debug!("Setting memory limit");
    let memory = config.resources.memory;
    let limit = memory
        .checked_mul(1024 * 1024)
        .ok_or(RunError::MemoryLimit(memory))?;
    ALLOCATOR
        .set_limit(limit)
        .map_err(|_| RunError::MemoryLimit(memory))?;

    match args.command {
        Command::Download {
            date,
            basedir,
            force,
        } => {
            let path = Archive::new(config.product, &basedir).fetch(date, force)?;
            info!("Archive file ready at {}", path.display());
            Ok(())
        }
        Command::DownloadRange {
            start,
            end,
            basedir,
            force,
        } => download_range(&Archive::new(config.product, &basedir), start, end, force),
        Command::Extract(extract_args) => extract(extract_args, config),
        Command::GridCsv { file, output } => grid_csv(&file, output.as_deref(), &config.lookup),
    }
}

/// Downloads every date of the range, failed dates are logged
/// and the remaining ones are still downloaded.
fn download_range(
    archive: &Archive,
    start: NaiveDate,
    end: NaiveDate,
    force: bool,
) -> Result<(), RunError> {
    let dates = date_range(start, end)?;
    let mut failed = 0;

    let dates_bar = ProgressBar::new(dates.len() as u64);
    dates_bar.set_style(
        ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
            .progress_chars("#>-"),
    );
    dates_bar.set_prefix("Downloaded days");

    for date in &dates {
        if let Err(err) = archive.fetch(*date, force) {
            failed += 1;
            error!("Download of {} failed: {}", date, err);
            // keeps the message from being overwritten by the progress bar
            println!();
        }
        dates_bar.inc(1);
    }

    dates_bar.finish_with_message("done");

    if failed > 0 {
        return Err(RunError::PartialFailure(failed, dates.len()));
    }

    Ok(())
}

/// Extracts points for every planned date and writes records in date order.
///
/// A single lookup fails as a whole, while failed dates of
/// a range are logged and skipped.
fn extract(args: ExtractArgs, config: Config) -> Result<(), RunError> {
    let mut settings = config.lookup;
    if !args.fields.is_empty() {
        settings.fields = args.fields.clone();
    }
    settings.check_bounds()?;

    let archive = Archive::new(config.product, &args.basedir);
    let query = QueryPoints::from_pairs(&args.coords);
    if query.is_empty() {
        return Err(RunError::Argument("no query points given".to_string()));
    }

    let jobs = plan_jobs(&args)?;

    // output is created only once records are available
    if let [job] = jobs.as_slice() {
        let records = run_job(job, &archive, &query, args.grid, &settings, args.force)?;
        let mut writer = RecordWriter::new(args.output.as_deref(), &settings.fields)?;
        writer.write(&records)?;
        return writer.finish();
    }

    debug!("Setting up ThreadPool");
    let threadpool = ThreadPoolBuilder::new()
        .num_threads(usize::from(config.resources.threads))
        .build()?;

    info!("Extracting {} points from {} dates", query.len(), jobs.len());

    let results: Vec<_> = threadpool.install(|| {
        jobs.par_iter()
            .map(|job| run_job(job, &archive, &query, args.grid, &settings, args.force))
            .collect()
    });

    let mut writer = RecordWriter::new(args.output.as_deref(), &settings.fields)?;
    let mut failed = 0;

    for (job, result) in jobs.iter().zip(results) {
        match result {
            Ok(records) => writer.write(&records)?,
            Err(err) => {
                failed += 1;
                error!("Extraction at {} failed: {}", job.time, err);
            }
        }
    }

    writer.finish()?;

    if failed > 0 {
        return Err(RunError::PartialFailure(failed, jobs.len()));
    }

    Ok(())
}

fn grid_csv(file: &Path, target: Option<&Path>, settings: &Lookup) -> Result<(), RunError> {
    let dataset = lookup::open_dataset(file).map_err(LookupError::from)?;
    let (lons, lats) =
        grid::geographic_mesh(dataset.as_ref(), settings).map_err(LookupError::from)?;

    info!("Writing {} grid cells", lons.len());

    match target {
        Some(path) => output::write_grid(File::create(path)?, &lons, &lats),
        None => output::write_grid(io::stdout(), &lons, &lats),
    }
}

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

//! NWP Extract is a tool for extracting values of numerical weather
//! prediction fields at arbitrary geographic points from gridded
//! forecast archives.
//!
//! For every requested point the tool finds the grid cell containing it
//! (on regular grids in projected or rotated coordinates) or the nearest
//! grid vertex (on irregular grids), finds the requested timestamp on the
//! time axis and writes field values together with the actual coordinates
//! of the sampled cell as CSV.
//!
//! Daily archive files can be downloaded from the product server
//! and are cached in a local directory.

mod archive;
mod cli;
mod configuration;
mod constants;
mod errors;
mod lookup;
mod output;


use cap::Cap;
use clap::Parser;
use env_logger::Env;
use log::{error, info};
use std::{alloc, process};

type Float = f64;

/// Global allocator used by the program.
///
/// Use of static global allocator allows for capping the memory to the limit set by user
/// in configuration file and in effect provide better [OOM error](https://en.wikipedia.org/wiki/Out_of_memory) handling.
#[global_allocator]
static ALLOCATOR: Cap<alloc::System> = Cap::new(alloc::System, usize::MAX);

/// The main program function.
/// Prepares the runtime environment and calls the [`cli::main`].
///
/// To provide meaningful error messages the `env_logger`
/// needs to be initiated before any log messages are possible to occur.
fn main() {
    #[cfg(not(feature = "debug"))]
    let logger_env = Env::new().filter_or("NWP_EXTRACT_LOG_LEVEL", "info");

    #[cfg(feature = "debug")]
    let logger_env = Env::new().filter_or("NWP_EXTRACT_LOG_LEVEL", "debug");

    env_logger::Builder::from_env(logger_env)
        .format_timestamp_millis()
        .init();

    let args = cli::Args::parse();

    match cli::main(args) {
        Ok(_) => info!("Execution finished"),
        Err(err) => {
            error!("Execution failed with error: {}", err);
            process::exit(1);
        }
    }
}

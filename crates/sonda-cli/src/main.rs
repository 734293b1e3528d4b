//! Sondador: run CRUD lifecycle scenarios against a live web application
//!
//! ## Usage
//!
//! ```bash
//! sondador run                              # Every record kind
//! sondador run --kind autor --headed        # One kind, visible browser
//! sondador run --presentation --report out/report.json
//! sondador kinds --format yaml              # Element ids and fixtures
//! sondador config --config sonda.yaml       # Effective settings
//! ```

use clap::Parser;
use sondador::{dispatch, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    match dispatch(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

//! Command handlers - one module per subcommand

pub mod config;
pub mod kinds;
pub mod run;

pub use config::{execute_config, render_config};
pub use kinds::{execute_kinds, render_text, KindSummary};
pub use run::{build_suite, execute_run};

//! CLI domain: parse, route, output and presentation. The CLI is a terminal
//! rendering layer over the orchestrator; it never mutates generation state.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{
    format_config, format_panel_table, format_progress_line, format_snapshot_json,
};
pub use route::RunContext;

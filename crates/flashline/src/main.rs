use std::process::ExitCode;

use clap::Parser;
use console::style;

mod cli;
mod config;
mod device;
mod exit_codes;
mod logging;
mod progress;

use cli::app::App;

fn main() -> ExitCode {
    let app = App::parse();
    logging::init(app.verbose);

    match app.run() {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("{} {e:#}", style("error:").red().bold());
            ExitCode::from(exit_codes::for_error(&e))
        }
    }
}

#![warn(
    clippy::all,
    // clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    // clippy::unwrap_used
)]
use app::App;
use clap::Parser;

use ical_agenda::config;

mod app;
mod cli;
mod logger;

fn main() {
    let cli = cli::Cli::parse();
    logger::init(cli.verbose);

    let config = config::init(&cli.config).expect("Could not load the configuration file");
    let app = App::new(&config).expect("Could not set up the calendar engine");

    log::info!("Loaded {} calendars from {}", config.calendars.len(), cli.config.display());

    if cli.once {
        app.run_once();
    } else {
        app.run();
    }
}

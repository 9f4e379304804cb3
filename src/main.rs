mod cli;

use clap::Parser;
use fai::ui::{self, Level};

fn main() {
    let cli = cli::Cli::parse();

    match cli::handle(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            ui::emit(Level::Error, "faictl.error", &format!("Error: {e:#}"), None);
            std::process::exit(1);
        }
    }
}

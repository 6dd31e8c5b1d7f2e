mod commands;

use clap::Parser;
use std::error::Error;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Render a personal site from Markdown and templates", long_about = None)]
struct Cli {
    #[arg(long)]
    content: Option<PathBuf>,

    #[arg(long = "static")]
    static_dir: Option<PathBuf>,

    #[arg(long)]
    templates: Option<PathBuf>,

    #[arg(long, short)]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    commands::init_logging();

    let overrides = commands::PathOverrides {
        content: cli.content,
        static_dir: cli.static_dir,
        templates: cli.templates,
        output: cli.output,
    };

    if let Err(error) = commands::build_site(overrides) {
        eprintln!("Error: {error}");
        let mut source = error.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(1);
    }
}

use folio_ssg::{BuildConfig, BuildRun};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

pub struct PathOverrides {
    pub content: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
    pub templates: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

// `RUST_LOG` wins when set; otherwise stage progress at info level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn resolve_config(
    working_dir: &Path,
    overrides: PathOverrides,
) -> Result<BuildConfig, Box<dyn std::error::Error>> {
    let mut config = BuildConfig::discover(working_dir)?;

    if let Some(path) = overrides.content {
        config.content_root = path;
    }
    if let Some(path) = overrides.static_dir {
        config.static_root = path;
    }
    if let Some(path) = overrides.templates {
        config.templates_root = path;
    }
    if let Some(path) = overrides.output {
        config.output_root = path;
    }

    Ok(config)
}

pub fn build_site(overrides: PathOverrides) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(Path::new(""), overrides)?;
    let output = config.output_root.clone();

    info!("Building site...");
    let report = BuildRun::new(config).run()?;

    println!(
        "Built {} pages, {} posts, {} projects, {} tags and {} static files to {} in {:.2?}",
        report.pages.len(),
        report.posts,
        report.projects,
        report.tags,
        report.static_files,
        output.display(),
        report.elapsed
    );

    Ok(())
}

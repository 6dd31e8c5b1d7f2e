use crate::error::{FolioError, Result};
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use tracing::debug;
use walkdir::WalkDir;

const TEMPLATE_EXTENSION: &str = "html";

pub struct ThemeEngine {
    tera: Tera,
}

impl ThemeEngine {
    pub fn load(templates_root: &Path) -> Result<Self> {
        if !templates_root.is_dir() {
            return Err(FolioError::TemplateLoad {
                path: templates_root.to_path_buf(),
                source: tera::Error::msg("templates directory does not exist"),
            });
        }

        let mut files: Vec<(PathBuf, Option<String>)> = Vec::new();

        for entry in WalkDir::new(templates_root)
            .min_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|error| FolioError::walk(templates_root, error))?;
            let path = entry.path();

            if !entry.file_type().is_file()
                || path
                    .extension()
                    .map(|extension| extension != TEMPLATE_EXTENSION)
                    .unwrap_or(true)
            {
                continue;
            }

            let Ok(relative) = path.strip_prefix(templates_root) else {
                continue;
            };
            let name = relative.to_string_lossy().replace('\\', "/");
            debug!(template = %name, "registering template");
            files.push((path.to_path_buf(), Some(name)));
        }

        // Tera autoescapes `.html` templates by default; `| safe` opts out.
        let mut tera = Tera::default();
        tera.add_template_files(files)
            .map_err(|source| FolioError::TemplateLoad {
                path: templates_root.to_path_buf(),
                source,
            })?;

        Ok(Self { tera })
    }

    pub fn from_raw(templates: &[(&str, &str)]) -> Result<Self> {
        let mut tera = Tera::default();
        let named: Vec<(String, &str)> = templates
            .iter()
            .map(|(name, body)| (template_file(name), *body))
            .collect();
        tera.add_raw_templates(named)
            .map_err(|source| FolioError::TemplateLoad {
                path: PathBuf::new(),
                source,
            })?;
        Ok(Self { tera })
    }

    pub fn has_template(&self, name: &str) -> bool {
        let file = template_file(name);
        self.tera.get_template_names().any(|existing| existing == file)
    }

    // `output` only labels the error; nothing is written here.
    pub fn render_template(&self, name: &str, context: &Context, output: &Path) -> Result<String> {
        self.tera
            .render(&template_file(name), context)
            .map_err(|source| FolioError::TemplateRender {
                template: name.to_string(),
                path: output.to_path_buf(),
                source,
            })
    }
}

fn template_file(name: &str) -> String {
    format!("{name}.{TEMPLATE_EXTENSION}")
}

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FolioError {
    #[error("Malformed content in {path}: {reason}")]
    MalformedContent { path: PathBuf, reason: String },

    #[error("Duplicate slug '{slug}' in {path} conflicts with {existing_path}")]
    DuplicateSlug {
        slug: String,
        path: PathBuf,
        existing_path: PathBuf,
    },

    #[error("Failed to load templates from {path}")]
    TemplateLoad {
        path: PathBuf,
        #[source]
        source: tera::Error,
    },

    #[error("Failed to render template '{template}' for {path}")]
    TemplateRender {
        template: String,
        path: PathBuf,
        #[source]
        source: tera::Error,
    },

    #[error("Failed to read {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy {path}")]
    IoCopy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to prepare output directory {path}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory walk error in {path}: {message}")]
    WalkDir { path: PathBuf, message: String },

    #[error("Config error in {path}: {message}")]
    Config { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, FolioError>;

pub trait IoContext<T> {
    fn read_context(self, path: &Path) -> Result<T>;
    fn write_context(self, path: &Path) -> Result<T>;
    fn copy_context(self, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn read_context(self, path: &Path) -> Result<T> {
        self.map_err(|source| FolioError::IoRead {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write_context(self, path: &Path) -> Result<T> {
        self.map_err(|source| FolioError::IoWrite {
            path: path.to_path_buf(),
            source,
        })
    }

    fn copy_context(self, path: &Path) -> Result<T> {
        self.map_err(|source| FolioError::IoCopy {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl FolioError {
    pub fn malformed(path: &Path, reason: impl Into<String>) -> Self {
        FolioError::MalformedContent {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn walk(path: &Path, error: walkdir::Error) -> Self {
        FolioError::WalkDir {
            path: path.to_path_buf(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_context_maps_to_variant() {
        let path = Path::new("build/blog.html");
        let result: std::io::Result<()> = Err(io::Error::other("disk full"));
        let error = result.write_context(path).unwrap_err();
        assert!(matches!(error, FolioError::IoWrite { ref path, .. } if path.ends_with("blog.html")));
        assert_eq!(error.to_string(), "Failed to write build/blog.html");
    }

    #[test]
    fn test_malformed_message_includes_reason() {
        let error = FolioError::malformed(Path::new("content/blog/a.md"), "missing title");
        assert_eq!(
            error.to_string(),
            "Malformed content in content/blog/a.md: missing title"
        );
    }
}

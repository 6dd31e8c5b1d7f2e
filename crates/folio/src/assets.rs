use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{FolioError, IoContext, Result};
use crate::types::Post;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub source: PathBuf,
    pub dest: PathBuf,
}

pub fn collect_assets(source_root: &Path, dest_prefix: &Path) -> Result<Vec<Asset>> {
    let mut assets = Vec::new();

    if !source_root.exists() {
        return Ok(assets);
    }

    for entry in WalkDir::new(source_root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|error| FolioError::IoCopy {
            path: error
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| source_root.to_path_buf()),
            source: error
                .into_io_error()
                .unwrap_or_else(|| io::Error::other("filesystem loop")),
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Ok(relative) = path.strip_prefix(source_root) else {
            continue;
        };

        assets.push(Asset {
            source: path.to_path_buf(),
            dest: dest_prefix.join(relative),
        });
    }

    Ok(assets)
}

// A post `content/blog/x.md` may ship files in `content/blog/x/`; they land
// next to the rendered page under `blog/<slug>/`.
pub fn collect_post_assets(posts: &[Post]) -> Result<Vec<Asset>> {
    let mut assets = Vec::new();

    for post in posts {
        let source = &post.content.source;
        let (Some(parent), Some(stem)) = (source.parent(), source.file_stem()) else {
            continue;
        };

        let assets_dir = parent.join(stem);
        if assets_dir.is_dir() {
            let prefix = Path::new("blog").join(&post.content.slug);
            assets.extend(collect_assets(&assets_dir, &prefix)?);
        }
    }

    Ok(assets)
}

// Copies each asset byte-for-byte. `reserved` holds every path (relative to
// the output root) already written by this run; copied assets are added to it.
pub fn copy_assets(
    assets: &[Asset],
    output_root: &Path,
    reserved: &mut BTreeSet<PathBuf>,
) -> Result<usize> {
    for asset in assets {
        if !reserved.insert(asset.dest.clone()) {
            return Err(FolioError::IoCopy {
                path: asset.source.clone(),
                source: io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("would overwrite {} written earlier in this build", asset.dest.display()),
                ),
            });
        }

        let dest = output_root.join(&asset.dest);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).copy_context(parent)?;
        }
        fs::copy(&asset.source, &dest).copy_context(&asset.source)?;
        debug!(source = %asset.source.display(), dest = %asset.dest.display(), "copied asset");
    }

    Ok(assets.len())
}

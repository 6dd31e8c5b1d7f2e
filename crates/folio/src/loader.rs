use crate::error::{FolioError, IoContext, Result};
use crate::parsing::{
    MarkdownRenderer, extract_excerpt, extract_frontmatter, first_heading, parse_date,
    parse_date_from_filename, reading_time, word_count,
};
use crate::types::{Content, Frontmatter, Post, Project};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

const EXCERPT_LENGTH: usize = 200;
const DATE_FIELDS: [&str; 2] = ["date", "date_published"];

struct ParsedFile {
    content: Content,
    date: Option<NaiveDate>,
}

pub struct ContentLoader<'a> {
    renderer: &'a MarkdownRenderer,
}

impl<'a> ContentLoader<'a> {
    pub fn new(renderer: &'a MarkdownRenderer) -> Self {
        Self { renderer }
    }

    pub fn load_posts(&self, dir: &Path) -> Result<Vec<Post>> {
        let mut posts = Vec::new();
        let mut seen_slugs: HashMap<String, PathBuf> = HashMap::new();

        for path in content_files(dir)? {
            let parsed = self.parse_file(&path)?;
            let date = parsed
                .date
                .ok_or_else(|| FolioError::malformed(&path, "missing required field 'date'"))?;
            let tags = parse_tags(&parsed.content.frontmatter, &path)?;

            check_unique(&mut seen_slugs, &parsed.content.slug, &path)?;
            debug!(slug = %parsed.content.slug, path = %path.display(), "loaded post");

            posts.push(Post {
                content: parsed.content,
                date,
                tags,
            });
        }

        Ok(posts)
    }

    pub fn load_projects(&self, dir: &Path) -> Result<Vec<Project>> {
        let mut projects = Vec::new();
        let mut seen_slugs: HashMap<String, PathBuf> = HashMap::new();

        for path in content_files(dir)? {
            let parsed = self.parse_file(&path)?;

            check_unique(&mut seen_slugs, &parsed.content.slug, &path)?;
            debug!(slug = %parsed.content.slug, path = %path.display(), "loaded project");

            projects.push(Project {
                content: parsed.content,
                date: parsed.date,
            });
        }

        Ok(projects)
    }

    fn parse_file(&self, path: &Path) -> Result<ParsedFile> {
        let file_content = fs::read_to_string(path).read_context(path)?;
        let (mut frontmatter, raw_content) = extract_frontmatter(&file_content, path)?;
        normalize_dates(&mut frontmatter, path)?;

        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        let (filename_date, stem_slug) = match parse_date_from_filename(&stem) {
            Some((date, rest)) => (Some(date), rest.to_string()),
            None => (None, stem.clone()),
        };

        let title = frontmatter
            .get_string("title")
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty())
            .or_else(|| first_heading(&raw_content))
            .ok_or_else(|| FolioError::malformed(path, "missing required field 'title'"))?;

        let slug = match frontmatter.get_string("slug") {
            Some(explicit) => explicit.trim().to_string(),
            None => {
                let from_title = slug::slugify(&title);
                if from_title.is_empty() {
                    slug::slugify(&stem_slug)
                } else {
                    from_title
                }
            }
        };
        if slug.is_empty() || slug.contains(['/', '\\']) || slug == "." || slug == ".." {
            return Err(FolioError::malformed(
                path,
                format!("cannot derive a usable slug (got '{slug}')"),
            ));
        }

        let date = match frontmatter_date(&frontmatter, path)? {
            Some(date) => Some(date),
            None => filename_date,
        };

        let rendered = self.renderer.render(&raw_content);
        let excerpt = frontmatter
            .get_string("summary")
            .or_else(|| frontmatter.get_string("excerpt"))
            .or_else(|| extract_excerpt(&raw_content, EXCERPT_LENGTH));
        let words = word_count(&raw_content);

        Ok(ParsedFile {
            content: Content {
                slug,
                title,
                html: rendered.html,
                raw_content,
                excerpt,
                word_count: words,
                reading_time: reading_time(words),
                toc: rendered.toc,
                frontmatter,
                source: path.to_path_buf(),
            },
            date,
        })
    }
}

fn content_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if !dir.exists() {
        debug!(path = %dir.display(), "content directory missing, nothing to load");
        return Ok(files);
    }

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|error| FolioError::walk(dir, error))?;
        let path = entry.path();

        if !entry.file_type().is_file() {
            continue;
        }

        let filename = entry.file_name().to_string_lossy();
        if filename.starts_with('.') || filename.starts_with('_') {
            continue;
        }

        let is_markdown = path
            .extension()
            .map(|extension| extension == "md" || extension == "markdown")
            .unwrap_or(false);
        if !is_markdown {
            warn!(path = %path.display(), "skipping non-markdown file in content directory");
            continue;
        }

        files.push(path.to_path_buf());
    }

    Ok(files)
}

// Every `date_*` field is a date, whichever format it was written in; templates
// see them as `YYYY-MM-DD`.
fn normalize_dates(frontmatter: &mut Frontmatter, path: &Path) -> Result<()> {
    for (field, value) in frontmatter.raw.iter_mut() {
        if field != "date" && !field.starts_with("date_") {
            continue;
        }
        let Value::String(text) = value else {
            continue;
        };
        let date = parse_date(text).ok_or_else(|| {
            FolioError::malformed(path, format!("invalid date '{text}' in field '{field}'"))
        })?;
        *value = Value::String(date.format("%Y-%m-%d").to_string());
    }
    Ok(())
}

fn frontmatter_date(frontmatter: &Frontmatter, path: &Path) -> Result<Option<NaiveDate>> {
    for field in DATE_FIELDS {
        if let Some(value) = frontmatter.get_string(field) {
            return parse_date(&value).map(Some).ok_or_else(|| {
                FolioError::malformed(path, format!("invalid date '{value}' in field '{field}'"))
            });
        }
    }
    Ok(None)
}

fn parse_tags(frontmatter: &Frontmatter, path: &Path) -> Result<Vec<String>> {
    let mut tags: Vec<String> = Vec::new();

    for tag in frontmatter.get_array("tags").unwrap_or_default() {
        let tag = tag.trim().to_string();
        if tag.is_empty() || tag == "." || tag == ".." || tag.contains(['/', '\\']) {
            return Err(FolioError::malformed(
                path,
                format!("tag '{tag}' cannot be used as a page name"),
            ));
        }
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    Ok(tags)
}

fn check_unique(seen: &mut HashMap<String, PathBuf>, slug: &str, path: &Path) -> Result<()> {
    if let Some(existing_path) = seen.get(slug) {
        return Err(FolioError::DuplicateSlug {
            slug: slug.to_string(),
            path: path.to_path_buf(),
            existing_path: existing_path.clone(),
        });
    }
    seen.insert(slug.to_string(), path.to_path_buf());
    Ok(())
}

use crate::assets::{collect_assets, collect_post_assets, copy_assets};
use crate::config::BuildConfig;
use crate::emit::PageEmitter;
use crate::error::{FolioError, Result};
use crate::loader::ContentLoader;
use crate::parsing::MarkdownRenderer;
use crate::site::SiteModel;
use crate::theme::ThemeEngine;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Init,
    Loading,
    Aggregating,
    Emitting,
    CopyingStatic,
    Done,
    Failed,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildState::Init => "init",
            BuildState::Loading => "loading",
            BuildState::Aggregating => "aggregating",
            BuildState::Emitting => "emitting",
            BuildState::CopyingStatic => "copying-static",
            BuildState::Done => "done",
            BuildState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub posts: usize,
    pub projects: usize,
    pub tags: usize,
    pub pages: Vec<PathBuf>,
    pub static_files: usize,
    pub elapsed: Duration,
}

// One build, start to finish. The state ends at `Done` or `Failed`; a failed
// run remembers the stage it was in when the error surfaced.
pub struct BuildRun {
    config: BuildConfig,
    state: BuildState,
    failed_stage: Option<BuildState>,
}

impl BuildRun {
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            state: BuildState::Init,
            failed_stage: None,
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn failed_stage(&self) -> Option<BuildState> {
        self.failed_stage
    }

    pub fn run(&mut self) -> Result<BuildReport> {
        self.state = BuildState::Init;
        self.failed_stage = None;

        match self.execute() {
            Ok(report) => Ok(report),
            Err(failure) => {
                debug!(stage = %self.state, error = %failure, "build failed");
                self.failed_stage = Some(self.state);
                self.state = BuildState::Failed;
                Err(failure)
            }
        }
    }

    fn execute(&mut self) -> Result<BuildReport> {
        let start = Instant::now();
        let config = &self.config;

        info!(output = %config.output_root.display(), "preparing output directory");
        guard_output_root(config)?;
        reset_output_root(&config.output_root)?;

        self.advance(BuildState::Loading);
        let config = &self.config;
        let renderer = MarkdownRenderer::new();
        let loader = ContentLoader::new(&renderer);
        let posts = loader.load_posts(&config.blog_root())?;
        let projects = loader.load_projects(&config.projects_root())?;
        info!(posts = posts.len(), projects = projects.len(), "loaded content");

        self.advance(BuildState::Aggregating);
        let model = SiteModel::build(posts, projects);
        info!(tags = model.tag_count(), "built site model");

        self.advance(BuildState::Emitting);
        let config = &self.config;
        let theme = ThemeEngine::load(&config.templates_root)?;
        let pages = PageEmitter::new(&theme, &config.site, &config.output_root).emit_all(&model)?;
        info!(pages = pages.len(), "rendered pages");

        self.advance(BuildState::CopyingStatic);
        let config = &self.config;
        let mut reserved: BTreeSet<PathBuf> = pages.iter().cloned().collect();
        let mut assets = collect_assets(&config.static_root, Path::new(""))?;
        assets.extend(collect_post_assets(model.posts())?);
        let static_files = copy_assets(&assets, &config.output_root, &mut reserved)?;
        info!(files = static_files, "copied static files");

        self.advance(BuildState::Done);

        Ok(BuildReport {
            posts: model.posts().len(),
            projects: model.projects().len(),
            tags: model.tag_count(),
            pages,
            static_files,
            elapsed: start.elapsed(),
        })
    }

    fn advance(&mut self, next: BuildState) {
        info!(from = %self.state, to = %next, "build state");
        self.state = next;
    }
}

// The output root is wiped on every run, so it must never contain an input.
fn guard_output_root(config: &BuildConfig) -> Result<()> {
    let output = absolute(&config.output_root)?;
    let inputs = [
        &config.content_root,
        &config.static_root,
        &config.templates_root,
    ];

    if output.parent().is_none() {
        return Err(FolioError::Config {
            path: config.output_root.clone(),
            message: "refusing to use a filesystem root as the output directory".to_string(),
        });
    }

    for input in inputs {
        if absolute(input)?.starts_with(&output) {
            return Err(FolioError::Config {
                path: config.output_root.clone(),
                message: format!(
                    "output directory would delete input directory {}",
                    input.display()
                ),
            });
        }
    }

    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|source| FolioError::OutputDir {
        path: path.to_path_buf(),
        source,
    })
}

fn reset_output_root(output_root: &Path) -> Result<()> {
    let to_error = |source: std::io::Error| FolioError::OutputDir {
        path: output_root.to_path_buf(),
        source,
    };

    if output_root.exists() {
        fs::remove_dir_all(output_root).map_err(to_error)?;
    }
    fs::create_dir_all(output_root).map_err(to_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use walkdir::WalkDir;

    const BASE: &str = r#"<!doctype html>
<html>
<head><title>{% block title %}{{ site.title }}{% endblock %}</title></head>
<body>{% block body %}{% endblock %}</body>
</html>
"#;
    const INDEX: &str = r#"{% extends "base.html" %}{% block body %}{% for post in posts %}<a href="{{ post.url }}">{{ post.title }}</a>{% endfor %}{% endblock %}"#;
    const ABOUT: &str = r#"{% extends "base.html" %}{% block body %}About {{ site.title }}{% endblock %}"#;
    const BLOG: &str = r#"{% extends "base.html" %}{% block body %}{% if tag %}<h1>{{ tag }}</h1>{% endif %}<ul>{% for item in items %}<li>{{ item.slug }}</li>{% endfor %}</ul>{% endblock %}"#;
    const POST: &str = r#"{% extends "base.html" %}{% block title %}{{ page.title }}{% endblock %}{% block body %}<time>{{ page.date }}</time>{{ page.content | safe }}{% endblock %}"#;
    const PROJECTS: &str = r#"{% extends "base.html" %}{% block body %}{% for item in items %}<section id="{{ item.slug }}">{{ item.content | safe }}</section>{% endfor %}{% endblock %}"#;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn create_test_site() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        write(root, "templates/base.html", BASE);
        write(root, "templates/index.html", INDEX);
        write(root, "templates/about.html", ABOUT);
        write(root, "templates/blog.html", BLOG);
        write(root, "templates/post.html", POST);
        write(root, "templates/projects.html", PROJECTS);

        write(
            root,
            "content/blog/first.md",
            "title: A\ndate_published: 01 Jul 2020\ntags: python\n\nFirst post.\n",
        );
        write(
            root,
            "content/blog/second.md",
            "+++\ntitle = \"B\"\ndate = 2020-07-02\ntags = [\"python\", \"Rust & Co\"]\n+++\n\nSecond post.\n",
        );
        write(
            root,
            "content/projects/tool.md",
            "---\ntitle: Tool\n---\nA **tool**.\n",
        );
        write(root, "static/css/style.css", "body { color: black; }\n");

        dir
    }

    fn run(root: &Path) -> Result<BuildReport> {
        BuildRun::new(BuildConfig::rooted_at(root)).run()
    }

    fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
        WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .map(|entry| entry.unwrap())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| {
                (
                    entry.path().strip_prefix(root).unwrap().to_path_buf(),
                    fs::read(entry.path()).unwrap(),
                )
            })
            .collect()
    }

    fn read(root: &Path, relative: &str) -> String {
        fs::read_to_string(root.join("build").join(relative)).unwrap()
    }

    #[test]
    fn test_full_build() {
        let dir = create_test_site();
        let report = run(dir.path()).unwrap();

        assert_eq!(report.posts, 2);
        assert_eq!(report.projects, 1);
        assert_eq!(report.tags, 2);
        assert_eq!(report.static_files, 1);

        let build = dir.path().join("build");
        for page in [
            "index.html",
            "about.html",
            "blog.html",
            "projects.html",
            "blog/a.html",
            "blog/b.html",
            "blog/tag/python.html",
            "blog/tag/Rust & Co.html",
            "css/style.css",
        ] {
            assert!(build.join(page).is_file(), "missing {page}");
        }

        let blog = read(dir.path(), "blog.html");
        assert!(blog.contains("<li>b</li><li>a</li>"));
        let python = read(dir.path(), "blog/tag/python.html");
        assert!(python.contains("<h1>python</h1><ul><li>b</li><li>a</li></ul>"));
        let rust = read(dir.path(), "blog/tag/Rust & Co.html");
        assert!(rust.contains("<h1>Rust &amp; Co</h1><ul><li>b</li></ul>"));

        let post = read(dir.path(), "blog/b.html");
        assert!(post.contains("<title>B</title>"));
        assert!(post.contains("<time>2020-07-02</time>"));
        assert!(post.contains("<p>Second post.</p>"));

        let projects = read(dir.path(), "projects.html");
        assert!(projects.contains("<strong>tool</strong>"));

        assert_eq!(
            fs::read(build.join("css/style.css")).unwrap(),
            fs::read(dir.path().join("static/css/style.css")).unwrap()
        );
    }

    #[test]
    fn test_builds_are_deterministic() {
        let dir = create_test_site();
        run(dir.path()).unwrap();
        let first = snapshot(&dir.path().join("build"));
        run(dir.path()).unwrap();
        let second = snapshot(&dir.path().join("build"));

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_stale_output_removed() {
        let dir = create_test_site();
        write(dir.path(), "build/old.html", "stale");

        run(dir.path()).unwrap();
        assert!(!dir.path().join("build/old.html").exists());
    }

    #[test]
    fn test_missing_title_leaves_empty_output() {
        let dir = create_test_site();
        write(dir.path(), "build/old.html", "stale");
        write(
            dir.path(),
            "content/blog/untitled.md",
            "date: 2020-08-01\n\nNo title at all.\n",
        );

        let error = run(dir.path()).unwrap_err();
        assert!(matches!(error, FolioError::MalformedContent { .. }));

        let build = dir.path().join("build");
        assert!(build.is_dir());
        assert_eq!(fs::read_dir(&build).unwrap().count(), 0);
    }

    #[test]
    fn test_duplicate_slug_writes_nothing() {
        let dir = create_test_site();
        write(
            dir.path(),
            "content/blog/third.md",
            "title: a\ndate: 2020-07-03\n\nClash.\n",
        );

        let error = run(dir.path()).unwrap_err();
        assert!(matches!(error, FolioError::DuplicateSlug { ref slug, .. } if slug == "a"));
        assert_eq!(fs::read_dir(dir.path().join("build")).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_template_fails_build() {
        let dir = create_test_site();
        fs::remove_file(dir.path().join("templates/projects.html")).unwrap();

        let error = run(dir.path()).unwrap_err();
        assert!(matches!(error, FolioError::TemplateRender { ref template, .. } if template == "projects"));
    }

    #[test]
    fn test_post_assets_copied_beside_page() {
        let dir = create_test_site();
        write(dir.path(), "content/blog/first/diagram.svg", "<svg/>");

        run(dir.path()).unwrap();
        assert_eq!(read(dir.path(), "blog/a/diagram.svg"), "<svg/>");
    }

    #[test]
    fn test_static_file_clashing_with_page_fails() {
        let dir = create_test_site();
        write(dir.path(), "static/about.html", "static about");

        let error = run(dir.path()).unwrap_err();
        assert!(matches!(error, FolioError::IoCopy { .. }));
    }

    #[test]
    fn test_output_containing_inputs_is_rejected() {
        let dir = create_test_site();
        let mut config = BuildConfig::rooted_at(dir.path());
        config.output_root = dir.path().to_path_buf();

        let error = BuildRun::new(config).run().unwrap_err();
        assert!(matches!(error, FolioError::Config { .. }));
        assert!(dir.path().join("templates/base.html").exists());
    }

    #[test]
    fn test_state_advances_to_done() {
        let dir = create_test_site();
        let mut build = BuildRun::new(BuildConfig::rooted_at(dir.path()));
        assert_eq!(build.state(), BuildState::Init);

        build.run().unwrap();
        assert_eq!(build.state(), BuildState::Done);
        assert_eq!(build.failed_stage(), None);
    }

    #[test]
    fn test_loading_error_ends_in_failed() {
        let dir = create_test_site();
        write(dir.path(), "content/blog/bad.md", "title: Bad\ndate: nope\n\nx\n");

        let mut build = BuildRun::new(BuildConfig::rooted_at(dir.path()));
        assert!(build.run().is_err());
        assert_eq!(build.state(), BuildState::Failed);
        assert_eq!(build.failed_stage(), Some(BuildState::Loading));
    }

    #[test]
    fn test_template_error_ends_in_failed() {
        let dir = create_test_site();
        fs::remove_file(dir.path().join("templates/post.html")).unwrap();

        let mut build = BuildRun::new(BuildConfig::rooted_at(dir.path()));
        let error = build.run().unwrap_err();
        assert!(matches!(error, FolioError::TemplateRender { .. }));
        assert_eq!(build.state(), BuildState::Failed);
        assert_eq!(build.failed_stage(), Some(BuildState::Emitting));
    }

    #[test]
    fn test_rerun_after_failure_starts_over() {
        let dir = create_test_site();
        write(dir.path(), "content/blog/bad.md", "title: Bad\ndate: nope\n\nx\n");

        let mut build = BuildRun::new(BuildConfig::rooted_at(dir.path()));
        assert!(build.run().is_err());

        fs::remove_file(dir.path().join("content/blog/bad.md")).unwrap();
        build.run().unwrap();
        assert_eq!(build.state(), BuildState::Done);
        assert_eq!(build.failed_stage(), None);
    }
}

use crate::config::SiteMeta;
use crate::error::{IoContext, Result};
use crate::site::SiteModel;
use crate::theme::ThemeEngine;
use crate::views::{ItemView, post_view, project_view, tag_views};
use std::fs;
use std::path::{Path, PathBuf};
use tera::Context;
use tracing::debug;

const NOT_FOUND_TEMPLATE: &str = "404";

pub struct PageEmitter<'a> {
    theme: &'a ThemeEngine,
    site: &'a SiteMeta,
    output_root: &'a Path,
    written: Vec<PathBuf>,
}

impl<'a> PageEmitter<'a> {
    pub fn new(theme: &'a ThemeEngine, site: &'a SiteMeta, output_root: &'a Path) -> Self {
        Self {
            theme,
            site,
            output_root,
            written: Vec::new(),
        }
    }

    // Returns the written pages relative to the output root, in emission order.
    pub fn emit_all(mut self, model: &SiteModel) -> Result<Vec<PathBuf>> {
        let posts: Vec<ItemView> = model.posts().iter().map(post_view).collect();
        let projects: Vec<ItemView> = model.projects().iter().map(project_view).collect();

        self.emit_home(model, &posts, &projects)?;
        self.emit_simple("about")?;
        self.emit_blog(model, &posts)?;
        self.emit_tag_pages(model)?;
        self.emit_posts(&posts)?;
        self.emit_projects(&projects)?;

        if self.theme.has_template(NOT_FOUND_TEMPLATE) {
            self.emit_simple(NOT_FOUND_TEMPLATE)?;
        }

        Ok(self.written)
    }

    fn base_context(&self, category: &str) -> Context {
        let mut context = Context::new();
        context.insert("site", self.site);
        context.insert("category", category);
        context
    }

    fn emit_home(
        &mut self,
        model: &SiteModel,
        posts: &[ItemView],
        projects: &[ItemView],
    ) -> Result<()> {
        let mut context = self.base_context("index");
        context.insert("posts", posts);
        context.insert("projects", projects);
        context.insert("tags", &tag_views(model));

        self.write_page("index", &context, PathBuf::from("index.html"))
    }

    fn emit_simple(&mut self, name: &str) -> Result<()> {
        let context = self.base_context(name);
        self.write_page(name, &context, PathBuf::from(format!("{name}.html")))
    }

    fn emit_blog(&mut self, model: &SiteModel, posts: &[ItemView]) -> Result<()> {
        let mut context = self.base_context("blog");
        context.insert("items", posts);
        context.insert("tags", &tag_views(model));
        context.insert("tag", &Option::<String>::None);

        self.write_page("blog", &context, PathBuf::from("blog.html"))
    }

    fn emit_tag_pages(&mut self, model: &SiteModel) -> Result<()> {
        let tags = tag_views(model);

        for (tag, tagged) in model.tags() {
            let items: Vec<ItemView> = tagged.into_iter().map(post_view).collect();

            let mut context = self.base_context("blog");
            context.insert("items", &items);
            context.insert("tags", &tags);
            context.insert("tag", tag);

            let output = Path::new("blog").join("tag").join(format!("{tag}.html"));
            self.write_page("blog", &context, output)?;
        }

        Ok(())
    }

    fn emit_posts(&mut self, posts: &[ItemView]) -> Result<()> {
        for post in posts {
            let mut context = self.base_context("blog");
            context.insert("page", post);

            let output = Path::new("blog").join(format!("{}.html", post.slug));
            self.write_page("post", &context, output)?;
        }

        Ok(())
    }

    fn emit_projects(&mut self, projects: &[ItemView]) -> Result<()> {
        let mut context = self.base_context("projects");
        context.insert("items", projects);

        self.write_page("projects", &context, PathBuf::from("projects.html"))
    }

    fn write_page(&mut self, template: &str, context: &Context, relative: PathBuf) -> Result<()> {
        let output_path = self.output_root.join(&relative);
        let rendered = self
            .theme
            .render_template(template, context, &output_path)?;

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).write_context(parent)?;
        }
        fs::write(&output_path, rendered).write_context(&output_path)?;

        debug!(template, path = %relative.display(), "wrote page");
        self.written.push(relative);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FolioError;
    use crate::types::{Content, Frontmatter, Post, Project};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    const LISTING: &str = "{% if tag %}[{{ tag }}]{% endif %}{% for item in items %}{{ item.slug }};{% endfor %}";

    fn content(slug: &str, html: &str) -> Content {
        Content {
            slug: slug.to_string(),
            title: format!("Title {slug}"),
            html: html.to_string(),
            raw_content: String::new(),
            excerpt: None,
            word_count: 0,
            reading_time: 1,
            toc: Vec::new(),
            frontmatter: Frontmatter::default(),
            source: PathBuf::from(format!("{slug}.md")),
        }
    }

    fn post(slug: &str, day: u32, tags: &[&str]) -> Post {
        Post {
            content: content(slug, "<p>body</p>"),
            date: NaiveDate::from_ymd_opt(2020, 7, day).unwrap(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
        }
    }

    fn engine(extra: &[(&str, &str)]) -> ThemeEngine {
        let mut templates = vec![
            ("index", "home:{% for p in posts %}{{ p.slug }};{% endfor %}"),
            ("about", "about:{{ site.title }}"),
            ("blog", LISTING),
            ("post", "{{ page.title }}|{{ page.content | safe }}"),
            ("projects", "{% for item in items %}{{ item.slug }};{% endfor %}"),
        ];
        templates.extend_from_slice(extra);
        ThemeEngine::from_raw(&templates).unwrap()
    }

    fn model() -> SiteModel {
        SiteModel::build(
            vec![
                post("a", 1, &["python"]),
                post("b", 2, &["python", "rust"]),
            ],
            vec![Project {
                content: content("tool", "<p>tool</p>"),
                date: None,
            }],
        )
    }

    fn read(root: &Path, relative: &str) -> String {
        fs::read_to_string(root.join(relative)).unwrap()
    }

    #[test]
    fn test_emits_every_page_kind() {
        let dir = TempDir::new().unwrap();
        let theme = engine(&[]);
        let site = SiteMeta {
            title: "Notes".to_string(),
            ..SiteMeta::default()
        };

        let written = PageEmitter::new(&theme, &site, dir.path())
            .emit_all(&model())
            .unwrap();

        assert_eq!(
            written,
            vec![
                PathBuf::from("index.html"),
                PathBuf::from("about.html"),
                PathBuf::from("blog.html"),
                PathBuf::from("blog/tag/python.html"),
                PathBuf::from("blog/tag/rust.html"),
                PathBuf::from("blog/b.html"),
                PathBuf::from("blog/a.html"),
                PathBuf::from("projects.html"),
            ]
        );

        let root = dir.path();
        assert_eq!(read(root, "index.html"), "home:b;a;");
        assert_eq!(read(root, "about.html"), "about:Notes");
        assert_eq!(read(root, "blog.html"), "b;a;");
        assert_eq!(read(root, "blog/tag/python.html"), "[python]b;a;");
        assert_eq!(read(root, "blog/tag/rust.html"), "[rust]b;");
        assert_eq!(read(root, "blog/a.html"), "Title a|<p>body</p>");
        assert_eq!(read(root, "projects.html"), "tool;");
        assert!(!root.join("404.html").exists());
    }

    #[test]
    fn test_optional_not_found_page() {
        let dir = TempDir::new().unwrap();
        let theme = engine(&[("404", "missing:{{ category }}")]);
        let site = SiteMeta::default();

        let written = PageEmitter::new(&theme, &site, dir.path())
            .emit_all(&model())
            .unwrap();

        assert_eq!(written.last(), Some(&PathBuf::from("404.html")));
        assert_eq!(read(dir.path(), "404.html"), "missing:404");
    }

    #[test]
    fn test_missing_template_fails() {
        let dir = TempDir::new().unwrap();
        let theme = ThemeEngine::from_raw(&[("index", "home")]).unwrap();
        let site = SiteMeta::default();

        let error = PageEmitter::new(&theme, &site, dir.path())
            .emit_all(&model())
            .unwrap_err();

        assert!(matches!(error, FolioError::TemplateRender { ref template, .. } if template == "about"));
        assert!(!dir.path().join("about.html").exists());
    }

    #[test]
    fn test_unwritable_output_is_write_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blog");
        fs::write(&blocker, "not a directory").unwrap();

        let theme = engine(&[]);
        let site = SiteMeta::default();
        let error = PageEmitter::new(&theme, &site, dir.path())
            .emit_all(&model())
            .unwrap_err();

        assert!(matches!(error, FolioError::IoWrite { .. }));
    }
}

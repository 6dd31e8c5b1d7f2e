use crate::site::SiteModel;
use crate::types::{Content, Frontmatter, Post, Project, TocEntry};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

// Header fields already exposed as dedicated variables.
const PROMOTED_FIELDS: [&str; 7] = [
    "title",
    "slug",
    "date",
    "date_published",
    "tags",
    "summary",
    "excerpt",
];

#[derive(Debug, Clone, Serialize)]
pub struct ItemView {
    pub slug: String,
    pub title: String,
    pub url: String,
    pub date: Option<String>,
    pub tags: Vec<TagLink>,
    pub excerpt: Option<String>,
    pub word_count: usize,
    pub reading_time: usize,
    pub content: String,
    pub toc: Vec<TocEntry>,
    pub meta: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagLink {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagView {
    pub name: String,
    pub url: String,
    pub count: usize,
}

// Files keep the raw slug or tag as their name; links percent-encode it so
// names like `C#` still resolve.
pub fn post_url(slug: &str) -> String {
    format!("/blog/{}.html", urlencoding::encode(slug))
}

pub fn tag_url(tag: &str) -> String {
    format!("/blog/tag/{}.html", urlencoding::encode(tag))
}

pub fn post_view(post: &Post) -> ItemView {
    let tags = post
        .tags
        .iter()
        .map(|tag| TagLink {
            name: tag.clone(),
            url: tag_url(tag),
        })
        .collect();

    item_view(&post.content, post_url(&post.content.slug), Some(post.date), tags)
}

pub fn project_view(project: &Project) -> ItemView {
    let url = format!("/projects.html#{}", urlencoding::encode(&project.content.slug));
    item_view(&project.content, url, project.date, Vec::new())
}

pub fn tag_views(model: &SiteModel) -> Vec<TagView> {
    model
        .tags()
        .map(|(tag, posts)| TagView {
            name: tag.to_string(),
            url: tag_url(tag),
            count: posts.len(),
        })
        .collect()
}

fn item_view(
    content: &Content,
    url: String,
    date: Option<NaiveDate>,
    tags: Vec<TagLink>,
) -> ItemView {
    ItemView {
        slug: content.slug.clone(),
        title: content.title.clone(),
        url,
        date: date.map(|date| date.format("%Y-%m-%d").to_string()),
        tags,
        excerpt: content.excerpt.clone(),
        word_count: content.word_count,
        reading_time: content.reading_time,
        content: content.html.clone(),
        toc: content.toc.clone(),
        meta: extra_fields(&content.frontmatter),
    }
}

fn extra_fields(frontmatter: &Frontmatter) -> BTreeMap<String, Value> {
    frontmatter
        .raw
        .iter()
        .filter(|(key, _)| !PROMOTED_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

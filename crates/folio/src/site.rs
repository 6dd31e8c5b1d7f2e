use crate::types::{Post, Project};
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct SiteModel {
    posts: Vec<Post>,
    projects: Vec<Project>,
    tags: BTreeMap<String, Vec<usize>>,
}

impl SiteModel {
    // Posts newest first with ties broken by slug so that rebuilds are
    // byte-for-byte reproducible. Tags are grouped as exact strings.
    pub fn build(mut posts: Vec<Post>, mut projects: Vec<Project>) -> Self {
        posts.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| a.content.slug.cmp(&b.content.slug))
        });

        projects.sort_by(|a, b| {
            compare_optional_dates(a, b).then_with(|| a.content.slug.cmp(&b.content.slug))
        });

        let mut tags: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (index, post) in posts.iter().enumerate() {
            for tag in &post.tags {
                tags.entry(tag.clone()).or_default().push(index);
            }
        }

        Self {
            posts,
            projects,
            tags,
        }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    pub fn tags(&self) -> impl Iterator<Item = (&str, Vec<&Post>)> {
        self.tags.iter().map(|(tag, indices)| {
            (
                tag.as_str(),
                indices.iter().map(|&index| &self.posts[index]).collect(),
            )
        })
    }

    pub fn posts_tagged(&self, tag: &str) -> Vec<&Post> {
        self.tags
            .get(tag)
            .map(|indices| indices.iter().map(|&index| &self.posts[index]).collect())
            .unwrap_or_default()
    }
}

// Dated projects first, newest to oldest.
fn compare_optional_dates(a: &Project, b: &Project) -> Ordering {
    match (a.date, b.date) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub level: u32,
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub slug: String,
    pub title: String,
    pub html: String,
    pub raw_content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub word_count: usize,
    #[serde(default)]
    pub reading_time: usize,
    #[serde(default)]
    pub toc: Vec<TocEntry>,
    pub frontmatter: Frontmatter,
    pub source: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub content: Content,
    pub date: NaiveDate,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub content: Content,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

// Ordered so that rendering the same input twice yields identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frontmatter {
    #[serde(flatten)]
    pub raw: BTreeMap<String, Value>,
}

impl Frontmatter {
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.raw.get(key).and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    // A lone string counts as a one-element list: the plain metadata header
    // cannot tell `tags: rust` apart from a list of one.
    pub fn get_array(&self, key: &str) -> Option<Vec<String>> {
        self.raw.get(key).and_then(|v| match v {
            Value::Array(arr) => Some(
                arr.iter()
                    .filter_map(|item| item.as_str().map(String::from))
                    .collect(),
            ),
            Value::String(s) => Some(vec![s.clone()]),
            _ => None,
        })
    }
}

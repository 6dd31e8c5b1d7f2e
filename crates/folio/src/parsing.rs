use crate::error::{FolioError, Result};
use crate::types::{Frontmatter, TocEntry};
use chrono::{DateTime, NaiveDate};
use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

const SYNTAX_THEME: &str = "base16-ocean.dark";
const TOC_DEPTH: u32 = 2;
const WORDS_PER_MINUTE: usize = 200;

#[derive(Debug, Clone, Default)]
pub struct RenderedMarkdown {
    pub html: String,
    pub toc: Vec<TocEntry>,
}

pub struct MarkdownRenderer {
    syntax_set: SyntaxSet,
    theme: Theme,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
enum Pending<'a> {
    #[default]
    None,
    Code {
        lang: Option<String>,
        source: String,
    },
    Heading {
        level: HeadingLevel,
        id: Option<String>,
        classes: Vec<CowStr<'a>>,
        inner: Vec<Event<'a>>,
    },
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let mut themes = ThemeSet::load_defaults().themes;
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme: themes.remove(SYNTAX_THEME).unwrap_or_default(),
        }
    }

    pub fn render(&self, content: &str) -> RenderedMarkdown {
        let parser = Parser::new_ext(content, markdown_options());
        let mut events: Vec<Event> = Vec::new();
        let mut toc = Vec::new();
        let mut ids = HeadingIds::default();
        let mut pending = Pending::None;

        for event in parser {
            pending = match (std::mem::take(&mut pending), event) {
                (Pending::Code { lang, source }, Event::End(TagEnd::CodeBlock)) => {
                    events.push(Event::Html(self.highlight(lang.as_deref(), &source).into()));
                    Pending::None
                }
                (Pending::Code { lang, mut source }, Event::Text(text)) => {
                    source.push_str(&text);
                    Pending::Code { lang, source }
                }
                (code @ Pending::Code { .. }, _) => code,
                (
                    Pending::Heading {
                        level,
                        id,
                        classes,
                        inner,
                    },
                    Event::End(TagEnd::Heading(_)),
                ) => {
                    let title = plain_text(&inner);
                    let id = ids.assign(id, &title);
                    let level = level as u32;
                    if level <= TOC_DEPTH {
                        toc.push(TocEntry {
                            level,
                            id: id.clone(),
                            title,
                        });
                    }
                    events.push(Event::Html(render_heading(level, &id, &classes, inner).into()));
                    Pending::None
                }
                (
                    Pending::Heading {
                        level,
                        id,
                        classes,
                        mut inner,
                    },
                    event,
                ) => {
                    inner.push(event);
                    Pending::Heading {
                        level,
                        id,
                        classes,
                        inner,
                    }
                }
                (Pending::None, Event::Start(Tag::CodeBlock(kind))) => Pending::Code {
                    lang: fence_language(&kind),
                    source: String::new(),
                },
                (
                    Pending::None,
                    Event::Start(Tag::Heading {
                        level, id, classes, ..
                    }),
                ) => Pending::Heading {
                    level,
                    id: id.map(|id| id.to_string()),
                    classes,
                    inner: Vec::new(),
                },
                (Pending::None, event) => {
                    events.push(event);
                    Pending::None
                }
            };
        }

        let mut html = String::new();
        pulldown_cmark::html::push_html(&mut html, events.into_iter());

        RenderedMarkdown { html, toc }
    }

    fn highlight(&self, lang: Option<&str>, source: &str) -> String {
        let Some(lang) = lang else {
            return format!("<pre><code>{}</code></pre>\n", escape_html(source));
        };

        self.syntax_set
            .find_syntax_by_token(lang)
            .and_then(|syntax| {
                highlighted_html_for_string(source, &self.syntax_set, syntax, &self.theme).ok()
            })
            .unwrap_or_else(|| {
                format!(
                    "<pre><code class=\"language-{}\">{}</code></pre>\n",
                    escape_html(lang),
                    escape_html(source)
                )
            })
    }
}

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    options
}

fn fence_language(kind: &CodeBlockKind) -> Option<String> {
    match kind {
        CodeBlockKind::Fenced(info) => info
            .split(|c: char| c.is_whitespace() || c == ',')
            .next()
            .filter(|lang| !lang.is_empty())
            .map(String::from),
        CodeBlockKind::Indented => None,
    }
}

fn render_heading(level: u32, id: &str, classes: &[CowStr], inner: Vec<Event>) -> String {
    let mut body = String::new();
    pulldown_cmark::html::push_html(&mut body, inner.into_iter());

    let class_attr = if classes.is_empty() {
        String::new()
    } else {
        let joined: Vec<&str> = classes.iter().map(|class| class.as_ref()).collect();
        format!(" class=\"{}\"", escape_html(&joined.join(" ")))
    };

    let id = escape_html(id);
    format!(
        "<h{level} id=\"{id}\"{class_attr}>{body}<a class=\"headerlink\" href=\"#{id}\" title=\"Permanent link\">&para;</a></h{level}>\n"
    )
}

fn plain_text(events: &[Event]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::Text(value) | Event::Code(value) => text.push_str(value),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            _ => {}
        }
    }
    text.trim().to_string()
}

#[derive(Default)]
struct HeadingIds {
    seen: HashMap<String, usize>,
}

impl HeadingIds {
    fn assign(&mut self, explicit: Option<String>, title: &str) -> String {
        if let Some(id) = explicit {
            self.seen.entry(id.clone()).or_insert(0);
            return id;
        }

        let mut base = slug::slugify(title);
        if base.is_empty() {
            base = "section".to_string();
        }

        let mut candidate = base.clone();
        while let Some(count) = self.seen.get_mut(&candidate) {
            *count += 1;
            candidate = format!("{}-{}", base, count);
        }
        self.seen.insert(candidate.clone(), 0);
        candidate
    }
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn first_heading(content: &str) -> Option<String> {
    let mut inside = false;
    let mut collected = Vec::new();

    for event in Parser::new_ext(content, markdown_options()) {
        match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) => inside = true,
            Event::End(TagEnd::Heading(HeadingLevel::H1)) => {
                let title = plain_text(&collected);
                return if title.is_empty() { None } else { Some(title) };
            }
            other if inside => collected.push(other),
            _ => {}
        }
    }

    None
}

pub fn word_count(content: &str) -> usize {
    Parser::new_ext(content, markdown_options())
        .map(|event| match event {
            Event::Text(text) | Event::Code(text) => text.split_whitespace().count(),
            _ => 0,
        })
        .sum()
}

pub fn reading_time(words: usize) -> usize {
    words.div_ceil(WORDS_PER_MINUTE).max(1)
}

pub fn extract_excerpt(content: &str, max_chars: usize) -> Option<String> {
    if content.trim().is_empty() {
        return None;
    }

    let first_paragraph = content
        .split("\n\n")
        .map(|p| p.trim())
        .find(|p| !p.is_empty() && !p.starts_with('#') && !p.starts_with("```"))?;

    let text: String = first_paragraph
        .chars()
        .filter(|c| !['#', '*', '_', '`', '[', ']', '(', ')'].contains(c))
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();

    let text = text.trim();

    if text.chars().count() <= max_chars {
        Some(text.to_string())
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        let cut = truncated.rfind(' ').unwrap_or(truncated.len());
        Some(format!("{}...", truncated[..cut].trim_end()))
    }
}

pub fn extract_frontmatter(content: &str, path: &Path) -> Result<(Frontmatter, String)> {
    let content = content.replace("\r\n", "\n");
    let content = content.trim_start();

    if content.starts_with("+++") {
        parse_toml_frontmatter(content, path)
    } else if content.starts_with("---") {
        parse_yaml_frontmatter(content, path)
    } else if content.lines().next().and_then(parse_meta_line).is_some() {
        Ok(parse_meta_header(content))
    } else {
        Ok((Frontmatter::default(), content.trim().to_string()))
    }
}

fn parse_toml_frontmatter(content: &str, path: &Path) -> Result<(Frontmatter, String)> {
    let rest = &content[3..];

    let (end_index, body_start) = find_closing_delimiter(rest, "+++")
        .ok_or_else(|| FolioError::malformed(path, "unterminated +++ header"))?;

    let frontmatter_str = &rest[..end_index];
    let body = &rest[body_start..];

    let table: toml::Table = toml::from_str(frontmatter_str)
        .map_err(|error| FolioError::malformed(path, format!("invalid TOML header: {error}")))?;

    let raw = table
        .into_iter()
        .map(|(key, value)| (key, toml_to_json(value)))
        .collect();

    Ok((Frontmatter { raw }, body.trim().to_string()))
}

fn parse_yaml_frontmatter(content: &str, path: &Path) -> Result<(Frontmatter, String)> {
    let rest = &content[3..];

    let (end_index, body_start) = find_closing_delimiter(rest, "---")
        .ok_or_else(|| FolioError::malformed(path, "unterminated --- header"))?;

    let frontmatter_str = &rest[..end_index];
    let body = &rest[body_start..];

    let raw: BTreeMap<String, Value> = if frontmatter_str.trim().is_empty() {
        BTreeMap::new()
    } else {
        serde_yml::from_str(frontmatter_str)
            .map_err(|error| FolioError::malformed(path, format!("invalid YAML header: {error}")))?
    };

    Ok((Frontmatter { raw }, body.trim().to_string()))
}

// `Key: value` lines up to the first blank line; lines indented four or more
// spaces continue the previous key.
fn parse_meta_header(content: &str) -> (Frontmatter, String) {
    let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut current: Option<String> = None;
    let mut consumed = 0;

    for line in content.lines() {
        if line.trim().is_empty() {
            consumed += line.len() + 1;
            break;
        }

        if let Some((key, value)) = parse_meta_line(line) {
            let key = key.to_lowercase();
            let entry = values.entry(key.clone()).or_default();
            if !value.is_empty() {
                entry.push(value.to_string());
            }
            current = Some(key);
        } else if let (Some(key), true) = (&current, line.starts_with("    ")) {
            let value = line.trim();
            if let Some(entry) = values.get_mut(key) {
                entry.push(value.to_string());
            }
        } else {
            break;
        }

        consumed += line.len() + 1;
    }

    let raw = values
        .into_iter()
        .map(|(key, mut list)| {
            let value = match list.len() {
                0 => Value::String(String::new()),
                1 => Value::String(list.remove(0)),
                _ => Value::Array(list.into_iter().map(Value::String).collect()),
            };
            (key, value)
        })
        .collect();

    let body = content.get(consumed..).unwrap_or("");
    (Frontmatter { raw }, body.trim().to_string())
}

fn parse_meta_line(line: &str) -> Option<(&str, &str)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }

    let line = &line[indent..];
    let (key, value) = line.split_once(':')?;

    let valid_key = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid_key {
        Some((key, value.trim()))
    } else {
        None
    }
}

// Returns where the delimiter line starts and where the line after it begins.
fn find_closing_delimiter(content: &str, delimiter: &str) -> Option<(usize, usize)> {
    let mut position = 0;

    for line in content.split_inclusive('\n') {
        if line.trim() == delimiter {
            return Some((position, position + line.len()));
        }
        position += line.len();
    }

    None
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(datetime) => Value::String(datetime.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(key, value)| (key, toml_to_json(value)))
                .collect(),
        ),
    }
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%d %b %Y"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|datetime| datetime.date_naive())
        })
}

pub fn parse_date_from_filename(filename: &str) -> Option<(NaiveDate, &str)> {
    let date_part = filename.get(..10)?;
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;

    let rest = filename[10..].strip_prefix('-').unwrap_or(&filename[10..]);
    Some((date, rest))
}

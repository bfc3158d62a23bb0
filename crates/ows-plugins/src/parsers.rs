//! Parsers incluidos.
//!
//! - `ows.parsers.RawParser`: un registro por respuesta con el cuerpo tal cual.
//! - `ows.parsers.ParagraphParser`: un registro por párrafo. En HTML se toman
//!   los elementos `<p>`; en texto plano, los bloques separados por líneas
//!   vacías. Config: `min_length` (default 1) y `content_types` (default
//!   `["text/html", "text/plain"]`).

use log::warn;
use once_cell::sync::Lazy;
use ows_core::{Parser, PluginConfig, PluginError, PluginRegistry, Record, Response};
use regex::Regex;
use serde::Deserialize;

pub const RAW_PARSER: &str = "ows.parsers.RawParser";
pub const PARAGRAPH_PARSER: &str = "ows.parsers.ParagraphParser";

static PARAGRAPH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<p(?:\s[^>]*)?>(.*?)</p\s*>").expect("paragraph regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex"));
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("space regex"));
static BLANK_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n[ \t]*\r?\n").expect("blank line regex"));

pub struct RawParser;

impl Parser for RawParser {
    fn parse(&self, response: &Response) -> Vec<Record> {
        vec![Record::new(&response.url, &response.body, response.depth)]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParagraphConfig {
    pub min_length: usize,
    pub content_types: Vec<String>,
}

impl Default for ParagraphConfig {
    fn default() -> Self {
        Self { min_length: 1,
               content_types: vec!["text/html".to_string(), "text/plain".to_string()] }
    }
}

pub struct ParagraphParser {
    config: ParagraphConfig,
}

impl ParagraphParser {
    pub fn new(config: ParagraphConfig) -> Self {
        Self { config }
    }

    pub fn from_config(config: &PluginConfig) -> Result<Self, PluginError> {
        let parsed: ParagraphConfig = serde_json::from_value(serde_json::Value::Object(config.clone()))
            .map_err(|e| PluginError::Config(format!("{PARAGRAPH_PARSER}: {e}")))?;
        Ok(Self::new(parsed))
    }

    fn paragraphs(&self, mime: &str, body: &str) -> Vec<String> {
        let raw: Vec<String> = if mime == "text/html" {
            PARAGRAPH_RE.captures_iter(body)
                        .filter_map(|c| c.get(1))
                        .map(|m| unescape(&TAG_RE.replace_all(m.as_str(), " ")))
                        .collect()
        } else {
            BLANK_LINE_RE.split(body).map(str::to_string).collect()
        };
        raw.into_iter()
           .map(|p| SPACE_RE.replace_all(p.trim(), " ").into_owned())
           .filter(|p| p.chars().count() >= self.config.min_length.max(1))
           .collect()
    }
}

impl Parser for ParagraphParser {
    fn parse(&self, response: &Response) -> Vec<Record> {
        // "text/html; charset=utf-8" -> "text/html"
        let mime = response.content_type
                           .split(';')
                           .next()
                           .unwrap_or_default()
                           .trim()
                           .to_ascii_lowercase();
        if !self.config.content_types.iter().any(|t| t.eq_ignore_ascii_case(&mime)) {
            warn!("[parsers] unsupported content type '{}' for {}", response.content_type, response.url);
            return Vec::new();
        }
        self.paragraphs(&mime, &response.body)
            .into_iter()
            .map(|p| Record::new(&response.url, p, response.depth))
            .collect()
    }
}

fn unescape(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

pub fn register(registry: &mut PluginRegistry) {
    registry.register_parser(RAW_PARSER, |_| Ok(Box::new(RawParser) as Box<dyn Parser>));
    registry.register_parser(PARAGRAPH_PARSER, |config| {
                Ok(Box::new(ParagraphParser::from_config(config)?) as Box<dyn Parser>)
            });
}

//! Token substitution engine for outreach templates.
//!
//! A single linear pass over the template body. Recognized tokens are
//! replaced with their context value — or the empty string when the value is
//! missing, which is deliberate product behavior (personalization degrades
//! gracefully instead of failing a send). Unrecognized `{{...}}` sequences
//! pass through verbatim so authoring mistakes stay visible.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// The fixed, versioned token set. Adding a token means updating this set
/// and every caller that supplies context values.
pub const RECOGNIZED_TOKENS: [&str; 5] = [
    "host_name",
    "show_name",
    "your_name",
    "your_title",
    "your_main_link",
];

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("token regex is valid"));

/// Values supplied for one render. All fields optional — missing recognized
/// values substitute as the empty string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderContext {
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub show_name: Option<String>,
    #[serde(default)]
    pub your_name: Option<String>,
    #[serde(default)]
    pub your_title: Option<String>,
    #[serde(default)]
    pub your_main_link: Option<String>,
}

impl RenderContext {
    fn value_for(&self, token: &str) -> Option<&str> {
        match token {
            "host_name" => self.host_name.as_deref(),
            "show_name" => self.show_name.as_deref(),
            "your_name" => self.your_name.as_deref(),
            "your_title" => self.your_title.as_deref(),
            "your_main_link" => self.your_main_link.as_deref(),
            _ => None,
        }
    }
}

/// Render a template body against a context. Pure — no side effects.
pub fn render(body: &str, ctx: &RenderContext) -> String {
    TOKEN_RE
        .replace_all(body, |caps: &regex::Captures<'_>| {
            let token = &caps[1];
            if RECOGNIZED_TOKENS.contains(&token) {
                ctx.value_for(token).unwrap_or("").to_string()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// List the recognized tokens present in a body, in order of first occurrence.
/// Used by the API for authoring feedback.
pub fn recognized_tokens_in(body: &str) -> Vec<&'static str> {
    let mut found = Vec::new();
    for caps in TOKEN_RE.captures_iter(body) {
        if let Some(token) = RECOGNIZED_TOKENS.iter().find(|t| **t == &caps[1]) {
            if !found.contains(token) {
                found.push(*token);
            }
        }
    }
    found
}

//! HTML page transforms

use super::script::minify_script;
use super::{map_text, Transform, TransformError};
use crate::core::config::Config;
use crate::core::fileset::FileSet;
use minijinja::Environment;
use oxc_span::SourceType;
use regex::{Captures, Regex};
use std::sync::{Arc, OnceLock};
use tracing::warn;

/// Render pages as templates with the resolved configuration as context
///
/// `{% include %}` and `{% extends %}` paths resolve relative to the
/// working directory.
pub struct TemplateRender {
    config: Arc<Config>,
    env: Environment<'static>,
}

impl TemplateRender {
    pub fn new(config: Arc<Config>) -> Self {
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(config.cwd.clone()));
        env.set_keep_trailing_newline(true);
        Self { config, env }
    }
}

impl Transform for TemplateRender {
    fn name(&self) -> &str {
        "template"
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, TransformError> {
        map_text(self.name(), files, |path, text| {
            let name = path.to_string_lossy();
            self.env
                .render_named_str(&name, text, &*self.config)
                .map_err(|e| format!("{:#}", e))
        })
    }
}

/// Minify HTML: collapse whitespace, minify inline CSS and JS, drop comments
///
/// Inline scripts go through the same minifier as `scripts`, with
/// `console.*` calls removed. Redundant attributes, such as a JavaScript
/// `type` on `<script>`, are dropped by minify-html.
pub struct HtmlMinify {
    cfg: minify_html::Cfg,
}

impl HtmlMinify {
    pub fn new() -> Self {
        let mut cfg = minify_html::Cfg::new();
        cfg.minify_css = true;
        cfg.minify_js = false;
        cfg.keep_comments = false;
        cfg.keep_closing_tags = true;
        cfg.keep_html_and_head_opening_tags = true;
        Self { cfg }
    }
}

const JS_MIME_TYPES: &[&str] = &[
    "text/javascript",
    "application/javascript",
    "application/x-javascript",
    "text/ecmascript",
    "application/ecmascript",
];

fn script_pattern() -> &'static Regex {
    static SCRIPT: OnceLock<Regex> = OnceLock::new();
    SCRIPT.get_or_init(|| {
        Regex::new(r"(?is)(<script\b([^>]*)>)(.*?)(</script\s*>)").expect("literal pattern")
    })
}

fn attr_pattern() -> &'static Regex {
    static ATTR: OnceLock<Regex> = OnceLock::new();
    ATTR.get_or_init(|| {
        Regex::new(r#"(?i)(?:^|\s)(src|type)\s*=\s*["']?([^"'\s>]*)"#).expect("literal pattern")
    })
}

/// How to parse an inline script, or `None` for external and non-JS scripts
fn inline_source_type(attrs: &str) -> Option<SourceType> {
    let mut source_type = SourceType::cjs();
    for caps in attr_pattern().captures_iter(attrs) {
        let value = caps[2].to_ascii_lowercase();
        match caps[1].to_ascii_lowercase().as_str() {
            "src" => return None,
            _ if value == "module" => source_type = SourceType::mjs(),
            _ if value.is_empty() || JS_MIME_TYPES.contains(&value.as_str()) => {}
            _ => return None,
        }
    }
    Some(source_type)
}

fn minify_inline_scripts(html: &str) -> String {
    script_pattern()
        .replace_all(html, |caps: &Captures| {
            let body = &caps[3];
            let Some(source_type) = inline_source_type(&caps[2]) else {
                return caps[0].to_string();
            };
            if body.trim().is_empty() {
                return caps[0].to_string();
            }
            match minify_script(body, source_type, true) {
                Ok(code) => format!("{}{}{}", &caps[1], code, &caps[4]),
                Err(e) => {
                    warn!("Inline script left unminified: {}", e);
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

impl Default for HtmlMinify {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for HtmlMinify {
    fn name(&self) -> &str {
        "htmlmin"
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, TransformError> {
        map_text(self.name(), files, |_, text| {
            let scripted = minify_inline_scripts(text);
            let out = minify_html::minify(scripted.as_bytes(), &self.cfg);
            String::from_utf8(out).map_err(|e| e.to_string())
        })
    }
}

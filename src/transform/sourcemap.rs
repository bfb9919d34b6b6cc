//! Source map capture and emission
//!
//! [`SourceMapInit`] records each file's original source before any other
//! step touches it. [`SourceMapWrite`] turns the capture into a sibling
//! `.map` file and links it from the transformed output. Maps are
//! line-level: output line N points at source line N (clamped to the
//! source length), column 0.

use super::{Transform, TransformError};
use crate::core::fileset::{url_path, FileSet, SourceFile, SourceMapCapture};
use oxc_sourcemap::SourceMapBuilder;
use std::path::PathBuf;

/// Capture original sources
#[derive(Debug, Clone, Default)]
pub struct SourceMapInit;

impl Transform for SourceMapInit {
    fn name(&self) -> &str {
        "sourcemaps.init"
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, TransformError> {
        files
            .into_iter()
            .map(|mut file| {
                let content = file
                    .text()
                    .map_err(|e| TransformError::input(self.name(), &file.path, e))?
                    .to_string();
                file.source_map = Some(SourceMapCapture {
                    source: url_path(&file.path),
                    content,
                });
                Ok(file)
            })
            .collect()
    }
}

/// Emit `<file>.map` beside every captured file
#[derive(Debug, Clone, Default)]
pub struct SourceMapWrite;

impl SourceMapWrite {
    fn build_map(file_name: &str, capture: &SourceMapCapture, output: &str) -> String {
        let mut builder = SourceMapBuilder::default();
        builder.set_file(file_name);
        let source_id = builder.set_source_and_content(&capture.source, &capture.content);

        let last_source_line = capture.content.lines().count().saturating_sub(1) as u32;
        for (line, _) in output.lines().enumerate() {
            let line = line as u32;
            builder.add_token(line, 0, line.min(last_source_line), 0, Some(source_id), None);
        }

        builder.into_sourcemap().to_json_string()
    }

    fn link_comment(file: &SourceFile, map_name: &str) -> String {
        match file.extension() {
            Some("css") => format!("\n/*# sourceMappingURL={} */\n", map_name),
            _ => format!("\n//# sourceMappingURL={}\n", map_name),
        }
    }
}

impl Transform for SourceMapWrite {
    fn name(&self) -> &str {
        "sourcemaps.write"
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, TransformError> {
        let mut out = FileSet::new();

        for mut file in files {
            let Some(capture) = file.source_map.take() else {
                out.push(file);
                continue;
            };

            let file_name = file.file_name().unwrap_or_default().to_string();
            let map_name = format!("{}.map", file_name);

            let output = file
                .text()
                .map_err(|e| TransformError::input(self.name(), &file.path, e))?
                .trim_end()
                .to_string();
            let map = Self::build_map(&file_name, &capture, &output);

            let mut linked = output;
            linked.push_str(&Self::link_comment(&file, &map_name));
            file.contents = linked.into_bytes();

            let mut map_path = PathBuf::from(&file.path);
            map_path.set_file_name(&map_name);
            let map_file = SourceFile::new(map_path, file.origin.clone(), map.into_bytes());

            out.push(file);
            out.push(map_file);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::style::SassCompile;
    use std::fs;
    use tempfile::TempDir;

    fn script(text: &str) -> FileSet {
        let mut files = FileSet::new();
        files.push(SourceFile::new("assets/js/app.js", "/site/assets/js/app.js", text.as_bytes().to_vec()));
        files
    }

    #[test]
    fn test_init_captures_original_source() {
        let out = SourceMapInit.apply(script("let a = 1;\n")).unwrap();
        let capture = out.get("assets/js/app.js").unwrap().source_map.clone().unwrap();
        assert_eq!(capture.source, "/assets/js/app.js");
        assert_eq!(capture.content, "let a = 1;\n");
    }

    #[test]
    fn test_write_emits_sibling_map_and_link() {
        let files = SourceMapInit.apply(script("let a = 1;\nlet b = 2;\n")).unwrap();
        let out = SourceMapWrite.apply(files).unwrap();

        assert_eq!(
            out.paths(),
            vec![PathBuf::from("assets/js/app.js"), PathBuf::from("assets/js/app.js.map")]
        );

        let js = out.get("assets/js/app.js").unwrap();
        assert!(js.source_map.is_none());
        assert!(js.text().unwrap().ends_with("//# sourceMappingURL=app.js.map\n"));

        let map: serde_json::Value =
            serde_json::from_slice(&out.get("assets/js/app.js.map").unwrap().contents).unwrap();
        assert_eq!(map["version"], 3);
        assert_eq!(map["file"], "app.js");
        assert_eq!(map["sources"][0], "/assets/js/app.js");
        assert_eq!(map["sourcesContent"][0], "let a = 1;\nlet b = 2;\n");
    }

    #[test]
    fn test_write_passes_uncaptured_files() {
        let out = SourceMapWrite.apply(script("let a = 1;")).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.get("assets/js/app.js").unwrap().text().unwrap(), "let a = 1;");
    }

    #[test]
    fn test_css_map_survives_sass_compile() {
        let dir = TempDir::new().unwrap();
        let origin = dir.path().join("main.scss");
        fs::write(&origin, ".a { .b { color: red; } }\n").unwrap();

        let mut files = FileSet::new();
        files.push(SourceFile::new("assets/scss/main.scss", &origin, fs::read(&origin).unwrap()));

        let files = SourceMapInit.apply(files).unwrap();
        let files = SassCompile.apply(files).unwrap();
        let out = SourceMapWrite.apply(files).unwrap();

        let css = out.get("assets/scss/main.css").unwrap().text().unwrap();
        assert!(css.ends_with("/*# sourceMappingURL=main.css.map */\n"));
        assert!(out.get("assets/scss/main.css.map").is_some());
    }
}

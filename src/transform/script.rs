//! JavaScript minification

use super::{map_text, Transform, TransformError};
use crate::core::fileset::FileSet;
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;

/// Compress and mangle browser scripts
///
/// Sources are parsed as classic scripts, so top-level names stay global.
#[derive(Debug, Clone, Default)]
pub struct JsMinify;

/// Parse and minify one script, optionally removing `console.*` calls
pub(crate) fn minify_script(source: &str, source_type: SourceType, drop_console: bool) -> Result<String, String> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, source_type).parse();

    if parsed.panicked || !parsed.errors.is_empty() {
        let messages: Vec<String> = parsed.errors.iter().map(|e| e.to_string()).collect();
        return Err(if messages.is_empty() {
            "parser gave up".to_string()
        } else {
            messages.join(", ")
        });
    }

    let options = MinifierOptions {
        compress: Some(CompressOptions {
            drop_console,
            ..CompressOptions::smallest()
        }),
        ..MinifierOptions::default()
    };
    let mut program = parsed.program;
    let minified = Minifier::new(options).minify(&allocator, &mut program);

    let code = Codegen::new()
        .with_options(CodegenOptions::minify())
        .with_scoping(minified.scoping)
        .build(&program)
        .code;
    Ok(code)
}

impl Transform for JsMinify {
    fn name(&self) -> &str {
        "uglify"
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, TransformError> {
        map_text(self.name(), files, |_, text| minify_script(text, SourceType::cjs(), false))
    }
}

//! Image optimization

use super::{Transform, TransformError};
use crate::core::fileset::FileSet;

/// Lossless PNG recompression; other formats pass through untouched
#[derive(Debug, Clone)]
pub struct PngOptimize {
    options: oxipng::Options,
}

impl PngOptimize {
    pub fn new() -> Self {
        Self {
            options: oxipng::Options::from_preset(2),
        }
    }
}

impl Default for PngOptimize {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for PngOptimize {
    fn name(&self) -> &str {
        "imagemin"
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, TransformError> {
        files
            .into_iter()
            .map(|mut file| {
                let is_png = file
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
                if !is_png {
                    return Ok(file);
                }

                let optimized = oxipng::optimize_from_memory(&file.contents, &self.options)
                    .map_err(|e| TransformError::input(self.name(), &file.path, e))?;
                if optimized.len() < file.contents.len() {
                    file.contents = optimized;
                }
                Ok(file)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fileset::SourceFile;
    use std::path::Path;

    /// 1x1 RGBA PNG
    const PIXEL: &[u8] = &[
        0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
        0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0x64,
        0x60, 0xf8, 0x5f, 0x0f, 0x00, 0x02, 0x87, 0x01, 0x80, 0xeb, 0x47, 0xba, 0x92, 0x00, 0x00,
        0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
    ];

    fn image(name: &str, contents: &[u8]) -> FileSet {
        let mut files = FileSet::new();
        files.push(SourceFile::new(name, format!("/site/{}", name), contents.to_vec()));
        files
    }

    #[test]
    fn test_png_stays_valid_and_never_grows() {
        let out = PngOptimize::new().apply(image("assets/img/dot.png", PIXEL)).unwrap();
        let file = out.get("assets/img/dot.png").unwrap();
        assert!(file.contents.starts_with(&PIXEL[..8]));
        assert!(file.contents.len() <= PIXEL.len());
    }

    #[test]
    fn test_other_formats_pass_through() {
        let svg = b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>";
        let out = PngOptimize::new().apply(image("assets/img/logo.svg", svg)).unwrap();
        assert_eq!(out.get("assets/img/logo.svg").unwrap().contents, svg.to_vec());
    }

    #[test]
    fn test_corrupt_png_names_file() {
        let err = PngOptimize::new()
            .apply(image("assets/img/broken.png", b"not a png"))
            .unwrap_err();
        assert_eq!(err.path(), Some(Path::new("assets/img/broken.png")));
    }
}

//! In-process style compilation.
//!
//! Sass sources are compiled to CSS with grass, then lightningcss lowers and
//! prefixes the result for the browsers that run Manifest V3 extensions,
//! prints it minified and writes a sibling source map. The map points into
//! the compiled CSS.

use super::command::source_map_path;
use super::{Transform, TransformError, TransformJob};
use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Encode a browser major version the way lightningcss expects.
const fn version(major: u32) -> Option<u32> {
    Some(major << 16)
}

/// Lowest browser versions with Manifest V3 support.
fn extension_targets() -> Targets {
    Targets::from(Browsers {
        chrome: version(88),
        edge: version(88),
        firefox: version(109),
        opera: version(74),
        safari: version(15),
        ..Browsers::default()
    })
}

/// grass + lightningcss style transform.
#[derive(Debug, Clone, Default)]
pub struct LightningCss {
    /// Extra directories searched by `@use` and `@import`
    load_paths: Vec<PathBuf>,
}

impl LightningCss {
    /// Create the transform.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory to search for imported stylesheets (e.g. `node_modules`).
    pub fn with_load_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.load_paths.push(path.into());
        self
    }

    /// Compile the Sass text of `source_path` to plain CSS.
    ///
    /// Imports resolve against the directory of `source_path`, then the
    /// configured load paths.
    pub fn compile_sass(&self, source_path: &Path, scss: &str) -> Result<String, String> {
        let mut options = grass::Options::default().style(grass::OutputStyle::Expanded);
        if let Some(parent) = source_path.parent() {
            options = options.load_path(parent);
        }
        for path in &self.load_paths {
            options = options.load_path(path);
        }
        grass::from_string(scss.to_string(), &options).map_err(|e| e.to_string())
    }

    /// Compile `scss` read from `source_path`; returns `(css, source_map_json)`.
    pub fn compile(&self, source_path: &Path, scss: &str) -> Result<(String, String), String> {
        let filename = file_name(source_path);
        let compiled = self.compile_sass(source_path, scss)?;

        let mut stylesheet = StyleSheet::parse(
            &compiled,
            ParserOptions { filename: filename.clone(), ..ParserOptions::default() },
        )
        .map_err(|e| e.to_string())?;

        stylesheet
            .minify(MinifyOptions { targets: extension_targets(), ..MinifyOptions::default() })
            .map_err(|e| e.to_string())?;

        let mut source_map = SourceMap::new("/");
        source_map.add_source(&filename);
        source_map.set_source_content(0, &compiled).map_err(|e| format!("{:?}", e))?;

        let result = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                source_map: Some(&mut source_map),
                targets: extension_targets(),
                ..PrinterOptions::default()
            })
            .map_err(|e| e.to_string())?;

        let map = source_map.to_json(None).map_err(|e| format!("{:?}", e))?;
        Ok((result.code, map))
    }
}

impl Transform for LightningCss {
    fn name(&self) -> &str {
        "lightningcss"
    }

    fn transform(&self, job: &TransformJob<'_>) -> Result<Vec<PathBuf>, TransformError> {
        let source = fs::read_to_string(job.source).map_err(|e| TransformError::io(job.source, e))?;

        let (mut css, map) =
            self.compile(job.source, &source).map_err(|msg| TransformError::invalid(job.source, msg))?;

        let map_path = source_map_path(job.dest);
        css.push_str(&format!("\n/*# sourceMappingURL={} */\n", file_name(&map_path)));

        fs::write(job.dest, css).map_err(|e| TransformError::io(job.dest, e))?;
        fs::write(&map_path, map).map_err(|e| TransformError::io(&map_path, e))?;

        Ok(vec![job.dest.to_path_buf(), map_path])
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_compile_minifies() {
        let (css, map) = LightningCss::new()
            .compile(Path::new("main.scss"), ".popup {\n  color: #ff0000;\n  margin: 0px 0px;\n}\n")
            .unwrap();

        assert!(!css.contains('\n'));
        assert!(css.contains(".popup"));
        assert!(map.contains("main.scss"));
    }

    #[test]
    fn test_compile_reports_syntax_error() {
        let styles = LightningCss::new();
        assert!(styles.compile(Path::new("bad.scss"), "..broken { color: red }").is_err());
        assert!(styles.compile(Path::new("bad.scss"), ".a { color: $undefined; }").is_err());
    }

    #[test]
    fn test_compile_sass_variables_partials_and_mixins() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("_vars.scss"),
            "$brand: #f00;\n@mixin pad($size) {\n  padding: $size;\n}\n",
        )
        .unwrap();
        let source = temp.path().join("main.scss");
        let scss = "@use 'vars';\n.a {\n  color: vars.$brand;\n  @include vars.pad(4px);\n  .b { margin: 0; }\n}\n";

        let (css, _map) = LightningCss::new().compile(&source, scss).unwrap();

        assert!(!css.contains('$'), "{}", css);
        assert!(!css.contains("@use"), "{}", css);
        assert!(!css.contains("@include"), "{}", css);
        assert!(css.contains("padding:4px"), "{}", css);
        assert!(css.contains("color:red") || css.contains("color:#f00"), "{}", css);
        assert!(css.contains(".a .b{margin:0}"), "{}", css);
    }

    #[test]
    fn test_compile_sass_imports_from_load_path() {
        let temp = TempDir::new().unwrap();
        let modules = temp.path().join("node_modules");
        fs::create_dir_all(modules.join("theme")).unwrap();
        fs::write(modules.join("theme/_colors.scss"), "$accent: #00f;\n").unwrap();
        let source = temp.path().join("scss/main.scss");
        let scss = "@import 'theme/colors';\n.c { border-color: $accent; }\n";

        assert!(LightningCss::new().compile(&source, scss).is_err());

        let (css, _map) = LightningCss::new().with_load_path(&modules).compile(&source, scss).unwrap();
        assert!(css.contains(".c{border-color:"), "{}", css);
        assert!(!css.contains('$'), "{}", css);
    }

    #[test]
    fn test_transform_writes_css_and_map() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("main.scss");
        fs::write(&source, "body { padding: 0 }").unwrap();
        let dest = temp.path().join("main.min.css");

        let outputs = LightningCss::new()
            .transform(&TransformJob { source: &source, dest: &dest, production: false })
            .unwrap();

        assert_eq!(outputs, vec![dest.clone(), temp.path().join("main.min.css.map")]);
        let css = fs::read_to_string(&dest).unwrap();
        assert!(css.contains("sourceMappingURL=main.min.css.map"));
        assert!(temp.path().join("main.min.css.map").exists());
    }

    #[test]
    fn test_transform_missing_source() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("missing.scss");
        let dest = temp.path().join("missing.min.css");

        let err = LightningCss::new()
            .transform(&TransformJob { source: &source, dest: &dest, production: false })
            .unwrap_err();
        assert!(matches!(err, TransformError::Io { .. }));
        assert!(!dest.exists());
    }
}

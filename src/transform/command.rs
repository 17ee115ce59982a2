//! External command-line collaborators.
//!
//! Each tool runs once per input file with the project root as working
//! directory, so tool-specific config files there (`svgo.config.js`,
//! `.browserslistrc`, ...) are honoured.

use super::{Rasterize, Transform, TransformError, TransformJob};
use crate::config::resolve_path;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// A configured external program.
#[derive(Debug, Clone)]
pub struct CommandTool {
    program: String,
    project_root: PathBuf,
}

impl CommandTool {
    /// Create a tool; `program` is a bare name or a path.
    pub fn new(program: impl Into<String>, project_root: &Path) -> Self {
        Self { program: program.into(), project_root: project_root.to_path_buf() }
    }

    /// Configured program name.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Working directory the tool runs in.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Locate the executable.
    ///
    /// Paths are resolved against the project root. Bare names are looked
    /// up in `node_modules/.bin` first, then on `PATH`.
    pub fn resolve(&self) -> Result<PathBuf, TransformError> {
        let not_found = || TransformError::ToolNotFound { tool: self.program.clone() };
        let program = Path::new(&self.program);

        if program.is_absolute() || program.components().count() > 1 {
            let path = resolve_path(&self.project_root, program);
            return if path.is_file() { Ok(path) } else { Err(not_found()) };
        }

        let local_bin = self.project_root.join("node_modules").join(".bin");
        if let Ok(found) = which::which_in(&self.program, Some(&local_bin), &self.project_root) {
            return Ok(found);
        }
        which::which(&self.program).map_err(|_| not_found())
    }

    /// Run the tool on `input` with the given arguments.
    pub fn run(&self, input: &Path, args: Vec<OsString>) -> Result<(), TransformError> {
        let executable = self.resolve()?;
        tracing::trace!(tool = %self.program, ?args, "running external tool");

        let output = Command::new(&executable)
            .args(&args)
            .current_dir(&self.project_root)
            .output()
            .map_err(|e| TransformError::io(&executable, e))?;

        if !output.status.success() {
            return Err(TransformError::ToolFailed {
                tool: self.program.clone(),
                input: input.display().to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// `path` with `.map` appended to its file name.
pub(crate) fn source_map_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".map");
    path.with_file_name(name)
}

/// Keep only the outputs the tool actually wrote.
fn written(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths.into_iter().filter(|p| p.is_file()).collect()
}

/// Script minification through esbuild (no bundling, browser platform).
#[derive(Debug, Clone)]
pub struct Esbuild {
    tool: CommandTool,
}

impl Esbuild {
    /// Wrap a configured esbuild executable.
    pub fn new(tool: CommandTool) -> Self {
        Self { tool }
    }

    fn args(job: &TransformJob<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            job.source.into(),
            "--platform=browser".into(),
            "--sourcemap".into(),
            "--log-level=error".into(),
        ];
        if job.production {
            args.push("--minify".into());
        } else {
            args.push("--minify-whitespace".into());
            args.push("--minify-syntax".into());
        }
        let mut outfile = OsString::from("--outfile=");
        outfile.push(job.dest);
        args.push(outfile);
        args
    }
}

impl Transform for Esbuild {
    fn name(&self) -> &str {
        "esbuild"
    }

    fn transform(&self, job: &TransformJob<'_>) -> Result<Vec<PathBuf>, TransformError> {
        self.tool.run(job.source, Self::args(job))?;
        Ok(written(vec![job.dest.to_path_buf(), source_map_path(job.dest)]))
    }
}

/// HTML minification through html-minifier-terser.
#[derive(Debug, Clone)]
pub struct HtmlMinifier {
    tool: CommandTool,
}

impl HtmlMinifier {
    /// Wrap a configured html-minifier-terser executable.
    pub fn new(tool: CommandTool) -> Self {
        Self { tool }
    }

    fn args(job: &TransformJob<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            job.source.into(),
            "--output".into(),
            job.dest.into(),
            "--collapse-whitespace".into(),
            "--remove-comments".into(),
            "--remove-redundant-attributes".into(),
            "--use-short-doctype".into(),
            "--sort-attributes".into(),
            "--sort-class-name".into(),
        ];
        if job.production {
            args.extend(["--minify-css", "true", "--minify-js", "true"].map(OsString::from));
        }
        args
    }
}

impl Transform for HtmlMinifier {
    fn name(&self) -> &str {
        "html-minifier-terser"
    }

    fn transform(&self, job: &TransformJob<'_>) -> Result<Vec<PathBuf>, TransformError> {
        self.tool.run(job.source, Self::args(job))?;
        Ok(written(vec![job.dest.to_path_buf()]))
    }
}

/// Config files svgo picks up from the project root on its own.
const SVGO_PROJECT_CONFIGS: &[&str] = &["svgo.config.js", "svgo.config.mjs", "svgo.config.cjs"];

/// Default preset with `removeViewBox` disabled.
const SVGO_DEFAULT_CONFIG: &str = "module.exports = {
  plugins: [
    {
      name: 'preset-default',
      params: { overrides: { removeViewBox: false } },
    },
  ],
};
";

/// SVG optimization through svgo.
///
/// A project `svgo.config.*` wins. Otherwise a generated config that keeps
/// `viewBox` is written under `node_modules/.cache/extpack/` and passed with
/// `--config`.
#[derive(Debug, Clone)]
pub struct Svgo {
    tool: CommandTool,
}

impl Svgo {
    /// Wrap a configured svgo executable.
    pub fn new(tool: CommandTool) -> Self {
        Self { tool }
    }

    /// Config to pass explicitly, or `None` when the project has its own.
    pub fn config_path(&self) -> Result<Option<PathBuf>, TransformError> {
        let root = self.tool.project_root();
        if SVGO_PROJECT_CONFIGS.iter().any(|name| root.join(name).is_file()) {
            return Ok(None);
        }

        let path = root.join("node_modules/.cache/extpack/svgo.config.cjs");
        if fs::read_to_string(&path).ok().as_deref() != Some(SVGO_DEFAULT_CONFIG) {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| TransformError::io(parent, e))?;
            }
            fs::write(&path, SVGO_DEFAULT_CONFIG).map_err(|e| TransformError::io(&path, e))?;
        }
        Ok(Some(path))
    }

    fn args(job: &TransformJob<'_>, config: Option<&Path>) -> Vec<OsString> {
        let mut args: Vec<OsString> =
            vec![job.source.into(), "--quiet".into(), "-o".into(), job.dest.into()];
        if let Some(config) = config {
            args.push("--config".into());
            args.push(config.into());
        }
        args
    }
}

impl Transform for Svgo {
    fn name(&self) -> &str {
        "svgo"
    }

    fn transform(&self, job: &TransformJob<'_>) -> Result<Vec<PathBuf>, TransformError> {
        let config = self.config_path()?;
        self.tool.run(job.source, Self::args(job, config.as_deref()))?;
        Ok(written(vec![job.dest.to_path_buf()]))
    }
}

/// Style compilation through the Dart Sass CLI.
///
/// Writes the compiled CSS and a sibling source map; `node_modules` is on
/// the load path so packages can be imported.
#[derive(Debug, Clone)]
pub struct SassCli {
    tool: CommandTool,
}

impl SassCli {
    /// Wrap a configured sass executable.
    pub fn new(tool: CommandTool) -> Self {
        Self { tool }
    }
}

impl Transform for SassCli {
    fn name(&self) -> &str {
        "sass"
    }

    fn transform(&self, job: &TransformJob<'_>) -> Result<Vec<PathBuf>, TransformError> {
        let style = if job.production { "--style=compressed" } else { "--style=expanded" };
        let args = vec![
            job.source.into(),
            job.dest.into(),
            style.into(),
            "--source-map".into(),
            "--no-error-css".into(),
            "--load-path=node_modules".into(),
        ];
        self.tool.run(job.source, args)?;
        Ok(written(vec![job.dest.to_path_buf(), source_map_path(job.dest)]))
    }
}

/// Icon rasterization through the resvg CLI.
#[derive(Debug, Clone)]
pub struct Resvg {
    tool: CommandTool,
}

impl Resvg {
    /// Wrap a configured resvg executable.
    pub fn new(tool: CommandTool) -> Self {
        Self { tool }
    }
}

impl Rasterize for Resvg {
    fn name(&self) -> &str {
        "resvg"
    }

    fn rasterize(&self, svg: &Path, size: u32, dest: &Path) -> Result<(), TransformError> {
        let side = size.to_string();
        let args = vec![
            "-w".into(),
            side.clone().into(),
            "-h".into(),
            side.into(),
            svg.into(),
            dest.into(),
        ];
        self.tool.run(svg, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_source_map_path() {
        assert_eq!(
            source_map_path(Path::new("/dist/css/main.min.css")),
            PathBuf::from("/dist/css/main.min.css.map")
        );
    }

    #[test]
    fn test_resolve_missing_tool() {
        let temp = TempDir::new().unwrap();
        let tool = CommandTool::new("extpack-definitely-not-installed", temp.path());
        assert!(matches!(tool.resolve(), Err(TransformError::ToolNotFound { .. })));
    }

    #[test]
    fn test_resolve_relative_path_against_root() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("tools")).unwrap();
        std::fs::write(temp.path().join("tools/minify"), "").unwrap();

        let tool = CommandTool::new("tools/minify", temp.path());
        assert_eq!(tool.resolve().unwrap(), temp.path().join("tools/minify"));

        let missing = CommandTool::new("tools/missing", temp.path());
        assert!(missing.resolve().is_err());
    }

    #[test]
    fn test_missing_tool_fails_transform() {
        let temp = TempDir::new().unwrap();
        let esbuild = Esbuild::new(CommandTool::new("extpack-no-esbuild", temp.path()));
        let source = temp.path().join("a.js");
        let dest = temp.path().join("out/a.js");
        let job = TransformJob { source: &source, dest: &dest, production: false };

        let err = esbuild.transform(&job).unwrap_err();
        assert!(matches!(err, TransformError::ToolNotFound { .. }));
    }

    #[test]
    fn test_esbuild_args_production() {
        let job = TransformJob {
            source: Path::new("src/js/a.js"),
            dest: Path::new("dist/js/a.js"),
            production: true,
        };
        let args = Esbuild::args(&job);
        assert!(args.contains(&OsString::from("--minify")));
        assert!(args.contains(&OsString::from("--outfile=dist/js/a.js")));
        assert!(!args.contains(&OsString::from("--bundle")));
    }

    #[test]
    fn test_esbuild_args_development() {
        let job = TransformJob {
            source: Path::new("src/js/a.js"),
            dest: Path::new("dist/js/a.js"),
            production: false,
        };
        let args = Esbuild::args(&job);
        assert!(!args.contains(&OsString::from("--minify")));
        assert!(args.contains(&OsString::from("--sourcemap")));
    }

    #[test]
    fn test_svgo_args_with_config() {
        let job = TransformJob {
            source: Path::new("src/img/logo.svg"),
            dest: Path::new("dist/img/logo.svg"),
            production: false,
        };

        let args = Svgo::args(&job, Some(Path::new("/cache/svgo.config.cjs")));
        assert_eq!(&args[args.len() - 2..], &["--config", "/cache/svgo.config.cjs"].map(OsString::from));

        let args = Svgo::args(&job, None);
        assert!(!args.contains(&OsString::from("--config")));
    }

    #[test]
    fn test_svgo_default_config_keeps_view_box() {
        let temp = TempDir::new().unwrap();
        let svgo = Svgo::new(CommandTool::new("svgo", temp.path()));

        let path = svgo.config_path().unwrap().unwrap();

        assert!(path.starts_with(temp.path().join("node_modules/.cache")));
        let config = std::fs::read_to_string(&path).unwrap();
        assert!(config.contains("preset-default"));
        assert!(config.contains("removeViewBox: false"));
        assert_eq!(svgo.config_path().unwrap(), Some(path));
    }

    #[test]
    fn test_svgo_project_config_wins() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("svgo.config.mjs"), "export default {};").unwrap();
        let svgo = Svgo::new(CommandTool::new("svgo", temp.path()));

        assert_eq!(svgo.config_path().unwrap(), None);
        assert!(!temp.path().join("node_modules").exists());
    }

    #[test]
    fn test_html_minifier_args() {
        let job = TransformJob {
            source: Path::new("src/html/popup.html"),
            dest: Path::new("dist/html/popup.html"),
            production: true,
        };
        let args = HtmlMinifier::args(&job);
        assert_eq!(args[0], OsString::from("src/html/popup.html"));
        assert!(args.contains(&OsString::from("--collapse-whitespace")));
        assert!(args.contains(&OsString::from("--minify-js")));
    }
}

//! Staged artifact directory assembly.
//!
//! Turns bundler output under `dist/` plus the project's source manifest,
//! icon and config markup into the directory layout the platform expects:
//!
//! ```text
//! manifest.json
//! icon.png
//! html/config.html
//! js/{desktop,mobile,config}.js
//! css/{desktop,mobile,config}.css   (only those that exist)
//! ```
//!
//! The staged directory lives in a temporary directory and is removed when
//! the [`StagedDirectory`] is dropped.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use kpdev_schema::{
    BuildMode, ManifestError, PluginManifest, REQUIRED_PARAMS_KEY, Surface, Targets,
};
use regex::Regex;
use serde_json::{Map, Value, json};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info};

use crate::icon;
use crate::paths::ProjectPaths;

/// Markup used when the project has no `src/config/index.html`.
pub const DEFAULT_CONFIG_HTML: &str = "<div id=\"config-root\"></div>\n";

const CONFIG_HTML_PATH: &str = "html/config.html";
const CONFIG_SCRIPT_PATH: &str = "js/config.js";
const CONFIG_STYLE_PATH: &str = "css/config.css";
const ICON_PATH: &str = "icon.png";

const FALLBACK_STEM: &str = "plugin";
const FALLBACK_VERSION: &str = "1.0.0";

static NON_ALNUM_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9]+").expect("literal regex"));

static UNSAFE_VERSION_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-zA-Z0-9.+-]+|\.{2,}").expect("literal regex")
});

#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("Source manifest not found: {}", .0.display())]
    ManifestNotFound(PathBuf),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Bundle output missing: {} (run the bundler first)", .0.display())]
    MissingBundle(PathBuf),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode default icon: {0}")]
    Icon(#[from] png::EncodingError),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> AssembleError + '_ {
    move |source| AssembleError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Files produced by the bundler for one build.
#[derive(Debug, Clone)]
pub struct BundleOutputs {
    /// Main (record screen) script.
    pub main_js: PathBuf,
    /// Main stylesheet, if the bundler emitted one.
    pub main_css: Option<PathBuf>,
    /// Config screen script.
    pub config_js: PathBuf,
    /// Config screen stylesheet, if any.
    pub config_css: Option<PathBuf>,
}

impl BundleOutputs {
    /// Locate bundler output in `dist`: `main.js`, `config.js` and the
    /// optional `main.css` / `config.css`.
    pub fn from_dist(dist: &Path) -> Self {
        let optional = |name: &str| Some(dist.join(name)).filter(|p| p.is_file());
        Self {
            main_js: dist.join("main.js"),
            main_css: optional("main.css"),
            config_js: dist.join("config.js"),
            config_css: optional("config.css"),
        }
    }
}

/// Which optional stylesheets made it into the staged directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StylePresence {
    pub main: bool,
    pub config: bool,
}

/// A staged artifact directory ready for signing.
#[derive(Debug)]
pub struct StagedDirectory {
    dir: TempDir,
    manifest: PluginManifest,
    output_name: String,
}

impl StagedDirectory {
    /// Root of the staged tree.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The manifest written into the tree.
    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    /// File name the signed package should get.
    pub fn output_name(&self) -> &str {
        &self.output_name
    }
}

/// Lays out a staged directory for one project.
#[derive(Debug, Clone)]
pub struct ArtifactAssembler<'a> {
    paths: &'a ProjectPaths,
    targets: Targets,
    mode: BuildMode,
}

impl<'a> ArtifactAssembler<'a> {
    pub fn new(paths: &'a ProjectPaths, targets: Targets, mode: BuildMode) -> Self {
        Self {
            paths,
            targets,
            mode,
        }
    }

    /// Load and validate the project's source manifest.
    pub fn load_source_manifest(&self) -> Result<PluginManifest, AssembleError> {
        let path = self.paths.source_manifest();
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AssembleError::ManifestNotFound(path));
            }
            Err(source) => return Err(AssembleError::Io { path, source }),
        };
        let manifest = PluginManifest::from_json(&text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Build the staged directory from `bundles`.
    ///
    /// The manifest is validated before anything is copied.
    pub fn assemble(&self, bundles: &BundleOutputs) -> Result<StagedDirectory, AssembleError> {
        let source = self.load_source_manifest()?;
        let output_name = output_file_name(&source, self.mode);

        for required in [&bundles.main_js, &bundles.config_js] {
            if !required.is_file() {
                return Err(AssembleError::MissingBundle(required.clone()));
            }
        }

        let dist = self.paths.dist_dir();
        std::fs::create_dir_all(&dist).map_err(io_err(&dist))?;
        let dir = tempfile::Builder::new()
            .prefix(".kpdev-stage-")
            .tempdir_in(&dist)
            .map_err(io_err(&dist))?;
        let root = dir.path();

        for surface in self.targets.enabled() {
            copy_into(&bundles.main_js, root, surface.script_path())?;
            if let Some(css) = &bundles.main_css {
                copy_into(css, root, surface.style_path())?;
            }
        }
        copy_into(&bundles.config_js, root, CONFIG_SCRIPT_PATH)?;
        if let Some(css) = &bundles.config_css {
            copy_into(css, root, CONFIG_STYLE_PATH)?;
        }

        self.stage_config_html(root)?;

        let icon_src = self.paths.icon();
        icon::ensure_icon(&icon_src)?;
        copy_into(&icon_src, root, ICON_PATH)?;

        let styles = StylePresence {
            main: bundles.main_css.is_some(),
            config: bundles.config_css.is_some(),
        };
        let manifest = build_manifest(source, self.targets, self.mode, styles)?;
        let manifest_path = root.join("manifest.json");
        std::fs::write(&manifest_path, manifest.to_canonical_json()?)
            .map_err(io_err(&manifest_path))?;

        info!(
            dir = %root.display(),
            mode = %self.mode,
            output = %output_name,
            "staged artifact directory"
        );

        Ok(StagedDirectory {
            dir,
            manifest,
            output_name,
        })
    }

    fn stage_config_html(&self, root: &Path) -> Result<(), AssembleError> {
        let src = self.paths.config_html();
        let markup = match std::fs::read(&src) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %src.display(), "no config markup, using default");
                DEFAULT_CONFIG_HTML.as_bytes().to_vec()
            }
            Err(source) => return Err(AssembleError::Io { path: src, source }),
        };
        let dst = root.join(CONFIG_HTML_PATH);
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        std::fs::write(&dst, markup).map_err(io_err(&dst))
    }
}

fn copy_into(src: &Path, root: &Path, rel: &str) -> Result<(), AssembleError> {
    let dst = root.join(rel);
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    std::fs::copy(src, &dst).map_err(io_err(src))?;
    Ok(())
}

/// Derive the staged manifest from the project's source manifest.
///
/// Surface sections are rebuilt from `targets`; disabled surfaces are
/// removed. The `config` section is rebuilt too, carrying over any
/// `required_params` it had (or, for older projects, a top-level
/// `required_params`).
pub fn build_manifest(
    mut manifest: PluginManifest,
    targets: Targets,
    mode: BuildMode,
    styles: StylePresence,
) -> Result<PluginManifest, ManifestError> {
    manifest.validate()?;

    if mode == BuildMode::PreRelease {
        apply_prerelease_names(&mut manifest);
    }

    manifest.insert("icon", json!(ICON_PATH));

    let enabled = targets.enabled();
    for surface in Surface::ALL {
        if enabled.contains(&surface) {
            let mut section = Map::new();
            section.insert("js".into(), json!([surface.script_path()]));
            if styles.main {
                section.insert("css".into(), json!([surface.style_path()]));
            }
            manifest.insert(surface.key(), Value::Object(section));
        } else {
            manifest.remove(surface.key());
        }
    }

    let legacy_params = manifest.remove(REQUIRED_PARAMS_KEY);
    let required_params = manifest
        .get("config")
        .and_then(|c| c.get(REQUIRED_PARAMS_KEY))
        .cloned()
        .or(legacy_params)
        .filter(|v| !v.is_null());

    let mut config = Map::new();
    config.insert("html".into(), json!(CONFIG_HTML_PATH));
    config.insert("js".into(), json!([CONFIG_SCRIPT_PATH]));
    if styles.config {
        config.insert("css".into(), json!([CONFIG_STYLE_PATH]));
    }
    if let Some(params) = required_params {
        config.insert(REQUIRED_PARAMS_KEY.into(), params);
    }
    manifest.insert("config", Value::Object(config));

    Ok(manifest)
}

/// Prefix the Japanese and English display names with an environment
/// marker. Other languages are left alone.
pub fn apply_prerelease_names(manifest: &mut PluginManifest) {
    let Some(names) = manifest.names_mut() else {
        return;
    };
    for (lang, marker) in [("ja", "[開発] "), ("en", "[DEV] ")] {
        let Some(Value::String(name)) = names.get_mut(lang) else {
            continue;
        };
        if !name.starts_with(marker) {
            *name = format!("{marker}{name}");
        }
    }
}

/// `<sanitized english name>-<prod|pre>-v<version>.zip`
pub fn output_file_name(manifest: &PluginManifest, mode: BuildMode) -> String {
    let stem = sanitize_file_stem(manifest.localized_name("en").unwrap_or(FALLBACK_STEM));
    let version = manifest
        .version()
        .map_or_else(|| FALLBACK_VERSION.to_string(), |v| sanitize_version(&v));
    format!("{stem}-{}-v{version}.zip", mode.label())
}

/// Keep `[A-Za-z0-9.+-]` and map anything else to `_`. Leading and
/// trailing dots are dropped so the result never names a parent directory.
fn sanitize_version(version: &str) -> String {
    let replaced = UNSAFE_VERSION_RUN.replace_all(version, "_");
    let trimmed = replaced.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        FALLBACK_VERSION.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Replace runs of non-alphanumerics with `_` and trim `_` from both ends.
pub fn sanitize_file_stem(name: &str) -> String {
    let replaced = NON_ALNUM_RUN.replace_all(name, "_");
    let trimmed = replaced.trim_matches('_');
    if trimmed.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source_manifest() -> PluginManifest {
        PluginManifest::from_json(
            r#"{
                "manifest_version": 1,
                "version": "1.2.0",
                "type": "APP",
                "name": {"ja": "サンプル", "en": "Sample Plugin!"},
                "description": {"en": "demo"},
                "icon": "image/icon.png"
            }"#,
        )
        .unwrap()
    }

    fn project() -> (TempDir, ProjectPaths) {
        let dir = TempDir::new().unwrap();
        let paths = ProjectPaths::new(dir.path());
        std::fs::create_dir_all(paths.config_dir()).unwrap();
        std::fs::write(
            paths.source_manifest(),
            serde_json::to_string(&Value::from(source_manifest())).unwrap(),
        )
        .unwrap();
        let dist = paths.dist_dir();
        std::fs::create_dir_all(&dist).unwrap();
        std::fs::write(dist.join("main.js"), "main()").unwrap();
        std::fs::write(dist.join("config.js"), "config()").unwrap();
        (dir, paths)
    }

    fn staged_names(staged: &StagedDirectory) -> Vec<String> {
        crate::package::ArtifactListing::scan(staged.path())
            .unwrap()
            .names()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn test_desktop_only_layout() {
        let (_tmp, paths) = project();
        let assembler = ArtifactAssembler::new(&paths, Targets::default(), BuildMode::Production);
        let staged = assembler
            .assemble(&BundleOutputs::from_dist(&paths.dist_dir()))
            .unwrap();

        assert_eq!(
            staged_names(&staged),
            vec![
                "html/config.html",
                "icon.png",
                "js/config.js",
                "js/desktop.js",
                "manifest.json"
            ]
        );
        let html = std::fs::read_to_string(staged.path().join("html/config.html")).unwrap();
        assert_eq!(html, DEFAULT_CONFIG_HTML);
        assert!(paths.icon().exists(), "default icon written to project root");
        assert_eq!(staged.output_name(), "Sample_Plugin-prod-v1.2.0.zip");
    }

    #[test]
    fn test_both_surfaces_with_styles() {
        let (_tmp, paths) = project();
        let dist = paths.dist_dir();
        std::fs::write(dist.join("main.css"), "a{}").unwrap();
        std::fs::write(dist.join("config.css"), "b{}").unwrap();
        std::fs::create_dir_all(paths.root().join("src/config")).unwrap();
        std::fs::write(paths.config_html(), "<form></form>").unwrap();

        let targets = Targets {
            desktop: true,
            mobile: true,
        };
        let staged = ArtifactAssembler::new(&paths, targets, BuildMode::Production)
            .assemble(&BundleOutputs::from_dist(&dist))
            .unwrap();

        let names = staged_names(&staged);
        for expected in [
            "css/config.css",
            "css/desktop.css",
            "css/mobile.css",
            "js/mobile.js",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
        let m = staged.manifest();
        assert_eq!(m.get("mobile").unwrap()["css"], json!(["css/mobile.css"]));
        assert_eq!(m.get("config").unwrap()["css"], json!(["css/config.css"]));
        let html = std::fs::read_to_string(staged.path().join("html/config.html")).unwrap();
        assert_eq!(html, "<form></form>");
    }

    #[test]
    fn test_staged_directory_is_removed_on_drop() {
        let (_tmp, paths) = project();
        let staged = ArtifactAssembler::new(&paths, Targets::default(), BuildMode::Production)
            .assemble(&BundleOutputs::from_dist(&paths.dist_dir()))
            .unwrap();
        let dir = staged.path().to_path_buf();
        assert!(dir.is_dir());
        drop(staged);
        assert!(!dir.exists());
    }

    #[test]
    fn test_missing_bundle_is_reported() {
        let (_tmp, paths) = project();
        std::fs::remove_file(paths.dist_dir().join("config.js")).unwrap();
        let err = ArtifactAssembler::new(&paths, Targets::default(), BuildMode::Production)
            .assemble(&BundleOutputs::from_dist(&paths.dist_dir()))
            .unwrap_err();
        assert!(matches!(err, AssembleError::MissingBundle(_)));
    }

    #[test]
    fn test_invalid_manifest_fails_before_staging() {
        let (_tmp, paths) = project();
        std::fs::write(paths.source_manifest(), r#"{"name": {"en": "x"}}"#).unwrap();
        let err = ArtifactAssembler::new(&paths, Targets::default(), BuildMode::Production)
            .assemble(&BundleOutputs::from_dist(&paths.dist_dir()))
            .unwrap_err();
        assert!(matches!(
            err,
            AssembleError::Manifest(ManifestError::MissingField("version"))
        ));
        let leftovers = std::fs::read_dir(paths.dist_dir())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with(".kpdev-stage-")
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_manifest_sections_follow_targets() {
        let mut src = source_manifest();
        src.insert("mobile", json!({"js": ["old.js"]}));
        let targets = Targets {
            desktop: true,
            mobile: false,
        };
        let m = build_manifest(src, targets, BuildMode::Production, StylePresence::default())
            .unwrap();

        assert_eq!(m.get("desktop").unwrap(), &json!({"js": ["js/desktop.js"]}));
        assert!(!m.contains("mobile"));
        assert_eq!(
            m.get("config").unwrap(),
            &json!({"html": "html/config.html", "js": ["js/config.js"]})
        );
        assert_eq!(m.get("icon").unwrap(), "icon.png");
    }

    #[test]
    fn test_required_params_survive_rebuild() {
        let mut src = source_manifest();
        src.insert(
            "config",
            json!({"html": "x.html", "required_params": ["token"]}),
        );
        let m = build_manifest(
            src,
            Targets::default(),
            BuildMode::Production,
            StylePresence::default(),
        )
        .unwrap();
        assert_eq!(m.get("config").unwrap()["required_params"], json!(["token"]));
        assert_eq!(m.get("config").unwrap()["html"], "html/config.html");
    }

    #[test]
    fn test_top_level_required_params_migrate_into_config() {
        let mut src = source_manifest();
        src.insert("required_params", json!(["apiKey"]));
        let m = build_manifest(
            src,
            Targets::default(),
            BuildMode::Production,
            StylePresence::default(),
        )
        .unwrap();
        assert!(!m.contains("required_params"));
        assert_eq!(m.get("config").unwrap()["required_params"], json!(["apiKey"]));
    }

    #[test]
    fn test_config_params_win_over_legacy_top_level() {
        let mut src = source_manifest();
        src.insert("required_params", json!(["legacy"]));
        src.insert("config", json!({"required_params": ["current"]}));
        let m = build_manifest(
            src,
            Targets::default(),
            BuildMode::Production,
            StylePresence::default(),
        )
        .unwrap();
        assert!(!m.contains("required_params"));
        assert_eq!(m.get("config").unwrap()["required_params"], json!(["current"]));
    }

    #[test]
    fn test_prerelease_prefixes_japanese_and_english_only() {
        let mut src = source_manifest();
        src.names_mut()
            .unwrap()
            .insert("zh".into(), json!("样本"));
        let m = build_manifest(
            src,
            Targets::default(),
            BuildMode::PreRelease,
            StylePresence::default(),
        )
        .unwrap();

        assert_eq!(m.localized_name("ja"), Some("[開発] サンプル"));
        assert_eq!(m.localized_name("en"), Some("[DEV] Sample Plugin!"));
        assert_eq!(m.localized_name("zh"), Some("样本"));
    }

    #[test]
    fn test_production_names_untouched() {
        let m = build_manifest(
            source_manifest(),
            Targets::default(),
            BuildMode::Production,
            StylePresence::default(),
        )
        .unwrap();
        assert_eq!(m.localized_name("en"), Some("Sample Plugin!"));
    }

    #[test]
    fn test_output_names() {
        let m = source_manifest();
        assert_eq!(
            output_file_name(&m, BuildMode::PreRelease),
            "Sample_Plugin-pre-v1.2.0.zip"
        );

        let bare = PluginManifest::from_json(r#"{"version": 3, "name": {"ja": "名前"}}"#).unwrap();
        assert_eq!(
            output_file_name(&bare, BuildMode::Production),
            "plugin-prod-v3.zip"
        );
    }

    #[test]
    fn test_sanitize_rules() {
        assert_eq!(sanitize_file_stem("My  Cool--Plugin"), "My_Cool_Plugin");
        assert_eq!(sanitize_file_stem("__x__"), "x");
        assert_eq!(sanitize_file_stem("!!!"), "plugin");
        assert_eq!(sanitize_file_stem("日本語"), "plugin");
        assert_eq!(sanitize_file_stem("v2.0 beta"), "v2_0_beta");
    }

    #[test]
    fn test_version_cannot_escape_dist() {
        let mut m = source_manifest();
        m.insert("version", json!("../../etc/1.0"));
        let name = output_file_name(&m, BuildMode::Production);
        assert!(!name.contains('/'), "{name}");
        assert!(!name.contains(".."), "{name}");
        assert_eq!(name, "Sample_Plugin-prod-vetc_1.0.zip");

        m.insert("version", json!("2.0.0-rc.1+build"));
        assert_eq!(
            output_file_name(&m, BuildMode::Production),
            "Sample_Plugin-prod-v2.0.0-rc.1+build.zip"
        );

        m.insert("version", json!(".."));
        assert_eq!(
            output_file_name(&m, BuildMode::PreRelease),
            "Sample_Plugin-pre-v1.0.0.zip"
        );
    }
}

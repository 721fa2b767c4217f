use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which device surfaces a package ships entry points for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Targets {
    /// Ship `js/desktop.js` (and `css/desktop.css` when styled).
    #[serde(default = "default_true")]
    pub desktop: bool,
    /// Ship `js/mobile.js` (and `css/mobile.css` when styled).
    #[serde(default)]
    pub mobile: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            desktop: true,
            mobile: false,
        }
    }
}

impl Targets {
    /// Enabled surfaces in manifest order.
    pub fn enabled(&self) -> Vec<Surface> {
        Surface::ALL
            .into_iter()
            .filter(|s| match s {
                Surface::Desktop => self.desktop,
                Surface::Mobile => self.mobile,
            })
            .collect()
    }
}

/// A device context with its own script/stylesheet entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    /// Desktop browser.
    Desktop,
    /// Mobile browser or app.
    Mobile,
}

impl Surface {
    /// Every surface, in manifest order.
    pub const ALL: [Surface; 2] = [Surface::Desktop, Surface::Mobile];

    /// Manifest section key (`desktop` / `mobile`).
    pub fn key(self) -> &'static str {
        match self {
            Surface::Desktop => "desktop",
            Surface::Mobile => "mobile",
        }
    }

    /// Script path inside the package.
    pub fn script_path(self) -> &'static str {
        match self {
            Surface::Desktop => "js/desktop.js",
            Surface::Mobile => "js/mobile.js",
        }
    }

    /// Stylesheet path inside the package.
    pub fn style_path(self) -> &'static str {
        match self {
            Surface::Desktop => "css/desktop.css",
            Surface::Mobile => "css/mobile.css",
        }
    }
}

/// Lifecycle stage; each stage has its own key pair and plugin identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleStage {
    /// Local development and pre-release builds.
    Development,
    /// Released packages.
    Production,
}

impl LifecycleStage {
    /// Both stages, development first.
    pub const ALL: [LifecycleStage; 2] = [LifecycleStage::Development, LifecycleStage::Production];

    /// Short label used in file names and output.
    pub fn label(self) -> &'static str {
        match self {
            LifecycleStage::Development => "dev",
            LifecycleStage::Production => "prod",
        }
    }
}

impl std::fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Build flavour.
///
/// Production builds are minified with diagnostics stripped; pre-release
/// builds keep both and carry an environment marker in the display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BuildMode {
    /// Minified release build signed with the production key.
    #[default]
    Production,
    /// Unminified build signed with the development key.
    PreRelease,
}

impl BuildMode {
    /// Key stage used to sign this build.
    pub fn stage(self) -> LifecycleStage {
        match self {
            BuildMode::Production => LifecycleStage::Production,
            BuildMode::PreRelease => LifecycleStage::Development,
        }
    }

    /// Whether the bundler should minify.
    pub fn minify(self) -> bool {
        matches!(self, BuildMode::Production)
    }

    /// Whether the bundler should strip `console.*` calls.
    pub fn drop_console(self) -> bool {
        matches!(self, BuildMode::Production)
    }

    /// Label used in output file names (`prod` / `pre`).
    pub fn label(self) -> &'static str {
        match self {
            BuildMode::Production => "prod",
            BuildMode::PreRelease => "pre",
        }
    }
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BuildMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prod" | "production" => Ok(BuildMode::Production),
            "pre" | "pre-release" | "prerelease" => Ok(BuildMode::PreRelease),
            other => Err(format!("Invalid build mode '{other}' (expected 'prod' or 'pre')")),
        }
    }
}

/// Username/password pair for a remote environment.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Login name.
    #[serde(default)]
    pub username: String,
    /// Password; never printed.
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    /// Build a credential pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Both halves are filled in.
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A named remote environment a package can be installed into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTarget {
    /// Display name (e.g. `production`, `staging-eu`).
    pub name: String,
    /// Host name, or a full `http(s)://` base URL.
    pub domain: String,
    /// Credentials, if any were configured.
    pub credentials: Option<Credentials>,
}

impl DeployTarget {
    /// Create a target.
    pub fn new(
        name: impl Into<String>,
        domain: impl Into<String>,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            credentials,
        }
    }

    /// Base URL for API calls. Bare host names are assumed to speak HTTPS.
    pub fn base_url(&self) -> String {
        let domain = self.domain.trim().trim_end_matches('/');
        if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        }
    }
}

/// Opaque handle returned by the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadToken(String);

impl UploadToken {
    /// Wrap a token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Return the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Version reported by the remote platform. Numeric on current servers, but
/// older ones answer with a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteVersion {
    /// Numeric revision.
    Number(u64),
    /// Free-form version text.
    Text(String),
}

impl std::fmt::Display for RemoteVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteVersion::Number(n) => write!(f, "{n}"),
            RemoteVersion::Text(s) => f.write_str(s),
        }
    }
}

/// Result of a successful import on the remote platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedPlugin {
    /// Plugin id assigned (or recognized) by the remote.
    pub id: String,
    /// Installed version.
    pub version: RemoteVersion,
}

/// An installed plugin as listed by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPlugin {
    /// Plugin id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Installed version.
    #[serde(default)]
    pub version: String,
}

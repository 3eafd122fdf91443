//! Run Context - substitution values for one harness invocation

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::template::Bindings;
use crate::{Error, Result};

/// Placeholder bound to the camera name.
pub const CAM: &str = "cam";
/// Placeholder bound to the output root.
pub const ROOT: &str = "root";

// Characters that would let a substituted value escape into the shell command.
const SHELL_METACHARACTERS: &[char] = &['"', '\'', '`', '$', '\\', ';', '&', '|', '<', '>'];

/// Concrete substitution values for a run: camera name, output root and any
/// extra named variables.
///
/// Created once per invocation and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    cam: String,
    root: PathBuf,
    root_text: String,
    vars: BTreeMap<String, String>,
}

impl RunContext {
    /// Create a context with only the camera and output root bound.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the camera name is empty, or if the
    /// camera name or root contains shell metacharacters or control
    /// characters. The root must not contain whitespace either, since it is
    /// substituted unquoted.
    pub fn new(cam: impl Into<String>, root: impl Into<PathBuf>) -> Result<Self> {
        Self::builder(cam, root).build()
    }

    /// Create a builder for a context with extra variables.
    #[must_use]
    pub fn builder(cam: impl Into<String>, root: impl Into<PathBuf>) -> RunContextBuilder {
        RunContextBuilder::new(cam, root)
    }

    /// Camera name.
    #[must_use]
    pub fn cam(&self) -> &str {
        &self.cam
    }

    /// Output root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Extra variables (everything except `cam` and `root`).
    #[must_use]
    pub const fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// Resolve a rendered relative path against the output root.
    ///
    /// Absolute paths are returned unchanged.
    #[must_use]
    pub fn resolve(&self, rendered: &str) -> PathBuf {
        self.root.join(rendered)
    }
}

impl Bindings for RunContext {
    fn lookup(&self, key: &str) -> Option<&str> {
        match key {
            CAM => Some(&self.cam),
            ROOT => Some(&self.root_text),
            other => self.vars.get(other).map(String::as_str),
        }
    }
}

/// Builder for `RunContext`.
#[derive(Debug)]
pub struct RunContextBuilder {
    cam: String,
    root: PathBuf,
    vars: BTreeMap<String, String>,
}

impl RunContextBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(cam: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            cam: cam.into(),
            root: root.into(),
            vars: BTreeMap::new(),
        }
    }

    /// Bind an extra named placeholder.
    #[must_use]
    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Bind several extra named placeholders.
    #[must_use]
    pub fn vars<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.vars
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Validate and build the `RunContext`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unsafe camera name, root or
    /// variable value, a reserved variable key, or a variable key that is not
    /// a placeholder name.
    pub fn build(self) -> Result<RunContext> {
        if self.cam.trim().is_empty() {
            return Err(Error::InvalidInput("camera name must not be empty".into()));
        }
        check_shell_safe("camera name", &self.cam)?;
        let root_text = self.root.to_string_lossy().into_owned();
        check_shell_safe("output root", &root_text)?;
        if let Some(bad) = root_text.chars().find(|c| c.is_whitespace()) {
            return Err(Error::InvalidInput(format!(
                "output root {root_text:?} contains whitespace {bad:?}"
            )));
        }
        for (key, value) in &self.vars {
            if key == CAM || key == ROOT {
                return Err(Error::InvalidInput(format!(
                    "'{key}' is reserved; set it with the dedicated option"
                )));
            }
            if key.is_empty() || !key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
                return Err(Error::InvalidInput(format!(
                    "variable name '{key}' must be ASCII alphanumerics or '_'"
                )));
            }
            check_shell_safe(&format!("variable '{key}'"), value)?;
        }
        Ok(RunContext {
            cam: self.cam,
            root: self.root,
            root_text,
            vars: self.vars,
        })
    }
}

fn check_shell_safe(what: &str, value: &str) -> Result<()> {
    if let Some(bad) = value
        .chars()
        .find(|c| c.is_control() || SHELL_METACHARACTERS.contains(c))
    {
        return Err(Error::InvalidInput(format!(
            "{what} {value:?} contains forbidden character {bad:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_reserved_and_extra() {
        let ctx = RunContext::builder("Nikon D90", "/tmp/exp1")
            .var("epochs", "100")
            .build()
            .unwrap();
        assert_eq!(ctx.lookup("cam"), Some("Nikon D90"));
        assert_eq!(ctx.lookup("root"), Some("/tmp/exp1"));
        assert_eq!(ctx.lookup("epochs"), Some("100"));
        assert_eq!(ctx.lookup("missing"), None);
    }

    #[test]
    fn test_rejects_shell_metacharacters() {
        assert!(RunContext::new("D90\"; rm -rf /", "/tmp").is_err());
        assert!(RunContext::new("$(id)", "/tmp").is_err());
        assert!(RunContext::new("line\nbreak", "/tmp").is_err());
        assert!(RunContext::new("  ", "/tmp").is_err());
        assert!(RunContext::new("Canon EOS 5D", "/tmp").is_ok());
    }

    #[test]
    fn test_rejects_unsafe_root() {
        for root in [
            "/tmp/a; touch /tmp/pwned #",
            "/tmp/$(id)",
            "/tmp/a|b",
            "/tmp/with space",
            "/tmp/tab\there",
        ] {
            assert!(
                matches!(RunContext::new("D90", root), Err(Error::InvalidInput(_))),
                "accepted root {root:?}"
            );
        }
        assert!(RunContext::new("D90", "./data/harness").is_ok());
    }

    #[test]
    fn test_rejects_unsafe_var_values() {
        for value in ["1; rm -rf /", "`id`", "a&b", "x > y", "multi\nline"] {
            let built = RunContext::builder("D90", "/tmp").var("epochs", value).build();
            assert!(
                matches!(built, Err(Error::InvalidInput(_))),
                "accepted var value {value:?}"
            );
        }
        assert!(RunContext::builder("D90", "/tmp")
            .var("split", "20:20:1")
            .build()
            .is_ok());
    }

    #[test]
    fn test_rejects_reserved_var() {
        let err = RunContext::builder("D90", "/tmp").var("root", "/x").build();
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_resolve_joins_root() {
        let ctx = RunContext::new("D90", "/tmp/exp1").unwrap();
        assert_eq!(ctx.resolve("a/b.json"), PathBuf::from("/tmp/exp1/a/b.json"));
        assert_eq!(ctx.resolve("/abs/c.json"), PathBuf::from("/abs/c.json"));
    }
}

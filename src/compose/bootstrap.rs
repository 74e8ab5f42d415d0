//! First-boot script for the tenant's Windows instance.

use crate::error::{AcustackError, Result};
use crate::shared::logging;
use std::path::{Path, PathBuf};

pub const SECRET_NAME_TOKEN: &str = "{SECRET_NAME}";
pub const SSM_NAME_TOKEN: &str = "{SSM_NAME}";

const BUNDLED_SCRIPT: &str = include_str!("../../assets/user-data.ps1");

/// Script text with substitution tokens, treated as opaque otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct UserDataTemplate {
    source: String,
    origin: Option<PathBuf>,
}

impl UserDataTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            origin: None,
        }
    }

    /// The script shipped with this crate.
    pub fn bundled() -> Self {
        Self::new(BUNDLED_SCRIPT)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source =
            std::fs::read_to_string(path).map_err(|source| AcustackError::UserDataRead {
                path: path.to_path_buf(),
                source,
            })?;
        logging::debug(&format!("Loaded user data template from {}", path.display()));
        Ok(Self {
            source,
            origin: Some(path.to_path_buf()),
        })
    }

    /// Use `path` when given, the bundled script otherwise.
    pub fn load_or_bundled(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::bundled()),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    /// Replace every token occurrence verbatim.
    pub fn render(&self, secret_name: &str, parameter_name: &str) -> String {
        for token in [SECRET_NAME_TOKEN, SSM_NAME_TOKEN] {
            if !self.source.contains(token) {
                logging::warn(&format!(
                    "User data template{} does not contain {}",
                    self.origin
                        .as_ref()
                        .map(|p| format!(" {}", p.display()))
                        .unwrap_or_default(),
                    token
                ));
            }
        }

        self.source
            .replace(SECRET_NAME_TOKEN, secret_name)
            .replace(SSM_NAME_TOKEN, parameter_name)
    }
}

/// Wrap a PowerShell script for EC2Launch.
pub fn for_windows(script: &str) -> String {
    format!("<powershell>\n{}\n</powershell>", script.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_render_replaces_all_occurrences() {
        let template = UserDataTemplate::new(
            "$a = \"{SECRET_NAME}\"\n$b = \"{SSM_NAME}\"\nWrite-Host {SECRET_NAME} {SSM_NAME}\n",
        );
        let rendered = template.render("acme-db-secret", "acme-erp-param");

        assert!(!rendered.contains(SECRET_NAME_TOKEN));
        assert!(!rendered.contains(SSM_NAME_TOKEN));
        assert_eq!(rendered.matches("acme-db-secret").count(), 2);
        assert_eq!(rendered.matches("acme-erp-param").count(), 2);
    }

    #[test]
    fn test_bundled_script_has_both_tokens() {
        let bundled = UserDataTemplate::bundled();
        assert!(bundled.source().contains(SECRET_NAME_TOKEN));
        assert!(bundled.source().contains(SSM_NAME_TOKEN));
        assert!(bundled.origin().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("user-data.ps1");
        std::fs::write(&path, "Write-Host {SSM_NAME}").unwrap();

        let template = UserDataTemplate::load_or_bundled(Some(&path)).unwrap();
        assert_eq!(template.origin(), Some(path.as_path()));
        assert_eq!(template.render("s", "p"), "Write-Host p");
    }

    #[test]
    fn test_load_missing_file() {
        let err = UserDataTemplate::load(Path::new("/nonexistent/user-data.ps1")).unwrap_err();
        assert!(matches!(err, AcustackError::UserDataRead { .. }));
    }

    #[test]
    fn test_for_windows() {
        assert_eq!(
            for_windows("Write-Host hi\n\n"),
            "<powershell>\nWrite-Host hi\n</powershell>"
        );
    }
}

//! Configuration for a signing session.
//!
//! All tunables live in [`SessionConfig`], built via its
//! [`SessionConfigBuilder`]. Setters clamp obviously wrong input; `build()`
//! rejects what cannot be clamped (empty URLs, non-positive reference width).

use crate::error::SignError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Upload size limit for signature images: 5 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// MIME types accepted by the upload capture mode.
pub const ACCEPTED_IMAGE_MIMES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];

/// Configuration for a [`crate::SigningSession`].
///
/// # Example
/// ```rust
/// use docsign::SessionConfig;
///
/// let config = SessionConfig::builder()
///     .api_base_url("https://sign.example.com/api")
///     .submit_timeout_secs(20)
///     .build()
///     .unwrap();
/// assert_eq!(config.submit_timeout_secs, 20);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Base URL of the JSON API. Default: `http://localhost:5000/api`.
    pub api_base_url: String,

    /// Base URL that serves stored files. Default: `http://localhost:5000`.
    pub file_base_url: String,

    /// Storage-root prefix every canonical file path starts with. Default: `uploads`.
    pub storage_root: String,

    /// Width the viewer is asked to render pages at. Default: 612.
    ///
    /// The viewport scale is `rendered_width / reference_width`; placements
    /// are authored against that scale.
    pub reference_width: f64,

    /// Deadline for the completion request, in seconds. Default: 30.
    pub submit_timeout_secs: u64,

    /// Deadline for document fetches, in seconds. Default: 30.
    pub fetch_timeout_secs: u64,

    /// Largest accepted signature upload, in bytes. Default: 5 MiB.
    pub max_upload_bytes: u64,

    /// Drawing surface size in pixels. Default: 400 × 150.
    pub drawing_surface: (u32, u32),

    /// Brush diameter for freehand strokes, in pixels. Default: 2.5.
    pub stroke_width: f32,

    /// Location of the persistent token file, if any.
    pub token_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api".to_string(),
            file_base_url: "http://localhost:5000".to_string(),
            storage_root: "uploads".to_string(),
            reference_width: 612.0,
            submit_timeout_secs: 30,
            fetch_timeout_secs: 30,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            drawing_surface: (400, 150),
            stroke_width: 2.5,
            token_path: None,
        }
    }
}

impl SessionConfig {
    /// Create a new builder for `SessionConfig`.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder {
            config: Self::default(),
        }
    }

    /// `token_path` if set, otherwise [`default_token_path`].
    pub fn resolved_token_path(&self) -> PathBuf {
        self.token_path.clone().unwrap_or_else(default_token_path)
    }
}

/// Default token file location.
///
/// - Linux:   `~/.config/docsign/token.json`
/// - macOS:   `~/Library/Application Support/docsign/token.json`
/// - Windows: `%APPDATA%\docsign\token.json`
pub fn default_token_path() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docsign")
        .join("token.json")
}

/// Builder for [`SessionConfig`].
#[derive(Debug)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn file_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.file_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn storage_root(mut self, root: impl Into<String>) -> Self {
        self.config.storage_root = root.into().trim_matches(|c| c == '/' || c == '\\').to_string();
        self
    }

    pub fn reference_width(mut self, width: f64) -> Self {
        self.config.reference_width = width;
        self
    }

    pub fn submit_timeout_secs(mut self, secs: u64) -> Self {
        self.config.submit_timeout_secs = secs.max(1);
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs.max(1);
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn drawing_surface(mut self, width: u32, height: u32) -> Self {
        self.config.drawing_surface = (width.max(1), height.max(1));
        self
    }

    pub fn stroke_width(mut self, px: f32) -> Self {
        self.config.stroke_width = px.clamp(0.5, 32.0);
        self
    }

    pub fn token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.token_path = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SessionConfig, SignError> {
        let c = &self.config;
        if c.api_base_url.is_empty() {
            return Err(SignError::InvalidConfig("API base URL must not be empty".into()));
        }
        if c.file_base_url.is_empty() {
            return Err(SignError::InvalidConfig("File base URL must not be empty".into()));
        }
        if !(c.reference_width.is_finite() && c.reference_width > 0.0) {
            return Err(SignError::InvalidConfig(format!(
                "Reference width must be a positive number, got {}",
                c.reference_width
            )));
        }
        if c.max_upload_bytes == 0 {
            return Err(SignError::InvalidConfig(
                "Upload limit must be at least 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_backend_contract() {
        let c = SessionConfig::default();
        assert_eq!(c.max_upload_bytes, 5 * 1024 * 1024);
        assert_eq!(c.storage_root, "uploads");
        assert_eq!(c.reference_width, 612.0);
    }

    #[test]
    fn builder_trims_trailing_slashes() {
        let c = SessionConfig::builder()
            .api_base_url("http://x/api/")
            .file_base_url("http://x//")
            .storage_root("/files/")
            .build()
            .unwrap();
        assert_eq!(c.api_base_url, "http://x/api");
        assert_eq!(c.file_base_url, "http://x");
        assert_eq!(c.storage_root, "files");
    }

    #[test]
    fn builder_rejects_zero_reference_width() {
        let err = SessionConfig::builder().reference_width(0.0).build().unwrap_err();
        assert!(matches!(err, SignError::InvalidConfig(_)));
    }

    #[test]
    fn explicit_token_path_wins() {
        let c = SessionConfig::builder().token_path("/tmp/t.json").build().unwrap();
        assert_eq!(c.resolved_token_path(), PathBuf::from("/tmp/t.json"));
        assert!(SessionConfig::default()
            .resolved_token_path()
            .ends_with("docsign/token.json"));
    }

    #[test]
    fn timeouts_are_at_least_one_second() {
        let c = SessionConfig::builder().submit_timeout_secs(0).build().unwrap();
        assert_eq!(c.submit_timeout_secs, 1);
    }
}

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::layout::classifier::SplitPolicy;
use crate::layout::fonts::{candidate_list, FontCandidate};

/// Regular-weight fonts tried when `FONT_PATHS` is not set.
const DEFAULT_FONT_PATHS: [&str; 6] = [
    "/usr/share/fonts/truetype/nanum/NanumGothic.ttf",
    "/usr/share/fonts/nanum/NanumGothic.ttf",
    "/Library/Fonts/NanumGothic.ttf",
    "/System/Library/Fonts/Supplemental/AppleGothic.ttf",
    "C:/Windows/Fonts/malgun.ttf",
    "C:/Windows/Fonts/NanumGothic.ttf",
];

/// Application configuration loaded from environment variables.
/// Every variable is optional.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Scanned for font files before `font_paths` are tried.
    pub font_dir: Option<PathBuf>,
    pub font_paths: Vec<PathBuf>,
    pub bold_font_path: Option<PathBuf>,
    /// Where named report destinations are written. Unset disables them.
    pub output_dir: Option<PathBuf>,
    pub max_upload_mb: usize,
    pub text_split: SplitPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            rust_log: "info".to_string(),
            font_dir: None,
            font_paths: DEFAULT_FONT_PATHS.iter().map(PathBuf::from).collect(),
            bold_font_path: None,
            output_dir: None,
            max_upload_mb: 64,
            text_split: SplitPolicy::Lines,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        let defaults = Config::default();

        Ok(Config {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            font_dir: optional_env("FONT_DIR").map(PathBuf::from),
            font_paths: optional_env("FONT_PATHS")
                .map(|v| parse_path_list(&v))
                .unwrap_or(defaults.font_paths),
            bold_font_path: optional_env("BOLD_FONT_PATH").map(PathBuf::from),
            output_dir: optional_env("OUTPUT_DIR").map(PathBuf::from),
            max_upload_mb: optional_env("MAX_UPLOAD_MB")
                .map(|v| v.parse::<usize>())
                .transpose()
                .context("MAX_UPLOAD_MB must be a whole number of megabytes")?
                .unwrap_or(defaults.max_upload_mb),
            text_split: optional_env("TEXT_SPLIT")
                .map(|v| v.parse::<SplitPolicy>())
                .transpose()
                .map_err(anyhow::Error::msg)
                .context("TEXT_SPLIT must be 'lines' or 'paragraphs'")?
                .unwrap_or(defaults.text_split),
        })
    }

    pub fn font_candidates(&self) -> Vec<FontCandidate> {
        candidate_list(
            self.font_dir.as_deref(),
            &self.font_paths,
            self.bold_font_path.as_deref(),
        )
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

/// Reads `key`, treating an empty value as unset.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_path_list(value: &str) -> Vec<PathBuf> {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path_list_trims_and_skips_empty() {
        let paths = parse_path_list(" /a.ttf, ,/b.ttf,");
        assert_eq!(paths, vec![PathBuf::from("/a.ttf"), PathBuf::from("/b.ttf")]);
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_upload_bytes(), 64 * 1024 * 1024);
        assert_eq!(config.text_split, SplitPolicy::Lines);
        assert!(config.font_paths.iter().any(|p| p.ends_with("NanumGothic.ttf")));
    }

    #[test]
    fn test_font_candidates_carry_bold_path() {
        let config = Config {
            font_paths: vec![PathBuf::from("/x/Regular.ttf")],
            bold_font_path: Some(PathBuf::from("/x/Bold.ttf")),
            ..Config::default()
        };
        let candidates = config.font_candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].bold.as_deref(), Some(std::path::Path::new("/x/Bold.ttf")));
    }
}

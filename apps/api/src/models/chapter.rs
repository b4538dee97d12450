use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::layout::page_config::LayoutConfig;

/// One chapter of source text. Immutable for the whole assembly pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// 1-based chapter number. Contiguity is not validated.
    pub index: u32,
    /// Used for the table of contents; when empty the subtitle of the
    /// chapter's title line is used instead.
    #[serde(default)]
    pub title: String,
    #[serde(alias = "text")]
    pub raw_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverDetail {
    pub label: String,
    pub value: String,
}

impl CoverDetail {
    pub fn line(&self) -> String {
        format!("{}: {}", self.label, self.value)
    }
}

/// What the cover page shows about the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub name: String,
    #[serde(default = "default_report_title")]
    pub report_title: String,
    #[serde(default)]
    pub details: Vec<CoverDetail>,
    #[serde(default = "default_honorific")]
    pub honorific: String,
    /// Date printed on the cover; today (local time) when absent.
    #[serde(default)]
    pub generated_on: Option<NaiveDate>,
}

fn default_report_title() -> String {
    "사주 분석 보고서".to_string()
}

fn default_honorific() -> String {
    "님".to_string()
}

impl CustomerProfile {
    pub fn new(name: impl Into<String>) -> Self {
        CustomerProfile {
            name: name.into(),
            report_title: default_report_title(),
            details: Vec::new(),
            honorific: default_honorific(),
            generated_on: None,
        }
    }

    /// `"{name} {honorific}"`, or just the name when the honorific is empty.
    pub fn display_name(&self) -> String {
        if self.honorific.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.honorific)
        }
    }
}

/// The `manifest` part of a report request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRequest {
    pub customer: CustomerProfile,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    /// Drawn at the top of every body page when set.
    #[serde(default)]
    pub running_header: Option<String>,
    /// File name inside the configured output directory.
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub layout: Option<LayoutConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_minimal_json_fills_defaults() {
        let request: ReportRequest = serde_json::from_str(
            r#"{"customer": {"name": "홍길동"}, "chapters": [{"index": 1, "text": "본문"}]}"#,
        )
        .unwrap();

        assert_eq!(request.customer.report_title, "사주 분석 보고서");
        assert_eq!(request.customer.display_name(), "홍길동 님");
        assert_eq!(request.chapters[0].raw_text, "본문");
        assert_eq!(request.chapters[0].title, "");
        assert!(request.layout.is_none());
        assert!(request.destination.is_none());
    }

    #[test]
    fn test_display_name_without_honorific() {
        let mut customer = CustomerProfile::new("Kim");
        customer.honorific.clear();
        assert_eq!(customer.display_name(), "Kim");
    }

    #[test]
    fn test_cover_detail_line() {
        let detail = CoverDetail {
            label: "생년월일".to_string(),
            value: "1990-01-01".to_string(),
        };
        assert_eq!(detail.line(), "생년월일: 1990-01-01");
    }
}

//! Page geometry and typography for the report.
//!
//! All lengths are PDF points (1/72"). Every field has a default, so a report
//! request can override any subset of them as JSON.

use serde::{Deserialize, Serialize};

/// Points per millimetre.
pub const MM: f32 = 72.0 / 25.4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Margins {
    pub fn all(value: f32) -> Self {
        Margins {
            top: value,
            bottom: value,
            left: value,
            right: value,
        }
    }
}

/// Where a page's number is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FooterAlign {
    Hidden,
    Centered,
    Right,
}

/// Footer placement per page kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FooterPolicy {
    pub cover: FooterAlign,
    pub contents: FooterAlign,
    pub chapter_title: FooterAlign,
    pub body: FooterAlign,
    pub guide: FooterAlign,
}

impl Default for FooterPolicy {
    fn default() -> Self {
        FooterPolicy {
            cover: FooterAlign::Hidden,
            contents: FooterAlign::Centered,
            chapter_title: FooterAlign::Centered,
            body: FooterAlign::Centered,
            guide: FooterAlign::Hidden,
        }
    }
}

/// Layout parameters for every page of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub page_width: f32,
    pub page_height: f32,
    pub margins: Margins,

    pub title_size: f32,
    pub subtitle_size: f32,
    pub body_size: f32,
    /// Line height as a multiple of font size.
    pub line_height_ratio: f32,
    /// Empty source lines advance by this fraction of a body line.
    pub blank_line_fraction: f32,

    pub subtitle_space_before: f32,
    pub subtitle_space_after: f32,
    /// Extra room a subtitle needs below its lines before it may start on a page.
    pub subtitle_reserve: f32,

    pub footer_size: f32,
    /// Distance of the footer baseline below the bottom margin.
    pub footer_drop: f32,
    /// Space kept clear above the bottom margin; placements never enter it.
    pub reserved_footer_gap: f32,
    pub footer: FooterPolicy,

    pub header_size: f32,
    /// How much lower content starts on pages carrying a running header.
    pub header_offset: f32,

    /// Figures are at most this fraction of the text width...
    pub figure_max_width_fraction: f32,
    /// ...and at most this fraction of the page height.
    pub figure_max_height_fraction: f32,
    /// Gap after a figure, in body lines.
    pub figure_gap_lines: f32,

    /// Chapter title baseline as a fraction of page height from the bottom.
    pub chapter_title_y_fraction: f32,
    /// Gap between chapter title and subtitle baselines, beyond `title_size`.
    pub chapter_subtitle_gap: f32,
    /// `{n}` is replaced by the chapter number.
    pub chapter_label: String,

    pub toc_title: String,
    pub toc_entry_size: f32,
    pub toc_entry_indent: f32,
    pub toc_entry_spacing: f32,
    pub toc_title_spacing: f32,

    pub cover_title_size: f32,
    pub cover_name_size: f32,
    pub cover_detail_size: f32,
    pub cover_detail_spacing: f32,
    pub cover_date_size: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        default_layout_config()
    }
}

/// A4, 25 mm margins, 30/25/17 pt title/subtitle/body at 120% line height.
pub fn default_layout_config() -> LayoutConfig {
    LayoutConfig {
        page_width: 595.2756,
        page_height: 841.8898,
        margins: Margins::all(25.0 * MM),

        title_size: 30.0,
        subtitle_size: 25.0,
        body_size: 17.0,
        line_height_ratio: 1.2,
        blank_line_fraction: 0.5,

        subtitle_space_before: 15.0,
        subtitle_space_after: 10.0,
        subtitle_reserve: 20.0,

        footer_size: 10.0,
        footer_drop: 10.0 * MM,
        reserved_footer_gap: 30.0,
        footer: FooterPolicy::default(),

        header_size: 9.0,
        header_offset: 40.0,

        figure_max_width_fraction: 0.9,
        figure_max_height_fraction: 0.4,
        figure_gap_lines: 2.0,

        chapter_title_y_fraction: 0.55,
        chapter_subtitle_gap: 15.0,
        chapter_label: "제{n}장".to_string(),

        toc_title: "목 차".to_string(),
        toc_entry_size: 14.0,
        toc_entry_indent: 20.0,
        toc_entry_spacing: 25.0,
        toc_title_spacing: 50.0,

        cover_title_size: 40.0,
        cover_name_size: 28.0,
        cover_detail_size: 14.0,
        cover_detail_spacing: 20.0,
        cover_date_size: 12.0,
    }
}

impl LayoutConfig {
    pub fn text_width(&self) -> f32 {
        self.page_width - self.margins.left - self.margins.right
    }

    pub fn body_line_height(&self) -> f32 {
        self.body_size * self.line_height_ratio
    }

    pub fn subtitle_line_height(&self) -> f32 {
        self.subtitle_size * self.line_height_ratio
    }

    /// Writing position at the top of a fresh page.
    pub fn top_y(&self) -> f32 {
        self.page_height - self.margins.top
    }

    /// Lowest position a placement may reach.
    pub fn floor_y(&self) -> f32 {
        self.margins.bottom + self.reserved_footer_gap
    }

    pub fn chapter_label(&self, index: u32) -> String {
        self.chapter_label.replace("{n}", &index.to_string())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_config_sanity() {
        let config = default_layout_config();
        assert!((config.margins.left - 70.866).abs() < 0.01);
        assert!((config.text_width() - 453.54).abs() < 0.05);
        assert!((config.body_line_height() - 20.4).abs() < 1e-4);
        assert!(config.floor_y() < config.top_y());
    }

    #[test]
    fn test_chapter_label_substitution() {
        let config = default_layout_config();
        assert_eq!(config.chapter_label(3), "제3장");
    }

    #[test]
    fn test_partial_json_override_keeps_defaults() {
        let config: LayoutConfig =
            serde_json::from_str(r#"{"body_size": 12.0, "footer": {"body": "right"}}"#).unwrap();
        assert_eq!(config.body_size, 12.0);
        assert_eq!(config.footer.body, FooterAlign::Right);
        assert_eq!(config.footer.contents, FooterAlign::Centered);
        assert_eq!(config.title_size, 30.0);
    }
}

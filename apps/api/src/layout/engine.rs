//! Layout Cursor / Page Engine.
//!
//! Owns the vertical writing position, the current page and its number, and
//! the page-break decision. Every producer (cover, contents, chapter bodies,
//! guide pages) goes through it, so footers, backgrounds, and the running
//! header are drawn in exactly one place.
//!
//! Coordinates are PDF user space: `y` starts at `page_height - margin.top`
//! and decreases as content is placed.
//!
//! State machine:
//! ```text
//!   PageStart ──place──▶ InContent ──reach floor──▶ PageFull
//!       ▲                    │                          │
//!       └──── page break ◀───┴──────────────────────────┘
//! ```
//! A page break is never taken from an untouched page (`PageStart` with the
//! cursor still at its starting offset): such a page accepts whatever is
//! placed first even if it does not fit, which keeps oversized content from
//! looping forever. Blank space skipped at the top of a page uses up that
//! exemption. Forcing a new page while still in `PageStart` re-purposes the
//! current page instead.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::errors::ReportError;
use crate::layout::cancel::CancelToken;
use crate::layout::font_metrics::TextMeasure;
use crate::layout::fonts::{FontSet, FontWeight};
use crate::layout::page_config::{FooterAlign, LayoutConfig};
use crate::layout::wrap::wrap_text;
use crate::models::asset::ImageAsset;
use crate::render::document::{Document, DrawOp, PageKind, RenderedPage, SealedDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Nothing but decorations (background, header) on the current page.
    PageStart,
    InContent,
    /// The cursor sits on the floor; the next placement breaks.
    PageFull,
}

/// Result of a figure placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    Placed { width: f32, height: f32 },
    /// The bytes could not be decoded; nothing was drawn.
    Failed,
}

/// Per-document decorations chosen by the assembler.
#[derive(Debug, Clone, Default)]
pub struct Decorations<'a> {
    pub page_background: Option<&'a ImageAsset>,
    pub chapter_background: Option<&'a ImageAsset>,
    pub running_header: Option<String>,
}

pub struct PageEngine<'a> {
    config: &'a LayoutConfig,
    fonts: &'a FontSet,
    cancel: &'a CancelToken,
    decorations: Decorations<'a>,
    doc: Document,
    page: RenderedPage,
    state: CursorState,
    y: f32,
    /// Where the cursor starts on the current page, below any running header.
    page_top: f32,
    /// Backgrounds that failed to decode once are not retried on every page.
    broken_backgrounds: HashSet<String>,
}

impl<'a> PageEngine<'a> {
    /// Starts the document on page 1, a cover page in `PageStart`.
    pub fn new(
        title: &str,
        config: &'a LayoutConfig,
        fonts: &'a FontSet,
        decorations: Decorations<'a>,
        cancel: &'a CancelToken,
    ) -> Self {
        let mut engine = PageEngine {
            config,
            fonts,
            cancel,
            decorations,
            doc: Document::new(title, config.page_width, config.page_height),
            page: RenderedPage::new(1, PageKind::Cover),
            state: CursorState::PageStart,
            y: config.top_y(),
            page_top: config.top_y(),
            broken_backgrounds: HashSet::new(),
        };
        engine.decorate();
        engine
    }

    pub fn config(&self) -> &'a LayoutConfig {
        self.config
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn page_number(&self) -> u32 {
        self.page.number
    }

    pub fn page_kind(&self) -> PageKind {
        self.page.kind
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    // ── Page management ─────────────────────────────────────────────────────

    /// Breaks the page when `height` more points would cross the floor.
    pub fn ensure_space(&mut self, height: f32) -> Result<(), ReportError> {
        let untouched = self.state == CursorState::PageStart && self.y >= self.page_top;
        if !untouched && self.y - height < self.config.floor_y() {
            let kind = self.page.kind;
            self.break_page(kind)?;
        }
        Ok(())
    }

    /// Makes sure the next placement lands on a fresh page of `kind`.
    pub fn start_page(&mut self, kind: PageKind) -> Result<(), ReportError> {
        if self.state == CursorState::PageStart {
            self.page.kind = kind;
            self.page.ops.clear();
            self.decorate();
            Ok(())
        } else {
            self.break_page(kind)
        }
    }

    fn break_page(&mut self, next_kind: PageKind) -> Result<(), ReportError> {
        self.draw_footer();
        let next = RenderedPage::new(self.page.number + 1, next_kind);
        let finished = std::mem::replace(&mut self.page, next);
        debug!(
            from = finished.number,
            to = self.page.number,
            kind = ?next_kind,
            "Page break"
        );
        self.doc.push_page(finished);

        if self.cancel.is_cancelled() {
            return Err(ReportError::Cancelled);
        }

        self.state = CursorState::PageStart;
        self.decorate();
        Ok(())
    }

    /// Paints the background and running header a fresh page of this kind
    /// carries, and resets the cursor.
    fn decorate(&mut self) {
        let background = match self.page.kind {
            PageKind::Body | PageKind::Contents => self.decorations.page_background,
            PageKind::ChapterTitle => self.decorations.chapter_background,
            PageKind::Cover | PageKind::Guide => None,
        };
        if let Some(asset) = background {
            self.paint_background(asset);
        }

        self.y = self.config.top_y();
        if self.page.kind == PageKind::Body {
            if let Some(header) = self.decorations.running_header.clone() {
                let size = self.config.header_size;
                let baseline = self.config.top_y() - size;
                self.push_centered(&header, baseline, size, FontWeight::Regular);
                self.y -= self.config.header_offset;
            }
        }
        self.page_top = self.y;
    }

    fn paint_background(&mut self, asset: &ImageAsset) {
        if self.broken_backgrounds.contains(&asset.name) {
            return;
        }
        if let Err(e) = self.doc.register_image(asset) {
            warn!(image = %asset.name, error = %e, "Background image failed to decode; page left blank");
            self.broken_backgrounds.insert(asset.name.clone());
            return;
        }
        self.page.ops.push(DrawOp::Image {
            name: asset.name.clone(),
            x: 0.0,
            y: 0.0,
            width: self.config.page_width,
            height: self.config.page_height,
        });
    }

    fn draw_footer(&mut self) {
        let policy = &self.config.footer;
        let align = match self.page.kind {
            PageKind::Cover => policy.cover,
            PageKind::Contents => policy.contents,
            PageKind::ChapterTitle => policy.chapter_title,
            PageKind::Body => policy.body,
            PageKind::Guide => policy.guide,
        };
        let text = self.page.number.to_string();
        let size = self.config.footer_size;
        let y = self.config.margins.bottom - self.config.footer_drop;
        let width = self.fonts.regular.string_width(&text, size);

        let x = match align {
            FooterAlign::Hidden => return,
            FooterAlign::Centered => (self.config.page_width - width) / 2.0,
            FooterAlign::Right => self.config.page_width - self.config.margins.right - width,
        };
        self.push_text(text, x, y, size, FontWeight::Regular);
    }

    /// Closes the document. A trailing page that never received content is
    /// dropped; otherwise its footer is drawn.
    pub fn finish(mut self) -> SealedDocument {
        if self.state == CursorState::PageStart && self.page.number > 1 {
            debug!(page = self.page.number, "Discarding empty trailing page");
        } else {
            self.draw_footer();
            let last = std::mem::replace(&mut self.page, RenderedPage::new(0, PageKind::Body));
            self.doc.push_page(last);
        }
        self.doc.seal()
    }

    // ── Drawing primitives ──────────────────────────────────────────────────

    fn push_text(&mut self, text: String, x: f32, y: f32, size: f32, weight: FontWeight) {
        self.page.ops.push(DrawOp::Text {
            text,
            x,
            y,
            size,
            weight,
        });
    }

    fn push_centered(&mut self, text: &str, y: f32, size: f32, weight: FontWeight) {
        let width = self.fonts.get(weight).string_width(text, size);
        let x = (self.config.page_width - width) / 2.0;
        self.push_text(text.to_string(), x, y, size, weight);
    }

    fn mark_content(&mut self) {
        self.state = if self.y <= self.config.floor_y() {
            CursorState::PageFull
        } else {
            CursorState::InContent
        };
    }

    /// Draws `text` at an absolute position. Does not move the cursor.
    pub fn draw_text(&mut self, text: &str, x: f32, y: f32, size: f32, weight: FontWeight) {
        if text.is_empty() {
            return;
        }
        self.push_text(text.to_string(), x, y, size, weight);
        self.mark_content();
    }

    /// Draws `text` horizontally centered on the page. Does not move the cursor.
    pub fn draw_centered(&mut self, text: &str, y: f32, size: f32, weight: FontWeight) {
        if text.is_empty() {
            return;
        }
        self.push_centered(text, y, size, weight);
        self.mark_content();
    }

    /// Moves the cursor down, stopping at the bottom margin.
    pub fn skip(&mut self, height: f32) {
        self.y = (self.y - height).max(self.config.margins.bottom);
        if self.state == CursorState::InContent && self.y <= self.config.floor_y() {
            self.state = CursorState::PageFull;
        }
    }

    // ── Flowing content ─────────────────────────────────────────────────────

    /// Draws each line at the left margin, breaking pages as needed. Empty
    /// lines take up their height but draw nothing.
    pub fn place_lines(
        &mut self,
        lines: &[String],
        weight: FontWeight,
        size: f32,
        line_height: f32,
    ) -> Result<(), ReportError> {
        for line in lines {
            self.ensure_space(line_height)?;
            if !line.is_empty() {
                let x = self.config.margins.left;
                self.push_text(line.clone(), x, self.y, size, weight);
            }
            self.y -= line_height;
            if !line.is_empty() {
                self.mark_content();
            }
        }
        Ok(())
    }

    /// Wraps and places a body paragraph.
    pub fn place_paragraph(&mut self, text: &str) -> Result<(), ReportError> {
        let size = self.config.body_size;
        let lines = wrap_text(text, &self.fonts.regular, size, self.config.text_width());
        self.place_lines(&lines, FontWeight::Regular, size, self.config.body_line_height())
    }

    /// Places a bold subtitle with its surrounding space. The whole subtitle
    /// plus a little room for what follows must fit, or it moves to the next
    /// page.
    pub fn place_subtitle(&mut self, text: &str) -> Result<(), ReportError> {
        let size = self.config.subtitle_size;
        let line_height = self.config.subtitle_line_height();
        let lines = wrap_text(text, &self.fonts.bold, size, self.config.text_width());

        let needed = lines.len() as f32 * line_height + self.config.subtitle_reserve;
        self.ensure_space(needed + self.config.subtitle_space_before)?;
        self.skip(self.config.subtitle_space_before);
        self.place_lines(&lines, FontWeight::Bold, size, line_height)?;
        self.skip(self.config.subtitle_space_after);
        Ok(())
    }

    /// Places a figure centered in the text column, scaled uniformly to at
    /// most `max_width` wide and `max_height_fraction` of the page tall, never
    /// above its native size. The cursor then drops by the figure's height
    /// plus the post-figure gap.
    pub fn place_image(
        &mut self,
        asset: &ImageAsset,
        max_width: f32,
        max_height_fraction: f32,
    ) -> Result<Placement, ReportError> {
        let Some((px_width, px_height)) = asset.dimensions().filter(|(w, h)| *w > 0 && *h > 0)
        else {
            warn!(image = %asset.name, "Figure has no readable dimensions; skipped");
            return Ok(Placement::Failed);
        };
        if let Err(e) = self.doc.register_image(asset) {
            warn!(image = %asset.name, error = %e, "Figure failed to decode; skipped");
            return Ok(Placement::Failed);
        }

        let (px_width, px_height) = (px_width as f32, px_height as f32);
        let scale = (max_width / px_width)
            .min(max_height_fraction * self.config.page_height / px_height)
            .min(1.0);
        let width = px_width * scale;
        let height = px_height * scale;

        self.ensure_space(height)?;

        let x = self.config.margins.left + (self.config.text_width() - width) / 2.0;
        let bottom = self.y - height;
        self.page.ops.push(DrawOp::Image {
            name: asset.name.clone(),
            x,
            y: bottom,
            width,
            height,
        });
        self.y = bottom;
        self.mark_content();
        self.skip(self.config.figure_gap_lines * self.config.body_line_height());

        Ok(Placement::Placed { width, height })
    }

    /// Draws `asset` fitted inside the page (no upscaling) and centered. Used
    /// for contents and guide pages supplied as images.
    pub fn place_full_page_image(&mut self, asset: &ImageAsset) -> Placement {
        let Some((px_width, px_height)) = asset.dimensions().filter(|(w, h)| *w > 0 && *h > 0)
        else {
            warn!(image = %asset.name, "Page image has no readable dimensions; skipped");
            return Placement::Failed;
        };
        if let Err(e) = self.doc.register_image(asset) {
            warn!(image = %asset.name, error = %e, "Page image failed to decode; skipped");
            return Placement::Failed;
        }

        let (px_width, px_height) = (px_width as f32, px_height as f32);
        let scale = (self.config.page_width / px_width)
            .min(self.config.page_height / px_height)
            .min(1.0);
        let width = px_width * scale;
        let height = px_height * scale;

        self.page.ops.push(DrawOp::Image {
            name: asset.name.clone(),
            x: (self.config.page_width - width) / 2.0,
            y: (self.config.page_height - height) / 2.0,
            width,
            height,
        });
        self.mark_content();
        Placement::Placed { width, height }
    }

    /// Stretches `asset` over the whole current page.
    pub fn paint_full_bleed(&mut self, asset: &ImageAsset) -> Placement {
        if let Err(e) = self.doc.register_image(asset) {
            warn!(image = %asset.name, error = %e, "Full-page image failed to decode; skipped");
            return Placement::Failed;
        }
        self.page.ops.push(DrawOp::Image {
            name: asset.name.clone(),
            x: 0.0,
            y: 0.0,
            width: self.config.page_width,
            height: self.config.page_height,
        });
        self.mark_content();
        Placement::Placed {
            width: self.config.page_width,
            height: self.config.page_height,
        }
    }

    /// A page holding only the chapter's title (and subtitle), followed by a
    /// fresh body page.
    pub fn start_chapter_title_page(&mut self, main: &str, sub: &str) -> Result<(), ReportError> {
        self.start_page(PageKind::ChapterTitle)?;

        let title_y = self.config.page_height * self.config.chapter_title_y_fraction;
        self.push_centered(main, title_y, self.config.title_size, FontWeight::Bold);
        if !sub.is_empty() {
            let sub_y = title_y - (self.config.title_size + self.config.chapter_subtitle_gap);
            self.push_centered(sub, sub_y, self.config.subtitle_size, FontWeight::Regular);
        }
        self.state = CursorState::InContent;

        self.start_page(PageKind::Body)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

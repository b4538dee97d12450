//! Page Assembler — sequences a whole report through the page engine.
//!
//! Order is fixed: cover, table of contents, then for every chapter (ascending
//! index) a title page followed by its content, then the guide pages. The
//! assembly is a pure function of its inputs and the font set, apart from the
//! report id and, when no date is given, today's date on the cover.
//!
//! Assembly is CPU-bound and synchronous; callers on the async runtime run it
//! inside `tokio::task::spawn_blocking`.

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::ReportError;
use crate::layout::cancel::CancelToken;
use crate::layout::classifier::{Classifier, ContentBlock};
use crate::layout::engine::{Decorations, PageEngine, Placement};
use crate::layout::fonts::{FontSet, FontWeight};
use crate::layout::images::{resolve_detailed, Resolution, UsedImageSet};
use crate::layout::page_config::LayoutConfig;
use crate::models::asset::{AssetCatalog, AssetPool};
use crate::models::chapter::{Chapter, CustomerProfile, ReportRequest};
use crate::render::document::{PageKind, SealedDocument};
use crate::render::pdf::write_pdf;

/// What happened while a report was assembled.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssemblyReport {
    pub report_id: Uuid,
    pub page_count: usize,
    pub chapter_count: usize,
    /// Figures in the order they were placed.
    pub placed_images: Vec<String>,
    pub unresolved_tags: Vec<String>,
    /// Placeholders whose figure was already placed earlier.
    pub duplicate_tags: Vec<String>,
    /// Figures that resolved but could not be decoded.
    pub failed_images: Vec<String>,
}

#[derive(Debug)]
pub struct ReportArtifact {
    pub pdf: Vec<u8>,
    pub page_count: usize,
    pub report: AssemblyReport,
}

/// Everything one assembly reads. Nothing here is mutated.
pub struct AssemblyInput<'a> {
    pub request: &'a ReportRequest,
    pub pool: &'a AssetPool,
    pub fonts: &'a FontSet,
    pub layout: &'a LayoutConfig,
    pub classifier: &'a Classifier,
}

/// A chapter with its blocks classified and its title resolved.
struct PreparedChapter<'c> {
    chapter: &'c Chapter,
    title_main: String,
    title_sub: String,
    /// Blocks to route, with the title block removed.
    blocks: Vec<ContentBlock>,
}

/// Lays out and serializes a report.
pub fn assemble(input: &AssemblyInput<'_>, cancel: &CancelToken) -> Result<ReportArtifact, ReportError> {
    let (document, report) = layout_document(input, cancel)?;
    let pdf = write_pdf(&document, input.fonts);
    Ok(ReportArtifact {
        pdf,
        page_count: report.page_count,
        report,
    })
}

/// Lays out a report without serializing it.
pub fn layout_document(
    input: &AssemblyInput<'_>,
    cancel: &CancelToken,
) -> Result<(SealedDocument, AssemblyReport), ReportError> {
    let request = input.request;
    let layout = input.layout;
    let catalog = AssetCatalog::classify(input.pool);
    let mut report = AssemblyReport {
        report_id: Uuid::new_v4(),
        chapter_count: request.chapters.len(),
        ..AssemblyReport::default()
    };

    info!(
        report_id = %report.report_id,
        customer = %request.customer.name,
        chapters = request.chapters.len(),
        assets = input.pool.len(),
        "Report assembly started"
    );

    let chapters = prepare_chapters(&request.chapters, input.classifier, layout);

    let decorations = Decorations {
        page_background: catalog.page_background.as_ref(),
        chapter_background: catalog.chapter_background.as_ref(),
        running_header: request.running_header.clone().filter(|h| !h.trim().is_empty()),
    };
    let mut engine = PageEngine::new(
        &request.customer.report_title,
        layout,
        input.fonts,
        decorations,
        cancel,
    );

    render_cover(&mut engine, &request.customer, &catalog);
    render_contents(&mut engine, &chapters, &catalog)?;

    let mut used = UsedImageSet::new();
    for prepared in &chapters {
        if cancel.is_cancelled() {
            return Err(ReportError::Cancelled);
        }
        render_chapter(&mut engine, prepared, &catalog, &mut used, &mut report)?;
    }

    for asset in &catalog.guide_pages {
        engine.start_page(PageKind::Guide)?;
        engine.place_full_page_image(asset);
    }

    let document = engine.finish();
    report.page_count = document.page_count();

    info!(
        report_id = %report.report_id,
        pages = report.page_count,
        figures = report.placed_images.len(),
        unresolved = report.unresolved_tags.len(),
        "Report assembly finished"
    );
    Ok((document, report))
}

fn prepare_chapters<'c>(
    chapters: &'c [Chapter],
    classifier: &Classifier,
    layout: &LayoutConfig,
) -> Vec<PreparedChapter<'c>> {
    let mut ordered: Vec<&Chapter> = chapters.iter().collect();
    ordered.sort_by_key(|c| c.index);

    ordered
        .into_iter()
        .map(|chapter| {
            let mut blocks = classifier.classify(&chapter.raw_text);
            let first = blocks.iter().position(|b| *b != ContentBlock::Blank);
            let title = first.and_then(|i| match &blocks[i] {
                ContentBlock::ChapterTitle { main, sub } => Some((i, main.clone(), sub.clone())),
                _ => None,
            });

            let (title_main, title_sub) = match title {
                Some((i, main, sub)) => {
                    blocks.remove(i);
                    (main, sub)
                }
                None => (layout.chapter_label(chapter.index), chapter.title.clone()),
            };

            PreparedChapter {
                chapter,
                title_main,
                title_sub,
                blocks,
            }
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Cover and contents
// ────────────────────────────────────────────────────────────────────────────

fn render_cover(engine: &mut PageEngine<'_>, customer: &CustomerProfile, catalog: &AssetCatalog) {
    let config = engine.config();
    let height = config.page_height;
    let name_line = customer.display_name();

    if let Some(cover) = &catalog.cover {
        if matches!(engine.paint_full_bleed(cover), Placement::Placed { .. }) {
            engine.draw_centered(&name_line, height * 0.2, config.cover_name_size, FontWeight::Bold);
            return;
        }
    }

    engine.draw_centered(
        &customer.report_title,
        height * 0.6,
        config.cover_title_size,
        FontWeight::Bold,
    );
    engine.draw_centered(&name_line, height * 0.45, config.cover_name_size, FontWeight::Regular);

    let mut y = height * 0.35;
    for detail in &customer.details {
        engine.draw_centered(&detail.line(), y, config.cover_detail_size, FontWeight::Regular);
        y -= config.cover_detail_spacing;
    }

    let date = customer
        .generated_on
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let date_line = date.format("생성일: %Y년 %m월 %d일").to_string();
    engine.draw_centered(&date_line, height * 0.15, config.cover_date_size, FontWeight::Regular);
}

fn render_contents(
    engine: &mut PageEngine<'_>,
    chapters: &[PreparedChapter<'_>],
    catalog: &AssetCatalog,
) -> Result<(), ReportError> {
    let mut placed = 0;
    for asset in &catalog.toc_pages {
        engine.start_page(PageKind::Contents)?;
        if matches!(engine.place_full_page_image(asset), Placement::Placed { .. }) {
            placed += 1;
        }
    }
    if placed > 0 {
        return Ok(());
    }
    if !catalog.toc_pages.is_empty() {
        warn!(images = catalog.toc_pages.len(), "No contents image could be drawn; using the text list");
    }

    engine.start_page(PageKind::Contents)?;
    let config = engine.config();

    let title_y = engine.y() - config.title_size;
    engine.draw_centered(&config.toc_title, title_y, config.title_size, FontWeight::Bold);
    engine.skip(config.title_size + config.toc_title_spacing);

    let x = config.margins.left + config.toc_entry_indent;
    for prepared in chapters {
        engine.ensure_space(config.toc_entry_spacing)?;
        let entry = contents_entry(config, prepared);
        let y = engine.y();
        engine.draw_text(&entry, x, y, config.toc_entry_size, FontWeight::Regular);
        engine.skip(config.toc_entry_spacing);
    }
    Ok(())
}

/// `제N장. title`, or just the label when the chapter has no title.
fn contents_entry(config: &LayoutConfig, prepared: &PreparedChapter<'_>) -> String {
    let label = config.chapter_label(prepared.chapter.index);
    let title = if prepared.chapter.title.trim().is_empty() {
        prepared.title_sub.as_str()
    } else {
        prepared.chapter.title.trim()
    };
    if title.is_empty() {
        label
    } else {
        format!("{label}. {title}")
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Chapters
// ────────────────────────────────────────────────────────────────────────────

fn render_chapter(
    engine: &mut PageEngine<'_>,
    prepared: &PreparedChapter<'_>,
    catalog: &AssetCatalog,
    used: &mut UsedImageSet,
    report: &mut AssemblyReport,
) -> Result<(), ReportError> {
    engine.start_chapter_title_page(&prepared.title_main, &prepared.title_sub)?;
    let config = engine.config();
    let figure_width = config.text_width() * config.figure_max_width_fraction;

    for block in &prepared.blocks {
        match block {
            ContentBlock::Paragraph { text } => engine.place_paragraph(text)?,
            ContentBlock::Subtitle { text } => engine.place_subtitle(text)?,
            ContentBlock::Blank => {
                engine.skip(config.body_line_height() * config.blank_line_fraction)
            }
            ContentBlock::ImagePlaceholder { tag } => {
                match resolve_detailed(tag, &catalog.figures, used) {
                    Resolution::Resolved(asset) => {
                        match engine.place_image(
                            asset,
                            figure_width,
                            config.figure_max_height_fraction,
                        )? {
                            Placement::Placed { .. } => report.placed_images.push(asset.name.clone()),
                            Placement::Failed => report.failed_images.push(asset.name.clone()),
                        }
                    }
                    Resolution::AlreadyUsed(asset) => {
                        warn!(
                            chapter = prepared.chapter.index,
                            tag = %tag,
                            image = %asset.name,
                            "Figure already placed earlier; placeholder skipped"
                        );
                        report.duplicate_tags.push(tag.clone());
                    }
                    Resolution::Unmatched => {
                        warn!(chapter = prepared.chapter.index, tag = %tag, "No figure matches placeholder");
                        report.unresolved_tags.push(tag.clone());
                    }
                }
            }
            // Consumed by the title page.
            ContentBlock::ChapterTitle { .. } => {}
        }
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::page_config::default_layout_config;
    use crate::models::asset::ImageAsset;
    use crate::render::document::DrawOp;
    use chrono::NaiveDate;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut out = std::io::Cursor::new(Vec::new());
        image::RgbImage::from_pixel(width, height, image::Rgb([120, 30, 200]))
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn chapter(index: u32, text: &str) -> Chapter {
        Chapter {
            index,
            title: String::new(),
            raw_text: text.to_string(),
        }
    }

    fn request(chapters: Vec<Chapter>) -> ReportRequest {
        let mut customer = CustomerProfile::new("홍길동");
        customer.generated_on = NaiveDate::from_ymd_opt(2024, 3, 1);
        ReportRequest {
            customer,
            chapters,
            running_header: None,
            destination: None,
            layout: None,
        }
    }

    fn run(request: &ReportRequest, pool: &AssetPool) -> (SealedDocument, AssemblyReport) {
        let fonts = FontSet::builtin();
        let layout = default_layout_config();
        let classifier = Classifier::default();
        let input = AssemblyInput {
            request,
            pool,
            fonts: &fonts,
            layout: &layout,
            classifier: &classifier,
        };
        layout_document(&input, &CancelToken::new()).unwrap()
    }

    fn image_ops(doc: &SealedDocument) -> Vec<(u32, String, f32, f32)> {
        doc.pages()
            .iter()
            .flat_map(|page| {
                page.ops.iter().filter_map(move |op| match op {
                    DrawOp::Image { name, width, height, .. } => {
                        Some((page.number, name.clone(), *width, *height))
                    }
                    DrawOp::Text { .. } => None,
                })
            })
            .collect()
    }

    #[test]
    fn test_single_chapter_without_images_has_four_pages() {
        let request = request(vec![chapter(1, "제1장 테스트\n본문입니다.")]);
        let (doc, report) = run(&request, &AssetPool::new());

        assert_eq!(report.page_count, 4);
        let kinds: Vec<PageKind> = doc.pages().iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![PageKind::Cover, PageKind::Contents, PageKind::ChapterTitle, PageKind::Body]
        );

        let toc: Vec<&str> = doc.pages()[1].texts().collect();
        assert!(toc.contains(&"목 차"));
        assert!(toc.contains(&"제1장. 테스트"), "toc entries: {toc:?}");

        let title: Vec<&str> = doc.pages()[2].texts().collect();
        assert!(title.contains(&"제1장") && title.contains(&"테스트"));

        let body: Vec<&str> = doc.pages()[3].texts().collect();
        assert!(body.contains(&"본문입니다."));
        assert!(!body.contains(&"제1장 테스트"), "title line must not repeat in the body");
    }

    #[test]
    fn test_cover_shows_customer_and_date() {
        let request = request(Vec::new());
        let (doc, _) = run(&request, &AssetPool::new());
        let cover: Vec<&str> = doc.pages()[0].texts().collect();
        assert!(cover.contains(&"사주 분석 보고서"));
        assert!(cover.contains(&"홍길동 님"));
        assert!(cover.contains(&"생성일: 2024년 03월 01일"));
    }

    #[test]
    fn test_cover_background_replaces_text_cover() {
        let request = request(Vec::new());
        let pool: AssetPool = [ImageAsset::new("표지.png", png(20, 28))].into_iter().collect();
        let (doc, _) = run(&request, &pool);

        let cover = &doc.pages()[0];
        assert_eq!(cover.image_names().collect::<Vec<_>>(), vec!["표지.png"]);
        assert_eq!(cover.texts().collect::<Vec<_>>(), vec!["홍길동 님"]);
    }

    #[test]
    fn test_figure_placed_once_within_limits() {
        let request = request(vec![chapter(1, "제1장 오행\n{{IMG:05_오행분석}}\n설명")]);
        let pool: AssetPool = [ImageAsset::new("05_오행분석.png", png(1600, 900))]
            .into_iter()
            .collect();
        let (doc, report) = run(&request, &pool);

        let layout = default_layout_config();
        let images = image_ops(&doc);
        assert_eq!(images.len(), 1);
        let (_, name, width, height) = &images[0];
        assert_eq!(name, "05_오행분석.png");
        assert!(*width <= layout.text_width() * 0.9 + 1e-3);
        assert!(*height <= layout.page_height * 0.4 + 1e-3);
        assert!(*width <= 1600.0 && *height <= 900.0);
        assert_eq!(report.placed_images, vec!["05_오행분석.png"]);
    }

    #[test]
    fn test_small_figure_keeps_native_size() {
        let request = request(vec![chapter(1, "{{IMG:icon}}")]);
        let pool: AssetPool = [ImageAsset::new("icon.png", png(40, 30))].into_iter().collect();
        let (doc, _) = run(&request, &pool);
        let images = image_ops(&doc);
        assert_eq!((images[0].2, images[0].3), (40.0, 30.0));
    }

    #[test]
    fn test_shared_figure_renders_in_first_chapter_only() {
        let request = request(vec![
            chapter(2, "제2장 둘\n{{IMG:chart}}"),
            chapter(1, "제1장 하나\n{{IMG:chart}}"),
        ]);
        let pool: AssetPool = [ImageAsset::new("chart.png", png(100, 100))].into_iter().collect();
        let (doc, report) = run(&request, &pool);

        let images = image_ops(&doc);
        assert_eq!(images.len(), 1);
        // Chapter 1 runs first: cover 1, toc 2, title 3, body 4.
        assert_eq!(images[0].0, 4);
        assert_eq!(report.duplicate_tags, vec!["chart"]);
    }

    #[test]
    fn test_unresolved_and_broken_figures_are_reported() {
        let request = request(vec![chapter(1, "{{IMG:missing}}\n{{IMG:broken}}\n본문")]);
        let pool: AssetPool = [ImageAsset::new("broken.png", b"not png".to_vec())]
            .into_iter()
            .collect();
        let (doc, report) = run(&request, &pool);

        assert!(image_ops(&doc).is_empty());
        assert_eq!(report.unresolved_tags, vec!["missing"]);
        assert_eq!(report.failed_images, vec!["broken.png"]);
        assert_eq!(report.page_count, 4);
    }

    #[test]
    fn test_empty_chapter_list_yields_cover_and_contents() {
        let (doc, report) = run(&request(Vec::new()), &AssetPool::new());
        assert_eq!(report.page_count, 2);
        assert_eq!(doc.pages()[1].kind, PageKind::Contents);
    }

    #[test]
    fn test_empty_chapter_leaves_no_blank_page() {
        let request = request(vec![chapter(1, ""), chapter(2, "본문")]);
        let (doc, _) = run(&request, &AssetPool::new());
        let kinds: Vec<PageKind> = doc.pages().iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![
                PageKind::Cover,
                PageKind::Contents,
                PageKind::ChapterTitle,
                PageKind::ChapterTitle,
                PageKind::Body
            ]
        );
        // Synthesized title for a chapter without a title line.
        assert!(doc.pages()[2].texts().any(|t| t == "제1장"));
    }

    #[test]
    fn test_page_numbers_are_consecutive() {
        let long = "가나다라마바사아자차카타파하 ".repeat(400);
        let request = request(vec![chapter(1, &long), chapter(2, &long)]);
        let (doc, report) = run(&request, &AssetPool::new());
        let numbers: Vec<u32> = doc.pages().iter().map(|p| p.number).collect();
        let expected: Vec<u32> = (1..=report.page_count as u32).collect();
        assert_eq!(numbers, expected);
        assert!(report.page_count > 6);
    }

    #[test]
    fn test_placements_stay_above_bottom_margin() {
        let long = "▶ 소제목\n".to_string() + &"본문 문장입니다. ".repeat(300) + "\n{{IMG:fig}}\n";
        let request = request(vec![chapter(1, &long.repeat(3))]);
        let pool: AssetPool = [ImageAsset::new("fig.png", png(300, 600))].into_iter().collect();
        let (doc, _) = run(&request, &pool);
        let layout = default_layout_config();

        for page in doc.pages().iter().filter(|p| p.kind == PageKind::Body) {
            for op in &page.ops {
                match op {
                    DrawOp::Text { y, size, .. } if *size != layout.footer_size => {
                        assert!(*y >= layout.margins.bottom, "text at {y} on page {}", page.number)
                    }
                    DrawOp::Image { y, .. } => {
                        assert!(*y >= layout.margins.bottom, "image at {y} on page {}", page.number)
                    }
                    _ => {}
                }
            }
        }
    }

    #[test]
    fn test_assembly_is_idempotent() {
        let request = request(vec![
            chapter(1, "제1장 하나\n▶ 소제목\n본문\n{{IMG:a}}"),
            chapter(2, "제2장 둘\n{{IMG:b}}\n\n끝"),
        ]);
        let pool: AssetPool = [
            ImageAsset::new("a.png", png(200, 100)),
            ImageAsset::new("b.png", png(100, 200)),
        ]
        .into_iter()
        .collect();

        let (first, first_report) = run(&request, &pool);
        let (second, second_report) = run(&request, &pool);
        assert_eq!(first.pages(), second.pages());
        assert_eq!(first_report.page_count, second_report.page_count);
        assert_eq!(first_report.placed_images, second_report.placed_images);
    }

    #[test]
    fn test_image_toc_and_guide_pages() {
        let request = request(vec![chapter(1, "본문")]);
        let pool: AssetPool = [
            ImageAsset::new("toc_2.png", png(10, 10)),
            ImageAsset::new("toc_1.png", png(10, 10)),
            ImageAsset::new("guide.png", png(10, 10)),
        ]
        .into_iter()
        .collect();
        let (doc, _) = run(&request, &pool);

        let kinds: Vec<PageKind> = doc.pages().iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![
                PageKind::Cover,
                PageKind::Contents,
                PageKind::Contents,
                PageKind::ChapterTitle,
                PageKind::Body,
                PageKind::Guide
            ]
        );
        assert_eq!(doc.pages()[1].image_names().collect::<Vec<_>>(), vec!["toc_1.png"]);
        assert_eq!(doc.pages()[5].image_names().collect::<Vec<_>>(), vec!["guide.png"]);
    }

    #[test]
    fn test_undecodable_toc_images_fall_back_to_text_list() {
        let request = request(vec![chapter(1, "제1장 테스트\n본문")]);
        let pool: AssetPool = [
            ImageAsset::new("toc_1.png", b"not png".to_vec()),
            ImageAsset::new("toc_2.png", b"also not png".to_vec()),
        ]
        .into_iter()
        .collect();
        let (doc, report) = run(&request, &pool);

        assert_eq!(report.page_count, 4);
        let contents = &doc.pages()[1];
        assert_eq!(contents.kind, PageKind::Contents);
        assert_eq!(contents.image_names().count(), 0);
        let texts: Vec<&str> = contents.texts().collect();
        assert!(texts.contains(&"목 차"), "contents texts: {texts:?}");
        assert!(texts.contains(&"제1장. 테스트"));
    }

    #[test]
    fn test_blank_run_before_first_paragraph_stays_above_margin() {
        let text = format!("제1장 테스트\n{}본문입니다.\n둘째 줄", "\n".repeat(80));
        let request = request(vec![chapter(1, &text)]);
        let (doc, _) = run(&request, &AssetPool::new());
        let layout = default_layout_config();

        let mut found = false;
        for page in doc.pages().iter().filter(|p| p.kind == PageKind::Body) {
            for op in &page.ops {
                if let DrawOp::Text { text, y, .. } = op {
                    if text == "본문입니다." || text == "둘째 줄" {
                        found = true;
                        assert!(
                            *y - layout.body_line_height() >= layout.margins.bottom,
                            "{text} at {y} on page {} ends below the margin",
                            page.number
                        );
                        assert!(*y >= layout.floor_y(), "{text} at {y} sits in the footer gap");
                    }
                }
            }
        }
        assert!(found, "paragraph lines must be drawn");
    }

    #[test]
    fn test_long_contents_list_paginates() {
        let chapters: Vec<Chapter> = (1..=60).map(|i| chapter(i, "")).collect();
        let (doc, _) = run(&request(chapters), &AssetPool::new());
        let contents = doc
            .pages()
            .iter()
            .filter(|p| p.kind == PageKind::Contents)
            .count();
        assert!(contents >= 2, "60 entries cannot fit on one page");
    }

    #[test]
    fn test_cancelled_assembly_returns_error() {
        let request = request(vec![chapter(1, "본문")]);
        let fonts = FontSet::builtin();
        let layout = default_layout_config();
        let classifier = Classifier::default();
        let pool = AssetPool::new();
        let input = AssemblyInput {
            request: &request,
            pool: &pool,
            fonts: &fonts,
            layout: &layout,
            classifier: &classifier,
        };
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(assemble(&input, &cancel), Err(ReportError::Cancelled)));
    }

    #[test]
    fn test_assemble_produces_pdf_bytes() {
        let request = request(vec![chapter(1, "제1장 테스트\n본문입니다.")]);
        let fonts = FontSet::builtin();
        let layout = default_layout_config();
        let classifier = Classifier::default();
        let pool = AssetPool::new();
        let input = AssemblyInput {
            request: &request,
            pool: &pool,
            fonts: &fonts,
            layout: &layout,
            classifier: &classifier,
        };
        let artifact = assemble(&input, &CancelToken::new()).unwrap();
        assert!(artifact.pdf.starts_with(b"%PDF-"));
        assert_eq!(artifact.page_count, 4);
    }
}

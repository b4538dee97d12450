//! PDF serialization of a sealed document.
//!
//! Resource naming is fixed: `F1` is the regular weight, `F2` the bold weight,
//! and images are `Im1..ImN` in image-name order. Built-in faces are written
//! as plain Type 1 fonts with WinAnsi encoding. Embedded TrueType faces are
//! written as Type 0 / CIDFontType2 with Identity-H encoding, so the content
//! stream carries big-endian glyph ids; a ToUnicode CMap keeps the text
//! extractable. When bold and regular are the same face it is embedded once.

use std::collections::{BTreeMap, HashMap};

use miniz_oxide::deflate::compress_to_vec_zlib;
use pdf_writer::types::{CidFontType, FontFlags, SystemInfo, UnicodeCmap};
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, Str, TextStr};

use crate::layout::font_metrics::{BuiltinFace, FontMetricTable};
use crate::layout::fonts::{EmbeddedFont, Font, FontSet, FontWeight};
use crate::render::document::{DrawOp, RenderedPage, SealedDocument};
use crate::render::raster::{ImageEncoding, PreparedImage};

const DEFLATE_LEVEL: u8 = 6;
const PRODUCER: &str = concat!("report-api ", env!("CARGO_PKG_VERSION"));

fn resource_name(weight: FontWeight) -> Name<'static> {
    match weight {
        FontWeight::Regular => Name(b"F1"),
        FontWeight::Bold => Name(b"F2"),
    }
}

fn identity_system_info() -> SystemInfo<'static> {
    SystemInfo {
        registry: Str(b"Adobe"),
        ordering: Str(b"Identity"),
        supplement: 0,
    }
}

/// Serializes `doc` with `fonts`, which must be the set it was laid out with.
pub fn write_pdf(doc: &SealedDocument, fonts: &FontSet) -> Vec<u8> {
    let mut alloc = Ref::new(1);
    let catalog_id = alloc.bump();
    let pages_id = alloc.bump();
    let info_id = alloc.bump();
    let mut pdf = Pdf::new();

    // ── Fonts ───────────────────────────────────────────────────────────────
    let shared = fonts.bold_shares_regular();
    let regular_weights: &[FontWeight] = if shared {
        &[FontWeight::Regular, FontWeight::Bold]
    } else {
        &[FontWeight::Regular]
    };
    let regular_ref = write_font(&mut pdf, &mut alloc, &fonts.regular, doc, regular_weights);
    let bold_ref = if shared {
        regular_ref
    } else {
        write_font(&mut pdf, &mut alloc, &fonts.bold, doc, &[FontWeight::Bold])
    };

    // ── Images ──────────────────────────────────────────────────────────────
    let mut xobjects: Vec<(String, Ref)> = Vec::new();
    let mut xobject_names: HashMap<&str, String> = HashMap::new();
    for (name, image) in doc.images() {
        let id = write_image(&mut pdf, &mut alloc, image);
        let resource = format!("Im{}", xobjects.len() + 1);
        xobject_names.insert(name.as_str(), resource.clone());
        xobjects.push((resource, id));
    }

    // ── Pages ───────────────────────────────────────────────────────────────
    let mut page_ids = Vec::with_capacity(doc.page_count());
    for page in doc.pages() {
        let page_id = alloc.bump();
        let content_id = alloc.bump();
        page_ids.push(page_id);

        let content = page_content(page, fonts, &xobject_names);
        pdf.stream(content_id, &content).filter(Filter::FlateDecode);

        let mut page_writer = pdf.page(page_id);
        page_writer
            .media_box(Rect::new(0.0, 0.0, doc.width(), doc.height()))
            .parent(pages_id)
            .contents(content_id);
        let mut resources = page_writer.resources();
        {
            let mut font_dict = resources.fonts();
            font_dict.pair(resource_name(FontWeight::Regular), regular_ref);
            font_dict.pair(resource_name(FontWeight::Bold), bold_ref);
        }
        if !xobjects.is_empty() {
            let mut xobject_dict = resources.x_objects();
            for (name, id) in &xobjects {
                xobject_dict.pair(Name(name.as_bytes()), *id);
            }
        }
    }

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(page_ids.iter().copied())
        .count(page_ids.len() as i32);
    pdf.document_info(info_id)
        .title(TextStr(doc.title()))
        .producer(TextStr(PRODUCER));

    pdf.finish()
}

// ────────────────────────────────────────────────────────────────────────────
// Fonts
// ────────────────────────────────────────────────────────────────────────────

/// `weights` are the text weights drawn with this face.
fn write_font(
    pdf: &mut Pdf,
    alloc: &mut Ref,
    font: &Font,
    doc: &SealedDocument,
    weights: &[FontWeight],
) -> Ref {
    match font {
        Font::Builtin(face) => write_builtin_font(pdf, alloc, *face),
        Font::Embedded(embedded) => {
            let used = used_glyphs(embedded, doc, weights);
            write_embedded_font(pdf, alloc, embedded, &used)
        }
    }
}

fn write_builtin_font(pdf: &mut Pdf, alloc: &mut Ref, face: BuiltinFace) -> Ref {
    let id = alloc.bump();
    pdf.type1_font(id)
        .base_font(Name(face.base_font().as_bytes()))
        .encoding_predefined(Name(b"WinAnsiEncoding"));
    id
}

/// Glyph id → first character drawn with it, over all text ops of `weights`.
fn used_glyphs(
    font: &EmbeddedFont,
    doc: &SealedDocument,
    weights: &[FontWeight],
) -> BTreeMap<u16, char> {
    let mut used = BTreeMap::new();
    used.insert(0, '\u{FFFD}');
    for page in doc.pages() {
        for op in &page.ops {
            if let DrawOp::Text { text, weight, .. } = op {
                if !weights.contains(weight) {
                    continue;
                }
                for ch in text.chars() {
                    used.entry(font.glyph_id(ch)).or_insert(ch);
                }
            }
        }
    }
    used
}

fn write_embedded_font(
    pdf: &mut Pdf,
    alloc: &mut Ref,
    font: &EmbeddedFont,
    used: &BTreeMap<u16, char>,
) -> Ref {
    let type0_id = alloc.bump();
    let cid_id = alloc.bump();
    let descriptor_id = alloc.bump();
    let file_id = alloc.bump();
    let cmap_id = alloc.bump();
    let base_font = Name(font.name.as_bytes());

    pdf.type0_font(type0_id)
        .base_font(base_font)
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_id)
        .to_unicode(cmap_id);

    let mut cid = pdf.cid_font(cid_id);
    cid.subtype(CidFontType::Type2)
        .base_font(base_font)
        .system_info(identity_system_info())
        .font_descriptor(descriptor_id)
        .default_width(0.0)
        .cid_to_gid_map_predefined(Name(b"Identity"));
    {
        let mut widths = cid.widths();
        for &gid in used.keys() {
            widths.consecutive(gid, [font.glyph_width_milli(gid)]);
        }
    }
    cid.finish();

    let [ascent, descent, cap_height] = font.vertical_metrics_milli();
    let [x_min, y_min, x_max, y_max] = font.bbox_milli();
    pdf.font_descriptor(descriptor_id)
        .name(base_font)
        .flags(FontFlags::SYMBOLIC)
        .bbox(Rect::new(x_min, y_min, x_max, y_max))
        .italic_angle(0.0)
        .ascent(ascent)
        .descent(descent)
        .cap_height(cap_height)
        .stem_v(80.0)
        .font_file2(file_id);

    let program = compress_to_vec_zlib(font.data(), DEFLATE_LEVEL);
    pdf.stream(file_id, &program)
        .filter(Filter::FlateDecode)
        .pair(Name(b"Length1"), font.data().len() as i32);

    let mut cmap: UnicodeCmap = UnicodeCmap::new(Name(b"Custom"), identity_system_info());
    for (&gid, &ch) in used {
        if gid != 0 {
            cmap.pair(gid, ch);
        }
    }
    pdf.cmap(cmap_id, &cmap.finish());

    type0_id
}

fn encode_text(font: &Font, text: &str) -> Vec<u8> {
    match font {
        Font::Builtin(_) => text.chars().map(FontMetricTable::encode_char).collect(),
        Font::Embedded(embedded) => text
            .chars()
            .flat_map(|ch| embedded.glyph_id(ch).to_be_bytes())
            .collect(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Images and content
// ────────────────────────────────────────────────────────────────────────────

fn write_image(pdf: &mut Pdf, alloc: &mut Ref, image: &PreparedImage) -> Ref {
    let id = alloc.bump();
    let (width, height) = (image.width as i32, image.height as i32);

    match &image.encoding {
        ImageEncoding::Dct { data, gray } => {
            let mut xobject = pdf.image_xobject(id, data);
            xobject.filter(Filter::DctDecode);
            xobject.width(width);
            xobject.height(height);
            if *gray {
                xobject.color_space().device_gray();
            } else {
                xobject.color_space().device_rgb();
            }
            xobject.bits_per_component(8);
        }
        ImageEncoding::Flate { rgb, alpha } => {
            let mask_id = alpha.as_ref().map(|samples| {
                let mask_id = alloc.bump();
                let mut mask = pdf.image_xobject(mask_id, samples);
                mask.filter(Filter::FlateDecode);
                mask.width(width);
                mask.height(height);
                mask.color_space().device_gray();
                mask.bits_per_component(8);
                mask_id
            });

            let mut xobject = pdf.image_xobject(id, rgb);
            xobject.filter(Filter::FlateDecode);
            xobject.width(width);
            xobject.height(height);
            xobject.color_space().device_rgb();
            xobject.bits_per_component(8);
            if let Some(mask_id) = mask_id {
                xobject.s_mask(mask_id);
            }
        }
    }
    id
}

/// Deflated content stream for one page.
fn page_content(page: &RenderedPage, fonts: &FontSet, xobjects: &HashMap<&str, String>) -> Vec<u8> {
    let mut content = Content::new();

    for op in &page.ops {
        match op {
            DrawOp::Text {
                text,
                x,
                y,
                size,
                weight,
            } => {
                let encoded = encode_text(fonts.get(*weight), text);
                content
                    .begin_text()
                    .set_font(resource_name(*weight), *size)
                    .next_line(*x, *y)
                    .show(Str(&encoded))
                    .end_text();
            }
            DrawOp::Image {
                name,
                x,
                y,
                width,
                height,
            } => {
                let Some(resource) = xobjects.get(name.as_str()) else {
                    continue;
                };
                content
                    .save_state()
                    .transform([*width, 0.0, 0.0, *height, *x, *y])
                    .x_object(Name(resource.as_bytes()))
                    .restore_state();
            }
        }
    }

    let raw = content.finish();
    compress_to_vec_zlib(&raw, DEFLATE_LEVEL)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

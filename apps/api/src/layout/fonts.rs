//! Font Resolver — picks the regular/bold pair used for the whole process.
//!
//! Candidates are tried in order; the first file that exists and parses wins
//! and is used for both weights unless a distinct bold file was configured.
//! When nothing loads, the built-in Helvetica pair is used instead. That loses
//! CJK glyph coverage but still produces a valid document.
//!
//! The resolved set is cached process-wide in a `OnceLock`. `main` resolves it
//! once before the server accepts requests, so concurrent assemblies all see
//! the same fonts.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use ttf_parser::GlyphId;

use crate::layout::font_metrics::{BuiltinFace, TextMeasure};

const FONT_EXTENSIONS: [&str; 2] = ["ttf", "otf"];

static RESOLVED: OnceLock<Arc<FontSet>> = OnceLock::new();

#[derive(Debug, Error)]
pub enum FontError {
    #[error("failed to read font file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse font file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

// ────────────────────────────────────────────────────────────────────────────
// Font types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontWeight {
    Regular,
    Bold,
}

/// A TrueType/OpenType face loaded from disk, with its cmap flattened so that
/// width lookups never re-parse the file.
pub struct EmbeddedFont {
    /// PostScript-safe name used as the PDF `BaseFont`.
    pub name: String,
    data: Arc<[u8]>,
    units_per_em: f32,
    ascender: i16,
    descender: i16,
    cap_height: i16,
    bbox: [i16; 4],
    glyphs: HashMap<char, u16>,
    advances: Vec<u16>,
}

impl EmbeddedFont {
    pub fn load(path: &Path) -> Result<Self, FontError> {
        let data = std::fs::read(path).map_err(|source| FontError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(pdf_font_name(path), data).map_err(|reason| FontError::Parse {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn from_bytes(name: String, data: Vec<u8>) -> Result<Self, String> {
        if ttf_parser::fonts_in_collection(&data).is_some() {
            return Err("font collections cannot be embedded; extract a single face".to_string());
        }
        let (units_per_em, ascender, descender, cap_height, bbox, glyphs, advances) = {
            let face = ttf_parser::Face::parse(&data, 0).map_err(|e| e.to_string())?;
            // FontFile2 carries TrueType outlines only.
            if face.tables().glyf.is_none() {
                return Err("font has no glyf table (CFF outlines are not supported)".to_string());
            }

            let mut glyphs: HashMap<char, u16> = HashMap::new();
            if let Some(cmap) = face.tables().cmap {
                for subtable in cmap.subtables {
                    if !subtable.is_unicode() {
                        continue;
                    }
                    subtable.codepoints(|cp| {
                        if let (Some(ch), Some(gid)) = (char::from_u32(cp), subtable.glyph_index(cp))
                        {
                            glyphs.entry(ch).or_insert(gid.0);
                        }
                    });
                }
            }
            if glyphs.is_empty() {
                return Err("font has no unicode cmap subtable".to_string());
            }

            let advances: Vec<u16> = (0..face.number_of_glyphs())
                .map(|g| face.glyph_hor_advance(GlyphId(g)).unwrap_or(0))
                .collect();
            let rect = face.global_bounding_box();

            (
                f32::from(face.units_per_em()),
                face.ascender(),
                face.descender(),
                face.capital_height().unwrap_or_else(|| face.ascender()),
                [rect.x_min, rect.y_min, rect.x_max, rect.y_max],
                glyphs,
                advances,
            )
        };

        Ok(EmbeddedFont {
            name,
            data: Arc::from(data),
            units_per_em,
            ascender,
            descender,
            cap_height,
            bbox,
            glyphs,
            advances,
        })
    }

    /// Raw font program, embedded as `FontFile2`.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Glyph id for a character; `0` (.notdef) when the face has no glyph.
    pub fn glyph_id(&self, ch: char) -> u16 {
        self.glyphs.get(&ch).copied().unwrap_or(0)
    }

    /// Advance of a glyph in thousandths of an em, as PDF width arrays expect.
    pub fn glyph_width_milli(&self, gid: u16) -> f32 {
        self.advance_units(gid) * 1000.0 / self.units_per_em
    }

    /// `[ascent, descent, cap_height]` in thousandths of an em.
    pub fn vertical_metrics_milli(&self) -> [f32; 3] {
        let scale = 1000.0 / self.units_per_em;
        [
            f32::from(self.ascender) * scale,
            f32::from(self.descender) * scale,
            f32::from(self.cap_height) * scale,
        ]
    }

    /// Font bounding box in thousandths of an em.
    pub fn bbox_milli(&self) -> [f32; 4] {
        let scale = 1000.0 / self.units_per_em;
        self.bbox.map(|v| f32::from(v) * scale)
    }

    fn advance_units(&self, gid: u16) -> f32 {
        f32::from(self.advances.get(gid as usize).copied().unwrap_or(0))
    }
}

impl TextMeasure for EmbeddedFont {
    fn char_width(&self, ch: char, size: f32) -> f32 {
        self.advance_units(self.glyph_id(ch)) / self.units_per_em * size
    }
}

impl fmt::Debug for EmbeddedFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedFont")
            .field("name", &self.name)
            .field("bytes", &self.data.len())
            .field("glyphs", &self.glyphs.len())
            .finish()
    }
}

/// One face of the resolved pair.
#[derive(Debug, Clone)]
pub enum Font {
    Builtin(BuiltinFace),
    Embedded(Arc<EmbeddedFont>),
}

impl TextMeasure for Font {
    fn char_width(&self, ch: char, size: f32) -> f32 {
        match self {
            Font::Builtin(face) => face.metrics().char_width(ch, size),
            Font::Embedded(font) => font.char_width(ch, size),
        }
    }
}

/// The regular/bold pair every page is drawn with.
#[derive(Debug, Clone)]
pub struct FontSet {
    pub regular: Font,
    pub bold: Font,
}

impl FontSet {
    /// Helvetica / Helvetica-Bold; always available, never embedded.
    pub fn builtin() -> Self {
        FontSet {
            regular: Font::Builtin(BuiltinFace::Helvetica),
            bold: Font::Builtin(BuiltinFace::HelveticaBold),
        }
    }

    pub fn get(&self, weight: FontWeight) -> &Font {
        match weight {
            FontWeight::Regular => &self.regular,
            FontWeight::Bold => &self.bold,
        }
    }

    /// True when both weights are the same embedded face.
    pub fn bold_shares_regular(&self) -> bool {
        match (&self.regular, &self.bold) {
            (Font::Embedded(r), Font::Embedded(b)) => Arc::ptr_eq(r, b),
            _ => false,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.regular, Font::Builtin(_))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Resolution
// ────────────────────────────────────────────────────────────────────────────

/// A regular-weight font file plus an optional distinct bold file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontCandidate {
    pub regular: PathBuf,
    pub bold: Option<PathBuf>,
}

/// Builds the ordered candidate list: every font file in `font_dir` (sorted by
/// name) first, then the explicit paths. `bold` is attached to every candidate.
pub fn candidate_list(
    font_dir: Option<&Path>,
    explicit: &[PathBuf],
    bold: Option<&Path>,
) -> Vec<FontCandidate> {
    let mut paths: Vec<PathBuf> = Vec::new();

    if let Some(dir) = font_dir {
        match std::fs::read_dir(dir) {
            Ok(entries) => {
                let mut found: Vec<PathBuf> = entries
                    .filter_map(|e| e.ok().map(|e| e.path()))
                    .filter(|p| is_font_file(p))
                    .collect();
                found.sort();
                paths.extend(found);
            }
            Err(e) => warn!(dir = %dir.display(), error = %e, "Font directory not readable"),
        }
    }
    paths.extend(explicit.iter().cloned());

    paths
        .into_iter()
        .map(|regular| FontCandidate {
            regular,
            bold: bold.map(Path::to_path_buf),
        })
        .collect()
}

/// Tries each candidate in order without touching the process-wide cache.
pub fn load_font_set(candidates: &[FontCandidate]) -> FontSet {
    for candidate in candidates {
        if !candidate.regular.exists() {
            continue;
        }
        match EmbeddedFont::load(&candidate.regular) {
            Ok(regular) => {
                let regular = Arc::new(regular);
                let bold = candidate
                    .bold
                    .as_deref()
                    .and_then(|path| match EmbeddedFont::load(path) {
                        Ok(bold) => Some(Arc::new(bold)),
                        Err(e) => {
                            warn!(error = %e, "Bold font failed to load; using regular for bold");
                            None
                        }
                    })
                    .unwrap_or_else(|| Arc::clone(&regular));

                info!(
                    regular = %regular.name,
                    bold = %bold.name,
                    path = %candidate.regular.display(),
                    "Font resolved"
                );
                return FontSet {
                    regular: Font::Embedded(regular),
                    bold: Font::Embedded(bold),
                };
            }
            Err(e) => warn!(error = %e, "Font candidate failed to load; trying next"),
        }
    }

    warn!("No font candidate loaded; falling back to built-in Helvetica (CJK glyphs unavailable)");
    FontSet::builtin()
}

/// Resolves the process-wide font set, loading it on first call only.
pub fn resolve(candidates: &[FontCandidate]) -> Arc<FontSet> {
    Arc::clone(RESOLVED.get_or_init(|| Arc::new(load_font_set(candidates))))
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FONT_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

/// Derives a PDF-safe base font name from the file stem.
fn pdf_font_name(path: &Path) -> String {
    let stem: String = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if stem.is_empty() {
        "EmbeddedFont".to_string()
    } else {
        stem
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

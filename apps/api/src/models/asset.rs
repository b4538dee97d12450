use std::io::Cursor;
use std::sync::OnceLock;

use bytes::Bytes;
use serde::Serialize;

/// A named raster image supplied by the caller.
///
/// Pixel dimensions are read from the encoded header the first time they are
/// asked for and cached; `None` means the bytes are not a decodable image.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub name: String,
    pub bytes: Bytes,
    dimensions: OnceLock<Option<(u32, u32)>>,
}

impl ImageAsset {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        ImageAsset {
            name: name.into(),
            bytes: bytes.into(),
            dimensions: OnceLock::new(),
        }
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        *self
            .dimensions
            .get_or_init(|| read_dimensions(&self.bytes))
    }

    /// The name with its final extension removed (`"05_표.png"` → `"05_표"`).
    /// A leading dot does not count as an extension separator.
    pub fn stem(&self) -> &str {
        strip_extension(&self.name)
    }
}

pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

fn read_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

// ────────────────────────────────────────────────────────────────────────────
// Pool
// ────────────────────────────────────────────────────────────────────────────

/// All images available to one document, in the order they were supplied.
///
/// Names are unique: inserting an existing name replaces the bytes but keeps
/// the original position, so match order stays stable.
#[derive(Debug, Clone, Default)]
pub struct AssetPool {
    assets: Vec<ImageAsset>,
}

impl AssetPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, asset: ImageAsset) {
        match self.assets.iter_mut().find(|a| a.name == asset.name) {
            Some(existing) => *existing = asset,
            None => self.assets.push(asset),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ImageAsset> {
        self.assets.iter().find(|a| a.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageAsset> {
        self.assets.iter()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl FromIterator<ImageAsset> for AssetPool {
    fn from_iter<I: IntoIterator<Item = ImageAsset>>(iter: I) -> Self {
        let mut pool = AssetPool::new();
        for asset in iter {
            pool.insert(asset);
        }
        pool
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Classification by name
// ────────────────────────────────────────────────────────────────────────────

const COVER_TOKENS: &[&str] = &["표지", "cover"];
const CHAPTER_BG_TOKENS: &[&str] = &["장배경", "chapter"];
const PAGE_BG_TOKENS: &[&str] = &["내지", "background", "bg", "page"];
const TOC_TOKENS: &[&str] = &["목차", "toc"];
const GUIDE_TOKENS: &[&str] = &["안내", "guide"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetRole {
    Cover,
    ChapterBackground,
    PageBackground,
    TableOfContents,
    Guide,
    Figure,
}

/// Coarse role of an asset from its name. Tokens are checked in a fixed order
/// and the first role whose vocabulary appears in the name wins.
pub fn classify_name(name: &str) -> AssetRole {
    let lower = name.to_lowercase();
    let has = |tokens: &[&str]| tokens.iter().any(|t| lower.contains(t));

    if has(COVER_TOKENS) {
        AssetRole::Cover
    } else if has(CHAPTER_BG_TOKENS) {
        AssetRole::ChapterBackground
    } else if has(PAGE_BG_TOKENS) {
        AssetRole::PageBackground
    } else if has(TOC_TOKENS) {
        AssetRole::TableOfContents
    } else if has(GUIDE_TOKENS) {
        AssetRole::Guide
    } else {
        AssetRole::Figure
    }
}

/// The asset pool split by role.
///
/// Singleton roles keep the first asset by name; TOC and guide pages are
/// sorted by name; figures keep pool order and are the only assets image
/// placeholders can resolve to.
#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    pub cover: Option<ImageAsset>,
    pub chapter_background: Option<ImageAsset>,
    pub page_background: Option<ImageAsset>,
    pub toc_pages: Vec<ImageAsset>,
    pub guide_pages: Vec<ImageAsset>,
    pub figures: AssetPool,
}

impl AssetCatalog {
    pub fn classify(pool: &AssetPool) -> Self {
        let mut catalog = AssetCatalog::default();

        for asset in pool.iter() {
            match classify_name(&asset.name) {
                AssetRole::Cover => keep_first_by_name(&mut catalog.cover, asset),
                AssetRole::ChapterBackground => {
                    keep_first_by_name(&mut catalog.chapter_background, asset)
                }
                AssetRole::PageBackground => {
                    keep_first_by_name(&mut catalog.page_background, asset)
                }
                AssetRole::TableOfContents => catalog.toc_pages.push(asset.clone()),
                AssetRole::Guide => catalog.guide_pages.push(asset.clone()),
                AssetRole::Figure => catalog.figures.insert(asset.clone()),
            }
        }

        catalog.toc_pages.sort_by(|a, b| a.name.cmp(&b.name));
        catalog.guide_pages.sort_by(|a, b| a.name.cmp(&b.name));
        catalog
    }
}

fn keep_first_by_name(slot: &mut Option<ImageAsset>, candidate: &ImageAsset) {
    let replace = match slot {
        Some(current) => candidate.name < current.name,
        None => true,
    };
    if replace {
        *slot = Some(candidate.clone());
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

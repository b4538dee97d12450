//! The in-memory display list the page engine writes into.
//!
//! A [`Document`] only grows: pages are appended as the engine finishes them
//! and images are registered once by name. Sealing consumes it and returns a
//! [`SealedDocument`], which has no mutating methods at all, so nothing can
//! touch the pages after the last footer is drawn.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::layout::fonts::FontWeight;
use crate::models::asset::ImageAsset;
use crate::render::raster::{self, PreparedImage, RasterError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    Cover,
    Contents,
    ChapterTitle,
    Body,
    Guide,
}

/// One drawing instruction in PDF user space (origin bottom-left, points).
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// `y` is the text baseline.
    Text {
        text: String,
        x: f32,
        y: f32,
        size: f32,
        weight: FontWeight,
    },
    /// `(x, y)` is the image's bottom-left corner.
    Image {
        name: String,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub number: u32,
    pub kind: PageKind,
    pub ops: Vec<DrawOp>,
}

impl RenderedPage {
    pub fn new(number: u32, kind: PageKind) -> Self {
        RenderedPage {
            number,
            kind,
            ops: Vec::new(),
        }
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> + '_ {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            DrawOp::Image { .. } => None,
        })
    }

    pub fn image_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Image { name, .. } => Some(name.as_str()),
            DrawOp::Text { .. } => None,
        })
    }
}

#[derive(Debug)]
pub struct Document {
    title: String,
    width: f32,
    height: f32,
    pages: Vec<RenderedPage>,
    images: BTreeMap<String, PreparedImage>,
}

impl Document {
    pub fn new(title: impl Into<String>, width: f32, height: f32) -> Self {
        Document {
            title: title.into(),
            width,
            height,
            pages: Vec::new(),
            images: BTreeMap::new(),
        }
    }

    pub fn push_page(&mut self, page: RenderedPage) {
        self.pages.push(page);
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Decodes `asset` the first time its name is seen. Later calls for the
    /// same name are free, whatever happened the first time.
    pub fn register_image(&mut self, asset: &ImageAsset) -> Result<(), RasterError> {
        if self.images.contains_key(&asset.name) {
            return Ok(());
        }
        let prepared = raster::prepare(&asset.bytes)?;
        self.images.insert(asset.name.clone(), prepared);
        Ok(())
    }

    pub fn seal(self) -> SealedDocument {
        SealedDocument {
            title: self.title,
            width: self.width,
            height: self.height,
            pages: self.pages,
            images: self.images,
        }
    }
}

/// A finished document. Read-only.
#[derive(Debug)]
pub struct SealedDocument {
    title: String,
    width: f32,
    height: f32,
    pages: Vec<RenderedPage>,
    images: BTreeMap<String, PreparedImage>,
}

impl SealedDocument {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn pages(&self) -> &[RenderedPage] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Images by name, in name order.
    pub fn images(&self) -> &BTreeMap<String, PreparedImage> {
        &self.images
    }
}

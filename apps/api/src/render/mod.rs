//! Display list and PDF output. The layout engine writes into a
//! [`document::Document`]; [`pdf::write_pdf`] turns the sealed result into bytes.

pub mod document;
pub mod pdf;
pub mod raster;

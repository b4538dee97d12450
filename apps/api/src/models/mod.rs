pub mod asset;
pub mod chapter;

// Report API: multipart intake, assembly on the blocking pool, optional disk copy.

pub mod handlers;
pub mod output;

//! # Skyway Docs
//!
//! Serves the API document to clients with its private parts removed.
//!
//! Anything the document marks with `x-private` is stripped before the
//! document leaves the process: `x-private: true` drops the marked object,
//! and an array of relative paths drops just those paths. See
//! [`filter_private`] for the rules and [`DocsEndpoint`] for serving.

#![doc(html_root_url = "https://docs.rs/skyway-docs/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod endpoint;
mod private;

pub use endpoint::DocsEndpoint;
pub use private::{filter_private, PRIVATE_MARKER};

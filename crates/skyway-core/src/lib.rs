//! # Skyway Core
//!
//! Core types for the Skyway framework, which turns a Swagger 2.0 document
//! into validated, authenticated, per-operation middleware chains.
//!
//! This crate provides:
//!
//! - [`SkywayError`] - the error every middleware stage fails with
//! - [`SchemaError`] - document-load failures, cleaned before exposure
//! - [`normalize()`](normalize::normalize) - the Schema Normalizer
//! - [`NormalizedDocument`], [`Operation`], [`Parameter`] - the operation model
//! - [`RequestId`] - UUID v7 request identifier

#![doc(html_root_url = "https://docs.rs/skyway-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
pub mod model;
pub mod normalize;
mod schema_error;

pub use context::RequestId;
pub use error::{ErrorCategory, ErrorDetail, ErrorEnvelope, FieldFailure, SkywayError, SkywayResult};
pub use model::{
    ApiKeyLocation, NormalizedDocument, Operation, ParamLocation, Parameter, ParameterGroups,
    PathItem, SchemeKind, SecurityRequirement, SecurityScheme,
};
pub use schema_error::{docs_url, pointer_path, SchemaError, SchemaErrorDetail, SWAGGER_SPEC_URL};

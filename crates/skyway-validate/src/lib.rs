//! Parameter validation for Skyway.
//!
//! For each operation one validator is compiled per parameter location.
//! A validator owns a draft-4 JSON schema built from the declared
//! parameters and applies the laxness of string transports before the
//! schema engine runs:
//!
//! - absent properties receive their declared `default`
//! - array parameters are split by their `collectionFormat`
//! - strings are coerced to `integer`, `number` and `boolean`
//! - undeclared properties are stripped where the policy asks for it
//!
//! ```rust
//! use serde_json::json;
//! use skyway_core::{ParamLocation, Parameter};
//! use skyway_validate::{CompiledValidator, ValidationConfig};
//!
//! let ids = json!({
//!     "name": "ids", "in": "query", "type": "array",
//!     "collectionFormat": "pipes", "items": { "type": "integer" }
//! });
//! let params = vec![Parameter::from_definition(ids.as_object().unwrap()).unwrap()];
//! let validator =
//!     CompiledValidator::compile(&params, ParamLocation::Query, &ValidationConfig::default())
//!         .unwrap();
//!
//! let coerced = validator.validate(json!({ "ids": "1|2|3" })).unwrap();
//! assert_eq!(coerced, json!({ "ids": [1, 2, 3] }));
//! ```

#![doc(html_root_url = "https://docs.rs/skyway-validate/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod coerce;
mod collection;
mod config;
mod formats;
pub mod input;
mod schema;
mod validator;

pub use coerce::prepare;
pub use collection::CollectionFormat;
pub use config::{AdditionalProperties, ValidationConfig};
pub use formats::POINTLESS_FORMATS;
pub use schema::{schema_from_params, COLLECTION_FORMAT_KEY, VALID_PARAM_KEYS};
pub use validator::{CompiledValidator, OperationValidators};

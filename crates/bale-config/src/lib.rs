//! Configuration for bale: the model, layered loading, and validation.

pub mod config;
pub mod discovery;
pub mod error;
pub mod overrides;
pub mod schema;
pub mod tsconfig;
pub mod validation;

pub use config::*;
pub use error::*;

pub use discovery::{
    CONFIG_FILE, ConfigLoader, ConfigSource, ENV_PREFIX, PACKAGE_JSON_FIELD, discover,
};
pub use overrides::{BuildOverrides, CoverageOverrides, Overrides, TestOverrides};
pub use schema::{json_schema, validate_value};
pub use tsconfig::{TsConfig, discover_tsconfig};
pub use validation::{
    ConfigValidator, FsValidator, SchemaValidator, parse_global, validate_fs, validate_schema,
};

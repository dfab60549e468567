//! Report Core: data model, option resolution and cache keys
//!
//! Everything the request pipeline passes between components lives here:
//! report definitions, the canonical option set, the cache key derived from
//! both, and the tabular payload a generator produces.

pub mod cache_key;
pub mod context;
pub mod data_model;
pub mod definition;
pub mod error;
pub mod generator;
pub mod options;

pub use cache_key::{percent_encode, CacheKey};
pub use context::{Action, RequestContext};
pub use data_model::{CachedArtifact, Cell, ReportData, Row, Table};
pub use definition::{DefinitionError, ReportDefinition, ReportDefinitionBuilder};
pub use error::ReportError;
pub use generator::{from_fn, FnGenerator, GenerationError, Generator};
pub use options::{
    parse_bool, CanonicalRedirect, OptionDisplay, OptionResolver, OptionSet, Resolution,
    ResolvedRequest, FORMAT_PARAM, ORGANIZATION_OPTION, REFRESH_PARAM,
};

/// Engine version stamped into rendered pages.
pub const REPORT_ENGINE_VERSION: &str = "1.0.0";

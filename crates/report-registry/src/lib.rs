//! Report Registry: the catalogue of report definitions
pub mod catalogue;
pub mod fixture;
pub mod registry;

pub use catalogue::{CatalogueError, CatalogueFile, GeneratorBindings, ReportEntry};
pub use fixture::FixtureGenerator;
pub use registry::{RegistryBuilder, RegistryError, ReportRegistry};

pub mod model;
pub mod parser;
pub mod reader;

pub use model::{
    ConfigurationUnit, ImportRegistry, SourceCandidate, IMPORT_REGISTRY_NAME,
};
pub use parser::SourceParser;
pub use reader::DefinitionReader;

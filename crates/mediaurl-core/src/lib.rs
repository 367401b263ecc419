pub mod addon;
pub mod config;
pub mod observability;
pub mod protocol;
pub mod schema;
pub mod version;

pub use addon::AddonDescriptor;
pub use protocol::{Action, Direction, TaskRequest, TaskResponse};
pub use schema::{ModelKind, SchemaError, StructuralValidator, Validator};

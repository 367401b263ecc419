//! MediaURL configuration layer
//!
//! All environment reads live here; engine code receives structured config
//! values and never calls `std::env::var` itself.
//!
//! - `loader`: env_or, env_optional, env_bool, env_millis helpers
//! - `schema`: ClientConfig, ObservabilityConfig
//! - `env_keys`: key constants (with legacy `WATCHED_*` aliases)

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{env_bool, env_millis, env_optional, env_or, load_dotenv};
pub use schema::{ClientConfig, ObservabilityConfig};

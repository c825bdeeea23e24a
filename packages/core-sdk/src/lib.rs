pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod models;
pub mod registry;
pub mod server;
pub mod store;
pub mod telemetry;
pub mod token;

/**
 * \brief Commonly used modules, re-exported for front ends.
 */
pub mod prelude {
    pub use crate::config;
    pub use crate::history;
    pub use crate::llm;
    pub use crate::models;
    pub use crate::registry;
    pub use crate::server;
    pub use crate::store;
    pub use crate::telemetry;
}

pub mod compare;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod model;
pub mod orchestrator;
pub mod payload;
pub mod plan;
pub mod session;
pub mod stats;
pub mod store;

pub use compare::*;
pub use config::*;
pub use dispatcher::*;
pub use error::*;
pub use executor::*;
pub use model::*;
pub use orchestrator::*;
pub use payload::*;
pub use plan::*;
pub use session::*;
pub use stats::*;
pub use store::*;

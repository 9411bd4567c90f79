//! Application services for pooled backend connections.

mod error;
mod factory;
mod fanout;
mod getter;
mod launch;
mod pool;
mod sandboxed;
mod templates;

pub use error::ClientPoolError;
pub use fanout::{BackendResponse, CapabilityFanout};
pub use getter::ClientGetter;
pub use launch::ContainerLaunchPlan;
pub use pool::{ClientPool, KeptEntry};
pub use templates::TemplateRenderer;

//! Application services for sandbox provisioning and teardown.

mod dns;
mod error;
mod l4;
mod l7;
mod naming;
mod orchestrator;
mod readiness;
mod rollback;
mod teardown;

pub use error::{NetworkScope, SandboxError, SidecarKind};
pub use orchestrator::{Sandbox, SandboxOrchestrator};
pub use readiness::ReadinessPolicy;
pub use teardown::SandboxTeardown;

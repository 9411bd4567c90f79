//! Backend client implementations and in-memory test doubles.

pub mod memory;

mod remote;
mod slot;
mod static_bridge;
mod stdio;
mod tool_process;

pub use remote::RemoteClient;
pub use static_bridge::StaticClient;
pub use stdio::StdioClient;
pub use tool_process::ProcessToolRunner;

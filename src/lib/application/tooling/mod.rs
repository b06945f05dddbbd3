mod error;
mod hub;
mod process;
mod registry;
mod session;

pub use error::{ToolError, ToolInvokeError};
pub use hub::ToolHub;
pub use process::McpProcess;
pub use registry::{RegisteredTool, ToolRegistry};
pub use session::ToolSession;

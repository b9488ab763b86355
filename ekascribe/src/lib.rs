pub mod clients;
pub mod config;
pub mod error;
pub mod logging;
pub mod workflow;

pub use ekascribe_protocol as protocol;

pub use clients::{EkaClient, Session};
pub use error::Error;
pub use workflow::{Workflow, WorkflowError, WorkflowRequest, WorkflowResult, WorkflowStage};

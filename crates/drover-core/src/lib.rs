pub mod config;
pub mod error;
pub mod job;
pub mod ps;
pub mod registry;
pub mod status;
pub mod supervisor;

pub use config::Settings;
pub use error::{DroverError, Result};
pub use job::{Job, JobSnapshot};
pub use registry::Registry;
pub use status::JobStatus;
pub use supervisor::{LaunchOutcome, SHEPHERD_COMMAND, Supervisor};

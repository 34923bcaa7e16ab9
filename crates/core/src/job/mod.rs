//! Job identity, lifecycle and registry.

mod registry;
mod types;

pub use registry::{JobRegistry, StatusCounts};
pub use types::{
    Job, JobEvent, JobId, JobPhase, JobStatus, MSG_CHECKING_AUDIO, MSG_COMPLETED, MSG_ENCODING,
};

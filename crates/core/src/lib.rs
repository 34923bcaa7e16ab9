pub mod config;
pub mod coordinator;
pub mod encoder;
pub mod error;
pub mod job;
pub mod metrics;
pub mod namespace;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, ServerConfig,
    StorageConfig, UploadConfig,
};
pub use coordinator::{JobUpdate, JobUpdateCallback, TranscodeCoordinator};
pub use encoder::{
    EncodeInvocation, EncodeLauncher, EncodeProcess, EncoderConfig, ExitOutcome, FfmpegLauncher,
    FfprobeInspector, Rendition, RenditionPlanner, StreamInspector,
};
pub use error::TranscodeError;
pub use job::{Job, JobEvent, JobId, JobPhase, JobRegistry, JobStatus, StatusCounts};
pub use namespace::{ArtifactNamespace, MANIFEST_FILE_NAME};

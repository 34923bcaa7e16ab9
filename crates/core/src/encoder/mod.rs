//! Encoder module: audio probing, rendition planning and process launch.
//!
//! The coordinator only depends on the [`StreamInspector`] and [`EncodeLauncher`]
//! traits. [`FfprobeInspector`] and [`FfmpegLauncher`] are the production
//! implementations; `crate::testing` provides fakes.
//!
//! # Example
//!
//! ```ignore
//! use dashpack_core::encoder::{EncoderConfig, FfmpegLauncher, FfprobeInspector, RenditionPlanner};
//!
//! let config = EncoderConfig::default();
//! let inspector = FfprobeInspector::new(&config);
//! let has_audio = inspector.has_audio(Path::new("/uploads/clip.mp4")).await;
//!
//! let invocation = RenditionPlanner::standard().plan(
//!     Path::new("/uploads/clip.mp4"),
//!     has_audio,
//!     Path::new("/video/<job>/manifest.mpd"),
//! );
//!
//! let mut process = FfmpegLauncher::new(config).launch(&job_id, &invocation).await?;
//! let outcome = process.wait().await?;
//! ```

mod config;
mod ffmpeg;
mod planner;
mod traits;

pub use config::EncoderConfig;
pub use ffmpeg::{FfmpegLauncher, FfprobeInspector};
pub use planner::{
    AdaptationSet, AudioRendition, EncodeInvocation, Rendition, RenditionPlanner,
    KEYFRAME_INTERVAL, OUTPUT_FORMAT,
};
pub use traits::{EncodeLauncher, EncodeProcess, ExitOutcome, StreamInspector};

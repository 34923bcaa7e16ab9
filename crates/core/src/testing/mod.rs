//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the encoder collaborator
//! traits, allowing the full job lifecycle to be tested without ffmpeg.
//!
//! # Example
//!
//! ```rust,ignore
//! use dashpack_core::testing::{MockInspector, MockLauncher};
//!
//! let inspector = Arc::new(MockInspector::with_audio());
//! let launcher = Arc::new(MockLauncher::new());
//! launcher.set_exit_code(Some(1)).await;
//!
//! let coordinator = TranscodeCoordinator::new(namespace, inspector, launcher);
//! ```

mod mock_inspector;
mod mock_launcher;

pub use mock_inspector::MockInspector;
pub use mock_launcher::{MockLauncher, RecordedLaunch, MOCK_SEGMENT_NAME};

//! Rendition planning and encode invocation assembly.
//!
//! Planning is pure: given an input, the audio flag and a destination, the
//! planner always produces the same argument vector.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Output muxer for the segmented adaptive-streaming package.
pub const OUTPUT_FORMAT: &str = "dash";

/// Keyframe interval shared by every rendition, in frames.
pub const KEYFRAME_INTERVAL: u32 = 48;

/// One planned video quality tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rendition {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub bitrate_kbps: u32,
    pub aspect: String,
    pub codec: String,
    pub profile: String,
    pub preset: String,
    pub keyframe_interval: u32,
    pub scene_cut_detection: bool,
}

impl Rendition {
    fn h264(name: &str, width: u32, height: u32, bitrate_kbps: u32) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            bitrate_kbps,
            aspect: "16:9".to_string(),
            codec: "libx264".to_string(),
            profile: "main".to_string(),
            preset: "fast".to_string(),
            keyframe_interval: KEYFRAME_INTERVAL,
            scene_cut_detection: false,
        }
    }

    pub fn frame_size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Mapping and encoding flags for this rendition as output video stream `index`.
    fn args(&self, index: usize) -> Vec<String> {
        let mut args = vec![
            "-map".to_string(),
            "0:v".to_string(),
            format!("-b:v:{}", index),
            format!("{}k", self.bitrate_kbps),
            format!("-s:v:{}", index),
            self.frame_size(),
            format!("-aspect:v:{}", index),
            self.aspect.clone(),
            format!("-c:v:{}", index),
            self.codec.clone(),
            format!("-profile:v:{}", index),
            self.profile.clone(),
            format!("-preset:v:{}", index),
            self.preset.clone(),
            format!("-keyint_min:v:{}", index),
            self.keyframe_interval.to_string(),
            format!("-g:v:{}", index),
            self.keyframe_interval.to_string(),
        ];

        if !self.scene_cut_detection {
            args.extend([format!("-sc_threshold:v:{}", index), "0".to_string()]);
        }

        args
    }
}

/// The single audio output, when the source has audio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioRendition {
    pub codec: String,
    pub bitrate_kbps: u32,
}

impl Default for AudioRendition {
    fn default() -> Self {
        Self {
            codec: "aac".to_string(),
            bitrate_kbps: 128,
        }
    }
}

impl AudioRendition {
    fn args(&self) -> Vec<String> {
        vec![
            "-map".to_string(),
            "0:a:0".to_string(),
            "-c:a".to_string(),
            self.codec.clone(),
            "-b:a".to_string(),
            format!("{}k", self.bitrate_kbps),
        ]
    }
}

/// A group of output streams a player may switch between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdaptationSet {
    pub id: usize,
    pub streams: Vec<usize>,
}

impl fmt::Display for AdaptationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let streams: Vec<String> = self.streams.iter().map(|s| s.to_string()).collect();
        write!(f, "id={},streams={}", self.id, streams.join(","))
    }
}

/// Fully resolved encoder invocation for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodeInvocation {
    pub input: PathBuf,
    pub output: PathBuf,
    pub renditions: Vec<Rendition>,
    pub audio: Option<AudioRendition>,
    pub adaptation_sets: Vec<AdaptationSet>,
}

impl EncodeInvocation {
    /// The `-adaptation_sets` directive value.
    pub fn adaptation_sets_arg(&self) -> String {
        self.adaptation_sets
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Argument vector passed to the encoder, excluding global options.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["-i".to_string(), self.input.to_string_lossy().to_string()];

        for (index, rendition) in self.renditions.iter().enumerate() {
            args.extend(rendition.args(index));
        }

        if let Some(ref audio) = self.audio {
            args.extend(audio.args());
        }

        args.extend(["-adaptation_sets".to_string(), self.adaptation_sets_arg()]);
        args.extend(["-f".to_string(), OUTPUT_FORMAT.to_string()]);
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Builds encode invocations from a fixed rendition ladder.
#[derive(Debug, Clone)]
pub struct RenditionPlanner {
    ladder: Vec<Rendition>,
    audio: AudioRendition,
}

impl Default for RenditionPlanner {
    fn default() -> Self {
        Self::standard()
    }
}

impl RenditionPlanner {
    /// The 360p / 480p / 720p ladder.
    pub fn standard() -> Self {
        Self {
            ladder: vec![
                Rendition::h264("360p", 640, 360, 800),
                Rendition::h264("480p", 852, 480, 1400),
                Rendition::h264("720p", 1280, 720, 2800),
            ],
            audio: AudioRendition::default(),
        }
    }

    pub fn ladder(&self) -> &[Rendition] {
        &self.ladder
    }

    /// Plans the invocation for one input.
    ///
    /// Video renditions occupy output streams `0..n`; audio, when present, is
    /// stream `n` in its own adaptation set.
    pub fn plan(&self, input: &Path, has_audio: bool, output: &Path) -> EncodeInvocation {
        let video_streams: Vec<usize> = (0..self.ladder.len()).collect();
        let mut adaptation_sets = vec![AdaptationSet {
            id: 0,
            streams: video_streams,
        }];

        let audio = if has_audio {
            adaptation_sets.push(AdaptationSet {
                id: 1,
                streams: vec![self.ladder.len()],
            });
            Some(self.audio.clone())
        } else {
            None
        };

        EncodeInvocation {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            renditions: self.ladder.clone(),
            audio,
            adaptation_sets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(has_audio: bool) -> EncodeInvocation {
        RenditionPlanner::standard().plan(
            Path::new("/uploads/input.mov"),
            has_audio,
            Path::new("/video/job/manifest.mpd"),
        )
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(|s| s.as_str())
    }

    #[test]
    fn test_plans_three_renditions() {
        let invocation = plan(false);
        assert_eq!(invocation.renditions.len(), 3);
        let sizes: Vec<String> = invocation.renditions.iter().map(|r| r.frame_size()).collect();
        assert_eq!(sizes, vec!["640x360", "852x480", "1280x720"]);
    }

    #[test]
    fn test_ladder_is_quality_ordered() {
        let planner = RenditionPlanner::standard();
        for pair in planner.ladder().windows(2) {
            assert!(pair[0].bitrate_kbps <= pair[1].bitrate_kbps);
            assert!(pair[0].width <= pair[1].width);
            assert!(pair[0].height <= pair[1].height);
        }
    }

    #[test]
    fn test_with_audio_has_two_adaptation_sets() {
        let invocation = plan(true);
        assert_eq!(invocation.adaptation_sets.len(), 2);
        assert_eq!(
            invocation.adaptation_sets_arg(),
            "id=0,streams=0,1,2 id=1,streams=3"
        );

        let args = invocation.args();
        assert_eq!(value_after(&args, "-c:a"), Some("aac"));
        assert_eq!(value_after(&args, "-b:a"), Some("128k"));
        assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "0:a:0"));
    }

    #[test]
    fn test_without_audio_has_one_adaptation_set() {
        let invocation = plan(false);
        assert_eq!(invocation.adaptation_sets.len(), 1);
        assert_eq!(invocation.adaptation_sets_arg(), "id=0,streams=0,1,2");

        let args = invocation.args();
        assert!(!args.contains(&"-c:a".to_string()));
        assert!(!args.contains(&"0:a:0".to_string()));
    }

    #[test]
    fn test_each_rendition_maps_input_video() {
        let args = plan(false).args();
        let video_maps = args
            .windows(2)
            .filter(|w| w[0] == "-map" && w[1] == "0:v")
            .count();
        assert_eq!(video_maps, 3);
    }

    #[test]
    fn test_per_rendition_parameters() {
        let args = plan(false).args();
        assert_eq!(value_after(&args, "-b:v:0"), Some("800k"));
        assert_eq!(value_after(&args, "-b:v:1"), Some("1400k"));
        assert_eq!(value_after(&args, "-b:v:2"), Some("2800k"));
        assert_eq!(value_after(&args, "-s:v:2"), Some("1280x720"));
        assert_eq!(value_after(&args, "-c:v:1"), Some("libx264"));
        assert_eq!(value_after(&args, "-profile:v:0"), Some("main"));
        assert_eq!(value_after(&args, "-preset:v:2"), Some("fast"));
        assert_eq!(value_after(&args, "-aspect:v:1"), Some("16:9"));
    }

    #[test]
    fn test_keyframes_aligned_across_renditions() {
        let args = plan(true).args();
        for index in 0..3 {
            assert_eq!(value_after(&args, &format!("-g:v:{}", index)), Some("48"));
            assert_eq!(
                value_after(&args, &format!("-keyint_min:v:{}", index)),
                Some("48")
            );
            assert_eq!(
                value_after(&args, &format!("-sc_threshold:v:{}", index)),
                Some("0")
            );
        }
    }

    #[test]
    fn test_input_first_output_last() {
        let args = plan(true).args();
        assert_eq!(args[0], "-i");
        assert_eq!(args[1], "/uploads/input.mov");
        assert_eq!(value_after(&args, "-f"), Some("dash"));
        assert_eq!(args.last().unwrap(), "/video/job/manifest.mpd");
    }

    #[test]
    fn test_planning_is_deterministic() {
        assert_eq!(plan(true), plan(true));
        assert_eq!(plan(false).args(), plan(false).args());
    }

    #[test]
    fn test_filenames_stay_single_arguments() {
        let invocation = RenditionPlanner::standard().plan(
            Path::new("/uploads/my clip; rm -rf.mp4"),
            false,
            Path::new("/video/x/manifest.mpd"),
        );
        let args = invocation.args();
        assert_eq!(args[1], "/uploads/my clip; rm -rf.mp4");
    }
}

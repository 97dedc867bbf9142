//! Metadata extractors for images and videos
//!
//! Images are probed in-process with the `image` crate (header read only,
//! no full decode). Video facts come from an external `ffprobe`/`ffmpeg`
//! pair behind the [`VideoProbe`] trait so scans can run with a stub in
//! tests.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::IndexError;
use crate::models::MediaFormat;
use crate::thumbs::SMALL_WIDTH;

/// Facts extracted from an image file
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMeta {
    pub width: u32,
    pub height: u32,
    pub format: MediaFormat,
    pub byte_size: u64,
    pub aspect_ratio: f64,
}

/// Probe an image file for dimensions and format without decoding pixels
pub fn probe_image(path: &Path) -> Result<ImageMeta, IndexError> {
    let format = MediaFormat::from_path(path)
        .ok_or_else(|| IndexError::extract_error(path.to_path_buf(), "unsupported image format"))?;
    let (width, height) = image::image_dimensions(path)
        .map_err(|e| IndexError::extract_error(path.to_path_buf(), e.to_string()))?;
    let byte_size = std::fs::metadata(path)
        .map_err(|e| IndexError::io_error(Some(path.to_path_buf()), e.to_string()))?
        .len();
    Ok(ImageMeta {
        width,
        height,
        format,
        byte_size,
        aspect_ratio: aspect_ratio(width, height),
    })
}

/// Facts extracted from a video file
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMeta {
    pub width: u32,
    pub height: u32,
    pub format: MediaFormat,
    pub byte_size: u64,
    pub aspect_ratio: f64,
    pub duration_secs: f64,
    pub codec: String,
    pub bitrate: u64,
    pub frame_rate: f64,
}

/// Video probing and cover-frame capture capability
pub trait VideoProbe: Send + Sync {
    /// Extract stream facts from a video file
    fn probe(&self, path: &Path) -> Result<VideoMeta, IndexError>;

    /// Capture a single frame into `output`, returning the written path
    fn capture_frame(
        &self,
        source: &Path,
        output: &Path,
        offset_secs: f64,
    ) -> Result<PathBuf, IndexError>;
}

/// `ffprobe`/`ffmpeg` subprocess implementation of [`VideoProbe`]
pub struct FfmpegProbe {
    pub ffprobe_bin: String,
    pub ffmpeg_bin: String,
    /// Cover frames are scaled down to this width (never upscaled)
    pub frame_width: u32,
}

impl Default for FfmpegProbe {
    fn default() -> Self {
        Self {
            ffprobe_bin: "ffprobe".to_string(),
            ffmpeg_bin: "ffmpeg".to_string(),
            frame_width: SMALL_WIDTH,
        }
    }
}

impl FfmpegProbe {
    /// Create a probe using the system `ffprobe`/`ffmpeg` binaries
    pub fn new() -> Self {
        Self::default()
    }
}

impl VideoProbe for FfmpegProbe {
    fn probe(&self, path: &Path) -> Result<VideoMeta, IndexError> {
        let output = Command::new(&self.ffprobe_bin)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_streams",
                "-show_format",
                "-print_format",
                "json",
            ])
            .arg(path)
            .output()
            .map_err(|e| {
                IndexError::extract_error(
                    path.to_path_buf(),
                    format!("{} failed to start: {}", self.ffprobe_bin, e),
                )
            })?;

        if !output.status.success() {
            return Err(IndexError::extract_error(
                path.to_path_buf(),
                format!(
                    "{} exited with {}: {}",
                    self.ffprobe_bin,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let probed: FfprobeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| IndexError::extract_error(path.to_path_buf(), e.to_string()))?;
        let stream = probed.streams.first().ok_or_else(|| {
            IndexError::extract_error(path.to_path_buf(), "no video stream found")
        })?;

        let width = stream.width.unwrap_or(0);
        let height = stream.height.unwrap_or(0);
        let duration_secs = stream
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .or_else(|| {
                probed
                    .format
                    .as_ref()
                    .and_then(|f| f.duration.as_deref())
                    .and_then(|d| d.parse::<f64>().ok())
            })
            .unwrap_or(0.0);
        let bitrate = stream
            .bit_rate
            .as_deref()
            .and_then(|b| b.parse::<u64>().ok())
            .or_else(|| {
                probed
                    .format
                    .as_ref()
                    .and_then(|f| f.bit_rate.as_deref())
                    .and_then(|b| b.parse::<u64>().ok())
            })
            .unwrap_or(0);
        let frame_rate = stream
            .r_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .unwrap_or(0.0);
        let byte_size = std::fs::metadata(path)
            .map_err(|e| IndexError::io_error(Some(path.to_path_buf()), e.to_string()))?
            .len();

        Ok(VideoMeta {
            width,
            height,
            format: MediaFormat::Mp4,
            byte_size,
            aspect_ratio: aspect_ratio(width, height),
            duration_secs,
            codec: stream.codec_name.clone().unwrap_or_default(),
            bitrate,
            frame_rate,
        })
    }

    fn capture_frame(
        &self,
        source: &Path,
        output: &Path,
        offset_secs: f64,
    ) -> Result<PathBuf, IndexError> {
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| IndexError::io_error(Some(parent.to_path_buf()), e.to_string()))?;
        }

        let scale = format!("scale='min({},iw)':-2", self.frame_width);
        let status = Command::new(&self.ffmpeg_bin)
            .args(["-y", "-v", "error", "-ss"])
            .arg(offset_secs.to_string())
            .arg("-i")
            .arg(source)
            .args(["-frames:v", "1", "-vf"])
            .arg(&scale)
            .arg(output)
            .status()
            .map_err(|e| {
                IndexError::thumbnail_error(
                    source.to_path_buf(),
                    format!("{} failed to start: {}", self.ffmpeg_bin, e),
                )
            })?;

        if !status.success() || !output.exists() {
            return Err(IndexError::thumbnail_error(
                source.to_path_buf(),
                format!("{} failed to capture frame at {}s", self.ffmpeg_bin, offset_secs),
            ));
        }
        Ok(output.to_path_buf())
    }
}

/// Compute width/height ratio, zero when the height is unknown
fn aspect_ratio(width: u32, height: u32) -> f64 {
    if height == 0 {
        0.0
    } else {
        width as f64 / height as f64
    }
}

/// Parse an ffprobe rational frame rate such as `30000/1001`
fn parse_frame_rate(raw: &str) -> Option<f64> {
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                None
            } else {
                Some(num / den)
            }
        }
        None => raw.parse().ok(),
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
    codec_name: Option<String>,
    r_frame_rate: Option<String>,
    bit_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::{IMAGE_EXTENSIONS, STREAM_SCHEMES, VIDEO_EXTENSIONS};

#[derive(Error, Debug, PartialEq)]
pub enum SourceError {
    #[error("unsupported file type: {0}")]
    UnsupportedExtension(PathBuf),
    #[error("camera URL is empty")]
    EmptyUrl,
    #[error("unsupported camera URL '{0}' (expected rtsp://, rtsps://, rtmp://, http:// or https://)")]
    UnsupportedScheme(String),
    #[error("{0} sources cannot be opened by this reader")]
    Unsupported(&'static str),
}

/// Where frames come from for a single detection run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputSource {
    ImageFile(PathBuf),
    VideoFile(PathBuf),
    /// Local capture device, by index.
    Webcam(u32),
    /// Network stream (RTSP, RTMP or HTTP).
    IpCamera(String),
}

impl InputSource {
    /// Routes a file to the image or video branch by its extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, SourceError> {
        let path = path.into();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Ok(InputSource::ImageFile(path))
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Ok(InputSource::VideoFile(path))
        } else {
            Err(SourceError::UnsupportedExtension(path))
        }
    }

    pub fn ip_camera(url: &str) -> Result<Self, SourceError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(SourceError::EmptyUrl);
        }
        let scheme = url
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .ok_or_else(|| SourceError::UnsupportedScheme(url.to_string()))?;
        if !STREAM_SCHEMES.contains(&scheme.as_str()) {
            return Err(SourceError::UnsupportedScheme(url.to_string()));
        }
        Ok(InputSource::IpCamera(url.to_string()))
    }

    /// Webcams and IP cameras: sources that never end on their own.
    pub fn is_live(&self) -> bool {
        matches!(self, InputSource::Webcam(_) | InputSource::IpCamera(_))
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            InputSource::ImageFile(p) | InputSource::VideoFile(p) => Some(p),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InputSource::ImageFile(_) => "image",
            InputSource::VideoFile(_) => "video",
            InputSource::Webcam(_) => "webcam",
            InputSource::IpCamera(_) => "IP camera",
        }
    }

    /// Message shown when a live source stops delivering frames.
    pub fn read_failure_warning(&self) -> Option<&'static str> {
        match self {
            InputSource::Webcam(_) => {
                Some("Failed to read from the webcam. Check if it's connected.")
            }
            InputSource::IpCamera(_) => {
                Some("Failed to read from the IP Camera. Check if the URL is correct.")
            }
            _ => None,
        }
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::ImageFile(p) | InputSource::VideoFile(p) => write!(f, "{}", p.display()),
            InputSource::Webcam(index) => write!(f, "webcam {index}"),
            InputSource::IpCamera(url) => write!(f, "{url}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("photo.jpg")]
    #[case("photo.JPEG")]
    #[case("dir/scan.png")]
    #[case("a.bmp")]
    #[case("a.webp")]
    fn test_from_path_routes_images(#[case] path: &str) {
        assert_eq!(
            InputSource::from_path(path).unwrap(),
            InputSource::ImageFile(PathBuf::from(path))
        );
    }

    #[rstest]
    #[case("clip.mp4")]
    #[case("clip.AVI")]
    #[case("clip.mov")]
    fn test_from_path_routes_videos(#[case] path: &str) {
        assert_eq!(
            InputSource::from_path(path).unwrap(),
            InputSource::VideoFile(PathBuf::from(path))
        );
    }

    #[rstest]
    #[case("notes.txt")]
    #[case("clip.mkv")]
    #[case("no_extension")]
    fn test_from_path_rejects_other_types(#[case] path: &str) {
        assert_eq!(
            InputSource::from_path(path),
            Err(SourceError::UnsupportedExtension(PathBuf::from(path)))
        );
    }

    #[rstest]
    #[case("rtsp://10.0.0.2:554/stream1")]
    #[case("http://cam.local/video.mjpg")]
    #[case("HTTPS://cam.local/live")]
    #[case("rtmp://server/app")]
    fn test_ip_camera_accepts_stream_urls(#[case] url: &str) {
        assert_eq!(
            InputSource::ip_camera(url).unwrap(),
            InputSource::IpCamera(url.to_string())
        );
    }

    #[test]
    fn test_ip_camera_trims_whitespace() {
        assert_eq!(
            InputSource::ip_camera("  rtsp://cam/1 \n").unwrap(),
            InputSource::IpCamera("rtsp://cam/1".to_string())
        );
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn test_ip_camera_rejects_empty(#[case] url: &str) {
        assert_eq!(InputSource::ip_camera(url), Err(SourceError::EmptyUrl));
    }

    #[rstest]
    #[case("ftp://cam/stream")]
    #[case("192.168.1.10:554")]
    #[case("file:///dev/video0")]
    fn test_ip_camera_rejects_other_schemes(#[case] url: &str) {
        assert_eq!(
            InputSource::ip_camera(url),
            Err(SourceError::UnsupportedScheme(url.to_string()))
        );
    }

    #[test]
    fn test_live_sources_have_read_warnings() {
        let webcam = InputSource::Webcam(0);
        let ip = InputSource::IpCamera("rtsp://cam".into());
        let video = InputSource::VideoFile("a.mp4".into());

        assert!(webcam.is_live());
        assert!(ip.is_live());
        assert!(!video.is_live());
        assert_eq!(
            webcam.read_failure_warning(),
            Some("Failed to read from the webcam. Check if it's connected.")
        );
        assert_eq!(
            ip.read_failure_warning(),
            Some("Failed to read from the IP Camera. Check if the URL is correct.")
        );
        assert_eq!(video.read_failure_warning(), None);
    }

    #[test]
    fn test_path_only_for_files() {
        assert_eq!(
            InputSource::ImageFile("x.png".into()).path(),
            Some(Path::new("x.png"))
        );
        assert_eq!(InputSource::Webcam(1).path(), None);
    }
}

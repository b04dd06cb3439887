//! Capture controller: one still image from a camera or an uploaded file.
//!
//! The camera stream is owned by a [`CameraGuard`]; dropping the guard
//! releases every track, so the camera is stopped on cancel, on capture, on
//! teardown and on any error path in between.

use crate::error::{AttendError, DeviceFault, Result};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const JPEG_QUALITY: u8 = 95;
const CAPTURED_FILE_NAME: &str = "captured-photo.jpg";
const BUSY_MARKER: &str = ".busy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FacingMode {
    User,
    Environment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing: FacingMode,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 1280,
            ideal_height: 720,
            facing: FacingMode::User,
        }
    }
}

/// Why a camera could not be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraFault {
    PermissionDenied,
    NotFound,
    Busy,
    Other(String),
}

impl From<CameraFault> for AttendError {
    fn from(fault: CameraFault) -> Self {
        match fault {
            CameraFault::PermissionDenied => AttendError::Permission,
            CameraFault::NotFound => AttendError::Device {
                fault: DeviceFault::NotFound,
                detail: String::new(),
            },
            CameraFault::Busy => AttendError::Device {
                fault: DeviceFault::Busy,
                detail: String::new(),
            },
            CameraFault::Other(detail) => AttendError::Device {
                fault: DeviceFault::Other,
                detail,
            },
        }
    }
}

pub trait CameraDevice {
    fn open(&self, constraints: &VideoConstraints) -> std::result::Result<Box<dyn CameraStream>, CameraFault>;
}

pub trait CameraStream {
    /// Current preview frame, `None` while the preview is not ready.
    fn current_frame(&mut self) -> Option<RgbImage>;

    /// Stops every track of the stream. Must tolerate repeated calls.
    fn stop_tracks(&mut self);

    fn label(&self) -> String {
        "camera".to_string()
    }
}

/// Exclusive owner of a live camera stream.
pub struct CameraGuard {
    stream: Option<Box<dyn CameraStream>>,
}

impl CameraGuard {
    fn new(stream: Box<dyn CameraStream>) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    fn stream_mut(&mut self) -> Option<&mut (dyn CameraStream + 'static)> {
        self.stream.as_deref_mut()
    }

    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
            debug!(label = %stream.label(), "camera tracks stopped");
        }
    }
}

impl Drop for CameraGuard {
    fn drop(&mut self) {
        self.release();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureSource {
    Camera,
    Upload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    pub id: Uuid,
    pub object_url: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
    pub sha256: String,
    pub source: CaptureSource,
}

impl CapturedImage {
    fn new(bytes: Vec<u8>, file_name: String, mime: String, source: CaptureSource) -> Self {
        let id = Uuid::new_v4();
        let sha256 = Sha256::digest(&bytes)
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        Self {
            id,
            object_url: format!("capture://{}", id),
            file_name,
            mime,
            bytes,
            sha256,
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CapturePhase {
    Idle,
    CameraActive,
    Captured,
}

enum CaptureState {
    Idle,
    CameraActive(CameraGuard),
    Captured(CapturedImage),
}

pub struct CaptureController {
    device: Box<dyn CameraDevice>,
    constraints: VideoConstraints,
    state: CaptureState,
}

impl CaptureController {
    pub fn new(device: Box<dyn CameraDevice>) -> Self {
        Self {
            device,
            constraints: VideoConstraints::default(),
            state: CaptureState::Idle,
        }
    }

    pub fn phase(&self) -> CapturePhase {
        match self.state {
            CaptureState::Idle => CapturePhase::Idle,
            CaptureState::CameraActive(_) => CapturePhase::CameraActive,
            CaptureState::Captured(_) => CapturePhase::Captured,
        }
    }

    pub fn captured(&self) -> Option<&CapturedImage> {
        match &self.state {
            CaptureState::Captured(img) => Some(img),
            _ => None,
        }
    }

    pub fn start_camera(&mut self) -> Result<()> {
        if matches!(self.state, CaptureState::CameraActive(_)) {
            return Ok(());
        }
        info!("requesting camera access");
        match self.device.open(&self.constraints) {
            Ok(stream) => {
                self.state = CaptureState::CameraActive(CameraGuard::new(stream));
                info!("camera active");
                Ok(())
            }
            Err(fault) => {
                warn!(?fault, "camera access failed");
                Err(fault.into())
            }
        }
    }

    /// Idempotent. Returns whether a live stream was released.
    pub fn stop_camera(&mut self) -> bool {
        if let CaptureState::CameraActive(guard) = &mut self.state {
            guard.release();
            self.state = CaptureState::Idle;
            info!("camera stopped");
            return true;
        }
        false
    }

    pub fn capture_photo(&mut self) -> Result<&CapturedImage> {
        let CaptureState::CameraActive(guard) = &mut self.state else {
            return Err(AttendError::Capture("camera is not active".to_string()));
        };
        let frame = guard
            .stream_mut()
            .and_then(|s| s.current_frame())
            .ok_or_else(|| AttendError::Capture("video preview is not ready".to_string()))?;
        let bytes = encode_jpeg(&frame)?;
        guard.release();
        let image = CapturedImage::new(
            bytes,
            CAPTURED_FILE_NAME.to_string(),
            "image/jpeg".to_string(),
            CaptureSource::Camera,
        );
        info!(
            width = frame.width(),
            height = frame.height(),
            sha256 = %image.sha256,
            "photo captured"
        );
        self.state = CaptureState::Captured(image);
        self.captured()
            .ok_or_else(|| AttendError::Capture("capture was not stored".to_string()))
    }

    pub fn upload_bytes(&mut self, file_name: &str, bytes: Vec<u8>) -> Result<&CapturedImage> {
        let format = image::guess_format(&bytes)
            .map_err(|_| AttendError::validation(format!("{} is not a supported image", file_name)))?;
        self.stop_camera();
        let image = CapturedImage::new(
            bytes,
            file_name.to_string(),
            format.to_mime_type().to_string(),
            CaptureSource::Upload,
        );
        info!(file = %file_name, sha256 = %image.sha256, "photo uploaded");
        self.state = CaptureState::Captured(image);
        self.captured()
            .ok_or_else(|| AttendError::Capture("upload was not stored".to_string()))
    }

    pub fn upload_file(&mut self, path: &Path) -> Result<&CapturedImage> {
        let bytes = fs::read(path)
            .map_err(|e| AttendError::validation(format!("cannot read {}: {}", path.display(), e)))?;
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("upload")
            .to_string();
        self.upload_bytes(&name, bytes)
    }

    /// Discards the still and returns to `Idle`.
    pub fn retake(&mut self) {
        if matches!(self.state, CaptureState::Captured(_)) {
            self.state = CaptureState::Idle;
        }
    }

    pub fn set_constraints(&mut self, constraints: VideoConstraints) {
        self.constraints = constraints;
    }
}

fn encode_jpeg(frame: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
        .encode_image(frame)
        .map_err(|e| AttendError::Capture(format!("jpeg encoding failed: {}", e)))?;
    Ok(buf)
}

/// Camera backed by a spool directory that an external frame grabber writes
/// into. The newest image file is the current preview frame.
pub struct DirectoryCamera {
    dir: PathBuf,
}

impl DirectoryCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CameraDevice for DirectoryCamera {
    fn open(&self, constraints: &VideoConstraints) -> std::result::Result<Box<dyn CameraStream>, CameraFault> {
        match fs::read_dir(&self.dir) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(CameraFault::NotFound),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(CameraFault::PermissionDenied)
            }
            Err(e) => return Err(CameraFault::Other(e.to_string())),
        }
        if self.dir.join(BUSY_MARKER).exists() {
            return Err(CameraFault::Busy);
        }
        debug!(dir = %self.dir.display(), ?constraints, "opened spool camera");
        Ok(Box::new(DirectoryStream {
            dir: self.dir.clone(),
            stopped: false,
        }))
    }
}

struct DirectoryStream {
    dir: PathBuf,
    stopped: bool,
}

impl CameraStream for DirectoryStream {
    fn current_frame(&mut self) -> Option<RgbImage> {
        if self.stopped {
            return None;
        }
        let newest = fs::read_dir(&self.dir)
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|s| s.to_str()).map(|s| s.to_ascii_lowercase()).as_deref(),
                    Some("jpg" | "jpeg" | "png")
                )
            })
            .filter_map(|p| {
                let modified = fs::metadata(&p).and_then(|m| m.modified()).ok()?;
                Some((modified, p))
            })
            .max()?;
        match image::open(&newest.1) {
            Ok(img) => Some(img.to_rgb8()),
            Err(e) => {
                warn!(file = %newest.1.display(), error = %e, "unreadable spool frame");
                None
            }
        }
    }

    fn stop_tracks(&mut self) {
        self.stopped = true;
    }

    fn label(&self) -> String {
        format!("spool:{}", self.dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct FakeStream {
        frame: Option<RgbImage>,
        stops: Rc<Cell<u32>>,
    }

    impl CameraStream for FakeStream {
        fn current_frame(&mut self) -> Option<RgbImage> {
            self.frame.clone()
        }
        fn stop_tracks(&mut self) {
            self.stops.set(self.stops.get() + 1);
        }
    }

    struct FakeDevice {
        result: std::result::Result<bool, CameraFault>,
        stops: Rc<Cell<u32>>,
    }

    impl CameraDevice for FakeDevice {
        fn open(&self, _: &VideoConstraints) -> std::result::Result<Box<dyn CameraStream>, CameraFault> {
            let ready = self.result.clone()?;
            Ok(Box::new(FakeStream {
                frame: ready.then(|| RgbImage::from_pixel(8, 6, image::Rgb([120, 80, 40]))),
                stops: self.stops.clone(),
            }))
        }
    }

    fn controller(result: std::result::Result<bool, CameraFault>) -> (CaptureController, Rc<Cell<u32>>) {
        let stops = Rc::new(Cell::new(0));
        let device = FakeDevice {
            result,
            stops: stops.clone(),
        };
        (CaptureController::new(Box::new(device)), stops)
    }

    #[test]
    fn capture_encodes_jpeg_and_stops_camera() {
        let (mut c, stops) = controller(Ok(true));
        c.start_camera().expect("start");
        assert_eq!(c.phase(), CapturePhase::CameraActive);
        let img = c.capture_photo().expect("capture").clone();
        assert_eq!(img.mime, "image/jpeg");
        assert_eq!(&img.bytes[..2], &[0xFF, 0xD8]);
        assert!(img.object_url.starts_with("capture://"));
        assert_eq!(img.sha256.len(), 64);
        assert_eq!(c.phase(), CapturePhase::Captured);
        assert_eq!(stops.get(), 1);
        assert!(!c.stop_camera());
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn capture_without_frame_fails_and_keeps_camera() {
        let (mut c, stops) = controller(Ok(false));
        c.start_camera().expect("start");
        let err = c.capture_photo().expect_err("not ready");
        assert_eq!(err.code(), "capture_failed");
        assert_eq!(c.phase(), CapturePhase::CameraActive);
        assert_eq!(stops.get(), 0);
        assert!(c.stop_camera());
        assert!(!c.stop_camera());
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn dropping_controller_releases_tracks() {
        let (mut c, stops) = controller(Ok(true));
        c.start_camera().expect("start");
        drop(c);
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn open_failures_are_classified() {
        for (fault, code) in [
            (CameraFault::PermissionDenied, "camera_permission"),
            (CameraFault::NotFound, "camera_not_found"),
            (CameraFault::Busy, "camera_busy"),
            (CameraFault::Other("x".to_string()), "camera_error"),
        ] {
            let (mut c, _) = controller(Err(fault));
            let err = c.start_camera().expect_err("should fail");
            assert_eq!(err.code(), code);
            assert_eq!(c.phase(), CapturePhase::Idle);
        }
    }

    #[test]
    fn upload_rejects_non_images_and_stops_camera() {
        let (mut c, stops) = controller(Ok(true));
        let err = c
            .upload_bytes("notes.txt", b"hello".to_vec())
            .expect_err("not an image");
        assert_eq!(err.code(), "validation");

        c.start_camera().expect("start");
        let png = {
            let mut buf = std::io::Cursor::new(Vec::new());
            RgbImage::from_pixel(2, 2, image::Rgb([0, 0, 0]))
                .write_to(&mut buf, image::ImageFormat::Png)
                .expect("png");
            buf.into_inner()
        };
        let img = c.upload_bytes("class.png", png).expect("upload").clone();
        assert_eq!(img.mime, "image/png");
        assert_eq!(img.source, CaptureSource::Upload);
        assert_eq!(stops.get(), 1);
        c.retake();
        assert_eq!(c.phase(), CapturePhase::Idle);
    }

    #[test]
    fn directory_camera_reports_missing_and_busy() {
        let missing = std::env::temp_dir().join(format!("attendd-no-cam-{}", Uuid::new_v4()));
        let err = DirectoryCamera::new(&missing)
            .open(&VideoConstraints::default())
            .err()
            .expect("missing dir");
        assert_eq!(err, CameraFault::NotFound);

        fs::create_dir_all(&missing).expect("mkdir");
        fs::write(missing.join(BUSY_MARKER), b"").expect("busy marker");
        let err = DirectoryCamera::new(&missing)
            .open(&VideoConstraints::default())
            .err()
            .expect("busy");
        assert_eq!(err, CameraFault::Busy);
        let _ = fs::remove_dir_all(missing);
    }
}

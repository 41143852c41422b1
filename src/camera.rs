use crate::error::CameraError;
use opencv::prelude::*;
use opencv::videoio;
use tracing::{debug, info, warn};

/// Anything the capture loop can pull frames from.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Mat, CameraError>;
}

/// Webcam backed by `VideoCapture`. The device is released on drop.
pub struct CameraSource {
    capture: videoio::VideoCapture,
    index: i32,
}

impl CameraSource {
    pub fn new(index: i32) -> Result<Self, CameraError> {
        let capture = videoio::VideoCapture::new(index, videoio::CAP_ANY)?;
        let opened = videoio::VideoCapture::is_opened(&capture)?;
        if !opened {
            return Err(CameraError::Open(index));
        }
        info!(index, "Opened camera");
        Ok(Self { capture, index })
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Mat, CameraError> {
        let mut frame = Mat::default();
        let grabbed = self.capture.read(&mut frame)?;
        if !grabbed || frame.size()?.width == 0 {
            return Err(CameraError::Read);
        }
        Ok(frame)
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        match self.capture.release() {
            Ok(()) => debug!(index = self.index, "Released camera"),
            Err(err) => warn!(index = self.index, "Failed to release camera: {err}"),
        }
    }
}

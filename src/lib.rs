pub mod analysis;
pub mod app;
pub mod camera;
pub mod detector;
pub mod emotion;
pub mod error;
pub mod model;
pub mod overlay;

pub use analysis::{EmotionAnalyzer, FaceAnalysis, FaceAnalyzer, FaceRegion};
pub use app::{run, FrameDisplay, LoopExit, LoopOptions, PreviewWindow};
pub use camera::{CameraSource, FrameSource};
pub use detector::{convert_to_grayscale, FaceDetector};
pub use emotion::{Emotion, EmotionClassifier, ModelLayout, Normalization};
pub use error::{AnalysisError, CameraError};

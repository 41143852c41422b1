use crate::analysis::FaceAnalyzer;
use crate::camera::FrameSource;
use crate::error::AnalysisError;
use crate::overlay::{draw_analysis, mirror};
use opencv::highgui;
use opencv::prelude::*;
use tracing::{debug, error, info, trace, warn};

/// Where annotated frames end up.
pub trait FrameDisplay {
    fn show(&mut self, frame: &Mat) -> anyhow::Result<()>;

    /// Waits up to `delay_ms` for a key press. Returns -1 when none arrived.
    fn wait_key(&mut self, delay_ms: i32) -> anyhow::Result<i32>;
}

/// A highgui window, destroyed on drop.
pub struct PreviewWindow {
    name: String,
}

impl PreviewWindow {
    pub fn new(name: &str) -> anyhow::Result<Self> {
        highgui::named_window_def(name)?;
        Ok(Self {
            name: name.to_owned(),
        })
    }
}

impl FrameDisplay for PreviewWindow {
    fn show(&mut self, frame: &Mat) -> anyhow::Result<()> {
        highgui::imshow(&self.name, frame)?;
        Ok(())
    }

    fn wait_key(&mut self, delay_ms: i32) -> anyhow::Result<i32> {
        Ok(highgui::wait_key(delay_ms)?)
    }
}

impl Drop for PreviewWindow {
    fn drop(&mut self) {
        if let Err(err) = highgui::destroy_all_windows() {
            warn!("Failed to close window {}: {err}", self.name);
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopOptions {
    pub mirror: bool,
    pub quit_key: u8,
    /// Stop after this many displayed frames.
    pub max_frames: Option<u64>,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            mirror: true,
            quit_key: b'q',
            max_frames: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    Quit,
    CameraFailure,
    FrameLimit,
}

/// Capture, analyze, draw and display until the quit key, a camera failure
/// or the frame limit.
///
/// Analysis failures are logged and the frame is shown without overlay.
pub fn run<S, A, D>(
    source: &mut S,
    analyzer: &mut A,
    display: &mut D,
    options: &LoopOptions,
) -> anyhow::Result<LoopExit>
where
    S: FrameSource,
    A: FaceAnalyzer,
    D: FrameDisplay,
{
    let mut frames: u64 = 0;
    loop {
        if options.max_frames.is_some_and(|max| frames >= max) {
            debug!(frames, "Frame limit reached");
            return Ok(LoopExit::FrameLimit);
        }

        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(err) => {
                error!("{err}");
                return Ok(LoopExit::CameraFailure);
            }
        };
        let mut frame = if options.mirror {
            mirror(&frame)?
        } else {
            frame
        };

        match annotate(analyzer, &mut frame) {
            Ok(faces) => trace!(faces, "Annotated frame"),
            Err(err) => error!("Error during analysis: {err}"),
        }

        display.show(&frame)?;
        frames += 1;

        let key = display.wait_key(1)?;
        if key & 0xFF == i32::from(options.quit_key) {
            info!(frames, "Quit key pressed");
            return Ok(LoopExit::Quit);
        }
    }
}

fn annotate<A: FaceAnalyzer>(analyzer: &mut A, frame: &mut Mat) -> Result<usize, AnalysisError> {
    let faces = analyzer.analyze(frame)?;
    Ok(draw_analysis(frame, &faces)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{FaceAnalysis, FaceRegion};
    use crate::emotion::Emotion;
    use crate::error::CameraError;
    use opencv::core::{self, Scalar};
    use std::collections::VecDeque;

    /// Yields `remaining` black frames, then fails like an unplugged camera.
    struct ScriptedSource {
        remaining: usize,
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Mat, CameraError> {
            if self.remaining == 0 {
                return Err(CameraError::Read);
            }
            self.remaining -= 1;
            Ok(Mat::new_rows_cols_with_default(120, 160, core::CV_8UC3, Scalar::all(0.0))?)
        }
    }

    struct FailingAnalyzer {
        calls: usize,
    }

    impl FaceAnalyzer for FailingAnalyzer {
        fn analyze(&mut self, _frame: &Mat) -> Result<Vec<FaceAnalysis>, AnalysisError> {
            self.calls += 1;
            Err(AnalysisError::UnexpectedOutput("boom".to_string()))
        }
    }

    struct FixedAnalyzer;

    impl FaceAnalyzer for FixedAnalyzer {
        fn analyze(&mut self, _frame: &Mat) -> Result<Vec<FaceAnalysis>, AnalysisError> {
            Ok(vec![FaceAnalysis::new(
                FaceRegion::new(20, 30, 40, 40),
                vec![(Emotion::Happy, 0.9), (Emotion::Sad, 0.1)],
            )])
        }
    }

    #[derive(Default)]
    struct RecordingDisplay {
        shown: Vec<f64>,
        keys: VecDeque<i32>,
    }

    impl FrameDisplay for RecordingDisplay {
        fn show(&mut self, frame: &Mat) -> anyhow::Result<()> {
            let sum = core::sum_elems(frame)?;
            self.shown.push(sum.0[0] + sum.0[1] + sum.0[2]);
            Ok(())
        }

        fn wait_key(&mut self, _delay_ms: i32) -> anyhow::Result<i32> {
            Ok(self.keys.pop_front().unwrap_or(-1))
        }
    }

    #[test]
    fn test_analysis_errors_do_not_stop_the_loop() {
        let mut source = ScriptedSource { remaining: 5 };
        let mut analyzer = FailingAnalyzer { calls: 0 };
        let mut display = RecordingDisplay::default();

        let exit = run(&mut source, &mut analyzer, &mut display, &LoopOptions::default()).unwrap();

        assert_eq!(exit, LoopExit::CameraFailure);
        assert_eq!(analyzer.calls, 5);
        assert_eq!(display.shown, vec![0.0; 5]);
    }

    #[test]
    fn test_quit_key_ends_loop() {
        let mut source = ScriptedSource { remaining: 100 };
        let mut display = RecordingDisplay {
            keys: VecDeque::from([-1, i32::from(b'x'), i32::from(b'q')]),
            ..Default::default()
        };

        let exit = run(&mut source, &mut FixedAnalyzer, &mut display, &LoopOptions::default()).unwrap();

        assert_eq!(exit, LoopExit::Quit);
        assert_eq!(display.shown.len(), 3);
        assert_eq!(source.remaining, 97);
    }

    #[test]
    fn test_quit_key_ignores_modifier_bits() {
        let mut source = ScriptedSource { remaining: 10 };
        let mut display = RecordingDisplay {
            keys: VecDeque::from([0x10_0000 | i32::from(b'q')]),
            ..Default::default()
        };

        let exit = run(&mut source, &mut FixedAnalyzer, &mut display, &LoopOptions::default()).unwrap();

        assert_eq!(exit, LoopExit::Quit);
    }

    #[test]
    fn test_custom_quit_key() {
        let mut source = ScriptedSource { remaining: 10 };
        let mut display = RecordingDisplay {
            keys: VecDeque::from([i32::from(b'q'), 27]),
            ..Default::default()
        };
        let options = LoopOptions {
            quit_key: 27,
            ..Default::default()
        };

        let exit = run(&mut source, &mut FixedAnalyzer, &mut display, &options).unwrap();

        assert_eq!(exit, LoopExit::Quit);
        assert_eq!(display.shown.len(), 2);
    }

    #[test]
    fn test_camera_failure_before_first_frame() {
        let mut source = ScriptedSource { remaining: 0 };
        let mut display = RecordingDisplay::default();

        let exit = run(&mut source, &mut FixedAnalyzer, &mut display, &LoopOptions::default()).unwrap();

        assert_eq!(exit, LoopExit::CameraFailure);
        assert!(display.shown.is_empty());
    }

    #[test]
    fn test_frame_limit() {
        let mut source = ScriptedSource { remaining: 10 };
        let mut display = RecordingDisplay::default();
        let options = LoopOptions {
            max_frames: Some(4),
            ..Default::default()
        };

        let exit = run(&mut source, &mut FixedAnalyzer, &mut display, &options).unwrap();

        assert_eq!(exit, LoopExit::FrameLimit);
        assert_eq!(display.shown.len(), 4);
    }

    #[test]
    fn test_detected_faces_are_drawn() {
        let mut source = ScriptedSource { remaining: 1 };
        let mut display = RecordingDisplay::default();
        let options = LoopOptions {
            mirror: false,
            ..Default::default()
        };

        run(&mut source, &mut FixedAnalyzer, &mut display, &options).unwrap();

        assert_eq!(display.shown.len(), 1);
        assert!(display.shown[0] > 0.0);
    }
}

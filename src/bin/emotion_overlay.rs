use clap::Parser;
use emotion_overlay::model::{self, DEFAULT_MODEL_URL};
use emotion_overlay::{
    run, CameraSource, EmotionAnalyzer, LoopOptions, Normalization, PreviewWindow,
};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Shows live webcam frames with each face's dominant emotion")]
struct Args {
    /// Camera device index.
    #[clap(long, default_value_t = 0)]
    camera: i32,

    /// ONNX emotion model. Downloaded to the user cache when omitted.
    #[clap(long)]
    model: Option<PathBuf>,

    /// Where to fetch the emotion model from.
    #[clap(long, default_value = DEFAULT_MODEL_URL)]
    model_url: String,

    /// Haar cascade for face detection. Defaults to the one shipped with OpenCV.
    #[clap(long)]
    cascade: Option<PathBuf>,

    /// Pixel scaling the model expects.
    #[clap(long, value_enum, default_value_t = Normalization::Raw)]
    normalization: Normalization,

    /// Show frames as captured instead of mirrored.
    #[clap(long)]
    no_mirror: bool,

    #[clap(long, default_value_t = 'q')]
    quit_key: char,

    #[clap(long, default_value = "Emotion Recognition AI")]
    window_title: String,

    /// Stop after this many frames.
    #[clap(long)]
    max_frames: Option<u64>,
}

impl Args {
    fn loop_options(&self) -> anyhow::Result<LoopOptions> {
        anyhow::ensure!(
            self.quit_key.is_ascii(),
            "quit key must be an ASCII character, got {:?}",
            self.quit_key
        );
        Ok(LoopOptions {
            mirror: !self.no_mirror,
            quit_key: self.quit_key as u8,
            max_frames: self.max_frames,
        })
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args: Args = Args::parse();
    let options = args.loop_options()?;

    let mut camera = match CameraSource::new(args.camera) {
        Ok(camera) => camera,
        Err(err) => {
            error!("{err}");
            return Err(err.into());
        }
    };

    info!("Starting emotion recognition. Press '{}' to quit.", args.quit_key);
    info!("The first run downloads the emotion model weights. This may take a few minutes.");

    let model_path = model::resolve(
        model::model_name_from_url(&args.model_url),
        &args.model_url,
        args.model.as_deref(),
    )?;
    let mut analyzer =
        EmotionAnalyzer::new(args.cascade.as_deref(), &model_path, args.normalization)?;

    let mut window = PreviewWindow::new(&args.window_title)?;
    let exit = run(&mut camera, &mut analyzer, &mut window, &options)?;
    info!(?exit, "Stopped emotion recognition");

    Ok(())
}

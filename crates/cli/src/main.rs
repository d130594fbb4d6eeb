use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use clap::Parser;

use roadscan_core::annotation::infrastructure::box_annotator::{AnnotationStyle, BoxAnnotator};
use roadscan_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetectorLoader;
use roadscan_core::pipeline::detect_damage_use_case::DetectDamageUseCase;
use roadscan_core::pipeline::infrastructure::sequential_pipeline_executor::SequentialPipelineExecutor;
use roadscan_core::pipeline::infrastructure::threaded_pipeline_executor::ThreadedPipelineExecutor;
use roadscan_core::pipeline::pipeline_executor::{PipelineConfig, PipelineExecutor};
use roadscan_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use roadscan_core::shared::settings::ScanSettings;
use roadscan_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use roadscan_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;

/// Road damage detection for dashcam and survey videos.
#[derive(Parser)]
#[command(name = "roadscan")]
struct Cli {
    /// Input video. Prompted for when omitted.
    input: Option<PathBuf>,

    /// Settings file (JSON). Defaults to the user settings file if present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for the annotated video.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// ONNX detection model.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Download the model from here when it is missing locally.
    #[arg(long)]
    model_url: Option<String>,

    /// Minimum detection confidence (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// TrueType font for box labels.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Overlap decoding, inference and encoding on separate threads.
    #[arg(long)]
    threaded: bool,

    /// Print progress every N frames.
    #[arg(long)]
    progress_every: Option<usize>,

    /// Hide confidence scores in box labels.
    #[arg(long)]
    hide_confidence: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut settings = ScanSettings::load(cli.config.as_deref())?;
    apply_overrides(&mut settings, &cli);
    settings.validate()?;

    let input = match &cli.input {
        Some(path) => path.clone(),
        None => prompt_for_input()?,
    };
    if !input.is_file() {
        return Err(format!("File not found: {}", input.display()).into());
    }
    let output = settings.output_path_for(&input);

    println!("Processing: {}", input.display());
    println!("Saving to: {}", output.display());
    println!("Press 'q' then Enter to stop early.");

    let cancelled = Arc::new(AtomicBool::new(false));
    watch_for_quit(cancelled.clone());

    let loader = OnnxYoloDetectorLoader::new(
        settings.model_path.clone(),
        settings.model_url.clone(),
        settings.class_labels.clone(),
        settings.confidence,
    )
    .with_download_progress(Arc::new(download_progress));

    let annotator = BoxAnnotator::new(AnnotationStyle {
        box_thickness: settings.box_thickness,
        show_confidence: settings.show_confidence,
        font_path: settings.label_font.clone(),
    })?;

    let executor: Box<dyn PipelineExecutor> = if settings.threaded {
        Box::new(ThreadedPipelineExecutor::new())
    } else {
        Box::new(SequentialPipelineExecutor::new())
    };

    let mut use_case = DetectDamageUseCase::new(
        Box::new(loader),
        Box::new(FfmpegReader::new()),
        Box::new(FfmpegWriter::new().with_bit_rate(settings.bit_rate)),
        Box::new(annotator),
        executor,
        Box::new(StdoutPipelineLogger::new(settings.progress_interval)),
        PipelineConfig {
            min_confidence: settings.confidence,
            cancelled,
        },
    );

    let summary = use_case.execute(&input, &output)?;
    println!();
    println!("{}", summary.render_report());
    Ok(())
}

fn apply_overrides(settings: &mut ScanSettings, cli: &Cli) {
    if let Some(dir) = &cli.output_dir {
        settings.output_dir = dir.clone();
    }
    if let Some(model) = &cli.model {
        settings.model_path = model.clone();
    }
    if let Some(url) = &cli.model_url {
        settings.model_url = Some(url.clone());
    }
    if let Some(confidence) = cli.confidence {
        settings.confidence = confidence;
    }
    if let Some(font) = &cli.font {
        settings.label_font = Some(font.clone());
    }
    if let Some(every) = cli.progress_every {
        settings.progress_interval = every;
    }
    if cli.threaded {
        settings.threaded = true;
    }
    if cli.hide_confidence {
        settings.show_confidence = false;
    }
}

fn prompt_for_input() -> Result<PathBuf, Box<dyn std::error::Error>> {
    print!("Drag and drop video here: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(clean_dropped_path(&line))
}

/// File managers wrap dropped paths in quotes and terminals append a newline.
fn clean_dropped_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'');
    Path::new(trimmed.trim()).to_path_buf()
}

/// Raises `cancelled` when the user types `q` and Enter.
fn watch_for_quit(cancelled: Arc<AtomicBool>) {
    let spawned = thread::Builder::new()
        .name("quit-watcher".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if is_quit_command(&line) {
                    log::info!("Stop requested, finishing the current frame");
                    cancelled.store(true, Ordering::SeqCst);
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        log::warn!("Early stop unavailable: {e}");
    }
}

fn is_quit_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("q")
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading detection model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading detection model... {downloaded} bytes");
    }
}

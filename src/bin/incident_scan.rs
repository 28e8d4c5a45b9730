//! incident_scan - submit a media file for detection and render the result

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;

use incident_watch::{
    DetectionRecorder, HttpDetectionService, ImageSurface, RenderTarget, SubmissionController,
    SubmissionState, WatchConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Media file (image or video) to submit for detection.
    file: PathBuf,
    /// Detection service endpoint (overrides config).
    #[arg(long)]
    endpoint: Option<String>,
    /// Output path for the annotated overlay image.
    #[arg(long, default_value = "annotated.jpg")]
    out: PathBuf,
    /// Directory to export recorded crops and a JSON manifest into.
    #[arg(long)]
    crops_dir: Option<PathBuf>,
    /// Skip local overlay rendering; report alerts only.
    #[arg(long)]
    no_render: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = WatchConfig::load()?;
    if let Some(endpoint) = args.endpoint {
        cfg.endpoint = endpoint;
    }

    let file_name = args
        .file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload")
        .to_string();
    let media =
        fs::read(&args.file).with_context(|| format!("reading {}", args.file.display()))?;

    let service = HttpDetectionService::new(&cfg.endpoint, cfg.timeout)?;

    let font = match &cfg.font_path {
        Some(path) => Some(ImageSurface::load_font(path)?),
        None => None,
    };

    // Overlays are rendered only for still images; videos are submitted as-is
    // and report alerts without a local render.
    let decoded = if args.no_render {
        None
    } else {
        match image::load_from_memory(&media) {
            Ok(img) => Some(img.to_rgb8()),
            Err(err) => {
                log::warn!("media is not a decodable still image ({}); skipping render", err);
                None
            }
        }
    };

    let mut render_state = decoded.map(|rgb| {
        let source = ImageSurface::new(rgb.clone());
        let overlay = match &font {
            Some(font) => ImageSurface::with_font(rgb, font.clone()),
            None => ImageSurface::new(rgb),
        };
        (overlay, source, DetectionRecorder::new())
    });

    stage("submit to detection service");
    let mut controller = SubmissionController::new();
    let render = render_state.as_mut().map(|(overlay, source, recorder)| RenderTarget {
        overlay,
        source: &*source,
        recorder,
    });
    let state = controller
        .submit_media(&service, &file_name, &media, render)
        .clone();

    let outcome = match state {
        SubmissionState::ResultReady { outcome, .. } => outcome,
        SubmissionState::Failed { error, .. } => {
            return Err(anyhow!("submission failed: {}", error));
        }
        other => return Err(anyhow!("unexpected controller state {:?}", other)),
    };

    println!("Prediction: {}", outcome.messages().join(" & "));
    if let Some(diagnostics) = &outcome.diagnostics {
        println!("Model log: {}", diagnostics);
    }

    let mut overlay_path = None;
    let mut exported_crops = 0usize;
    if let Some((overlay, _source, mut recorder)) = render_state {
        stage("write annotated overlay");
        overlay
            .image()
            .save(&args.out)
            .with_context(|| format!("writing overlay to {}", args.out.display()))?;
        overlay_path = Some(args.out.clone());

        recorder.enforce_limit(cfg.history_limit);
        if let Some(dir) = &args.crops_dir {
            stage("export recorded crops");
            exported_crops = export_crops(dir, &recorder)?;
        }
    }

    println!("scan summary:");
    println!("  file: {}", args.file.display());
    println!("  labels: {}", outcome.labels.join(", "));
    println!("  detections: {}", outcome.detections);
    println!("  rendered: {}", outcome.rendered);
    println!("  skipped: {}", outcome.skipped);
    if let Some(path) = overlay_path {
        println!("  overlay: {}", path.display());
    }
    if let Some(dir) = &args.crops_dir {
        println!("  crops: {} -> {}", exported_crops, dir.display());
    }

    Ok(())
}

fn stage(msg: &str) {
    eprintln!("incident_scan: {}", msg);
}

/// Write each recorded crop as a PNG plus a manifest.json describing the
/// history (label, capture time, content digest).
fn export_crops(dir: &PathBuf, recorder: &DetectionRecorder) -> Result<usize> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut manifest = Vec::new();
    let mut written = 0usize;
    for (index, entry) in recorder.history().iter().enumerate() {
        let file = entry.crop.to_image().map(|img| {
            let name = format!("crop_{:03}_{}.png", index, entry.label.replace(' ', "_"));
            (name, img)
        });
        if let Some((name, img)) = &file {
            let path = dir.join(name);
            img.save(&path)
                .with_context(|| format!("writing crop to {}", path.display()))?;
            written += 1;
        }
        manifest.push(serde_json::json!({
            "label": entry.label,
            "captured_at_ms": entry.captured_at_ms,
            "clock_time": entry.clock_time,
            "digest": entry.crop.digest_hex(),
            "file": file.as_ref().map(|(name, _)| name.clone()),
        }));
    }

    let manifest_path = dir.join("manifest.json");
    fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)
        .with_context(|| format!("writing manifest to {}", manifest_path.display()))?;
    Ok(written)
}

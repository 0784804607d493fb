//! pbmark CLI: run the parallax marker pipeline over image files.

use clap::{Args, Parser, Subcommand};
use image::GrayImage;
use std::path::{Path, PathBuf};

use pbmark::ports::{FixedText, NoControl};
use pbmark::{
    drive_session_with, find_roi, rectify, Ed25519Signer, Ed25519Verifier, EnrollmentSession,
    FrameMeasurer, FrameProcessor, FrameReport, FrameSource, PipelineConfig, VerificationSession,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "pbmark")]
#[command(about = "Parallax-based marker authentication: liveness, fingerprinting and signed credentials")]
#[command(version)]
struct Cli {
    /// Pipeline configuration (JSON). Missing keys use defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Localize and rectify the marker in one image; print the ROI.
    Locate {
        #[arg(long)]
        image: PathBuf,
        /// Write the rectified raster here.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print the shift sample and fingerprint descriptor of one image.
    Analyze {
        #[arg(long)]
        image: PathBuf,
    },

    /// Reconstruct the two printed layers of one image.
    Separate {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        out_near: PathBuf,
        #[arg(long)]
        out_far: PathBuf,
    },

    /// Enroll a marker from a directory of frames and write its credential.
    Enroll(EnrollArgs),

    /// Verify a credential against a directory of frames.
    Verify(VerifyArgs),
}

#[derive(Debug, Clone, Args)]
struct EnrollArgs {
    /// Directory of frames, processed in file-name order.
    #[arg(long)]
    frames: PathBuf,

    /// Ed25519 private key (PKCS#8 PEM).
    #[arg(long)]
    private_key: PathBuf,

    /// Path to write the credential (canonical JSON).
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Clone, Args)]
struct VerifyArgs {
    /// Directory of frames, processed in file-name order.
    #[arg(long)]
    frames: PathBuf,

    /// Credential text as written by `enroll`.
    #[arg(long)]
    credential: PathBuf,

    /// Ed25519 public key (SPKI PEM).
    #[arg(long)]
    public_key: PathBuf,
}

/// Replays image files as camera frames.
struct DirectorySource {
    files: std::vec::IntoIter<PathBuf>,
}

impl DirectorySource {
    fn open(dir: &Path) -> CliResult<Self> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
                .unwrap_or(false);
            if is_image {
                files.push(path);
            }
        }
        files.sort();
        if files.is_empty() {
            return Err(format!("no png/jpeg frames in {}", dir.display()).into());
        }
        tracing::info!("{} frames in {}", files.len(), dir.display());
        Ok(Self {
            files: files.into_iter(),
        })
    }
}

impl FrameSource for DirectorySource {
    fn next_frame(&mut self) -> Option<GrayImage> {
        let path = self.files.next()?;
        match image::open(&path) {
            Ok(img) => Some(img.to_luma8()),
            Err(err) => {
                tracing::warn!("cannot read frame {}: {}", path.display(), err);
                None
            }
        }
    }
}

fn load_config(path: Option<&Path>) -> CliResult<PipelineConfig> {
    match path {
        Some(path) => {
            tracing::info!("Loading config: {}", path.display());
            Ok(PipelineConfig::from_json_file(path)?)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn load_gray(path: &Path) -> CliResult<GrayImage> {
    tracing::info!("Loading image: {}", path.display());
    let img = image::open(path)?.to_luma8();
    let (w, h) = img.dimensions();
    tracing::info!("Image size: {}x{}", w, h);
    Ok(img)
}

fn log_frame(index: &mut usize, report: &FrameReport) {
    *index += 1;
    tracing::debug!(
        "frame {}: {} liveness={} collected={}/{}",
        index,
        report.state,
        report.liveness,
        report.collected,
        report.required
    );
    if let Some(err) = &report.error {
        tracing::warn!("frame {}: {}", index, err);
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Locate { image, out } => run_locate(&config, image, out.as_deref()),
        Commands::Analyze { image } => run_analyze(&config, image),
        Commands::Separate {
            image,
            out_near,
            out_far,
        } => run_separate(&config, image, out_near, out_far),
        Commands::Enroll(args) => run_enroll(&config, args),
        Commands::Verify(args) => run_verify(&config, args),
    }
}

fn run_locate(config: &PipelineConfig, image: &Path, out: Option<&Path>) -> CliResult<()> {
    let frame = load_gray(image)?;
    let Some(roi) = find_roi(&frame, &config.localizer) else {
        return Err("no marker found".into());
    };
    tracing::info!("ROI area {:.0} px²", roi.area());
    println!("{}", serde_json::to_string_pretty(&roi)?);

    if let Some(out) = out {
        let rectified = rectify(&frame, &roi, config.canonical_size)
            .ok_or("ROI could not be rectified")?;
        rectified.save(out)?;
        tracing::info!("Rectified marker written to {}", out.display());
    }
    Ok(())
}

fn run_analyze(config: &PipelineConfig, image: &Path) -> CliResult<()> {
    let frame = load_gray(image)?;
    let processor = FrameProcessor::new(config);
    let obs = processor.observe(&frame);
    if obs.roi.is_none() {
        return Err("no marker found".into());
    }
    let descriptor = processor.describe(&obs);
    if descriptor.is_none() {
        tracing::warn!("fewer than two spectral peaks; no descriptor");
    }
    let report = serde_json::json!({
        "roi": obs.roi,
        "sample": obs.sample,
        "parallax": obs.sample.parallax(),
        "descriptor": descriptor,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_separate(
    config: &PipelineConfig,
    image: &Path,
    out_near: &Path,
    out_far: &Path,
) -> CliResult<()> {
    let frame = load_gray(image)?;
    let processor = FrameProcessor::new(config);
    let roi = find_roi(&frame, &config.localizer).ok_or("no marker found")?;
    let rectified = rectify(&frame, &roi, processor.canonical_size())
        .ok_or("ROI could not be rectified")?;
    let pair = processor
        .analyzer()
        .separate(&rectified)
        .ok_or("fewer than two spectral peaks; layers not separable")?;
    tracing::info!("layer peaks at {:?} and {:?}", pair.peaks[0], pair.peaks[1]);
    pair.primary.save(out_near)?;
    pair.secondary.save(out_far)?;
    tracing::info!(
        "Layers written to {} and {}",
        out_near.display(),
        out_far.display()
    );
    Ok(())
}

fn run_enroll(config: &PipelineConfig, args: &EnrollArgs) -> CliResult<()> {
    let signer = Ed25519Signer::from_pem_file(&args.private_key)?;
    let mut source = DirectorySource::open(&args.frames)?;
    let mut session = EnrollmentSession::new(config, signer);

    let mut index = 0usize;
    let credential = drive_session_with(
        &mut session,
        &mut source,
        &mut NoControl,
        config.session.max_frames,
        |report| log_frame(&mut index, report),
    )?
    .ok_or("enrollment aborted")?;

    std::fs::write(&args.out, credential.to_json())?;
    tracing::info!(
        "Credential {} written to {}",
        credential.data.id,
        args.out.display()
    );
    println!("{}", serde_json::to_string_pretty(&credential.data)?);
    Ok(())
}

fn run_verify(config: &PipelineConfig, args: &VerifyArgs) -> CliResult<()> {
    let verifier = Ed25519Verifier::from_pem_file(&args.public_key)?;
    let text = std::fs::read_to_string(&args.credential)?;
    let mut source = DirectorySource::open(&args.frames)?;
    let mut session = VerificationSession::new(config, verifier, FixedText(text.clone()));
    session.submit_claim(text.trim())?;

    let mut index = 0usize;
    let outcome = drive_session_with(
        &mut session,
        &mut source,
        &mut NoControl,
        config.session.max_frames,
        |report| log_frame(&mut index, report),
    )?
    .ok_or("verification aborted")?;

    tracing::info!("Credential {}: {}", outcome.id, outcome.outcome());
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

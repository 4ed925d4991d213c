//! Frame producer
//!
//! Stand-in for a capture process: replays the JPEG files of a directory as a
//! live camera. Every tick one file is copied into a spool directory and its
//! path appended to the session's mailbox. A `running` control document is
//! written at start and `stopped` on Ctrl+C, which ends any open stream.
//!
//! Run with: cargo run --example frame_producer -- --user alice --camera cam1 ./jpegs

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use mjpeg_relay::{ControlDocument, FrameRef, Mailbox, SessionKey};

#[derive(Parser, Debug)]
#[command(name = "frame_producer", about = "Feed JPEG files into a relay mailbox")]
struct Args {
    /// Directory of .jpg/.jpeg files to replay
    source: PathBuf,

    /// User id of the session key
    #[arg(long)]
    user: String,

    /// Camera id of the session key
    #[arg(long)]
    camera: String,

    /// Directory holding mailbox and control files
    #[arg(long, default_value = "files/sock", env = "MJPEG_MAILBOX_DIR")]
    mailbox_dir: PathBuf,

    /// Where copied frames are written
    #[arg(long, default_value = "files/spool")]
    spool_dir: PathBuf,

    /// Frames per second
    #[arg(long, default_value_t = 1.0)]
    fps: f64,

    /// Spooled frames kept on disk before the oldest is deleted
    #[arg(long, default_value_t = 32)]
    keep: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("frame_producer=info".parse()?),
        )
        .init();

    let key = SessionKey::new(args.user.as_str(), args.camera.as_str())?;
    let sources = list_jpegs(&args.source)?;
    if sources.is_empty() {
        return Err(format!("no JPEG files in {}", args.source.display()).into());
    }

    std::fs::create_dir_all(&args.mailbox_dir)?;
    std::fs::create_dir_all(&args.spool_dir)?;
    let spool_dir = std::fs::canonicalize(&args.spool_dir)?;

    let mailbox = Mailbox::new(&args.mailbox_dir, &key);
    let control = mailbox.control_channel();
    control.write(&ControlDocument::running())?;

    tracing::info!(
        session = %key,
        frames = sources.len(),
        fps = args.fps,
        "Producing frames"
    );

    let period = Duration::from_secs_f64(1.0 / args.fps.max(0.01));
    let mut ticker = tokio::time::interval(period);
    let mut spooled: VecDeque<PathBuf> = VecDeque::new();
    let mut seq: u64 = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {}
        }

        let source = &sources[(seq as usize) % sources.len()];
        let target = spool_dir.join(format!("{}-{:08}.jpg", key, seq));
        seq += 1;

        tokio::fs::copy(source, &target).await?;

        let frame = FrameRef::new(target.to_string_lossy());
        if mailbox.append(&frame)? {
            tracing::debug!(frame = %frame, "Frame queued");
            spooled.push_back(target);
        } else {
            // No relay serving the key; nobody will read it
            tracing::trace!(frame = %frame, "No viewer, frame dropped");
            tokio::fs::remove_file(&target).await?;
        }

        while spooled.len() > args.keep {
            if let Some(old) = spooled.pop_front() {
                remove_spooled(&old).await;
            }
        }
    }

    println!("\nStopping stream...");
    control.write(&ControlDocument::stopped())?;

    for path in spooled {
        remove_spooled(&path).await;
    }

    Ok(())
}

async fn remove_spooled(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::debug!(path = %path.display(), error = %e, "Failed to remove spooled frame");
    }
}

fn list_jpegs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
        })
        .collect();
    files.sort();
    Ok(files)
}

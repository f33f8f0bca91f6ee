use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::Parser;
use mjpeg::{Credentials, StreamConfig, StreamProcessor};

#[derive(Parser)]
#[command(
    name = "mjpeg-grab",
    about = "Save JPEG frames from an MJPEG (multipart/x-mixed-replace) HTTP stream"
)]
struct Args {
    /// Stream URL, e.g. http://camera.local/mjpg/video.mjpg
    url: String,

    /// Username for Basic authentication
    #[arg(long, short)]
    user: Option<String>,

    /// Password for Basic authentication
    #[arg(long, short)]
    password: Option<String>,

    /// Bytes requested per read
    #[arg(long, default_value_t = mjpeg::processor::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Largest accepted frame in bytes
    #[arg(long, default_value_t = mjpeg::assembler::DEFAULT_BUFFER_CAPACITY)]
    capacity: usize,

    /// Stop after this many frames (default: run until Enter is pressed)
    #[arg(long, short)]
    count: Option<u64>,

    /// Directory the frames are written to
    #[arg(long, short, default_value = ".")]
    out: PathBuf,
}

/// `true` once a line is read. A closed stdin (`</dev/null`, service
/// units) never counts as a stop request.
fn enter_pressed(mut input: impl BufRead) -> bool {
    let mut line = String::new();
    matches!(input.read_line(&mut line), Ok(n) if n > 0)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    if let Err(e) = fs::create_dir_all(&args.out) {
        eprintln!("Failed to create {}: {}", args.out.display(), e);
        return ExitCode::FAILURE;
    }

    let config = StreamConfig {
        chunk_size: args.chunk_size.max(1),
        buffer_capacity: args.capacity.max(1),
        ..StreamConfig::default()
    };
    let credentials = match (&args.user, &args.password) {
        (None, None) => None,
        (user, password) => Some(Credentials::new(
            user.as_deref().unwrap_or(""),
            password.as_deref().unwrap_or(""),
        )),
    };

    let mut processor = StreamProcessor::new(config);
    if let Err(e) = processor.parse_stream(&args.url, credentials) {
        eprintln!("Failed to start stream: {}", e);
        return ExitCode::FAILURE;
    }

    let quit = Arc::new(AtomicBool::new(false));
    if args.count.is_none() {
        println!("Grabbing {} (press Enter to stop)", args.url);
        let quit = quit.clone();
        thread::spawn(move || {
            if enter_pressed(io::stdin().lock()) {
                quit.store(true, Ordering::SeqCst);
            }
        });
    }

    let mailbox = processor.mailbox().clone();
    let mut seen = mailbox.frames_received();
    let mut saved = 0u64;

    while !quit.load(Ordering::SeqCst) {
        let Some(frame) = mailbox.wait_for_frame(seen, Duration::from_millis(250)) else {
            if mailbox.is_finished() {
                break;
            }
            continue;
        };

        let received = mailbox.frames_received();
        let skipped = received - seen - 1;
        if skipped > 0 {
            tracing::debug!(skipped, "slow consumer, frames dropped");
        }
        seen = received;

        saved += 1;
        let path = args.out.join(format!("frame-{saved:06}.jpg"));
        if let Err(e) = fs::write(&path, frame.as_bytes()) {
            eprintln!("Failed to write {}: {}", path.display(), e);
            processor.stop_stream();
            return ExitCode::FAILURE;
        }
        tracing::info!(path = %path.display(), bytes = frame.len(), "frame saved");

        if args.count.is_some_and(|n| saved >= n) {
            break;
        }
    }

    processor.stop_stream();

    match mailbox.take_error() {
        Some(e) => {
            eprintln!("Stream error: {}", e);
            ExitCode::FAILURE
        }
        None => {
            println!("Saved {} frame(s) to {}", saved, args.out.display());
            ExitCode::SUCCESS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn closed_stdin_is_not_a_stop_request() {
        assert!(!enter_pressed(Cursor::new(Vec::new())));
    }

    #[test]
    fn newline_is_a_stop_request() {
        assert!(enter_pressed(Cursor::new(b"\n".to_vec())));
        assert!(enter_pressed(Cursor::new(b"q\n".to_vec())));
    }
}

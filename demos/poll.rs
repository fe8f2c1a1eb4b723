//! Eye-tracking polling loop against the bundled mock runtime.
//!
//! Run with: cargo run --example poll
//! Knobs:
//! - `GAZELINK_RETRY_MS`: backoff after a retryable wait failure (default 100)
//! - `GAZELINK_FRAMES`: number of frames to consume (default 120)

use gazelink::bitmap::BitmapImage;
use gazelink::{
    ClientCapabilities, FrameOutcome, Headset, ImageType, MockRuntime, ResearchCapabilities,
};
use std::sync::Arc;
use std::time::Duration;

fn read_env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn main() -> Result<(), gazelink::ErrorCode> {
    env_logger::init();

    let retry_delay = Duration::from_millis(read_env_u64("GAZELINK_RETRY_MS", 100));
    let frames = read_env_u64("GAZELINK_FRAMES", 120);

    let runtime = Arc::new(MockRuntime::default());
    let caps = ClientCapabilities::GAZE | ClientCapabilities::ORIENTATION;

    let headset = Headset::open(runtime, caps)?;
    // fatal if the runtime is too old; nothing below is reliable without it
    headset.check_software_versions()?;

    println!("Headset connected: {:?}", headset.is_hardware_connected());
    println!("Headset ready:     {:?}", headset.is_hardware_ready());
    println!("Versions:          {:?}", headset.software_versions()?);
    println!("Hardware:          {:?}", headset.hardware_info()?);

    if !headset.is_eye_tracking_enabled()? {
        eprintln!("Eye tracking not enabled");
    }

    // Request calibration if needed; completion is observed by polling.
    headset.ensure_calibration()?;
    while headset.is_eye_tracking_calibrating()? {
        std::thread::sleep(Duration::from_millis(50));
    }
    println!("Calibrated:        {:?}", headset.is_eye_tracking_calibrated());
    println!("IOD:               {} m", headset.iod()?);

    // Grab one eye image through the research surface and decode it.
    let research = headset.research_headset(ResearchCapabilities::EYE_IMAGE)?;
    let image = BitmapImage::decode(research.image(ImageType::StereoEye)?)
        .expect("runtime produced a malformed bitmap");
    println!(
        "Eye image:         {}x{} ({} channels, flipped={})",
        image.header().width,
        image.header().height,
        image.header().channels,
        image.header().flipped,
    );

    // Main loop: sync to the eye camera, then consume this frame's data.
    let mut synced = 0u64;
    while synced < frames {
        match headset.wait_for_next_eye_frame() {
            FrameOutcome::Ready(()) => {}
            FrameOutcome::Retry(code) => {
                eprintln!("eye frame sync: {}; retrying in {:?}", code, retry_delay);
                std::thread::sleep(retry_delay);
                continue;
            }
            FrameOutcome::Fatal(code) => {
                eprintln!("eye frame sync failed permanently: {}", code);
                return Err(code);
            }
        }
        synced += 1;

        let (left, right) = headset.gaze_vectors()?;
        let convergence = headset.gaze_convergence()?;
        if synced % 30 == 0 {
            println!(
                "frame {:4}  gaze L=({:+.3},{:+.3},{:+.3}) R=({:+.3},{:+.3},{:+.3}) conv={:.2}m",
                synced,
                left.vector.x, left.vector.y, left.vector.z,
                right.vector.x, right.vector.y, right.vector.z,
                convergence.distance,
            );
        }
    }

    println!("Consumed {} eye frames", synced);
    Ok(())
}

//! Render-thread pacing loop against the bundled mock runtime.
//!
//! Run with: cargo run --example render
//! Knobs:
//! - `GAZELINK_RETRY_MS`: backoff after a retryable wait failure (default 10)
//! - `GAZELINK_FRAMES`: number of frames to submit (default 140)

use gazelink::{
    ClientCapabilities, FrameOutcome, Headset, LayerCreateInfo, LayerSubmitInfo, MockRuntime,
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

    let retry_delay = Duration::from_millis(read_env_u64("GAZELINK_RETRY_MS", 10));
    let frames = read_env_u64("GAZELINK_FRAMES", 140);

    let runtime = Arc::new(MockRuntime::default());
    let headset = Headset::open(runtime, ClientCapabilities::ORIENTATION)?;
    headset.check_software_versions()?;

    let compositor = headset.create_compositor()?;
    while !compositor.is_ready()? {
        std::thread::sleep(Duration::from_millis(50));
    }
    println!("Compositor ready on adapter {:?}", compositor.adapter_id()?);

    // Create the layer exactly once per compositor lifetime; it survives
    // transient reconnections, so never recreate it on reconnect.
    let layer = compositor.create_layer(&LayerCreateInfo::default())?;
    println!(
        "Layer {} at ideal resolution {:?}",
        layer.layer_id, layer.ideal_resolution
    );

    let mut submitted = 0u64;
    while submitted < frames {
        // wait for the render slot, then render immediately with the pose
        let pose = match compositor.wait_for_render_pose() {
            FrameOutcome::Ready(pose) => pose,
            FrameOutcome::Retry(code) => {
                eprintln!("render sync: {}; retrying in {:?}", code, retry_delay);
                std::thread::sleep(retry_delay);
                continue;
            }
            FrameOutcome::Fatal(code) => {
                eprintln!("render sync failed permanently: {}", code);
                return Err(code);
            }
        };

        // a real client would render into GPU textures here
        compositor.submit(&[LayerSubmitInfo {
            layer_id: layer.layer_id,
            left_texture: 1,
            right_texture: 2,
            pose,
        }])?;
        submitted += 1;

        if submitted % 70 == 0 {
            println!(
                "frame {:4}  pose q=({:+.3},{:+.3},{:+.3},{:+.3}) at {}us",
                submitted,
                pose.orientation.x, pose.orientation.y, pose.orientation.z, pose.orientation.w,
                pose.timestamp_us,
            );
        }
    }

    println!("Submitted {} frames", submitted);
    Ok(())
}

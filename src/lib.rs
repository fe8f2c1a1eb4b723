//! # gazelink - client SDK for the GazeLink eye-tracking HMD runtime
//!
//! Connects an application to a running GazeLink service and provides:
//! - Session lifecycle with capability negotiation (gaze, orientation,
//!   position tracking)
//! - The eye-camera and compositor polling loops with retryable vs.
//!   fatal error classification
//! - Frame submission through the compositor
//! - A research surface for lab setups (raw imagery, low-level gaze)
//!
//! ## Quick Start
//! ```no_run
//! use gazelink::{ClientCapabilities, FrameOutcome, Headset, MockRuntime};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let runtime = Arc::new(MockRuntime::default());
//! let caps = ClientCapabilities::GAZE | ClientCapabilities::ORIENTATION;
//! let headset = Headset::open(runtime, caps).unwrap();
//! headset.check_software_versions().unwrap();
//!
//! loop {
//!     match headset.wait_for_next_eye_frame() {
//!         FrameOutcome::Ready(()) => {
//!             if let Ok((left, right)) = headset.gaze_vectors() {
//!                 println!("gaze: {:?} {:?}", left.vector, right.vector);
//!             }
//!         }
//!         FrameOutcome::Retry(_) => std::thread::sleep(Duration::from_millis(100)),
//!         FrameOutcome::Fatal(code) => panic!("eye loop stopped: {}", code),
//!     }
//! }
//! ```
//!
//! The `Runtime` trait is the seam to the actual service; production
//! builds plug in the IPC-backed implementation, while tests and the
//! bundled demos use [`MockRuntime`].

pub mod bitmap;
pub mod compositor;
pub mod error;
pub mod headset;
pub mod mock;
pub mod research;
pub mod runtime;
pub mod types;

pub use compositor::Compositor;
pub use error::{BitmapError, ErrorCode, FrameOutcome};
pub use headset::Headset;
pub use mock::{MockConfig, MockRuntime};
pub use research::ResearchHeadset;
pub use runtime::Runtime;
pub use types::*;

/// Result type alias for gazelink operations.
pub type Result<T> = std::result::Result<T, ErrorCode>;

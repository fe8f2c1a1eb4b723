use crate::runtime::Runtime;
use crate::types::{
    AdapterId, CompositorId, Layer, LayerCreateInfo, LayerSubmitInfo, Pose, SessionId,
};
use crate::{ErrorCode, FrameOutcome, Result};
use std::sync::Arc;

/// A frame-submission channel to the compositor.
///
/// Created from a [`crate::Headset`] but independently owned: it may
/// outlive the headset, several may coexist for one headset, and each
/// must be closed on its own (explicitly or on drop).
///
/// The render loop shape every client should use:
///
/// ```no_run
/// use gazelink::{ClientCapabilities, FrameOutcome, Headset, MockRuntime};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let runtime = Arc::new(MockRuntime::default());
/// let headset = Headset::open(runtime, ClientCapabilities::ORIENTATION)?;
/// let compositor = headset.create_compositor()?;
/// loop {
///     // update simulation for the next frame, then:
///     match compositor.wait_for_render_pose() {
///         FrameOutcome::Ready(pose) => {
///             // render immediately with `pose`, then submit
///             let _ = pose;
///         }
///         FrameOutcome::Retry(_) => {
///             std::thread::sleep(Duration::from_millis(10));
///             continue;
///         }
///         FrameOutcome::Fatal(code) => return Err(code),
///     }
/// }
/// # Ok::<(), gazelink::ErrorCode>(())
/// ```
pub struct Compositor {
    runtime: Arc<dyn Runtime>,
    compositor: Option<CompositorId>,
}

impl Compositor {
    pub(crate) fn open(runtime: Arc<dyn Runtime>, session: SessionId) -> Result<Compositor> {
        let compositor = runtime.create_compositor(session)?;
        log::debug!("Opened compositor {:?}", compositor);
        Ok(Compositor {
            runtime,
            compositor: Some(compositor),
        })
    }

    /// Whether the compositor connection is still open on the client side.
    pub fn is_open(&self) -> bool {
        self.compositor.is_some()
    }

    /// Release the compositor connection and every layer created on it.
    /// Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(compositor) = self.compositor.take() {
            self.runtime.destroy_compositor(compositor);
            log::debug!("Closed compositor {:?}", compositor);
        }
    }

    fn id(&self) -> Result<CompositorId> {
        self.compositor.ok_or(ErrorCode::HandleClosed)
    }

    /// Register a rendering layer for this client.
    ///
    /// Requires a live compositor connection — wait for
    /// [`Compositor::is_ready`] first. A created layer survives transient
    /// compositor disconnection, so create each layer exactly once per
    /// compositor lifetime, not once per reconnection. Layers are only
    /// released by closing the compositor.
    pub fn create_layer(&self, info: &LayerCreateInfo) -> Result<Layer> {
        self.runtime.create_layer(self.id()?, info)
    }

    /// Hand the frame's textures to the compositor for display, one entry
    /// per layer.
    pub fn submit(&self, layers: &[LayerSubmitInfo]) -> Result<()> {
        self.runtime.submit(self.id()?, layers)
    }

    /// Block until the compositor releases the next render slot.
    ///
    /// The sole recommended means of limiting the render frame rate. On
    /// `Ready`, proceed directly to rendering with the returned pose to
    /// minimize latency. On `Retry`, sleep briefly and call again rather
    /// than spinning.
    pub fn wait_for_render_pose(&self) -> FrameOutcome<Pose> {
        match self.id() {
            Ok(id) => FrameOutcome::classify(self.runtime.wait_for_render_pose(id)),
            Err(code) => FrameOutcome::Fatal(code),
        }
    }

    /// Last cached render pose, for callers that cannot block.
    pub fn last_render_pose(&self) -> Result<Pose> {
        self.runtime.last_render_pose(self.id()?)
    }

    /// Whether the compositor is running and accepting submissions.
    pub fn is_ready(&self) -> Result<bool> {
        self.runtime.compositor_ready(self.id()?)
    }

    /// GPU adapter the compositor renders on; submitted textures must
    /// come from the same adapter.
    pub fn adapter_id(&self) -> Result<AdapterId> {
        self.runtime.adapter_id(self.id()?)
    }
}

impl Drop for Compositor {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockConfig, MockRuntime};
    use crate::types::ClientCapabilities;
    use crate::Headset;
    use std::time::Duration;

    fn fast_runtime() -> Arc<MockRuntime> {
        Arc::new(MockRuntime::new(MockConfig {
            eye_frame_interval: Duration::from_millis(2),
            render_frame_interval: Duration::from_millis(2),
            wait_timeout: Duration::from_millis(50),
            ..MockConfig::default()
        }))
    }

    #[test]
    fn compositor_outlives_its_headset() {
        let runtime = fast_runtime();
        let compositor = {
            let mut headset =
                Headset::open(runtime.clone(), ClientCapabilities::ORIENTATION).unwrap();
            let compositor = headset.create_compositor().unwrap();
            headset.close();
            compositor
        };
        // the session is gone; the compositor channel still answers
        assert_eq!(runtime.live_sessions(), 0);
        assert_eq!(compositor.is_ready(), Ok(true));
        assert!(compositor.wait_for_render_pose().is_ready());
    }

    #[test]
    fn close_is_idempotent_and_releases_layers() {
        let runtime = fast_runtime();
        let headset = Headset::open(runtime.clone(), ClientCapabilities::ORIENTATION).unwrap();
        let mut compositor = headset.create_compositor().unwrap();
        compositor.create_layer(&LayerCreateInfo::default()).unwrap();
        compositor.close();
        compositor.close();
        assert_eq!(runtime.live_compositors(), 0);
        assert_eq!(compositor.is_ready(), Err(ErrorCode::HandleClosed));
    }

    #[test]
    fn multiple_compositors_for_one_headset() {
        let runtime = fast_runtime();
        let headset = Headset::open(runtime.clone(), ClientCapabilities::ORIENTATION).unwrap();
        let a = headset.create_compositor().unwrap();
        let b = headset.create_compositor().unwrap();
        assert_eq!(runtime.live_compositors(), 2);
        drop(a);
        assert_eq!(runtime.live_compositors(), 1);
        drop(b);
        assert_eq!(runtime.live_compositors(), 0);
    }

    #[test]
    fn layers_get_distinct_ids_and_submit_accepts_them() {
        let runtime = fast_runtime();
        let headset = Headset::open(runtime, ClientCapabilities::ORIENTATION).unwrap();
        let compositor = headset.create_compositor().unwrap();
        assert_eq!(compositor.is_ready(), Ok(true));

        let background = compositor.create_layer(&LayerCreateInfo::default()).unwrap();
        let hud = compositor
            .create_layer(&LayerCreateInfo { alpha_blend: true, ..Default::default() })
            .unwrap();
        assert_ne!(background.layer_id, hud.layer_id);

        let pose = compositor.wait_for_render_pose().ready().unwrap();
        compositor
            .submit(&[
                LayerSubmitInfo { layer_id: background.layer_id, pose, ..Default::default() },
                LayerSubmitInfo { layer_id: hud.layer_id, pose, ..Default::default() },
            ])
            .unwrap();
    }

    #[test]
    fn submit_with_unknown_layer_is_rejected() {
        let runtime = fast_runtime();
        let headset = Headset::open(runtime, ClientCapabilities::ORIENTATION).unwrap();
        let compositor = headset.create_compositor().unwrap();
        let err = compositor
            .submit(&[LayerSubmitInfo { layer_id: 42, ..Default::default() }])
            .unwrap_err();
        assert_eq!(err, ErrorCode::NotRegistered);
    }

    #[test]
    fn render_wait_times_out_as_retryable() {
        let runtime = Arc::new(MockRuntime::new(MockConfig {
            render_frame_interval: Duration::from_secs(3600),
            wait_timeout: Duration::from_millis(5),
            ..MockConfig::default()
        }));
        let headset = Headset::open(runtime, ClientCapabilities::ORIENTATION).unwrap();
        let compositor = headset.create_compositor().unwrap();
        assert_eq!(
            compositor.wait_for_render_pose(),
            FrameOutcome::Retry(ErrorCode::Timeout)
        );
    }

    #[test]
    fn last_render_pose_is_a_nonblocking_cache_read() {
        let runtime = fast_runtime();
        let headset = Headset::open(runtime, ClientCapabilities::ORIENTATION).unwrap();
        let compositor = headset.create_compositor().unwrap();
        let synced = compositor.wait_for_render_pose().ready().unwrap();
        let cached = compositor.last_render_pose().unwrap();
        // cache holds the snapshot of the most recently synced frame
        assert!(cached.timestamp_us >= synced.timestamp_us);
    }
}

//! Adapter interface to the GazeLink runtime.
//!
//! Every operation in this crate delegates to one request/response method
//! on the [`Runtime`] trait; the handle types in [`crate::headset`],
//! [`crate::compositor`] and [`crate::research`] hold no transport state
//! of their own. This keeps the lifecycle and polling logic independent
//! of how the runtime is reached (IPC in production, in-process fake in
//! tests — see [`crate::mock::MockRuntime`]).

use crate::types::{
    AdapterId, ClientCapabilities, CompositorId, Eye, GazeConvergence, GazeVector, Handedness,
    HardwareInfo, ImageType, Layer, LayerCreateInfo, LayerSubmitInfo, Matrix44, Pose,
    ProjectionParams, RawImage, ResearchCapabilities, ResearchGaze, ResearchId, SessionId,
    StatusQuery, TareKind, Vec2, Versions,
};
use crate::Result;

/// Request/response surface of the GazeLink runtime.
///
/// Every method carries the per-call status code of the runtime protocol
/// in its error channel: `Timeout` is retryable, `NotRegistered` is
/// permanent for the handle, the rest are fatal. Implementations serialize
/// calls per handle; the trait itself imposes no locking requirements
/// beyond `Send + Sync`.
pub trait Runtime: Send + Sync {
    // -- session lifecycle --

    /// Allocate and connect a session for the given capabilities.
    ///
    /// Acceptance of the request does not imply the hardware is present
    /// or started; query status after opening.
    fn create_session(&self, caps: ClientCapabilities) -> Result<SessionId>;

    /// Release the session and everything layered on it (research
    /// sessions included). Unblocks any wait pending on the session.
    /// Destroying an unknown or already-destroyed id is a no-op.
    fn destroy_session(&self, session: SessionId);

    /// Verify the client can run against this runtime. Fatal on mismatch;
    /// the compatibility rule is owned by the runtime.
    fn check_versions(&self, session: SessionId) -> Result<()>;

    fn software_versions(&self, session: SessionId) -> Result<Versions>;

    fn hardware_info(&self, session: SessionId) -> Result<HardwareInfo>;

    // -- status and control --

    /// Answer one boolean status question. A definite `false` and a
    /// failed query are different things; the latter comes back as `Err`.
    fn query_status(&self, session: SessionId, query: StatusQuery) -> Result<bool>;

    /// Reset a sensor's reference origin.
    fn tare(&self, session: SessionId, kind: TareKind) -> Result<()>;

    /// Request calibration if not already calibrated or calibrating.
    fn ensure_calibration(&self, session: SessionId) -> Result<()>;

    /// Request calibration; `restart_if_running` restarts an in-progress
    /// run instead of leaving it alone.
    fn start_calibration(&self, session: SessionId, restart_if_running: bool) -> Result<()>;

    fn stop_calibration(&self, session: SessionId) -> Result<()>;

    // -- eye frame sync and per-frame data --

    /// Block until the next eye camera frame or an internal timeout.
    fn wait_for_eye_frame(&self, session: SessionId) -> Result<()>;

    fn gaze_vectors(&self, session: SessionId) -> Result<(GazeVector, GazeVector)>;

    fn gaze_vectors_2d(&self, session: SessionId) -> Result<(Vec2, Vec2)>;

    fn gaze_convergence(&self, session: SessionId) -> Result<GazeConvergence>;

    fn eyes_closed(&self, session: SessionId) -> Result<Eye>;

    fn eyes_tracked(&self, session: SessionId) -> Result<Eye>;

    fn latest_pose(&self, session: SessionId) -> Result<Pose>;

    fn projection_matrices(
        &self,
        session: SessionId,
        handedness: Handedness,
        z_near: f32,
        z_far: f32,
    ) -> Result<(Matrix44, Matrix44)>;

    fn raw_projection_values(
        &self,
        session: SessionId,
    ) -> Result<(ProjectionParams, ProjectionParams)>;

    fn eye_to_head_matrices(&self, session: SessionId) -> Result<(Matrix44, Matrix44)>;

    /// Interocular distance in meters.
    fn iod(&self, session: SessionId) -> Result<f32>;

    // -- compositor --

    /// Connect a frame-submission channel for a session. Independently
    /// lifetimed: it may outlive the session it was requested from.
    fn create_compositor(&self, session: SessionId) -> Result<CompositorId>;

    /// Release the compositor and all layers created on it.
    fn destroy_compositor(&self, compositor: CompositorId);

    fn create_layer(&self, compositor: CompositorId, info: &LayerCreateInfo) -> Result<Layer>;

    fn submit(&self, compositor: CompositorId, layers: &[LayerSubmitInfo]) -> Result<()>;

    /// Block until the compositor releases the next render slot, and
    /// return the pose to render with.
    fn wait_for_render_pose(&self, compositor: CompositorId) -> Result<Pose>;

    /// Last cached render pose, without waiting.
    fn last_render_pose(&self, compositor: CompositorId) -> Result<Pose>;

    fn compositor_ready(&self, compositor: CompositorId) -> Result<bool>;

    fn adapter_id(&self, compositor: CompositorId) -> Result<AdapterId>;

    // -- research session --

    /// Layer a research session on an existing session, registering the
    /// given capabilities in the same round trip. The research session
    /// is destroyed with its owning session; it has no destroy call.
    fn create_research(
        &self,
        session: SessionId,
        caps: ResearchCapabilities,
    ) -> Result<ResearchId>;

    /// Register research capabilities; already-registered ones are a no-op.
    fn register_research(&self, research: ResearchId, caps: ResearchCapabilities) -> Result<()>;

    /// Unregister research capabilities; not-registered ones are a no-op.
    fn unregister_research(&self, research: ResearchId, caps: ResearchCapabilities) -> Result<()>;

    /// Latest image of the given type, as an owned buffer.
    fn research_image(&self, research: ResearchId, image_type: ImageType) -> Result<RawImage>;

    fn research_gaze(&self, research: ResearchId) -> Result<ResearchGaze>;
}

/// Log-and-discard helper for fire-and-forget requests (tare and friends)
/// whose failures are reported through the log only.
pub(crate) fn log_on_error(what: &str, result: Result<()>) {
    if let Err(code) = result {
        log::error!("{} failed: {}", what, code);
    }
}

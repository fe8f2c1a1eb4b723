use crate::runtime::{log_on_error, Runtime};
use crate::types::{
    ClientCapabilities, Eye, GazeConvergence, GazeVector, Handedness, HardwareInfo, Matrix44,
    Pose, ProjectionParams, ResearchCapabilities, SessionId, StatusQuery, TareKind, Vec2,
    Versions,
};
use crate::{Compositor, ErrorCode, FrameOutcome, ResearchHeadset, Result};
use std::sync::Arc;

/// A connected headset session.
///
/// Opened with a fixed capability set and released exactly once, either
/// by an explicit [`Headset::close`] or on drop. After close, every
/// operation returns `ErrorCode::HandleClosed`.
///
/// ```no_run
/// use gazelink::{ClientCapabilities, FrameOutcome, Headset, MockRuntime};
/// use std::sync::Arc;
///
/// let runtime = Arc::new(MockRuntime::default());
/// let headset = Headset::open(runtime, ClientCapabilities::GAZE)?;
/// headset.check_software_versions()?;
/// loop {
///     match headset.wait_for_next_eye_frame() {
///         FrameOutcome::Ready(()) => {
///             let (left, right) = headset.gaze_vectors()?;
///             // consume this frame's gaze
///             let _ = (left, right);
///         }
///         FrameOutcome::Retry(_) => continue, // back off in real code
///         FrameOutcome::Fatal(code) => return Err(code),
///     }
/// }
/// # Ok::<(), gazelink::ErrorCode>(())
/// ```
pub struct Headset {
    runtime: Arc<dyn Runtime>,
    session: Option<SessionId>,
    caps: ClientCapabilities,
}

impl Headset {
    /// Connect a session with the given capabilities.
    ///
    /// Success means the runtime accepted the request, not that the
    /// hardware is present or started; use the status queries for that.
    pub fn open(runtime: Arc<dyn Runtime>, caps: ClientCapabilities) -> Result<Headset> {
        log::debug!("Opening headset session: {:?}", caps);
        let session = runtime.create_session(caps)?;
        log::info!("Opened headset session {:?} with {:?}", session, caps);
        Ok(Headset {
            runtime,
            session: Some(session),
            caps,
        })
    }

    /// The capabilities this session was opened with.
    pub fn capabilities(&self) -> ClientCapabilities {
        self.caps
    }

    /// Whether the session is still open on the client side.
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Release the session, its IPC channels, and any research session
    /// layered on it. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            self.runtime.destroy_session(session);
            log::debug!("Closed headset session {:?}", session);
        }
    }

    fn session(&self) -> Result<SessionId> {
        self.session.ok_or(ErrorCode::HandleClosed)
    }

    pub(crate) fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }

    pub(crate) fn session_id(&self) -> Result<SessionId> {
        self.session()
    }

    // -- versions and hardware --

    /// Verify this client can run against the connected runtime.
    ///
    /// Call once after opening, before relying on anything else. An error
    /// here is fatal for the session; do not retry.
    pub fn check_software_versions(&self) -> Result<()> {
        self.runtime.check_versions(self.session()?)
    }

    /// Detailed client and runtime version identifiers.
    ///
    /// For a compatibility decision use
    /// [`Headset::check_software_versions`]; the rule belongs to the
    /// runtime, not to version arithmetic on the client.
    pub fn software_versions(&self) -> Result<Versions> {
        self.runtime.software_versions(self.session()?)
    }

    /// Serial number, manufacturer, and model of the headset.
    pub fn hardware_info(&self) -> Result<HardwareInfo> {
        self.runtime.hardware_info(self.session()?)
    }

    // -- status queries --
    //
    // Each returns Ok(definite answer) or Err(why the question could not
    // be answered); a failed query is never reported as `false`.

    /// Whether an HMD is connected.
    pub fn is_hardware_connected(&self) -> Result<bool> {
        self.query(StatusQuery::HardwareConnected)
    }

    /// Whether the hardware for the requested capabilities has started.
    pub fn is_hardware_ready(&self) -> Result<bool> {
        self.query(StatusQuery::HardwareReady)
    }

    /// Whether eye tracking hardware has started.
    pub fn is_eye_tracking_enabled(&self) -> Result<bool> {
        self.query(StatusQuery::EyeTrackingEnabled)
    }

    /// Whether eye tracking has been calibrated this session.
    pub fn is_eye_tracking_calibrated(&self) -> Result<bool> {
        self.query(StatusQuery::EyeTrackingCalibrated)
    }

    /// Whether a calibration run is currently in progress. Poll this
    /// after requesting calibration; completion is never signaled
    /// synchronously.
    pub fn is_eye_tracking_calibrating(&self) -> Result<bool> {
        self.query(StatusQuery::EyeTrackingCalibrating)
    }

    /// Whether eye tracking is actively tracking at least one eye.
    pub fn is_eye_tracking_ready(&self) -> Result<bool> {
        self.query(StatusQuery::EyeTrackingReady)
    }

    /// Whether motion tracking hardware has started.
    pub fn is_motion_ready(&self) -> Result<bool> {
        self.query(StatusQuery::MotionReady)
    }

    /// Whether position tracking hardware has started.
    pub fn is_position_ready(&self) -> Result<bool> {
        self.query(StatusQuery::PositionReady)
    }

    fn query(&self, query: StatusQuery) -> Result<bool> {
        self.runtime.query_status(self.session()?, query)
    }

    // -- tare --

    /// Reset the orientation sensor's reference. Fire-and-forget;
    /// failures are logged, not returned.
    pub fn tare_orientation(&self) {
        match self.session() {
            Ok(session) => {
                log_on_error("tare_orientation", self.runtime.tare(session, TareKind::Orientation))
            }
            Err(code) => log::error!("tare_orientation failed: {}", code),
        }
    }

    /// Reset the position sensors' reference. Fire-and-forget; failures
    /// are logged, not returned.
    pub fn tare_position(&self) {
        match self.session() {
            Ok(session) => {
                log_on_error("tare_position", self.runtime.tare(session, TareKind::Position))
            }
            Err(code) => log::error!("tare_position failed: {}", code),
        }
    }

    // -- calibration --

    /// Request calibration unless already calibrated or calibrating.
    ///
    /// Eye tracking content should call this before using gaze data, then
    /// poll [`Headset::is_eye_tracking_calibrating`] until it turns false.
    pub fn ensure_calibration(&self) -> Result<()> {
        self.runtime.ensure_calibration(self.session()?)
    }

    /// Request calibration. With `restart_if_running`, an in-progress run
    /// is restarted; otherwise the request is a no-op while one runs.
    pub fn start_calibration(&self, restart_if_running: bool) -> Result<()> {
        self.runtime.start_calibration(self.session()?, restart_if_running)
    }

    /// Stop an in-progress calibration run.
    pub fn stop_calibration(&self) -> Result<()> {
        self.runtime.stop_calibration(self.session()?)
    }

    // -- eye frame sync --

    /// Block until the next eye camera frame is ready.
    ///
    /// This is the rate-limiting primitive for an eye tracking loop: wait
    /// here first, then fetch the per-frame data for the frame just
    /// synced. Do not poll faster than this returns. A `Retry` outcome is
    /// a timeout — back off briefly and wait again; `Fatal` (e.g. the
    /// GAZE capability was never requested) will not resolve by retrying.
    pub fn wait_for_next_eye_frame(&self) -> FrameOutcome<()> {
        match self.session() {
            Ok(session) => FrameOutcome::classify(self.runtime.wait_for_eye_frame(session)),
            Err(code) => FrameOutcome::Fatal(code),
        }
    }

    // -- per-frame data --

    /// Gaze direction of each eye for the most recently synced frame.
    pub fn gaze_vectors(&self) -> Result<(GazeVector, GazeVector)> {
        self.runtime.gaze_vectors(self.session()?)
    }

    /// 2D gaze points on the virtual screens behind the lenses,
    /// normalized to [-1, 1] with (0, 0) at the center.
    pub fn gaze_vectors_2d(&self) -> Result<(Vec2, Vec2)> {
        self.runtime.gaze_vectors_2d(self.session()?)
    }

    /// Convergence of the two gaze rays.
    pub fn gaze_convergence(&self) -> Result<GazeConvergence> {
        self.runtime.gaze_convergence(self.session()?)
    }

    /// Which eyes are currently closed.
    pub fn check_eyes_closed(&self) -> Result<Eye> {
        self.runtime.eyes_closed(self.session()?)
    }

    /// Which eyes are currently being tracked.
    pub fn check_eyes_tracked(&self) -> Result<Eye> {
        self.runtime.eyes_tracked(self.session()?)
    }

    /// Pose of the HMD for the most recently synced frame.
    pub fn latest_pose(&self) -> Result<Pose> {
        self.runtime.latest_pose(self.session()?)
    }

    /// Left/right projection matrices for a left-handed coordinate system.
    pub fn projection_matrices_lh(&self, z_near: f32, z_far: f32) -> Result<(Matrix44, Matrix44)> {
        self.runtime
            .projection_matrices(self.session()?, Handedness::Left, z_near, z_far)
    }

    /// Left/right projection matrices for a right-handed coordinate system.
    pub fn projection_matrices_rh(&self, z_near: f32, z_far: f32) -> Result<(Matrix44, Matrix44)> {
        self.runtime
            .projection_matrices(self.session()?, Handedness::Right, z_near, z_far)
    }

    /// Per-eye view frustum bounds at 1 unit away; multiply by your near
    /// plane distance.
    pub fn raw_projection_values(&self) -> Result<(ProjectionParams, ProjectionParams)> {
        self.runtime.raw_projection_values(self.session()?)
    }

    /// Eye-space to head-space transforms (translations of +/- IOD/2).
    pub fn eye_to_head_matrices(&self) -> Result<(Matrix44, Matrix44)> {
        self.runtime.eye_to_head_matrices(self.session()?)
    }

    /// Interocular distance estimate in meters. Worth re-reading each
    /// frame during stereo rendering; the runtime may update it.
    pub fn iod(&self) -> Result<f32> {
        self.runtime.iod(self.session()?)
    }

    // -- factories --

    /// Connect a compositor. The compositor is independently owned and
    /// may outlive this headset; close both.
    pub fn create_compositor(&self) -> Result<Compositor> {
        Compositor::open(Arc::clone(&self.runtime), self.session()?)
    }

    /// Layer a research session on this headset, registering `caps` in
    /// the same round trip.
    ///
    /// Research data is for controlled lab environments; there are no
    /// cross-version compatibility guarantees. The research session has
    /// no destroy call of its own — it ends with this headset, and the
    /// borrow keeps it from being used past [`Headset::close`].
    pub fn research_headset(&self, caps: ResearchCapabilities) -> Result<ResearchHeadset<'_>> {
        ResearchHeadset::open(self, caps)
    }
}

impl Drop for Headset {
    fn drop(&mut self) {
        self.close();
    }
}

// manual impl: the runtime trait object has no Debug bound
impl std::fmt::Debug for Headset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Headset")
            .field("session", &self.session)
            .field("caps", &self.caps)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockConfig, MockRuntime};
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
    fn open_close_lifecycle() {
        let runtime = fast_runtime();
        let mut headset = Headset::open(runtime.clone(), ClientCapabilities::GAZE).unwrap();
        assert!(headset.is_open());
        assert_eq!(headset.capabilities(), ClientCapabilities::GAZE);
        headset.close();
        assert!(!headset.is_open());
        assert_eq!(runtime.live_sessions(), 0);
    }

    #[test]
    fn close_is_idempotent() {
        let runtime = fast_runtime();
        let mut headset = Headset::open(runtime.clone(), ClientCapabilities::GAZE).unwrap();
        headset.close();
        headset.close();
        assert_eq!(runtime.live_sessions(), 0);
    }

    #[test]
    fn drop_releases_the_session() {
        let runtime = fast_runtime();
        {
            let _headset = Headset::open(runtime.clone(), ClientCapabilities::GAZE).unwrap();
            assert_eq!(runtime.live_sessions(), 1);
        }
        assert_eq!(runtime.live_sessions(), 0);
    }

    #[test]
    fn operations_after_close_report_handle_closed() {
        let runtime = fast_runtime();
        let mut headset = Headset::open(runtime, ClientCapabilities::GAZE).unwrap();
        headset.close();
        assert_eq!(headset.is_hardware_connected(), Err(ErrorCode::HandleClosed));
        assert_eq!(
            headset.wait_for_next_eye_frame(),
            FrameOutcome::Fatal(ErrorCode::HandleClosed)
        );
    }

    #[test]
    fn rejected_capabilities_fail_open() {
        let runtime = Arc::new(MockRuntime::new(MockConfig {
            supported_caps: ClientCapabilities::GAZE,
            ..MockConfig::default()
        }));
        let err = Headset::open(runtime, ClientCapabilities::POSITION).unwrap_err();
        assert_eq!(err, ErrorCode::CapabilitiesRejected);
    }

    #[test]
    fn version_check_fails_hard_on_old_runtime() {
        let runtime = Arc::new(MockRuntime::new(MockConfig {
            runtime_minor: 0,
            ..MockConfig::default()
        }));
        let headset = Headset::open(runtime, ClientCapabilities::GAZE).unwrap();
        assert_eq!(headset.check_software_versions(), Err(ErrorCode::VersionTooOld));
    }

    #[test]
    fn eye_frame_wait_syncs_with_gaze_registered() {
        let runtime = fast_runtime();
        let headset = Headset::open(runtime, ClientCapabilities::GAZE).unwrap();
        assert_eq!(headset.wait_for_next_eye_frame(), FrameOutcome::Ready(()));
        // getters are meaningful after the wait completed
        let (left, right) = headset.gaze_vectors().unwrap();
        assert_eq!(left.timestamp_us, right.timestamp_us);
    }

    #[test]
    fn gaze_queries_without_gaze_capability_are_not_registered() {
        let runtime = fast_runtime();
        let headset = Headset::open(runtime, ClientCapabilities::ORIENTATION).unwrap();
        // permanent precondition error, never a timeout
        assert_eq!(headset.gaze_vectors(), Err(ErrorCode::NotRegistered));
        assert_eq!(
            headset.wait_for_next_eye_frame(),
            FrameOutcome::Fatal(ErrorCode::NotRegistered)
        );
    }

    #[test]
    fn pose_requires_orientation_capability() {
        let runtime = fast_runtime();
        let headset = Headset::open(runtime, ClientCapabilities::GAZE).unwrap();
        assert_eq!(headset.latest_pose(), Err(ErrorCode::NotRegistered));
    }

    #[test]
    fn status_queries_answer_definitely() {
        let runtime = fast_runtime();
        let headset =
            Headset::open(runtime, ClientCapabilities::GAZE | ClientCapabilities::ORIENTATION)
                .unwrap();
        assert_eq!(headset.is_hardware_connected(), Ok(true));
        assert_eq!(headset.is_eye_tracking_calibrated(), Ok(false));
    }

    #[test]
    fn calibration_completes_by_polling() {
        let runtime = Arc::new(MockRuntime::new(MockConfig {
            calibration_duration: Duration::from_millis(5),
            ..MockConfig::default()
        }));
        let headset = Headset::open(runtime, ClientCapabilities::GAZE).unwrap();
        assert_eq!(headset.is_eye_tracking_calibrated(), Ok(false));
        headset.ensure_calibration().unwrap();
        assert_eq!(headset.is_eye_tracking_calibrating(), Ok(true));
        // ensure while calibrating is a no-op
        headset.ensure_calibration().unwrap();
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(headset.is_eye_tracking_calibrating(), Ok(false));
        assert_eq!(headset.is_eye_tracking_calibrated(), Ok(true));
    }

    #[test]
    fn closing_unblocks_a_pending_wait() {
        let runtime = Arc::new(MockRuntime::new(MockConfig {
            // no frames will ever arrive
            eye_frame_interval: Duration::from_secs(3600),
            wait_timeout: Duration::from_secs(5),
            ..MockConfig::default()
        }));
        let headset =
            Arc::new(Headset::open(runtime.clone(), ClientCapabilities::GAZE).unwrap());
        let session = headset.session_id().unwrap();

        let waiter = {
            let headset = Arc::clone(&headset);
            std::thread::spawn(move || headset.wait_for_next_eye_frame())
        };
        std::thread::sleep(Duration::from_millis(20));
        // tear the session down under the waiter
        runtime.destroy_session(session);

        let outcome = waiter.join().unwrap();
        assert_eq!(outcome, FrameOutcome::Fatal(ErrorCode::NotConnected));
    }

    #[test]
    fn debug_output_reports_session_state() {
        let runtime = fast_runtime();
        let mut headset = Headset::open(runtime, ClientCapabilities::GAZE).unwrap();
        assert!(format!("{:?}", headset).contains("session: Some"));
        headset.close();
        assert!(format!("{:?}", headset).contains("session: None"));
    }

    #[test]
    fn tare_does_not_panic_on_closed_handle() {
        let runtime = fast_runtime();
        let mut headset = Headset::open(runtime, ClientCapabilities::ORIENTATION).unwrap();
        headset.tare_orientation();
        headset.close();
        headset.tare_orientation();
        headset.tare_position();
    }
}

//! In-process fake of the GazeLink runtime.
//!
//! Implements the full [`Runtime`] adapter surface without any hardware
//! or service process: frame pacing comes from per-handle clock threads,
//! poses and research images are synthesized, and capability gating,
//! version compatibility, and the calibration state machine behave like
//! the real runtime observably would. Used by the test suite and the
//! demos.

use crate::runtime::Runtime;
use crate::types::{
    AdapterId, ClientCapabilities, CompositorId, Eye, GazeConvergence, GazeVector, Handedness,
    HardwareInfo, ImageType, Layer, LayerCreateInfo, LayerSubmitInfo, Matrix44, Pose,
    ProjectionParams, Quaternion, RawImage, ResearchCapabilities, ResearchGaze, ResearchId,
    SessionId, StatusQuery, TareKind, Vec2, Vec3, Versions,
};
use crate::{ErrorCode, Result};
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Version identifiers of this client library.
const CLIENT_MAJOR: u32 = 1;
const CLIENT_MINOR: u32 = 3;
const CLIENT_BUILD: u32 = 0;

/// Tuning knobs for [`MockRuntime`].
///
/// The frame intervals and the wait timeout are deliberately
/// configurable: retry/backoff policy belongs to the runtime deployment,
/// not to client code, and tests want short values.
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Capabilities the runtime will accept at session open.
    pub supported_caps: ClientCapabilities,
    /// Eye camera frame period (the real camera runs near 120 Hz).
    pub eye_frame_interval: Duration,
    /// Compositor vsync period (the real display runs near 70 Hz).
    pub render_frame_interval: Duration,
    /// Internal timeout for blocking waits before they report `Timeout`.
    pub wait_timeout: Duration,
    /// How long a calibration run takes to complete.
    pub calibration_duration: Duration,
    /// Whether an HMD is attached.
    pub hardware_connected: bool,
    pub runtime_major: u32,
    pub runtime_minor: u32,
    pub runtime_build: u32,
    /// GPU adapter the fake compositor reports.
    pub adapter: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        MockConfig {
            supported_caps: ClientCapabilities::all(),
            eye_frame_interval: Duration::from_millis(8),
            render_frame_interval: Duration::from_millis(14),
            wait_timeout: Duration::from_millis(200),
            calibration_duration: Duration::from_millis(500),
            hardware_connected: true,
            runtime_major: CLIENT_MAJOR,
            runtime_minor: CLIENT_MINOR,
            runtime_build: 0,
            adapter: 1,
        }
    }
}

struct SessionState {
    caps: ClientCapabilities,
    frames: Receiver<u64>,
    /// Dropping this wakes the clock thread so it can release its frame
    /// sender, unblocking any wait pending on the session.
    _stop: Sender<()>,
    /// Timestamp of the most recently synced eye frame; per-frame getters
    /// snapshot this, never a future frame.
    last_synced_us: u64,
    calibrated: bool,
    calibrating_until: Option<Instant>,
}

struct CompositorState {
    frames: Receiver<u64>,
    _stop: Sender<()>,
    /// Latest vsync timestamp, written by the clock thread.
    latest_tick_us: Arc<AtomicU64>,
    next_layer_id: u32,
    layers: Vec<u32>,
}

struct ResearchState {
    session: SessionId,
    caps: ResearchCapabilities,
}

/// An in-process [`Runtime`] with synthesized data.
pub struct MockRuntime {
    config: MockConfig,
    epoch: Instant,
    next_id: AtomicU32,
    sessions: Mutex<HashMap<u32, SessionState>>,
    compositors: Mutex<HashMap<u32, CompositorState>>,
    research: Mutex<HashMap<u32, ResearchState>>,
}

impl Default for MockRuntime {
    fn default() -> Self {
        MockRuntime::new(MockConfig::default())
    }
}

impl MockRuntime {
    pub fn new(config: MockConfig) -> MockRuntime {
        MockRuntime {
            config,
            epoch: Instant::now(),
            next_id: AtomicU32::new(1),
            sessions: Mutex::new(HashMap::new()),
            compositors: Mutex::new(HashMap::new()),
            research: Mutex::new(HashMap::new()),
        }
    }

    /// Number of sessions the runtime currently holds open.
    pub fn live_sessions(&self) -> usize {
        self.sessions.lock().expect("sessions lock").len()
    }

    /// Number of compositor connections the runtime currently holds open.
    pub fn live_compositors(&self) -> usize {
        self.compositors.lock().expect("compositors lock").len()
    }

    fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    /// Spawn a clock thread ticking `interval`, delivering timestamps into
    /// a bounded(1) channel. Ticks coalesce when the consumer is slow.
    /// The thread exits as soon as the returned stop sender is dropped.
    fn spawn_clock(
        &self,
        name: &str,
        interval: Duration,
        latest: Option<Arc<AtomicU64>>,
    ) -> Result<(Receiver<u64>, Sender<()>)> {
        let (frame_tx, frame_rx) = bounded::<u64>(1);
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let epoch = self.epoch;
        let ticker = tick(interval);

        std::thread::Builder::new()
            .name(name.into())
            .spawn(move || loop {
                select! {
                    recv(ticker) -> _ => {
                        let ts = epoch.elapsed().as_micros() as u64;
                        if let Some(latest) = &latest {
                            latest.store(ts, Ordering::Relaxed);
                        }
                        // a full channel means the consumer has not taken
                        // the previous tick yet; skip, do not queue up
                        if let Err(crossbeam_channel::TrySendError::Disconnected(_)) =
                            frame_tx.try_send(ts)
                        {
                            break;
                        }
                    }
                    recv(stop_rx) -> _ => break,
                }
            })
            .map_err(|e| {
                log::error!("failed to spawn {} clock: {}", name, e);
                ErrorCode::Internal
            })?;

        Ok((frame_rx, stop_tx))
    }

    fn synth_pose(&self, timestamp_us: u64) -> Pose {
        // slow turn of the head, enough to make motion visible downstream
        let t = timestamp_us as f32 / 1e6;
        let half_yaw = t * 0.1;
        Pose {
            orientation: Quaternion {
                x: 0.0,
                y: half_yaw.sin(),
                z: 0.0,
                w: half_yaw.cos(),
            },
            position: Vec3 { x: 0.0, y: 1.7, z: (t * 0.5).sin() * 0.01 },
            angular_velocity: Vec3 { x: 0.0, y: 0.2, z: 0.0 },
            velocity: Vec3::default(),
            timestamp_us,
        }
    }

    fn synth_gaze(&self, timestamp_us: u64) -> (GazeVector, GazeVector) {
        let t = timestamp_us as f32 / 1e6;
        let sweep = (t * 0.7).sin() * 0.1;
        let vector = Vec3 { x: sweep, y: 0.0, z: 1.0 };
        (
            GazeVector { vector, timestamp_us },
            GazeVector { vector, timestamp_us },
        )
    }

    /// Encode a minimal Windows BMP with the given raw (signed) height.
    fn synth_bmp(width: u32, raw_height: i32, bits_per_pixel: u16) -> Vec<u8> {
        let rows = raw_height.unsigned_abs();
        let channels = (bits_per_pixel / 8) as u32;
        let data_offset = 54u32;
        let payload = rows * width * channels;
        let mut buf = vec![0u8; (data_offset + payload) as usize];
        buf[0] = b'B';
        buf[1] = b'M';
        buf[2..6].copy_from_slice(&(data_offset + payload).to_le_bytes());
        buf[10..14].copy_from_slice(&data_offset.to_le_bytes());
        buf[14..18].copy_from_slice(&40u32.to_le_bytes());
        buf[18..22].copy_from_slice(&width.to_le_bytes());
        buf[22..26].copy_from_slice(&raw_height.to_le_bytes());
        buf[26..28].copy_from_slice(&1u16.to_le_bytes());
        buf[28..30].copy_from_slice(&bits_per_pixel.to_le_bytes());
        // horizontal gradient, visibly not uniform
        let stride = (width * channels) as usize;
        for (i, b) in buf[data_offset as usize..].iter_mut().enumerate() {
            *b = ((i % stride) * 255 / stride.max(1)) as u8;
        }
        buf
    }

    fn with_session<T>(
        &self,
        session: SessionId,
        f: impl FnOnce(&mut SessionState) -> Result<T>,
    ) -> Result<T> {
        let mut sessions = self.sessions.lock().expect("sessions lock");
        let state = sessions.get_mut(&session.0).ok_or(ErrorCode::NotConnected)?;
        f(state)
    }

    fn with_compositor<T>(
        &self,
        compositor: CompositorId,
        f: impl FnOnce(&mut CompositorState) -> Result<T>,
    ) -> Result<T> {
        let mut compositors = self.compositors.lock().expect("compositors lock");
        let state = compositors
            .get_mut(&compositor.0)
            .ok_or(ErrorCode::NotConnected)?;
        f(state)
    }

    /// Resolve whether a calibration run finished, then answer `query`.
    fn answer_status(&self, state: &mut SessionState, query: StatusQuery) -> bool {
        if let Some(until) = state.calibrating_until {
            if Instant::now() >= until {
                state.calibrating_until = None;
                state.calibrated = true;
            }
        }
        let connected = self.config.hardware_connected;
        match query {
            StatusQuery::HardwareConnected => connected,
            StatusQuery::HardwareReady => connected,
            StatusQuery::EyeTrackingEnabled => {
                connected && state.caps.contains(ClientCapabilities::GAZE)
            }
            StatusQuery::EyeTrackingCalibrated => state.calibrated,
            StatusQuery::EyeTrackingCalibrating => state.calibrating_until.is_some(),
            StatusQuery::EyeTrackingReady => {
                connected && state.caps.contains(ClientCapabilities::GAZE) && state.calibrated
            }
            StatusQuery::MotionReady => {
                connected && state.caps.contains(ClientCapabilities::ORIENTATION)
            }
            StatusQuery::PositionReady => {
                connected && state.caps.contains(ClientCapabilities::POSITION)
            }
        }
    }

    fn require_gaze(state: &SessionState) -> Result<u64> {
        if state.caps.contains(ClientCapabilities::GAZE) {
            Ok(state.last_synced_us)
        } else {
            Err(ErrorCode::NotRegistered)
        }
    }
}

impl Runtime for MockRuntime {
    fn create_session(&self, caps: ClientCapabilities) -> Result<SessionId> {
        if !self.config.supported_caps.contains(caps) {
            log::warn!("session rejected, unsupported capabilities: {:?}", caps);
            return Err(ErrorCode::CapabilitiesRejected);
        }
        let (frames, stop) =
            self.spawn_clock("gazelink-eye-clock", self.config.eye_frame_interval, None)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sessions.lock().expect("sessions lock").insert(
            id,
            SessionState {
                caps,
                frames,
                _stop: stop,
                last_synced_us: 0,
                calibrated: false,
                calibrating_until: None,
            },
        );
        Ok(SessionId(id))
    }

    fn destroy_session(&self, session: SessionId) {
        // dropping the state drops the stop sender, which stops the clock
        // thread and disconnects any wait pending on the frame channel
        let removed = self.sessions.lock().expect("sessions lock").remove(&session.0);
        if removed.is_some() {
            self.research
                .lock()
                .expect("research lock")
                .retain(|_, r| r.session != session);
        }
    }

    fn check_versions(&self, session: SessionId) -> Result<()> {
        self.with_session(session, |_| Ok(()))?;
        // monotonic rule: same major line, runtime minor at or above the
        // client's minimum
        if self.config.runtime_major != CLIENT_MAJOR
            || self.config.runtime_minor < CLIENT_MINOR
        {
            return Err(ErrorCode::VersionTooOld);
        }
        Ok(())
    }

    fn software_versions(&self, session: SessionId) -> Result<Versions> {
        self.with_session(session, |_| {
            Ok(Versions {
                client_major: CLIENT_MAJOR,
                client_minor: CLIENT_MINOR,
                client_build: CLIENT_BUILD,
                runtime_major: self.config.runtime_major,
                runtime_minor: self.config.runtime_minor,
                runtime_build: self.config.runtime_build,
            })
        })
    }

    fn hardware_info(&self, session: SessionId) -> Result<HardwareInfo> {
        self.with_session(session, |_| {
            Ok(HardwareInfo {
                serial_number: "GL0-000001".into(),
                manufacturer: "GazeLink".into(),
                model_name: "GL0 DevKit".into(),
            })
        })
    }

    fn query_status(&self, session: SessionId, query: StatusQuery) -> Result<bool> {
        let mut sessions = self.sessions.lock().expect("sessions lock");
        let state = sessions.get_mut(&session.0).ok_or(ErrorCode::NotConnected)?;
        Ok(self.answer_status(state, query))
    }

    fn tare(&self, session: SessionId, kind: TareKind) -> Result<()> {
        self.with_session(session, |state| {
            let needed = match kind {
                TareKind::Orientation => ClientCapabilities::ORIENTATION,
                TareKind::Position => ClientCapabilities::POSITION,
            };
            if !state.caps.contains(needed) {
                return Err(ErrorCode::NotRegistered);
            }
            Ok(())
        })
    }

    fn ensure_calibration(&self, session: SessionId) -> Result<()> {
        let duration = self.config.calibration_duration;
        self.with_session(session, |state| {
            if state.calibrated || state.calibrating_until.is_some() {
                return Ok(());
            }
            state.calibrating_until = Some(Instant::now() + duration);
            Ok(())
        })
    }

    fn start_calibration(&self, session: SessionId, restart_if_running: bool) -> Result<()> {
        let duration = self.config.calibration_duration;
        self.with_session(session, |state| {
            if state.calibrating_until.is_some() && !restart_if_running {
                return Ok(());
            }
            state.calibrated = false;
            state.calibrating_until = Some(Instant::now() + duration);
            Ok(())
        })
    }

    fn stop_calibration(&self, session: SessionId) -> Result<()> {
        self.with_session(session, |state| {
            state.calibrating_until = None;
            Ok(())
        })
    }

    fn wait_for_eye_frame(&self, session: SessionId) -> Result<()> {
        // take a receiver clone, then block outside the lock
        let frames = self.with_session(session, |state| {
            Self::require_gaze(state)?;
            Ok(state.frames.clone())
        })?;

        let ts = frames.recv_timeout(self.config.wait_timeout).map_err(|e| match e {
            crossbeam_channel::RecvTimeoutError::Timeout => ErrorCode::Timeout,
            crossbeam_channel::RecvTimeoutError::Disconnected => ErrorCode::NotConnected,
        })?;

        // record the synced frame; getters snapshot this timestamp
        self.with_session(session, |state| {
            state.last_synced_us = ts;
            Ok(())
        })
    }

    fn gaze_vectors(&self, session: SessionId) -> Result<(GazeVector, GazeVector)> {
        let ts = self.with_session(session, |state| Self::require_gaze(state))?;
        Ok(self.synth_gaze(ts))
    }

    fn gaze_vectors_2d(&self, session: SessionId) -> Result<(Vec2, Vec2)> {
        let ts = self.with_session(session, |state| Self::require_gaze(state))?;
        let (left, right) = self.synth_gaze(ts);
        let project = |g: GazeVector| Vec2 { x: g.vector.x, y: g.vector.y };
        Ok((project(left), project(right)))
    }

    fn gaze_convergence(&self, session: SessionId) -> Result<GazeConvergence> {
        let ts = self.with_session(session, |state| Self::require_gaze(state))?;
        let (left, _) = self.synth_gaze(ts);
        Ok(GazeConvergence {
            origin: Vec3 { x: 0.0, y: 0.0, z: 0.0 },
            direction: left.vector,
            distance: 1.5,
            accuracy: 0.9,
        })
    }

    fn eyes_closed(&self, session: SessionId) -> Result<Eye> {
        self.with_session(session, |state| {
            Self::require_gaze(state)?;
            Ok(Eye::Neither)
        })
    }

    fn eyes_tracked(&self, session: SessionId) -> Result<Eye> {
        self.with_session(session, |state| {
            Self::require_gaze(state)?;
            Ok(Eye::Both)
        })
    }

    fn latest_pose(&self, session: SessionId) -> Result<Pose> {
        let ts = self.with_session(session, |state| {
            if !state.caps.contains(ClientCapabilities::ORIENTATION) {
                return Err(ErrorCode::NotRegistered);
            }
            Ok(state.last_synced_us)
        })?;
        let ts = if ts == 0 { self.now_us() } else { ts };
        Ok(self.synth_pose(ts))
    }

    fn projection_matrices(
        &self,
        session: SessionId,
        handedness: Handedness,
        z_near: f32,
        z_far: f32,
    ) -> Result<(Matrix44, Matrix44)> {
        let (left, right) = self.raw_projection_values(session)?;
        let build = |p: ProjectionParams| {
            let mut m = Matrix44::default();
            m.m[0][0] = 2.0 / (p.right - p.left);
            m.m[1][1] = 2.0 / (p.top - p.bottom);
            m.m[2][0] = (p.right + p.left) / (p.right - p.left);
            m.m[2][1] = (p.top + p.bottom) / (p.top - p.bottom);
            m.m[2][2] = z_far / (z_far - z_near);
            m.m[2][3] = 1.0;
            m.m[3][2] = -(z_far * z_near) / (z_far - z_near);
            m.m[3][3] = 0.0;
            if matches!(handedness, Handedness::Right) {
                m.m[2][2] = -m.m[2][2];
                m.m[2][3] = -1.0;
            }
            m
        };
        Ok((build(left), build(right)))
    }

    fn raw_projection_values(
        &self,
        session: SessionId,
    ) -> Result<(ProjectionParams, ProjectionParams)> {
        self.with_session(session, |_| {
            let params = ProjectionParams {
                left: -1.19,
                right: 1.19,
                top: 1.12,
                bottom: -1.12,
            };
            Ok((params, params))
        })
    }

    fn eye_to_head_matrices(&self, session: SessionId) -> Result<(Matrix44, Matrix44)> {
        let half_iod = self.iod(session)? / 2.0;
        Ok((
            Matrix44::translation_x(-half_iod),
            Matrix44::translation_x(half_iod),
        ))
    }

    fn iod(&self, session: SessionId) -> Result<f32> {
        self.with_session(session, |_| Ok(0.064))
    }

    fn create_compositor(&self, session: SessionId) -> Result<CompositorId> {
        self.with_session(session, |_| Ok(()))?;
        let latest = Arc::new(AtomicU64::new(0));
        let (frames, stop) = self.spawn_clock(
            "gazelink-render-clock",
            self.config.render_frame_interval,
            Some(Arc::clone(&latest)),
        )?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.compositors.lock().expect("compositors lock").insert(
            id,
            CompositorState {
                frames,
                _stop: stop,
                latest_tick_us: latest,
                next_layer_id: 0,
                layers: Vec::new(),
            },
        );
        Ok(CompositorId(id))
    }

    fn destroy_compositor(&self, compositor: CompositorId) {
        self.compositors
            .lock()
            .expect("compositors lock")
            .remove(&compositor.0);
    }

    fn create_layer(&self, compositor: CompositorId, info: &LayerCreateInfo) -> Result<Layer> {
        self.with_compositor(compositor, |state| {
            log::debug!("creating layer {:?}", info);
            let layer_id = state.next_layer_id;
            state.next_layer_id += 1;
            state.layers.push(layer_id);
            Ok(Layer {
                layer_id,
                ideal_resolution: (1280, 1440),
            })
        })
    }

    fn submit(&self, compositor: CompositorId, layers: &[LayerSubmitInfo]) -> Result<()> {
        self.with_compositor(compositor, |state| {
            for submit in layers {
                if !state.layers.contains(&submit.layer_id) {
                    return Err(ErrorCode::NotRegistered);
                }
            }
            Ok(())
        })
    }

    fn wait_for_render_pose(&self, compositor: CompositorId) -> Result<Pose> {
        let frames = self.with_compositor(compositor, |state| Ok(state.frames.clone()))?;
        let ts = frames.recv_timeout(self.config.wait_timeout).map_err(|e| match e {
            crossbeam_channel::RecvTimeoutError::Timeout => ErrorCode::Timeout,
            crossbeam_channel::RecvTimeoutError::Disconnected => ErrorCode::NotConnected,
        })?;
        Ok(self.synth_pose(ts))
    }

    fn last_render_pose(&self, compositor: CompositorId) -> Result<Pose> {
        let ts = self.with_compositor(compositor, |state| {
            Ok(state.latest_tick_us.load(Ordering::Relaxed))
        })?;
        Ok(self.synth_pose(ts))
    }

    fn compositor_ready(&self, compositor: CompositorId) -> Result<bool> {
        self.with_compositor(compositor, |_| Ok(true))
    }

    fn adapter_id(&self, compositor: CompositorId) -> Result<AdapterId> {
        let adapter = self.config.adapter;
        self.with_compositor(compositor, |_| Ok(AdapterId(adapter)))
    }

    fn create_research(
        &self,
        session: SessionId,
        caps: ResearchCapabilities,
    ) -> Result<ResearchId> {
        self.with_session(session, |_| Ok(()))?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.research
            .lock()
            .expect("research lock")
            .insert(id, ResearchState { session, caps });
        Ok(ResearchId(id))
    }

    fn register_research(&self, research: ResearchId, caps: ResearchCapabilities) -> Result<()> {
        let mut map = self.research.lock().expect("research lock");
        let state = map.get_mut(&research.0).ok_or(ErrorCode::NotConnected)?;
        state.caps |= caps;
        Ok(())
    }

    fn unregister_research(&self, research: ResearchId, caps: ResearchCapabilities) -> Result<()> {
        let mut map = self.research.lock().expect("research lock");
        let state = map.get_mut(&research.0).ok_or(ErrorCode::NotConnected)?;
        state.caps -= caps;
        Ok(())
    }

    fn research_image(&self, research: ResearchId, image_type: ImageType) -> Result<RawImage> {
        let needed = match image_type {
            ImageType::StereoEye => ResearchCapabilities::EYE_IMAGE,
            ImageType::Position => ResearchCapabilities::POSITION_IMAGE,
        };
        {
            let map = self.research.lock().expect("research lock");
            let state = map.get(&research.0).ok_or(ErrorCode::NotConnected)?;
            if !state.caps.contains(needed) {
                return Err(ErrorCode::NotRegistered);
            }
        }
        let data = match image_type {
            // eye cameras emit the usual bottom-up BMP
            ImageType::StereoEye => Self::synth_bmp(16, 8, 24),
            // the position camera writes top-down grayscale
            ImageType::Position => Self::synth_bmp(8, -8, 8),
        };
        Ok(RawImage {
            image_type,
            timestamp_us: self.now_us(),
            data,
        })
    }

    fn research_gaze(&self, research: ResearchId) -> Result<ResearchGaze> {
        let session = {
            let map = self.research.lock().expect("research lock");
            map.get(&research.0).ok_or(ErrorCode::NotConnected)?.session
        };
        let ts = self.with_session(session, |state| Ok(state.last_synced_us))?;
        let ts = if ts == 0 { self.now_us() } else { ts };
        let (left, right) = self.synth_gaze(ts);
        Ok(ResearchGaze {
            left,
            right,
            left_pupil_radius_mm: 2.1,
            right_pupil_radius_mm: 2.0,
        })
    }
}

bitflags::bitflags! {
    /// Capabilities a client requests when opening a headset session.
    ///
    /// The runtime keeps the corresponding hardware/software running as
    /// long as at least one client has the capability registered.
    /// Querying data for a capability that was never requested returns
    /// `ErrorCode::NotRegistered`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClientCapabilities: u32 {
        /// Eye tracking.
        const GAZE = 1 << 0;
        /// Headset orientation tracking.
        const ORIENTATION = 1 << 1;
        /// Headset position tracking.
        const POSITION = 1 << 2;
    }
}

bitflags::bitflags! {
    /// Research-only diagnostic capabilities, layered on a session.
    ///
    /// A separate type from [`ClientCapabilities`] on purpose: the two
    /// domains must not be mixed in one set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ResearchCapabilities: u32 {
        /// Raw eye camera imagery.
        const EYE_IMAGE = 1 << 0;
        /// Raw position camera imagery.
        const POSITION_IMAGE = 1 << 1;
    }
}

/// Opaque runtime-assigned identity of a headset session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u32);

/// Opaque runtime-assigned identity of a compositor connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompositorId(pub u32);

/// Opaque runtime-assigned identity of a research session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResearchId(pub u32);

/// 2D vector, e.g. a gaze point on the virtual screen in [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

/// 3D vector in meters (position) or unitless (direction).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Unit quaternion, identity = (0, 0, 0, 1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Quaternion { x: 0.0, y: 0.0, z: 0.0, w: 1.0 }
    }
}

/// Column-major 4x4 matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix44 {
    pub m: [[f32; 4]; 4],
}

impl Matrix44 {
    pub const IDENTITY: Matrix44 = Matrix44 {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Translation along the X axis; used for eye-to-head transforms
    /// which displace by +/- half the interocular distance.
    pub fn translation_x(x: f32) -> Matrix44 {
        let mut m = Matrix44::IDENTITY;
        m.m[3][0] = x;
        m
    }
}

impl Default for Matrix44 {
    fn default() -> Self {
        Matrix44::IDENTITY
    }
}

/// Headset pose for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub orientation: Quaternion,
    pub position: Vec3,
    pub angular_velocity: Vec3,
    pub velocity: Vec3,
    /// Runtime timestamp in microseconds.
    pub timestamp_us: u64,
}

/// Per-eye gaze direction in eye space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GazeVector {
    pub vector: Vec3,
    /// Timestamp of the eye frame the vector belongs to.
    pub timestamp_us: u64,
}

/// Convergence of the two gaze rays.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GazeConvergence {
    /// Origin of the combined gaze ray.
    pub origin: Vec3,
    /// Direction of the combined gaze ray.
    pub direction: Vec3,
    /// Distance to the convergence point in meters.
    pub distance: f32,
    /// Pupilometry-based attention measure in [0, 1].
    pub accuracy: f32,
}

/// Selector for one or both eyes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eye {
    Neither,
    Left,
    Right,
    Both,
}

/// Per-eye frustum bounds at 1 unit from the eye.
/// Multiply by the near plane distance to get the near-plane frustum.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProjectionParams {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

/// Client and runtime version identifiers.
///
/// Compatibility is decided by the runtime (monotonic minimum-minor
/// rule), never recomputed on the client side; use
/// `Headset::check_software_versions` instead of comparing these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Versions {
    pub client_major: u32,
    pub client_minor: u32,
    pub client_build: u32,
    pub runtime_major: u32,
    pub runtime_minor: u32,
    pub runtime_build: u32,
}

/// Headset hardware identification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HardwareInfo {
    pub serial_number: String,
    pub manufacturer: String,
    pub model_name: String,
}

/// GPU adapter the compositor runs on. Submitted textures must come from
/// the same adapter on multi-GPU systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdapterId(pub u64);

/// Settings for a compositor layer, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayerCreateInfo {
    /// Render the layer without the frame-queued pose reprojection.
    pub disable_time_warp: bool,
    /// Texture alpha participates in blending.
    pub alpha_blend: bool,
    /// Do not apply lens distortion correction to this layer.
    pub disable_distortion: bool,
}

/// A registered compositor layer. Layers persist until the compositor
/// itself is destroyed; there is no per-layer destroy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layer {
    pub layer_id: u32,
    /// Ideal per-eye texture resolution for this layer.
    pub ideal_resolution: (u32, u32),
}

/// Per-frame texture handoff for one layer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayerSubmitInfo {
    pub layer_id: u32,
    /// Opaque GPU texture handle for the left eye.
    pub left_texture: u64,
    /// Opaque GPU texture handle for the right eye.
    pub right_texture: u64,
    /// Pose the frame was rendered with, from `wait_for_render_pose`.
    pub pose: Pose,
}

/// Kind of raw image a research session can fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageType {
    /// Side-by-side image from the eye cameras.
    StereoEye,
    /// Image from the position tracking camera.
    Position,
}

/// Raw image buffer returned by a research session.
///
/// Each call returns an owned buffer, so data fetched earlier stays valid
/// regardless of later calls for the same image type.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub image_type: ImageType,
    pub timestamp_us: u64,
    /// Bitmap container bytes; decode with [`crate::bitmap`].
    pub data: Vec<u8>,
}

/// Low-level per-eye gaze data for research use.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResearchGaze {
    pub left: GazeVector,
    pub right: GazeVector,
    /// Pupil radius estimates in millimeters.
    pub left_pupil_radius_mm: f32,
    pub right_pupil_radius_mm: f32,
}

/// Boolean status queries a session supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusQuery {
    HardwareConnected,
    HardwareReady,
    EyeTrackingEnabled,
    EyeTrackingCalibrated,
    EyeTrackingCalibrating,
    EyeTrackingReady,
    MotionReady,
    PositionReady,
}

/// Which sensor a tare request resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TareKind {
    Orientation,
    Position,
}

/// Handedness of requested projection matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_union_and_difference() {
        let a = ClientCapabilities::GAZE | ClientCapabilities::ORIENTATION;
        let b = ClientCapabilities::ORIENTATION | ClientCapabilities::POSITION;

        // (A | B) - B contains nothing outside A
        let d = (a | b) - b;
        assert!(a.contains(d));
        assert_eq!(d, ClientCapabilities::GAZE);

        // union is commutative
        assert_eq!(a | b, b | a);
        // empty set is the identity
        assert_eq!(a | ClientCapabilities::empty(), a);
        assert_eq!(ClientCapabilities::empty() | a, a);
    }

    #[test]
    fn capability_union_associative() {
        let g = ClientCapabilities::GAZE;
        let o = ClientCapabilities::ORIENTATION;
        let p = ClientCapabilities::POSITION;
        assert_eq!((g | o) | p, g | (o | p));
    }

    #[test]
    fn subtraction_removes_exactly_the_subtracted() {
        let all = ResearchCapabilities::EYE_IMAGE | ResearchCapabilities::POSITION_IMAGE;
        let left = all - ResearchCapabilities::POSITION_IMAGE;
        assert!(left.contains(ResearchCapabilities::EYE_IMAGE));
        assert!(!left.contains(ResearchCapabilities::POSITION_IMAGE));
        // subtracting something never present is a no-op
        assert_eq!(left - ResearchCapabilities::POSITION_IMAGE, left);
    }

    #[test]
    fn containment_test() {
        let caps = ClientCapabilities::GAZE | ClientCapabilities::POSITION;
        assert!(caps.contains(ClientCapabilities::GAZE));
        assert!(!caps.contains(ClientCapabilities::ORIENTATION));
    }
}

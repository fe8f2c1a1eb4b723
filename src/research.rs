use crate::types::{ImageType, RawImage, ResearchCapabilities, ResearchGaze, ResearchId};
use crate::{Headset, Result};

/// An elevated diagnostic view layered on a [`Headset`] session.
///
/// Intended for controlled lab environments only; the research surface
/// has no cross-version compatibility guarantees and is not meant for
/// shipping software.
///
/// There is no destroy operation: the runtime tears the research session
/// down with its owning headset session. The borrow on the headset makes
/// using this handle past [`Headset::close`] a compile error rather than
/// undefined behavior.
pub struct ResearchHeadset<'h> {
    headset: &'h Headset,
    research: ResearchId,
}

impl<'h> ResearchHeadset<'h> {
    pub(crate) fn open(headset: &'h Headset, caps: ResearchCapabilities) -> Result<Self> {
        let research = headset
            .runtime()
            .create_research(headset.session_id()?, caps)?;
        log::debug!("Opened research session {:?} with {:?}", research, caps);
        Ok(ResearchHeadset { headset, research })
    }

    /// Register research capabilities, starting the required hardware as
    /// needed. Re-registering an already-set capability is a no-op.
    /// Capabilities may be added and removed at any time while the
    /// session is alive.
    pub fn register_capabilities(&self, caps: ResearchCapabilities) -> Result<()> {
        self.headset.runtime().register_research(self.research, caps)
    }

    /// Unregister research capabilities previously registered.
    /// Unregistering a capability that is not set is a no-op.
    pub fn unregister_capabilities(&self, caps: ResearchCapabilities) -> Result<()> {
        self.headset.runtime().unregister_research(self.research, caps)
    }

    /// Latest image of the given type.
    ///
    /// Each call returns an owned buffer, so an image fetched earlier
    /// stays valid however many later calls are made for the same type.
    /// Decode the bytes with [`crate::bitmap::BitmapImage`].
    pub fn image(&self, image_type: ImageType) -> Result<RawImage> {
        self.headset.runtime().research_image(self.research, image_type)
    }

    /// Low-level per-eye gaze data.
    pub fn gaze(&self) -> Result<ResearchGaze> {
        self.headset.runtime().research_gaze(self.research)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::BitmapImage;
    use crate::mock::{MockConfig, MockRuntime};
    use crate::types::ClientCapabilities;
    use crate::ErrorCode;
    use std::sync::Arc;

    fn runtime() -> Arc<MockRuntime> {
        Arc::new(MockRuntime::new(MockConfig::default()))
    }

    #[test]
    fn creation_registers_capabilities_in_one_round_trip() {
        let headset = Headset::open(runtime(), ClientCapabilities::GAZE).unwrap();
        let research = headset
            .research_headset(ResearchCapabilities::EYE_IMAGE)
            .unwrap();
        // EYE_IMAGE was registered at creation, no extra call needed
        let img = research.image(ImageType::StereoEye).unwrap();
        assert_eq!(img.image_type, ImageType::StereoEye);
    }

    #[test]
    fn unregistered_image_type_is_a_precondition_error() {
        let headset = Headset::open(runtime(), ClientCapabilities::GAZE).unwrap();
        let research = headset
            .research_headset(ResearchCapabilities::EYE_IMAGE)
            .unwrap();
        assert_eq!(
            research.image(ImageType::Position).unwrap_err(),
            ErrorCode::NotRegistered
        );
        research
            .register_capabilities(ResearchCapabilities::POSITION_IMAGE)
            .unwrap();
        assert!(research.image(ImageType::Position).is_ok());
    }

    #[test]
    fn register_and_unregister_are_idempotent() {
        let headset = Headset::open(runtime(), ClientCapabilities::GAZE).unwrap();
        let research = headset
            .research_headset(ResearchCapabilities::EYE_IMAGE)
            .unwrap();
        research
            .register_capabilities(ResearchCapabilities::EYE_IMAGE)
            .unwrap();
        research
            .unregister_capabilities(ResearchCapabilities::POSITION_IMAGE)
            .unwrap();
        research
            .unregister_capabilities(ResearchCapabilities::EYE_IMAGE)
            .unwrap();
        assert_eq!(
            research.image(ImageType::StereoEye).unwrap_err(),
            ErrorCode::NotRegistered
        );
    }

    #[test]
    fn earlier_image_stays_valid_after_a_second_fetch() {
        let headset = Headset::open(runtime(), ClientCapabilities::GAZE).unwrap();
        let research = headset
            .research_headset(ResearchCapabilities::EYE_IMAGE)
            .unwrap();
        let first = research.image(ImageType::StereoEye).unwrap();
        let first_bytes = first.data.clone();
        let _second = research.image(ImageType::StereoEye).unwrap();
        // owned buffer: untouched by the later call
        assert_eq!(first.data, first_bytes);
        assert!(BitmapImage::decode(first).is_ok());
    }

    #[test]
    fn research_gaze_returns_per_eye_data() {
        let headset = Headset::open(runtime(), ClientCapabilities::GAZE).unwrap();
        let research = headset
            .research_headset(ResearchCapabilities::EYE_IMAGE)
            .unwrap();
        let gaze = research.gaze().unwrap();
        assert!(gaze.left_pupil_radius_mm > 0.0);
        assert_eq!(gaze.left.timestamp_us, gaze.right.timestamp_us);
    }
}

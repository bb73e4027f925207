// ── Collaborator bundle ──

use std::sync::Arc;

use crate::camera::{CameraPlatform, VideoSink};
use crate::decode::DecodeBackend;
use crate::haptics::HapticFeedback;
use crate::notify::Notifier;

/// The full set of host collaborators injected into the scan engine.
///
/// Cheaply cloneable; every handle is shared.
#[derive(Clone)]
pub struct PlatformHandles {
    pub camera: Arc<dyn CameraPlatform>,
    pub sink: Arc<dyn VideoSink>,
    pub decoder: Arc<dyn DecodeBackend>,
    pub haptics: Arc<dyn HapticFeedback>,
    pub notifier: Arc<dyn Notifier>,
}

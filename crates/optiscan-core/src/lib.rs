//! Camera code-scanning engine between `optiscan-platform` and host UIs.
//!
//! This crate owns the scan lifecycle, state machine, and resource
//! guarantees for the optiscan workspace:
//!
//! - **[`Scanner`]** — Central facade managing the full lifecycle:
//!   [`start()`](Scanner::start) enumerates devices (once), negotiates
//!   hardware access under a constraint profile, then spawns the
//!   cancellable polling loop. [`stop()`](Scanner::stop) is idempotent and
//!   releases every held resource from any state.
//!
//! - **[`ScannerState`]** — Reactive snapshot broadcast through a
//!   `tokio::sync::watch` channel. Exposes `subscribe()` /
//!   `state_stream()` for reactive consumers alongside point-in-time
//!   snapshots.
//!
//! - **Capture session** (internal) — Exclusive ownership of one hardware
//!   stream and its sink binding, with guaranteed release on every exit
//!   path: normal stop, decode success, error, timeout, or camera switch.
//!
//! - **[`Detection`]** — Transient decoded payload delivered to the
//!   `on_scan` callback and the [`detections()`](Scanner::detections)
//!   broadcast stream; never retained by the engine.
//!
//! - **[`ScanError`]** — User-facing error taxonomy. Transient "no code in
//!   this frame" ticks are absorbed inside the loop and never surface.

pub mod config;
pub mod constraints;
pub mod devices;
pub mod error;
pub mod scanner;
mod session;
pub mod state;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DeviceProfile, ScannerConfig};
pub use error::ScanError;
pub use scanner::{Detection, DetectionSource, Scanner};
pub use state::{ScanPhase, ScannerState, StateWatchStream};

// Re-export the platform descriptors consumers see in the state snapshot.
pub use optiscan_platform::{CameraDevice, DeviceId, FacingMode, PlatformHandles};

//! # kiosk-core
//!
//! Session controller for a kiosk browser shell. Decides which site is on
//! screen, when rotation advances, when the kiosk locks, and which modal
//! dialog (if any) is open. The host owns windows and web views; it feeds
//! [`HostEvent`](kiosk_protocol::HostEvent)s in and applies the
//! [`HostCommand`](kiosk_protocol::HostCommand)s that come back.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. The caller drives [`KioskEngine::tick`]
//!   and [`KioskEngine::poll_media`] on its own timers.
//! - **Single writer**: The engine is not thread-safe; one controller thread owns it.
//! - **Graceful degradation**: Missing config means an empty tab list, a missing
//!   PIN file means hidden sites stay closed, and neither is fatal.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kiosk_core::{build_probe, load_kiosk_config, KioskEngine, PinStore, SentinelFiles};
//!
//! let config = load_kiosk_config(&config_path);
//! let mut engine = KioskEngine::new(&config, pins, sentinels, build_probe(kind), now);
//! let commands = engine.start(now);
//! ```

pub mod activity;
pub mod config;
pub mod dialogs;
pub mod engine;
pub mod error;
pub mod keyboard;
pub mod lockout;
pub mod media;
pub mod pin;
pub mod rotation;
pub mod sentinel;
pub mod session;
pub mod sites;

/// Wall-clock instant in the kiosk's local time zone. The lock schedule is
/// local, so everything else is too.
pub type Timestamp = chrono::DateTime<chrono::Local>;

pub use activity::ActivityTracker;
pub use config::{load_kiosk_config, try_load_kiosk_config, KioskConfig, Site, SwipeMode};
pub use dialogs::{DialogCoordinator, ExtensionChoice, EXTENSION_CHOICES_MINUTES};
pub use engine::KioskEngine;
pub use error::{KioskError, Result};
pub use keyboard::{CloseReason, KeyboardController};
pub use lockout::{hash_password, LockReason, LockoutPolicy};
pub use media::{build_probe, MediaProbe, MediaProbeKind};
pub use pin::{PinRequirement, PinStore};
pub use sentinel::SentinelFiles;
pub use session::RuntimeSession;
pub use sites::{SiteDuration, SiteRegistry, ViewSlot};

//! Foreground UI handle.
//!
//! Launching purchase or price-change flows requires a live foreground UI
//! context from the host. The bridge only holds it while the host says it is
//! attached, and checks [`UiContext::is_live`] before every launch.

use crate::platform::PlatformSendSync;

/// A host-owned foreground UI surface (an Activity on Android).
pub trait UiContext: PlatformSendSync {
    /// Stable identifier for logs.
    fn id(&self) -> String;

    /// Whether the surface can still present UI.
    fn is_live(&self) -> bool;
}

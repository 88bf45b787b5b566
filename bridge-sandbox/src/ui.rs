use bridge_traits::ui::UiContext;
use std::sync::atomic::{AtomicBool, Ordering};

/// A foreground surface whose liveness can be flipped from tests.
#[derive(Debug)]
pub struct SandboxUi {
    id: String,
    live: AtomicBool,
}

impl SandboxUi {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            live: AtomicBool::new(true),
        }
    }

    /// Simulates the surface being destroyed while still attached.
    pub fn finish(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

impl UiContext for SandboxUi {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

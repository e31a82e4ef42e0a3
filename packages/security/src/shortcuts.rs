// ABOUTME: Guard that blocks developer-tool keyboard shortcuts outside development mode
// ABOUTME: Inert until installed; the UI layer asks it before dispatching a key chord

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// A key press with its modifier state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyChord {
    pub key: String,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl KeyChord {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }
}

#[derive(Debug)]
pub struct ShortcutGuard {
    dev_mode: bool,
    installed: AtomicBool,
}

impl ShortcutGuard {
    pub fn new(dev_mode: bool) -> Self {
        Self {
            dev_mode,
            installed: AtomicBool::new(false),
        }
    }

    /// Start blocking; a no-op in development mode. Returns whether the guard is active.
    pub fn install(&self) -> bool {
        if self.dev_mode {
            debug!("Development mode, inspection shortcuts left enabled");
            return false;
        }
        if !self.installed.swap(true, Ordering::SeqCst) {
            info!("Inspection shortcut guard installed");
        }
        true
    }

    pub fn uninstall(&self) {
        self.installed.store(false, Ordering::SeqCst);
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    pub fn should_block(&self, chord: &KeyChord) -> bool {
        if !self.is_installed() {
            return false;
        }

        let key = chord.key.to_ascii_uppercase();
        let command = chord.ctrl || chord.meta;

        let blocked = match key.as_str() {
            "F12" => true,
            "I" | "J" | "C" => command && (chord.shift || (chord.meta && chord.alt)),
            "U" => command && !chord.shift,
            _ => false,
        };

        if blocked {
            debug!(key = %chord.key, "Blocked inspection shortcut");
        }
        blocked
    }
}

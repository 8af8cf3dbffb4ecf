//! Navigation to the system screen where overlay permission is granted.
//!
//! Desktops have no dedicated draw-over-apps permission. macOS gates reading
//! other apps' text behind Accessibility, so that pane is opened there;
//! Windows and GNOME open their privacy pages. Other desktops have no known
//! deep link and the instructions describe the manual route.

use std::process::Command;
use tracing::{info, warn};

/// Opens the settings screen for the overlay permission
pub trait SettingsNavigator {
    fn open(&self) -> std::io::Result<()>;
}

/// Launches the platform's settings opener
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSettings;

impl SettingsNavigator for SystemSettings {
    fn open(&self) -> std::io::Result<()> {
        let (program, target) = opener();
        if let Err(e) = Command::new(program).arg(target).spawn() {
            warn!("Could not launch {} {}: {}", program, target, e);
            return Err(e);
        }
        info!("Opened system settings via {} {}", program, target);
        Ok(())
    }
}

#[cfg(target_os = "macos")]
fn opener() -> (&'static str, &'static str) {
    (
        "open",
        "x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility",
    )
}

#[cfg(target_os = "windows")]
fn opener() -> (&'static str, &'static str) {
    ("explorer", "ms-settings:privacy")
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn opener() -> (&'static str, &'static str) {
    ("gnome-control-center", "privacy")
}

/// Instructions shown when the badge cannot be drawn
pub fn permission_instructions() -> &'static str {
    r#"
Screen Sentiment needs permission to draw over other apps.

1. Open the system settings (run with --open-settings to jump there)
2. Find the permission list:
   - Android: Apps > Special app access > Display over other apps
   - macOS: Privacy & Security > Accessibility
   - Windows: Privacy & security
   - GNOME: Privacy
   - Other desktops: open the system settings manually
3. Allow Screen Sentiment
4. Restart Screen Sentiment
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingNavigator {
        opened: Cell<u32>,
    }

    impl SettingsNavigator for CountingNavigator {
        fn open(&self) -> std::io::Result<()> {
            self.opened.set(self.opened.get() + 1);
            Ok(())
        }
    }

    fn offer_settings(navigator: &dyn SettingsNavigator) -> std::io::Result<()> {
        navigator.open()
    }

    #[test]
    fn test_navigator_is_object_safe() {
        let navigator = CountingNavigator { opened: Cell::new(0) };
        offer_settings(&navigator).unwrap();
        assert_eq!(navigator.opened.get(), 1);
    }

    #[test]
    fn test_instructions_are_actionable() {
        let instructions = permission_instructions();
        assert!(instructions.contains("--open-settings"));
        assert!(instructions.to_lowercase().contains("restart"));
        assert!(instructions.contains("1."));
    }

    #[test]
    fn test_opener_is_defined() {
        let (program, target) = opener();
        assert!(!program.is_empty());
        assert!(!target.is_empty());
    }

    #[test]
    fn test_instructions_cover_manual_route() {
        let instructions = permission_instructions();
        assert!(instructions.contains("Accessibility"));
        assert!(instructions.contains("manually"));
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    #[test]
    fn test_linux_opens_settings_app() {
        assert_eq!(opener(), ("gnome-control-center", "privacy"));
    }
}

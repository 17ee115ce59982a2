//! Completion notifications.
//!
//! A [`CompletionSink`] receives a title and a message when a composite
//! operation finishes. Sinks cannot report failure: whatever happens while
//! notifying is logged and dropped.

use std::process::{Command, Stdio};

/// Title and message of a completion signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// Short title
    pub title: &'static str,
    /// Body text
    pub message: &'static str,
}

impl Completion {
    /// Initial build of a development session.
    pub const DEV: Completion = Completion {
        title: "Clear build produced!",
        message: "The dist was cleared and freshly build. Any changes will be processed on save.",
    };

    /// One-shot build.
    pub const BUILD: Completion = Completion { title: "Build done!", message: "The build is done." };

    /// Build followed by packaging.
    pub const PACKAGE: Completion =
        Completion { title: "Packages are zipped.", message: "Packages are finished zipping." };
}

/// Receiver of completion signals.
pub trait CompletionSink: Send + Sync {
    /// Deliver a signal. Must not block for long and must not panic.
    fn notify(&self, title: &str, message: &str);

    /// Deliver a predefined [`Completion`].
    fn complete(&self, completion: Completion) {
        self.notify(completion.title, completion.message);
    }
}

/// Desktop notification through `notify-send` (Linux) or `osascript` (macOS).
///
/// The helper process is spawned and left to finish on its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    fn command(title: &str, message: &str) -> Option<Command> {
        if cfg!(target_os = "macos") {
            let script = format!(
                "display notification {} with title {}",
                apple_string(message),
                apple_string(title)
            );
            let mut cmd = Command::new("osascript");
            cmd.arg("-e").arg(script);
            Some(cmd)
        } else if cfg!(unix) {
            let mut cmd = Command::new("notify-send");
            cmd.arg("--app-name=extpack").arg(title).arg(message);
            Some(cmd)
        } else {
            None
        }
    }
}

/// Quote a string literal for AppleScript.
fn apple_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

impl CompletionSink for DesktopNotifier {
    fn notify(&self, title: &str, message: &str) {
        tracing::info!("{}: {}", title, message);

        let Some(mut cmd) = Self::command(title, message) else {
            return;
        };
        match cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null()).spawn() {
            Ok(mut child) => {
                std::thread::spawn(move || {
                    let _ = child.wait();
                });
            }
            Err(e) => tracing::debug!(error = %e, "desktop notification unavailable"),
        }
    }
}

/// Writes completion signals to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl CompletionSink for LogNotifier {
    fn notify(&self, title: &str, message: &str) {
        tracing::info!("{}: {}", title, message);
    }
}

/// Pick the sink for a run: desktop when enabled, log otherwise.
pub fn sink(enabled: bool) -> Box<dyn CompletionSink> {
    if enabled {
        Box::new(DesktopNotifier)
    } else {
        Box::new(LogNotifier)
    }
}

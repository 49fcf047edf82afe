// common.rs — console print channel and engine error handler

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

pub const MAXPRINTMSG: usize = 4096;

/// Distribution name and version (log prefixes, version strings).
pub const DISTNAME: &str = "RB2-HW";
pub const DISTVER: f32 = 1.0;

/// Severity passed to [`com_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLevel {
    /// Unrecoverable: logs the message and panics.
    Fatal,
    /// Aborts the current operation but leaves the engine running.
    Drop,
}

// ============================================================
// Redirect buffer for Com_Printf
// ============================================================

static RD_BUFFER: Mutex<Option<String>> = Mutex::new(None);

static DEVELOPER: AtomicBool = AtomicBool::new(false);

/// Begin redirecting printf output into a buffer.
pub fn com_begin_redirect() {
    *RD_BUFFER.lock() = Some(String::new());
}

/// End redirect and return the captured output.
pub fn com_end_redirect() -> Option<String> {
    RD_BUFFER.lock().take()
}

/// Toggle developer output (`com_dprintf`). Driven by the "developer" cvar.
pub fn com_set_developer(enabled: bool) {
    DEVELOPER.store(enabled, Ordering::Relaxed);
}

pub fn com_developer() -> bool {
    DEVELOPER.load(Ordering::Relaxed)
}

/// Appends to the redirect buffer if one is active. Returns true when the
/// message was captured.
fn redirect(msg: &str) -> bool {
    let mut buf = RD_BUFFER.lock();
    match *buf {
        Some(ref mut s) => {
            if s.len() + msg.len() <= MAXPRINTMSG * 16 {
                s.push_str(msg);
            }
            true
        }
        None => false,
    }
}

// ============================================================
// Com_Printf / Com_DPrintf / Com_Warning / Com_Error
// ============================================================

/// General-purpose print. Goes to the redirect buffer if one is active,
/// otherwise to the `log` facade at info level.
pub fn com_printf(msg: &str) {
    if redirect(msg) {
        return;
    }
    log::info!("{}", msg.trim_end_matches('\n'));
}

/// Developer-only print.
pub fn com_dprintf(msg: &str) {
    if !com_developer() {
        return;
    }
    if redirect(msg) {
        return;
    }
    log::debug!("{}", msg.trim_end_matches('\n'));
}

/// Non-fatal content warning (bad lump sizes and the like). Control flow
/// continues after the call.
pub fn com_warning(msg: &str) {
    if redirect(&format!("WARNING: {}", msg)) {
        return;
    }
    log::warn!("{}", msg.trim_end_matches('\n'));
}

/// `com_error(ErrorLevel::Fatal, ..)` for callers that need the divergence
/// visible to the type checker.
pub fn com_fatal(msg: &str) -> ! {
    log::error!("{}", msg);
    panic!("Fatal error: {}", msg);
}

/// Engine error handler.
/// - `Fatal`: logs and panics with the message.
/// - `Drop`: logs the error; the caller abandons the current operation.
pub fn com_error(level: ErrorLevel, msg: &str) {
    match level {
        ErrorLevel::Fatal => com_fatal(msg),
        ErrorLevel::Drop => {
            log::error!("********************\nERROR: {}\n********************", msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The redirect buffer is process-wide and other tests may print while it
    // is active, so only check for containment.
    #[test]
    fn test_redirect_captures_prints_and_warnings() {
        com_begin_redirect();
        com_printf("hello\n");
        com_warning("bad lump\n");
        com_set_developer(false);
        com_dprintf("hidden\n");
        let out = com_end_redirect().unwrap();
        assert!(out.contains("hello\n"));
        assert!(out.contains("WARNING: bad lump\n"));
        assert!(!out.contains("hidden"));
        assert!(com_end_redirect().is_none());
    }

    #[test]
    #[should_panic(expected = "Fatal error: draw_patch_in_cache")]
    fn test_fatal_error_panics() {
        com_error(ErrorLevel::Fatal, "draw_patch_in_cache: no drawer defined for this bpp (7)");
    }

    #[test]
    fn test_drop_error_returns() {
        com_error(ErrorLevel::Drop, "recoverable");
    }
}

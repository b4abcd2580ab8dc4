//! Cross-origin preflight handling.
//!
//! Only enabled when XSS prevention is turned off. Preflights are answered by
//! the CORS layer around the finished router, and the CSP header is dropped.

use crate::lifecycle::startup::{Registrar, StartupError};

pub fn register(r: &mut Registrar) -> Result<(), StartupError> {
    tracing::warn!("XSS prevention disabled, accepting cross-origin requests");
    let app = r.app_mut();
    app.enable_cors();
    app.set_xss_prevention(false);
    Ok(())
}

//! Application initialization and resource setup.
//!
//! - logger (plain or JSON)
//! - HTTP client used by the checker
//! - process-wide rustls crypto provider

mod client;
mod logger;

use rustls::crypto::{ring::default_provider, CryptoProvider};

pub use client::init_client;
pub use logger::{init_logger_with, log_check_result};

/// Installs the `ring` crypto provider for `rustls`.
///
/// Must run before the first TLS handshake.
pub fn init_crypto_provider() {
    // Reinstalling is harmless; the error only says one is already set.
    let _ = CryptoProvider::install_default(default_provider());
}

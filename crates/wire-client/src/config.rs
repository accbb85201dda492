//! Configuration for opening a protocol client.

use crate::RetryCache;
use credential_store::CredentialBundle;

/// Verbosity of the stack's internal logging.
///
/// Linking keeps the stack silent: progress is mediated through the event
/// sink, not the stack's own output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireLogLevel {
    /// No stack logging at all.
    #[default]
    Silent,
    /// Errors only.
    Error,
    /// Connection lifecycle info.
    Info,
    /// Full protocol tracing.
    Debug,
}

/// Configuration for spawning a protocol client.
#[derive(Clone)]
pub struct ClientConfig {
    /// Credential bundle loaded from storage (empty for a fresh account).
    pub credentials: CredentialBundle,

    /// Message-retry cache owned by this linking attempt.
    pub retry_cache: RetryCache,

    /// Whether the stack may render pairing UI (QR) on its own terminal.
    /// Always `false` for mediated linking.
    pub print_pairing_ui: bool,

    /// Stack log verbosity.
    pub log_level: WireLogLevel,
}

impl ClientConfig {
    /// Create a configuration with mediated-linking defaults: silent
    /// logging, no terminal pairing UI, a fresh retry cache.
    pub fn new(credentials: CredentialBundle) -> Self {
        Self {
            credentials,
            retry_cache: RetryCache::new(),
            print_pairing_ui: false,
            log_level: WireLogLevel::Silent,
        }
    }

    /// Use a caller-owned retry cache.
    pub fn with_retry_cache(mut self, retry_cache: RetryCache) -> Self {
        self.retry_cache = retry_cache;
        self
    }

    /// Set stack log verbosity.
    pub fn with_log_level(mut self, log_level: WireLogLevel) -> Self {
        self.log_level = log_level;
        self
    }

    /// Allow the stack to render pairing UI itself.
    pub fn with_print_pairing_ui(mut self, print_pairing_ui: bool) -> Self {
        self.print_pairing_ui = print_pairing_ui;
        self
    }
}

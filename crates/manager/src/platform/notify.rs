//! Administrative notifications

use tracing::error;

use super::Notifier;

/// Emits administrative notices as `error!` records for the log pipeline
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    server_name: String,
}

impl LogNotifier {
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
        }
    }
}

impl Notifier for LogNotifier {
    fn send_admin(&self, subject: &str, body: &str) -> bool {
        error!(
            server = %self.server_name,
            subject = %subject,
            body = %body,
            "Administrator notice"
        );
        true
    }
}

//! Outbound mail behind a trait.
//!
//! Delivery itself is out of scope for this service; the default
//! implementation logs the dispatch so the token flow is observable in
//! dev, and tests use a recording double to read tokens back out.

use std::sync::Mutex;

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailKind {
    Verification,
    PasswordReset,
    Unlock,
}

#[derive(Debug, Clone)]
pub struct OutboundMail {
    pub to: String,
    pub kind: MailKind,
    pub token: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(&self, to: &str, token: &str) -> Result<(), anyhow::Error>;
    async fn send_password_reset(&self, to: &str, token: &str) -> Result<(), anyhow::Error>;
    async fn send_unlock(&self, to: &str, token: &str) -> Result<(), anyhow::Error>;
}

/// Logs dispatches instead of sending them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(&self, to: &str, _token: &str) -> Result<(), anyhow::Error> {
        tracing::info!(recipient = %to, "Dispatching verification email");
        Ok(())
    }

    async fn send_password_reset(&self, to: &str, _token: &str) -> Result<(), anyhow::Error> {
        tracing::info!(recipient = %to, "Dispatching password reset email");
        Ok(())
    }

    async fn send_unlock(&self, to: &str, _token: &str) -> Result<(), anyhow::Error> {
        tracing::info!(recipient = %to, "Dispatching account unlock email");
        Ok(())
    }
}

/// Records every dispatch so tests can drive token flows end to end.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutboundMail>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent token sent of the given kind, if any.
    pub fn last_token(&self, kind: MailKind) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.kind == kind)
            .map(|m| m.token.clone())
    }

    pub fn count(&self, kind: MailKind) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.kind == kind)
            .count()
    }

    fn record(&self, to: &str, kind: MailKind, token: &str) {
        self.sent.lock().unwrap().push(OutboundMail {
            to: to.to_string(),
            kind,
            token: token.to_string(),
        });
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_verification(&self, to: &str, token: &str) -> Result<(), anyhow::Error> {
        self.record(to, MailKind::Verification, token);
        Ok(())
    }

    async fn send_password_reset(&self, to: &str, token: &str) -> Result<(), anyhow::Error> {
        self.record(to, MailKind::PasswordReset, token);
        Ok(())
    }

    async fn send_unlock(&self, to: &str, token: &str) -> Result<(), anyhow::Error> {
        self.record(to, MailKind::Unlock, token);
        Ok(())
    }
}

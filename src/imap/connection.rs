//! A lazily opened, read-only mailbox connection.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;

use super::{Connector, MailSession};

/// How the TCP stream is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Implicit TLS (usually port 993).
    #[default]
    Tls,
    /// Plain connection upgraded with `STARTTLS` (usually port 143).
    StartTls,
}

/// Everything needed to reach and open a mailbox.
#[derive(Clone)]
pub struct ConnectionSettings {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub mailbox: String,
    pub transport: Transport,
    /// Verify the server certificate. Only disable for test servers.
    pub validate_certs: bool,
}

impl ConnectionSettings {
    /// Settings for `INBOX` on port 993 over TLS.
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            host: host.into(),
            port: 993,
            mailbox: "INBOX".to_string(),
            transport: Transport::Tls,
            validate_certs: true,
        }
    }

    /// `{host:port/imap/ssl}MAILBOX`-style description, for logs and errors.
    pub fn describe(&self) -> String {
        let mut flags = vec!["imap"];
        match self.transport {
            Transport::Tls => flags.push("ssl"),
            Transport::StartTls => flags.push("tls"),
        }
        if !self.validate_certs {
            flags.push("novalidate-cert");
        }
        format!(
            "{{{}:{}/{}}}{}",
            self.host,
            self.port,
            flags.join("/"),
            self.mailbox
        )
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("mailbox", &self.mailbox)
            .field("transport", &self.transport)
            .field("validate_certs", &self.validate_certs)
            .finish()
    }
}

/// Owns at most one session, opened on first use.
///
/// The session is closed by [`close`](Self::close) or when the connection is
/// dropped, whichever comes first. After closing, the next use opens a new
/// session.
pub struct ReadOnlyConnection<C: Connector> {
    connector: C,
    session: Option<C::Session>,
}

impl<C: Connector> ReadOnlyConnection<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            session: None,
        }
    }

    /// The open session, connecting first if needed.
    pub fn session(&mut self) -> Result<&mut C::Session> {
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                debug!(target_mailbox = %self.connector.describe(), "Opening IMAP session");
                let session = self.connector.open()?;
                info!(target_mailbox = %self.connector.describe(), "IMAP session opened");
                session
            }
        };
        Ok(self.session.insert(session))
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Close the session if one is open. Errors while closing are logged, not returned.
    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            match session.close() {
                Ok(()) => debug!("IMAP session closed"),
                Err(e) => warn!(error = %e, "Failed to close IMAP session cleanly"),
            }
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }
}

impl<C: Connector> Drop for ReadOnlyConnection<C> {
    fn drop(&mut self) {
        self.close();
    }
}

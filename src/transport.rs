//! Delivery of built messages to an SMTP relay.

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::error::{Error, Result};

/// Error type returned by transports; only its text reaches the caller.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Something that can deliver one fully built message.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `message` to every recipient of its envelope.
    async fn deliver(&self, message: Message) -> std::result::Result<(), TransportError>;
}

/// How to secure the connection to the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    /// TLS from the first byte (SMTPS, usually port 465)
    #[default]
    Implicit,
    /// Plain connection upgraded with STARTTLS (usually port 587)
    StartTls,
    /// Opportunistic STARTTLS without certificate checks, for local relays
    None,
}

impl FromStr for TlsMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "implicit" | "smtps" => Ok(Self::Implicit),
            "starttls" => Ok(Self::StartTls),
            "none" | "plain" => Ok(Self::None),
            other => Err(format!(
                "unknown TLS mode {other:?} (expected implicit, starttls or none)"
            )),
        }
    }
}

impl fmt::Display for TlsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Implicit => "implicit",
            Self::StartTls => "starttls",
            Self::None => "none",
        })
    }
}

/// Connection settings for the outgoing relay.
#[derive(Clone)]
pub struct RelayConfig {
    /// SMTP host to send through
    pub host: String,
    /// SMTP port
    pub port: u16,
    pub tls: TlsMode,
    /// Username for SMTP AUTH
    pub username: Option<String>,
    /// Password for SMTP AUTH
    pub password: Option<String>,
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Transport backed by a real SMTP relay.
pub struct SmtpRelay {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl SmtpRelay {
    /// Build the relay client. No connection is made until the first delivery.
    pub fn new(config: &RelayConfig) -> Result<Self> {
        if config.host.is_empty() {
            return Err(Error::Config("SMTP host is not set".to_string()));
        }

        let mut builder = match config.tls {
            TlsMode::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| Error::Config(format!("invalid SMTP relay: {e}")))?,
            TlsMode::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                    .map_err(|e| Error::Config(format!("invalid SMTP relay: {e}")))?
            }
            TlsMode::None => {
                let tls_params = TlsParameters::builder(config.host.clone())
                    .dangerous_accept_invalid_certs(true)
                    .build()
                    .map_err(|e| Error::Config(format!("invalid TLS parameters: {e}")))?;
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                    .tls(Tls::Opportunistic(tls_params))
            }
        };

        builder = builder.port(config.port);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            host: config.host.clone(),
        })
    }
}

#[async_trait]
impl Transport for SmtpRelay {
    async fn deliver(&self, message: Message) -> std::result::Result<(), TransportError> {
        self.transport.send(message).await?;
        Ok(())
    }
}

impl fmt::Debug for SmtpRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpRelay").field("host", &self.host).finish()
    }
}

/// Transport that only logs what would have been sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRun;

#[async_trait]
impl Transport for DryRun {
    async fn deliver(&self, message: Message) -> std::result::Result<(), TransportError> {
        let rcpts: Vec<String> = message
            .envelope()
            .to()
            .iter()
            .map(ToString::to_string)
            .collect();
        let subject = message
            .headers()
            .get_raw("Subject")
            .unwrap_or_default()
            .to_string();
        info!("[dry run] would send {subject:?} to {rcpts:?}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tls_modes() {
        assert_eq!("SMTPS".parse::<TlsMode>().unwrap(), TlsMode::Implicit);
        assert_eq!("starttls".parse::<TlsMode>().unwrap(), TlsMode::StartTls);
        assert_eq!("none".parse::<TlsMode>().unwrap(), TlsMode::None);
        assert!("ssl3".parse::<TlsMode>().is_err());
    }

    #[test]
    fn debug_output_hides_password() {
        let config = RelayConfig {
            host: "smtp.example.org".into(),
            port: 465,
            tls: TlsMode::Implicit,
            username: Some("bureau".into()),
            password: Some("hunter2".into()),
        };
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn empty_host_is_a_config_error() {
        let config = RelayConfig {
            host: String::new(),
            port: 465,
            tls: TlsMode::Implicit,
            username: None,
            password: None,
        };
        assert!(matches!(SmtpRelay::new(&config), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn dry_run_accepts_without_a_relay() {
        let message = Message::builder()
            .from("bureau@example.org".parse().unwrap())
            .bcc("jean@example.org".parse().unwrap())
            .bcc("marie@example.org".parse().unwrap())
            .subject("Assemblée")
            .body(String::from("Bonjour"))
            .unwrap();
        assert!(DryRun.deliver(message).await.is_ok());
    }

    #[test]
    fn transports_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SmtpRelay>();
        assert_send_sync::<DryRun>();
    }
}

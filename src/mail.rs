//! Outgoing mail
//!
//! With an SMTP host configured, messages go out through lettre. Without
//! one only the recipient and subject are logged, and the most recent
//! messages are kept in an in-memory outbox, which is also what the tests
//! read reset links from.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{info, instrument};

use crate::config::Config;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// A message as handed to the mailer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// How many messages the outbox keeps
pub const OUTBOX_CAPACITY: usize = 32;

/// The last [`OUTBOX_CAPACITY`] messages sent while no SMTP relay is configured
#[derive(Debug, Clone, Default)]
pub struct Outbox(Arc<Mutex<VecDeque<OutgoingMail>>>);

impl Outbox {
    fn record(&self, mail: OutgoingMail) {
        if let Ok(mut messages) = self.0.lock() {
            if messages.len() == OUTBOX_CAPACITY {
                messages.pop_front();
            }
            messages.push_back(mail);
        }
    }

    /// Messages still held, oldest first
    pub fn messages(&self) -> Vec<OutgoingMail> {
        self.0
            .lock()
            .map(|messages| messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<OutgoingMail> {
        self.0.lock().ok().and_then(|messages| messages.back().cloned())
    }
}

#[derive(Clone)]
pub enum Mailer {
    Smtp {
        transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
        sender: Mailbox,
    },
    Outbox(Outbox),
}

impl Mailer {
    /// Picks the transport from the configuration
    pub fn from_config(config: &Config) -> Result<Self, MailError> {
        let Some(host) = config.smtp_host.as_deref() else {
            info!("No SMTP host configured, outgoing mail will only be logged");
            return Ok(Mailer::Outbox(Outbox::default()));
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(config.smtp_port);
        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Mailer::Smtp {
            transport: Arc::new(builder.build()),
            sender: config.mail_sender.parse()?,
        })
    }

    /// The outbox, when mail is not actually delivered
    pub fn outbox(&self) -> Option<&Outbox> {
        match self {
            Mailer::Outbox(outbox) => Some(outbox),
            Mailer::Smtp { .. } => None,
        }
    }

    #[instrument(skip(self, body))]
    pub async fn send(&self, to: &str, subject: &str, body: String) -> Result<(), MailError> {
        match self {
            Mailer::Smtp { transport, sender } => {
                let message = Message::builder()
                    .from(sender.clone())
                    .to(to.parse()?)
                    .subject(subject)
                    .header(ContentType::TEXT_PLAIN)
                    .body(body)?;
                transport.send(message).await?;
                info!("Mail delivered");
            }
            Mailer::Outbox(outbox) => {
                info!("Mail not delivered, no SMTP host configured");
                outbox.record(OutgoingMail {
                    to: to.to_string(),
                    subject: subject.to_string(),
                    body,
                });
            }
        }
        Ok(())
    }
}

//! Report delivery.

use crate::{config::SmtpConfig, error::NotifyError};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor, message::Mailbox,
    transport::smtp::authentication::Credentials,
};
use tracing::info;

/// Delivers a rendered report. Failures are the caller's to log; a failed
/// delivery is not retried within the same cycle.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// SMTP delivery over implicit TLS, one message to all configured
/// recipients.
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    recipients: Vec<Mailbox>,
}

impl EmailNotifier {
    pub fn new(smtp: &SmtpConfig) -> Result<Self, NotifyError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)?
            .credentials(Credentials::new(smtp.sender.clone(), smtp.password.clone()))
            .build();
        let sender = smtp.sender.parse::<Mailbox>()?;
        let recipients = smtp
            .recipients
            .iter()
            .map(|recipient| recipient.parse::<Mailbox>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            transport,
            sender,
            recipients,
        })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let mut builder = Message::builder().from(self.sender.clone()).subject(subject);
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }
        let email = builder.body(body.to_string())?;
        self.transport.send(email).await?;
        info!(recipients = self.recipients.len(), "report email sent");
        Ok(())
    }
}

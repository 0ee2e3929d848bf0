//! Outgoing email.
//!
//! Bulk sends go out in chunks; every message in a chunk is sent concurrently and
//! a failure only counts against that one recipient.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SmtpConfig;

#[async_trait]
pub trait Mailer: Send + Sync + fmt::Debug {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivery counts of a bulk send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub sent: usize,
    pub failed: usize,
}

/// SMTP delivery through lettre.
pub struct LettreMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl fmt::Debug for LettreMailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LettreMailer")
            .field("from", &self.from.to_string())
            .finish_non_exhaustive()
    }
}

impl LettreMailer {
    pub fn new(smtp: &SmtpConfig, from: &str) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
            .with_context(|| format!("Invalid SMTP host {}", smtp.host))?
            .port(smtp.port);
        if let (Some(username), Some(password)) = (&smtp.username, &smtp.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: from
                .parse()
                .with_context(|| format!("Invalid sender address {}", from))?,
        })
    }
}

#[async_trait]
impl Mailer for LettreMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse().with_context(|| format!("Invalid recipient {}", to))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;
        self.transport.send(message).await?;
        debug!("Sent '{}' to {}", subject, to);
        Ok(())
    }
}

/// Used when no SMTP relay is configured.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<()> {
        info!("Mail to {} not delivered (SMTP disabled): {}", to, subject);
        Ok(())
    }
}

/// Sends `emails` in chunks of `batch_size`, pausing `delay` between chunks.
pub async fn send_in_batches(
    mailer: Arc<dyn Mailer>,
    emails: Vec<OutgoingEmail>,
    batch_size: usize,
    delay: Duration,
) -> BatchReport {
    let mut report = BatchReport::default();
    let chunks: Vec<&[OutgoingEmail]> = emails.chunks(batch_size.max(1)).collect();
    let chunk_count = chunks.len();

    for (index, chunk) in chunks.into_iter().enumerate() {
        let results = join_all(
            chunk
                .iter()
                .map(|email| mailer.send(&email.to, &email.subject, &email.body)),
        )
        .await;

        for (email, result) in chunk.iter().zip(results) {
            match result {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    warn!("Failed to send '{}' to {}: {:#}", email.subject, email.to, e);
                    report.failed += 1;
                }
            }
        }

        if index + 1 < chunk_count && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    info!(
        "Notification batch finished: {} sent, {} failed",
        report.sent, report.failed
    );
    report
}

/// Records messages instead of sending them.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: std::sync::Mutex<Vec<OutgoingEmail>>,
}

#[cfg(test)]
impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// The six-digit code in the newest message to `to`.
    pub fn last_code_for(&self, to: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|email| email.to == to)
            .and_then(|email| {
                email
                    .body
                    .split(|c: char| !c.is_ascii_digit())
                    .find(|word| word.len() == 6)
                    .map(str::to_string)
            })
    }
}

#[cfg(test)]
#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if to.ends_with("@bounce.test") {
            anyhow::bail!("mailbox unavailable");
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(OutgoingEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(to: &str) -> OutgoingEmail {
        OutgoingEmail {
            to: to.to_string(),
            subject: "Meeting reminder".to_string(),
            body: "See you on Saturday".to_string(),
        }
    }

    #[tokio::test]
    async fn test_batches_tolerate_individual_failures() {
        let mailer = Arc::new(RecordingMailer::default());
        let emails = (0..23)
            .map(|i| {
                if i % 8 == 3 {
                    email(&format!("parent{}@bounce.test", i))
                } else {
                    email(&format!("parent{}@example.com", i))
                }
            })
            .collect();

        let report = send_in_batches(mailer.clone(), emails, 10, Duration::ZERO).await;
        assert_eq!(report, BatchReport { sent: 20, failed: 3 });
        assert_eq!(mailer.sent().len(), 20);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let mailer = Arc::new(RecordingMailer::default());
        let report = send_in_batches(mailer, Vec::new(), 10, Duration::from_secs(1)).await;
        assert_eq!(report, BatchReport::default());
    }

    #[test]
    fn test_code_extraction() {
        let mailer = RecordingMailer::default();
        mailer.sent.lock().unwrap().push(OutgoingEmail {
            to: "a@example.com".to_string(),
            subject: "Verify".to_string(),
            body: "Your verification code is 042917. It expires in 10 minutes.".to_string(),
        });
        assert_eq!(mailer.last_code_for("a@example.com").as_deref(), Some("042917"));
        assert_eq!(mailer.last_code_for("b@example.com"), None);
    }
}

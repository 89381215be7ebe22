//! SMTP delivery through `lettre`.

use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::{Attachment as MailAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::SmtpConfig;
use crate::gateway::{GatewayFuture, MailerGateway, OutgoingEmail};
use crate::{AppError, Result};

/// Submission port that negotiates STARTTLS; other ports use implicit TLS.
const STARTTLS_PORT: u16 = 587;

/// Sends customer mail from the configured sender address.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    /// Build the transport. No connection is opened until the first send.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for an invalid sender address or host.
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let address: Address = config.from_email.parse().map_err(|err| {
            AppError::Config(format!("invalid smtp.from_email '{}': {err}", config.from_email))
        })?;
        let name = (!config.from_name.trim().is_empty()).then(|| config.from_name.clone());
        let sender = Mailbox::new(name, address);

        let relay = if config.port == STARTTLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        };
        let builder = relay
                .map_err(|err| AppError::Config(format!("invalid smtp host '{}': {err}", config.host)))?
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_seconds.max(1))));

        let builder = if config.username.is_empty() {
            builder
        } else {
            builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
        };

        Ok(Self {
            transport: builder.build(),
            sender,
        })
    }

    fn build_message(&self, email: &OutgoingEmail) -> Result<Message> {
        build_message(&self.sender, email)
    }
}

/// Assemble a plain text message, multipart when attachments are present.
///
/// # Errors
///
/// Returns `AppError::Send` when the recipient is not a valid address.
pub fn build_message(sender: &Mailbox, email: &OutgoingEmail) -> Result<Message> {
    let recipient: Mailbox = email
        .to
        .parse()
        .map_err(|err| AppError::Send(format!("invalid recipient '{}': {err}", email.to)))?;

    let builder = Message::builder()
        .from(sender.clone())
        .to(recipient)
        .subject(email.subject.clone());

    if email.attachments.is_empty() {
        return Ok(builder
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())?);
    }

    let mut multipart = MultiPart::mixed().singlepart(SinglePart::plain(email.body.clone()));
    for attachment in &email.attachments {
        let content_type =
            ContentType::parse(&attachment.content_type).unwrap_or(ContentType::TEXT_PLAIN);
        multipart = multipart.singlepart(
            MailAttachment::new(attachment.filename.clone())
                .body(attachment.data.clone(), content_type),
        );
    }
    Ok(builder.multipart(multipart)?)
}

impl MailerGateway for SmtpMailer {
    fn send<'a>(&'a self, email: &'a OutgoingEmail) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let message = self.build_message(email)?;
            self.transport.send(message).await?;
            info!(to = %email.to, subject = %email.subject, "email sent");
            Ok(())
        })
    }
}

//! Report sinks: stdout and SMTP

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use reserve_lib::{Delivery, Report, ReportSink};
use tracing::info;

use crate::config::{EmailConfig, SmtpTls};
use crate::output::{self, OutputFormat};

/// Prints the rendered report to stdout
pub struct StdoutSink {
    format: OutputFormat,
}

impl StdoutSink {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

#[async_trait]
impl ReportSink for StdoutSink {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn deliver(&self, report: &Report, delivery: Delivery) -> Result<()> {
        println!("{}", output::render(report, delivery, self.format)?);
        Ok(())
    }
}

/// Mails the report as a text and HTML alternative
pub struct EmailSink {
    config: EmailConfig,
    sender: Mailbox,
    recipients: Vec<Mailbox>,
}

impl EmailSink {
    /// Parse the configured addresses up front so bad ones fail before the run
    pub fn new(config: EmailConfig) -> Result<Self> {
        let sender = config
            .sender
            .parse::<Mailbox>()
            .with_context(|| format!("Invalid email sender {:?}", config.sender))?;
        let recipients = config
            .recipients
            .iter()
            .map(|r| {
                r.parse::<Mailbox>()
                    .with_context(|| format!("Invalid email recipient {:?}", r))
            })
            .collect::<Result<Vec<Mailbox>>>()?;

        Ok(Self {
            config,
            sender,
            recipients,
        })
    }

    /// Build the message without sending it
    pub fn message(&self, report: &Report, delivery: Delivery) -> Result<Message> {
        // Mail bodies never carry terminal escapes
        colored::control::set_override(false);
        let text = output::render_text(report, delivery);
        colored::control::unset_override();
        let html = output::render_html(report, delivery)?;

        let mut builder = Message::builder()
            .from(self.sender.clone())
            .subject(output::subject(delivery));
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }

        builder
            .multipart(MultiPart::alternative_plain_html(text?, html))
            .context("Failed to build report email")
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let host = self.config.host.as_str();
        let builder = match self.config.tls {
            SmtpTls::Wrapper => AsyncSmtpTransport::<Tokio1Executor>::relay(host)?,
            SmtpTls::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?,
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        }
        .port(self.config.port);

        let builder = match (&self.config.username, &self.config.password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(builder.build())
    }
}

#[async_trait]
impl ReportSink for EmailSink {
    fn name(&self) -> &str {
        "email"
    }

    async fn deliver(&self, report: &Report, delivery: Delivery) -> Result<()> {
        let message = self.message(report, delivery)?;
        let transport = self.transport()?;

        info!(
            host = %self.config.host,
            port = self.config.port,
            recipients = self.recipients.len(),
            "Sending report email"
        );

        transport
            .send(message)
            .await
            .with_context(|| format!("Failed to send report email via {}", self.config.host))?;
        Ok(())
    }
}

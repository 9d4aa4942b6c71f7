//! Delivery of run reports over SMTP.
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use ngl_core::{CollabError, MailTransport, Report};
use ngl_model::{MailConfig, MailSecurity};
use tracing::{debug, info};

mod error;
pub use error::NotifyError;

/// Sends each [`Report`] as one plain-text message to every configured recipient.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl SmtpMailer {
    /// Must be called inside a tokio runtime; the connection pool spawns its reaper on build.
    pub fn from_config(cfg: &MailConfig) -> Result<Self, NotifyError> {
        let from = mailbox(&cfg.from)?;
        let to = cfg
            .to
            .iter()
            .map(|r| mailbox(r))
            .collect::<Result<Vec<_>, _>>()?;

        let transport_err = |e: lettre::transport::smtp::Error| NotifyError::Transport(e.to_string());
        let mut builder = match cfg.security {
            MailSecurity::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cfg.host),
            MailSecurity::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host).map_err(transport_err)?
            }
            MailSecurity::Tls => {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host).map_err(transport_err)?
            }
        }
        .port(cfg.port);

        if let (Some(user), Some(password)) = (&cfg.user, &cfg.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }
        debug!(
            target: "ngl.notify",
            host = %cfg.host,
            port = cfg.port,
            security = ?cfg.security,
            recipients = to.len(),
            "smtp transport ready"
        );

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    fn message(&self, report: &Report) -> Result<Message, NotifyError> {
        message(&self.from, &self.to, report)
    }
}

fn mailbox(addr: &str) -> Result<Mailbox, NotifyError> {
    addr.trim().parse().map_err(|e: lettre::address::AddressError| NotifyError::Address {
        addr: addr.to_string(),
        reason: e.to_string(),
    })
}

fn message(from: &Mailbox, to: &[Mailbox], report: &Report) -> Result<Message, NotifyError> {
    let mut builder = Message::builder()
        .from(from.clone())
        .subject(report.subject.as_str())
        .header(ContentType::TEXT_PLAIN);
    for rcpt in to {
        builder = builder.to(rcpt.clone());
    }
    builder
        .body(report.body.clone())
        .map_err(|e| NotifyError::Message(e.to_string()))
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, report: &Report) -> Result<(), CollabError> {
        let msg = self.message(report)?;
        self.transport
            .send(msg)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        info!(target: "ngl.notify", subject = %report.subject, recipients = self.to.len(), "report mailed");
        Ok(())
    }
}

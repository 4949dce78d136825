//! 基于 lettre 的 SMTP 投递

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use logkeeper_common::config::SmtpConfig;
use tracing::{debug, info};

use crate::error::MailError;
use crate::{MailMessage, Mailer};

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// 根据配置创建 SMTP 投递器
    ///
    /// `ssl = true` 使用隐式 TLS，否则使用 STARTTLS。连接在首次发送时建立。
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let builder = if config.ssl {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        };

        let mut builder = builder.port(config.port);
        if config.has_credentials() {
            builder = builder.credentials(Credentials::new(
                config.user.clone(),
                config.pass.clone(),
            ));
        }

        let address: Address = config.sender_email.parse()?;
        let from = Mailbox::new(Some(config.sender_name.clone()), address);

        info!(
            "SMTP mailer configured: {}:{} (ssl={})",
            config.host, config.port, config.ssl
        );

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        if message.to.is_empty() {
            return Err(MailError::NoRecipients);
        }

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(message.subject.clone());
        for recipient in &message.to {
            builder = builder.to(recipient.parse::<Mailbox>()?);
        }
        let email = builder.header(ContentType::TEXT_HTML).body(message.html)?;

        self.transport.send(email).await?;
        debug!("Mail '{}' sent to {:?}", message.subject, message.to);
        Ok(())
    }
}

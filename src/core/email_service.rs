use crate::core::config::SmtpConfig;
use crate::core::{AppError, AppErrorType};
use crate::models::login_codes::CodePurpose;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use std::str::FromStr;

pub struct EmailService {
    smtp_config: SmtpConfig,
}

fn delivery_failed(cause: impl ToString) -> AppError {
    AppError::with_cause(AppErrorType::DeliveryFailed, cause)
}

impl EmailService {
    pub fn new(smtp_config: SmtpConfig) -> Self {
        Self { smtp_config }
    }

    fn create_smtp_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, AppError> {
        let credentials = Credentials::new(
            self.smtp_config.username.clone(),
            self.smtp_config.password.expose_secret().clone(),
        );

        // 587 and 2525 speak STARTTLS, everything else implicit TLS.
        let builder = if matches!(self.smtp_config.port, 587 | 2525) {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.smtp_config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.smtp_config.host)
        }
        .map_err(|e| delivery_failed(format!("Failed to create SMTP transport: {}", e)))?;

        Ok(builder
            .port(self.smtp_config.port)
            .credentials(credentials)
            .build())
    }

    async fn send_html(&self, to_email: &str, subject: &str, body: String) -> Result<(), AppError> {
        let from_mailbox = Mailbox::from_str(&format!(
            "{} <{}>",
            self.smtp_config.from_name, self.smtp_config.from_email
        ))
        .map_err(|e| delivery_failed(format!("Invalid from email: {}", e)))?;

        let to_mailbox = Mailbox::from_str(to_email)
            .map_err(|e| delivery_failed(format!("Invalid to email: {}", e)))?;

        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body)
            .map_err(|e| delivery_failed(format!("Failed to build email: {}", e)))?;

        let mailer = self.create_smtp_transport()?;

        match mailer.send(email).await {
            Ok(_) => {
                tracing::info!("Email \"{}\" sent to: {}", subject, to_email);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to send \"{}\" to {}: {}", subject, to_email, e);
                Err(delivery_failed(format!("Failed to send email: {}", e)))
            }
        }
    }

    pub async fn send_login_code(
        &self,
        to_email: &str,
        code: &str,
        purpose: CodePurpose,
        ttl_minutes: i64,
    ) -> Result<(), AppError> {
        let subject = match purpose {
            CodePurpose::Login => "登录验证码 / Your sign-in code",
            CodePurpose::Reset => "重置密码验证码 / Your password reset code",
        };
        self.send_html(to_email, subject, code_email_body(code, purpose, ttl_minutes))
            .await
    }

    pub async fn send_password_reset_confirmation(&self, to_email: &str) -> Result<(), AppError> {
        self.send_html(
            to_email,
            "密码已重置 / Password reset successful",
            confirmation_email_body(),
        )
        .await
    }
}

fn code_email_body(code: &str, purpose: CodePurpose, ttl_minutes: i64) -> String {
    let (zh, en) = match purpose {
        CodePurpose::Login => ("您正在登录学员系统。", "You are signing in to the student portal."),
        CodePurpose::Reset => ("您正在重置学员系统密码。", "You are resetting your portal password."),
    };
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; color: #222; max-width: 560px; margin: 0 auto;">
  <p>{zh}<br>{en}</p>
  <p style="font-size: 30px; font-weight: bold; letter-spacing: 8px;">{code}</p>
  <p>验证码 {ttl} 分钟内有效，请勿转发给任何人。<br>
     The code expires in {ttl} minutes. Never share it with anyone.</p>
  <p style="font-size: 12px; color: #777;">如果这不是您本人的操作，请忽略此邮件。<br>
     If you did not request this, ignore this email.</p>
</body>
</html>
"#,
        zh = zh,
        en = en,
        code = code,
        ttl = ttl_minutes
    )
}

fn confirmation_email_body() -> String {
    r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; color: #222; max-width: 560px; margin: 0 auto;">
  <p>您的密码已重置，所有设备上的登录状态均已退出。<br>
     Your password has been reset and every active session has been signed out.</p>
  <p>如果这不是您本人的操作，请立即联系我们。<br>
     If you did not make this change, contact us immediately.</p>
</body>
</html>
"#
    .to_string()
}

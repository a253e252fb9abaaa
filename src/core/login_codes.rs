use crate::core::config::{Environment, LoginCodeSettings};
use crate::core::redis_helper::{code_cooldown_key, RedisHelper};
use crate::core::{AppError, AppErrorType, EmailService};
use crate::db::login_codes;
use crate::models::login_codes::{
    assess_attempt, code_matches, delivery_outcome, generate_code, hash_code, Assessment,
    CodeIssued, CodePurpose, Identifier,
};
use chrono::Utc;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use std::time::Duration;

/// Issues and checks one-time codes.
///
/// Whether a failed delivery may echo the code back is fixed here at
/// construction: it needs `expose_dev_code` in the settings *and* a
/// non-production environment.
pub struct LoginCodeService {
    settings: LoginCodeSettings,
    dev_echo: bool,
    email: Option<EmailService>,
    redis: Option<RedisHelper>,
}

impl LoginCodeService {
    pub fn new(
        settings: LoginCodeSettings,
        environment: Environment,
        email: Option<EmailService>,
        redis: Option<RedisHelper>,
    ) -> Self {
        let dev_echo = settings.expose_dev_code && !environment.is_production();
        if settings.expose_dev_code && environment.is_production() {
            tracing::warn!("expose_dev_code is ignored in production");
        }
        Self {
            settings,
            dev_echo,
            email,
            redis,
        }
    }

    pub fn dev_echo(&self) -> bool {
        self.dev_echo
    }

    pub fn mailer(&self) -> Option<&EmailService> {
        self.email.as_ref()
    }

    fn secret(&self) -> &[u8] {
        self.settings.hash_secret.expose_secret().as_bytes()
    }

    async fn enforce_cooldown(&self, qualified: &str) -> Result<(), AppError> {
        let redis = match &self.redis {
            Some(redis) => redis,
            None => return Ok(()),
        };
        let cooldown = Duration::from_secs(self.settings.resend_cooldown_seconds);
        match redis.try_acquire(&code_cooldown_key(qualified), cooldown).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AppError::with_cause(
                AppErrorType::RateLimited,
                format!("code for {} requested within cooldown", qualified),
            )),
            Err(e) => {
                tracing::warn!("Skipping code cooldown, cache unavailable: {}", e);
                Ok(())
            }
        }
    }

    async fn deliver(
        &self,
        identifier: &Identifier,
        code: &str,
        purpose: CodePurpose,
    ) -> Result<(), AppError> {
        match identifier {
            Identifier::Phone(_) => Err(AppError::with_cause(
                AppErrorType::SmsNotConfigured,
                "phone delivery is not implemented",
            )),
            Identifier::Email(address) => match &self.email {
                Some(email) => {
                    email
                        .send_login_code(address, code, purpose, self.settings.ttl_seconds / 60)
                        .await
                }
                None => Err(AppError::with_cause(
                    AppErrorType::DeliveryFailed,
                    "SMTP is not configured",
                )),
            },
        }
    }

    #[tracing::instrument(name = "Request login code", skip(self, pool))]
    pub async fn request_code(
        &self,
        pool: &PgPool,
        identifier: &Identifier,
        purpose: CodePurpose,
    ) -> Result<CodeIssued, AppError> {
        let qualified = identifier.qualified(purpose);
        self.enforce_cooldown(&qualified).await?;

        let code = generate_code();
        let expires_at = Utc::now() + chrono::Duration::seconds(self.settings.ttl_seconds);
        login_codes::insert_code(
            pool,
            &qualified,
            &hash_code(self.secret(), &qualified, &code),
            expires_at,
        )
        .await?;

        let delivery = self.deliver(identifier, &code, purpose).await;
        let issued = delivery_outcome(delivery, &code, self.dev_echo);
        if issued.is_err() {
            // Let the caller retry straight away instead of waiting out a
            // cooldown for a code that never arrived.
            if let Some(redis) = &self.redis {
                if let Err(e) = redis.delete(&code_cooldown_key(&qualified)).await {
                    tracing::warn!("Failed to clear code cooldown: {}", e);
                }
            }
        }
        issued
    }

    /// Consumes the code on success. Each guess spends one attempt before the
    /// hash is compared; failures leave the row unconsumed.
    #[tracing::instrument(name = "Verify login code", skip(self, pool, code))]
    pub async fn verify_code(
        &self,
        pool: &PgPool,
        identifier: &Identifier,
        purpose: CodePurpose,
        code: &str,
    ) -> Result<(), AppError> {
        let qualified = identifier.qualified(purpose);
        let max_attempts = self.settings.max_attempts;
        let row = login_codes::latest_active(pool, &qualified)
            .await?
            .ok_or_else(|| AppError::new(AppErrorType::InvalidCode))?;

        let reservation = login_codes::reserve_attempt(pool, row.id, max_attempts).await?;
        let assessment = assess_attempt(
            reservation,
            || code_matches(self.secret(), &row.identifier, code, &row.code_hash),
            max_attempts,
        );

        match assessment {
            Assessment::Accept => {
                if login_codes::consume(pool, row.id, max_attempts).await? {
                    Ok(())
                } else {
                    // lost a race with a concurrent verification
                    Err(AppError::new(AppErrorType::InvalidCode))
                }
            }
            Assessment::Reject(error_type) => Err(AppError::new(error_type)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn settings(expose_dev_code: bool) -> LoginCodeSettings {
        LoginCodeSettings {
            ttl_seconds: 300,
            max_attempts: 5,
            resend_cooldown_seconds: 60,
            hash_secret: Secret::new("secret".to_string()),
            expose_dev_code,
        }
    }

    #[test]
    fn dev_echo_needs_flag_and_non_production() {
        let cases = [
            (true, Environment::Local, true),
            (true, Environment::Sandbox, true),
            (true, Environment::Production, false),
            (false, Environment::Local, false),
            (false, Environment::Production, false),
        ];
        for (flag, environment, expected) in cases {
            let service = LoginCodeService::new(settings(flag), environment, None, None);
            assert_eq!(service.dev_echo(), expected, "{:?}", environment);
        }
    }

    #[actix_web::test]
    async fn phone_delivery_reports_sms_not_configured() {
        let service = LoginCodeService::new(settings(false), Environment::Local, None, None);
        let phone = Identifier::parse("13800138000").unwrap();
        let error = service
            .deliver(&phone, "123456", CodePurpose::Login)
            .await
            .unwrap_err();
        assert_eq!(error.code(), "SMS_NOT_CONFIGURED");
    }

    #[actix_web::test]
    async fn email_without_smtp_is_delivery_failed() {
        let service = LoginCodeService::new(settings(true), Environment::Production, None, None);
        let email = Identifier::parse("user@example.com").unwrap();
        let delivery = service.deliver(&email, "123456", CodePurpose::Reset).await;
        let error = delivery_outcome(delivery, "123456", service.dev_echo()).unwrap_err();
        assert_eq!(error.code(), "DELIVERY_FAILED");
    }
}

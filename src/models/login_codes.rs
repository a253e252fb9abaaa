use crate::core::{AppError, AppErrorType};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;
use validator::Validate;

type HmacSha256 = Hmac<Sha256>;

pub const CODE_LENGTH: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CodePurpose {
    Login,
    Reset,
}

impl CodePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodePurpose::Login => "login",
            CodePurpose::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Email(String),
    Phone(String),
}

impl Identifier {
    /// Emails are trimmed and lowercased; phone numbers lose spaces, dashes
    /// and parentheses and may keep a leading `+`.
    pub fn parse(raw: &str) -> Result<Identifier, AppError> {
        let trimmed = raw.trim();
        if trimmed.contains('@') {
            let email = trimmed.to_lowercase();
            let valid = match email.split_once('@') {
                Some((local, domain)) => {
                    !local.is_empty()
                        && domain.contains('.')
                        && !domain.starts_with('.')
                        && !domain.ends_with('.')
                        && !email.contains(char::is_whitespace)
                }
                None => false,
            };
            return if valid {
                Ok(Identifier::Email(email))
            } else {
                Err(AppError::invalid_body("identifier is not a valid email"))
            };
        }

        let phone: String = trimmed
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
            .collect();
        let digits = phone.strip_prefix('+').unwrap_or(&phone);
        if (6..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
            Ok(Identifier::Phone(phone))
        } else {
            Err(AppError::invalid_body(
                "identifier must be an email address or phone number",
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Identifier::Email(value) | Identifier::Phone(value) => value,
        }
    }

    /// Tagging with the purpose keeps login and reset codes for the same
    /// person apart.
    pub fn qualified(&self, purpose: CodePurpose) -> String {
        format!("{}:{}", purpose.as_str(), self.as_str())
    }
}

pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000))
}

fn code_mac(secret: &[u8], qualified_identifier: &str, code: &str) -> HmacSha256 {
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(qualified_identifier.as_bytes());
    mac.update(b"\n");
    mac.update(code.as_bytes());
    mac
}

pub fn hash_code(secret: &[u8], qualified_identifier: &str, code: &str) -> String {
    hex::encode(code_mac(secret, qualified_identifier, code).finalize().into_bytes())
}

/// Constant-time comparison against a stored hex digest.
pub fn code_matches(secret: &[u8], qualified_identifier: &str, code: &str, stored: &str) -> bool {
    match hex::decode(stored) {
        Ok(expected) => code_mac(secret, qualified_identifier, code)
            .verify_slice(&expected)
            .is_ok(),
        Err(_) => false,
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LoginCode {
    pub id: Uuid,
    pub identifier: String,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub attempts: i32,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Result of counting one attempt against the latest code row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// The attempt was counted; `attempts` includes it.
    Granted { attempts: i32 },
    /// Every attempt has already been spent.
    Exhausted,
    /// The row was consumed or expired in the meantime.
    Gone,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Assessment {
    Accept,
    Reject(AppErrorType),
}

/// Decides a guess whose attempt has already been reserved. The hash is only
/// compared for a granted reservation.
pub fn assess_attempt(
    reservation: Reservation,
    code_is_correct: impl FnOnce() -> bool,
    max_attempts: i32,
) -> Assessment {
    let attempts = match reservation {
        Reservation::Gone => return Assessment::Reject(AppErrorType::InvalidCode),
        Reservation::Exhausted => return Assessment::Reject(AppErrorType::TooManyAttempts),
        Reservation::Granted { attempts } if attempts > max_attempts => {
            return Assessment::Reject(AppErrorType::TooManyAttempts)
        }
        Reservation::Granted { attempts } => attempts,
    };
    if code_is_correct() {
        Assessment::Accept
    } else if attempts >= max_attempts {
        Assessment::Reject(AppErrorType::TooManyAttempts)
    } else {
        Assessment::Reject(AppErrorType::InvalidCode)
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CodeIssued {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_code: Option<String>,
}

/// Turn a delivery attempt into the response. A failed delivery only
/// degrades to echoing the code when `dev_echo` is on.
pub fn delivery_outcome(
    delivery: Result<(), AppError>,
    code: &str,
    dev_echo: bool,
) -> Result<CodeIssued, AppError> {
    match delivery {
        Ok(()) => Ok(CodeIssued { dev_code: None }),
        Err(e) if dev_echo => {
            tracing::warn!("Code delivery failed, echoing dev code: {}", e);
            Ok(CodeIssued {
                dev_code: Some(code.to_string()),
            })
        }
        Err(e) => Err(e),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RequestCodePayload {
    #[validate(length(min = 1, max = 254))]
    pub identifier: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyCodePayload {
    #[validate(length(min = 1, max = 254))]
    pub identifier: String,
    #[validate(length(equal = 6))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordPayload {
    #[validate(length(min = 1, max = 254))]
    pub identifier: String,
    #[validate(length(equal = 6))]
    pub code: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

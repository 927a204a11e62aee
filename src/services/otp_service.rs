//! One-time passcodes over SMS.

use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::OtpConfig;

const VERIFY_BASE_URL: &str = "https://verify.twilio.com/v2";

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("invalid OTP code")]
    Rejected,

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("verification provider error: {0}")]
    Provider(String),
}

/// Send/check pair offered by an SMS verification service.
#[automock]
#[async_trait]
pub trait VerificationProvider: Send + Sync {
    /// Starts a verification and returns the provider's status string.
    async fn send_code(&self, phone: &str) -> Result<String, OtpError>;

    /// `true` when the provider approved `code` for `phone`.
    async fn check_code(&self, phone: &str, code: &str) -> Result<bool, OtpError>;
}

/// Twilio Verify v2 client.
#[derive(Debug, Clone)]
pub struct TwilioVerify {
    config: OtpConfig,
    http: Client,
    base_url: String,
}

impl TwilioVerify {
    pub fn new(config: OtpConfig) -> Self {
        Self {
            config,
            http: Client::new(),
            base_url: VERIFY_BASE_URL.to_string(),
        }
    }

    async fn post(&self, endpoint: &str, form: &[(&str, &str)]) -> Result<String, OtpError> {
        let url = format!(
            "{}/Services/{}/{}",
            self.base_url, self.config.service_id, endpoint
        );

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(OtpError::Provider(format!(
                "{endpoint} failed with status {status}: {text}"
            )));
        }

        let parsed: VerificationResponse = response.json().await?;
        parsed
            .status
            .ok_or_else(|| OtpError::Provider("empty response status".into()))
    }
}

#[derive(Debug, Deserialize)]
struct VerificationResponse {
    status: Option<String>,
}

#[async_trait]
impl VerificationProvider for TwilioVerify {
    async fn send_code(&self, phone: &str) -> Result<String, OtpError> {
        self.post("Verifications", &[("To", phone), ("Channel", "sms")])
            .await
    }

    async fn check_code(&self, phone: &str, code: &str) -> Result<bool, OtpError> {
        let status = self
            .post("VerificationCheck", &[("To", phone), ("Code", code)])
            .await?;
        Ok(status == "approved")
    }
}

/// Prefixes `+` when missing, the provider expects E.164.
pub fn normalize_phone(phone: &str) -> String {
    let phone = phone.trim();
    if phone.starts_with('+') {
        phone.to_string()
    } else {
        format!("+{phone}")
    }
}

#[derive(Clone)]
pub struct OtpService {
    provider: Arc<dyn VerificationProvider>,
}

impl OtpService {
    pub fn new(provider: Arc<dyn VerificationProvider>) -> Self {
        Self { provider }
    }

    pub fn twilio(config: OtpConfig) -> Self {
        Self::new(Arc::new(TwilioVerify::new(config)))
    }

    pub async fn send(&self, phone: &str) -> Result<String, OtpError> {
        if phone.trim().is_empty() {
            return Err(OtpError::MissingField("phone"));
        }
        let phone = normalize_phone(phone);
        let status = self.provider.send_code(&phone).await?;
        tracing::info!(%status, "otp sent");
        Ok(status)
    }

    /// Returns the normalised phone number on success.
    pub async fn verify(&self, phone: &str, pin: &str) -> Result<String, OtpError> {
        if phone.trim().is_empty() {
            return Err(OtpError::MissingField("phone"));
        }
        if pin.trim().is_empty() {
            return Err(OtpError::MissingField("pin"));
        }
        let phone = normalize_phone(phone);
        if !self.provider.check_code(&phone, pin.trim()).await? {
            return Err(OtpError::Rejected);
        }
        Ok(phone)
    }
}

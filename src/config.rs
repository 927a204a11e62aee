use std::env;

use anyhow::{Context, bail};

/// Credentials for the SMS verification provider.
#[derive(Debug, Clone)]
pub struct OtpConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub service_id: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    /// `None` when no verification credentials are configured.
    pub otp: Option<OtpConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup, `from_env` passes the process env.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt_secret = lookup("JWT_SECRET").context("JWT_SECRET is not set")?;
        let host = lookup("APP_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = lookup("APP_PORT")
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let token_ttl_hours = lookup("TOKEN_TTL_HOURS")
            .and_then(|h| h.parse::<i64>().ok())
            .filter(|h| *h > 0)
            .unwrap_or(24);
        let otp = OtpConfig::from_lookup(&lookup)?;

        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            token_ttl_hours,
            otp,
        })
    }
}

impl OtpConfig {
    fn from_lookup<F>(lookup: &F) -> anyhow::Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let account_sid = lookup("TWILIO_ACCOUNT_SID").filter(|v| !v.is_empty());
        let auth_token = lookup("TWILIO_AUTHTOKEN").filter(|v| !v.is_empty());
        let service_id = lookup("TWILIO_SERVICES_ID").filter(|v| !v.is_empty());

        let (account_sid, auth_token, service_id) = match (account_sid, auth_token, service_id) {
            (None, None, None) => return Ok(None),
            (Some(a), Some(t), Some(s)) => (a, t, s),
            _ => bail!(
                "TWILIO_ACCOUNT_SID, TWILIO_AUTHTOKEN and TWILIO_SERVICES_ID must be set together"
            ),
        };

        if account_sid.len() < 34 || !account_sid.starts_with("AC") {
            bail!("invalid TWILIO_ACCOUNT_SID format");
        }
        if auth_token.len() < 32 {
            bail!("invalid TWILIO_AUTHTOKEN format");
        }
        if service_id.len() < 34 || !service_id.starts_with("VA") {
            bail!("invalid TWILIO_SERVICES_ID format");
        }

        Ok(Some(Self {
            account_sid,
            auth_token,
            service_id,
        }))
    }
}

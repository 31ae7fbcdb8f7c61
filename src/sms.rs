use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::AppConfig;
use crate::utils::phone::normalize_phone;

/// Outbound SMS provider seam. The production implementation talks to the
/// Twilio REST API; tests substitute a recording fake.
#[async_trait]
pub trait SmsGateway: Send + Sync + 'static {
    async fn send(&self, to: &str, from: &str, body: &str) -> Result<SmsDelivery>;
}

#[derive(Debug, Clone)]
pub struct SmsDelivery {
    pub provider_sid: String,
}

/// Gateway handle plus the sending number, threaded through `AppState`.
#[derive(Clone)]
pub struct SmsSender {
    pub gateway: Arc<dyn SmsGateway>,
    pub from_phone: String,
}

impl SmsSender {
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        let account_sid = config.twilio_account_sid.clone()?;
        let auth_token = config.twilio_auth_token.clone()?;
        let from_phone = config.twilio_phone_number.clone()?;

        Some(Self {
            gateway: Arc::new(TwilioGateway::new(account_sid, auth_token)),
            from_phone,
        })
    }
}

pub struct TwilioGateway {
    http: reqwest::Client,
    account_sid: String,
    auth_token: String,
}

impl TwilioGateway {
    pub fn new(account_sid: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
        }
    }
}

#[derive(Deserialize)]
struct TwilioMessageResponse {
    sid: String,
}

#[derive(Deserialize)]
struct TwilioErrorResponse {
    message: Option<String>,
}

#[async_trait]
impl SmsGateway for TwilioGateway {
    async fn send(&self, to: &str, from: &str, body: &str) -> Result<SmsDelivery> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );

        let params = [
            ("To", format_e164(to)),
            ("From", format_e164(from)),
            ("Body", body.to_string()),
        ];

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .context("failed to reach SMS gateway")?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<TwilioErrorResponse>()
                .await
                .ok()
                .and_then(|err| err.message)
                .unwrap_or_else(|| format!("SMS gateway returned {status}"));
            return Err(anyhow!(message));
        }

        let parsed: TwilioMessageResponse = response
            .json()
            .await
            .context("failed to parse SMS gateway response")?;

        Ok(SmsDelivery {
            provider_sid: parsed.sid,
        })
    }
}

/// Formats a phone number for the gateway (E.164). Ten-digit numbers are
/// assumed to be US.
pub fn format_e164(phone: &str) -> String {
    if phone.starts_with('+') {
        return phone.to_string();
    }

    let digits = normalize_phone(phone);
    if digits.len() == 11 && digits.starts_with('1') {
        return format!("+{digits}");
    }

    format!("+1{digits}")
}

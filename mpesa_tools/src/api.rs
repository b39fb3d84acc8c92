use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, Utc};
use donate_common::Secret;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;

use crate::{
    config::MpesaConfig,
    data_objects::{AccessToken, DarajaErrorResponse, StkPushParams, StkPushRequest, StkPushResponse},
    helpers::{basic_auth_header, daraja_timestamp, stk_password},
    MpesaApiError,
    StkQueryRequest,
    StkQueryResponse,
};

/// Tokens are refreshed this long before Daraja says they expire.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;
const REQUEST_TIMEOUT_SECS: u64 = 30;
const ACCOUNT_REFERENCE_MAX_LEN: usize = 12;
const TRANSACTION_DESC_MAX_LEN: usize = 13;

#[derive(Clone)]
struct CachedToken {
    token: Secret<String>,
    expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct MpesaApi {
    config: MpesaConfig,
    client: Arc<Client>,
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl MpesaApi {
    pub fn new(config: MpesaConfig) -> Result<Self, MpesaApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(StdDuration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| MpesaApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), token: Arc::new(Mutex::new(None)) })
    }

    pub fn config(&self) -> &MpesaConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url())
    }

    /// Requests a brand-new OAuth token, bypassing the cache.
    pub async fn fetch_access_token(&self) -> Result<AccessToken, MpesaApiError> {
        let url = self.url("/oauth/v1/generate");
        let auth = basic_auth_header(self.config.consumer_key.reveal(), self.config.consumer_secret.reveal());
        trace!("📲️ Requesting OAuth token from {url}");
        let response = self
            .client
            .get(url)
            .query(&[("grant_type", "client_credentials")])
            .header(AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| MpesaApiError::Authentication(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            warn!("📲️ OAuth request failed with status {status}. {message}");
            return Err(MpesaApiError::Authentication(format!("status {status}. {message}")));
        }
        response.json::<AccessToken>().await.map_err(|e| MpesaApiError::Authentication(e.to_string()))
    }

    /// Returns a bearer token, reusing the cached one until shortly before it expires.
    pub async fn access_token(&self) -> Result<Secret<String>, MpesaApiError> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();
        if let Some(t) = cached.as_ref() {
            if t.expires_at - Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) > now {
                trace!("📲️ Using cached OAuth token");
                return Ok(t.token.clone());
            }
        }
        let fresh = self.fetch_access_token().await?;
        debug!("📲️ Obtained new OAuth token, valid for {}s", fresh.expires_in);
        let token = CachedToken { expires_at: fresh.expires_at(now), token: Secret::new(fresh.access_token) };
        *cached = Some(token.clone());
        Ok(token.token)
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, MpesaApiError> {
        let url = self.url(path);
        let token = self.access_token().await?;
        trace!("📲️ Sending REST query: {url}");
        let mut req = self.client.request(method, url).bearer_auth(token.reveal());
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| MpesaApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("📲️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| MpesaApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| MpesaApiError::RestResponseError(e.to_string()))?;
            match serde_json::from_str::<DarajaErrorResponse>(&message) {
                Ok(err) => Err(MpesaApiError::Rejected { code: err.error_code, message: err.error_message }),
                Err(_) => Err(MpesaApiError::QueryError { status, message }),
            }
        }
    }

    /// Asks Safaricom to prompt the customer's phone for payment.
    pub async fn stk_push(&self, params: &StkPushParams) -> Result<StkPushResponse, MpesaApiError> {
        let timestamp = daraja_timestamp(Utc::now());
        let shortcode = self.config.shortcode.clone();
        let request = StkPushRequest {
            password: stk_password(&shortcode, self.config.passkey.reveal(), &timestamp),
            timestamp,
            transaction_type: "CustomerPayBillOnline".to_string(),
            amount: params.amount.value(),
            party_a: params.phone.to_string(),
            party_b: shortcode.clone(),
            phone_number: params.phone.to_string(),
            call_back_url: self.config.callback_url.clone(),
            account_reference: truncate(&params.account_reference, ACCOUNT_REFERENCE_MAX_LEN),
            transaction_desc: truncate(&params.description, TRANSACTION_DESC_MAX_LEN),
            business_short_code: shortcode,
        };
        debug!("📲️ Sending STK push of {} to {}", params.amount, params.phone.masked());
        let response =
            self.rest_query::<StkPushResponse, _>(Method::POST, "/mpesa/stkpush/v1/processrequest", Some(request)).await?;
        info!(
            "📲️ STK push response {} for checkout {}: {}",
            response.response_code, response.checkout_request_id, response.response_description
        );
        Ok(response)
    }

    /// Asks Safaricom for the outcome of an earlier STK push.
    pub async fn stk_query(&self, checkout_request_id: &str) -> Result<StkQueryResponse, MpesaApiError> {
        let timestamp = daraja_timestamp(Utc::now());
        let request = StkQueryRequest {
            business_short_code: self.config.shortcode.clone(),
            password: stk_password(&self.config.shortcode, self.config.passkey.reveal(), &timestamp),
            timestamp,
            checkout_request_id: checkout_request_id.to_string(),
        };
        debug!("📲️ Querying STK push status for {checkout_request_id}");
        let response =
            self.rest_query::<StkQueryResponse, _>(Method::POST, "/mpesa/stkpushquery/v1/query", Some(request)).await?;
        debug!("📲️ STK query for {checkout_request_id}: {} {}", response.result_code, response.result_desc);
        Ok(response)
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

use crate::api::API;
use crate::errors::{BinanceContentError, BinanceError, Result};
use crate::retry::with_retry;
use crate::util::{build_request, get_timestamp};
use hex::encode as hex_encode;
use hmac::{Hmac, Mac};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT},
    Client as ReqwestClient, Method, Response as ReqwestResponse, StatusCode,
};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use std::collections::BTreeMap;

/// Signed REST client. Every request passes through the retry kernel, so the
/// managers above never see a transient failure that still has tries left.
#[derive(Clone)]
pub struct Client {
    api_key: String,
    secret_key: String,
    host: String,
    inner_client: ReqwestClient,
}

impl Client {
    pub fn new(api_key: Option<String>, secret_key: Option<String>, host: String) -> Self {
        Client {
            api_key: api_key.unwrap_or_default(),
            secret_key: secret_key.unwrap_or_default(),
            host,
            inner_client: ReqwestClient::builder()
                .pool_idle_timeout(None)
                .timeout(std::time::Duration::from_secs(20))
                .build()
                .expect("reqwest client"),
        }
    }

    /// Makes an unsigned HTTP GET request to a public endpoint.
    pub async fn get<T: DeserializeOwned + Send + 'static>(
        &self,
        endpoint: API,
        request: Option<String>,
    ) -> Result<T> {
        let mut url: String = format!("{}{}", self.host, endpoint.as_ref());
        if let Some(request) = request {
            if !request.is_empty() {
                url.push_str(&format!("?{}", request));
            }
        }
        with_retry(|| async {
            let response = self.inner_client.get(url.as_str()).send().await?;
            self.handler(response).await
        })
        .await
    }

    /// Makes a signed HTTP GET request to the specified endpoint.
    pub async fn get_signed<T: DeserializeOwned + Send + 'static>(
        &self,
        endpoint: API,
        recv_window: u64,
        parameters: BTreeMap<String, String>,
    ) -> Result<T> {
        self.signed_request(Method::GET, endpoint, recv_window, parameters)
            .await
    }

    /// Makes a signed HTTP POST request. Binance accepts order parameters in
    /// the query string, so the body stays empty.
    pub async fn post_signed<T: DeserializeOwned + Send + 'static>(
        &self,
        endpoint: API,
        recv_window: u64,
        parameters: BTreeMap<String, String>,
    ) -> Result<T> {
        self.signed_request(Method::POST, endpoint, recv_window, parameters)
            .await
    }

    /// Makes a signed HTTP DELETE request (order and order-list cancels).
    pub async fn delete_signed<T: DeserializeOwned + Send + 'static>(
        &self,
        endpoint: API,
        recv_window: u64,
        parameters: BTreeMap<String, String>,
    ) -> Result<T> {
        self.signed_request(Method::DELETE, endpoint, recv_window, parameters)
            .await
    }

    async fn signed_request<T: DeserializeOwned + Send + 'static>(
        &self,
        method: Method,
        endpoint: API,
        recv_window: u64,
        parameters: BTreeMap<String, String>,
    ) -> Result<T> {
        let headers = self.build_headers()?;
        with_retry(|| async {
            // Timestamp and signature are rebuilt per attempt so a retry
            // never replays a request outside its recv window.
            let query = self.sign_request(recv_window, &parameters);
            let url = format!("{}{}?{}", self.host, endpoint.as_ref(), query);
            let response = self
                .inner_client
                .request(method.clone(), url.as_str())
                .headers(headers.clone())
                .send()
                .await?;
            self.handler(response).await
        })
        .await
    }

    fn build_headers(&self) -> Result<HeaderMap> {
        let mut custom_headers = HeaderMap::new();
        custom_headers.insert(USER_AGENT, HeaderValue::from_static("pivot-trader"));
        custom_headers.insert(
            HeaderName::from_static("x-mbx-apikey"),
            HeaderValue::from_str(&self.api_key)?,
        );
        custom_headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        Ok(custom_headers)
    }

    fn sign_request(&self, recv_window: u64, parameters: &BTreeMap<String, String>) -> String {
        let mut parameters = parameters.clone();
        if recv_window > 0 {
            parameters.insert("recvWindow".into(), recv_window.to_string());
        }
        parameters.insert("timestamp".into(), get_timestamp().to_string());
        let query = build_request(&parameters);
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(query.as_bytes());
        let signature = hex_encode(mac.finalize().into_bytes());
        format!("{}&signature={}", query, signature)
    }

    async fn handler<T: DeserializeOwned + Send + 'static>(
        &self,
        response: ReqwestResponse,
    ) -> Result<T> {
        let status = response.status();
        if status == StatusCode::OK {
            return Ok(response.json::<T>().await.map_err(BinanceError::from)?);
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
            // 418 is the exchange's auto-ban escalation of 429.
            return Err(BinanceError::RateLimit(body));
        }
        if status.is_server_error() {
            return Err(BinanceError::Network(format!("{status}: {body}")));
        }
        match serde_json::from_str::<BinanceContentError>(&body) {
            Ok(content) => Err(BinanceError::from_content(content)),
            Err(_) => Err(BinanceError::Unexpected(format!("{status}: {body}"))),
        }
    }
}

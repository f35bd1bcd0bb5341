//! Shared authenticated-request plumbing for the Sink adapter: every call
//! carries digest auth plus the literal `X-Requested-Auth: Digest` header
//! (§4.3).

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;

use super::digest::{DigestAuth, REQUESTED_AUTH_HEADER, REQUESTED_AUTH_VALUE};
use super::error::{SinkError, SinkResult};

pub struct AuthedHttp {
    pub client: Client,
    pub base_url: String,
    auth: DigestAuth,
}

impl AuthedHttp {
    pub fn new(client: Client, base_url: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into(), auth: DigestAuth::new(user, password) }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn authenticated(&self, method: Method, path: &str) -> SinkResult<RequestBuilder> {
        let url = self.url(path);
        let authorization = self.auth.authorization_for(&self.client, method.as_str(), &url, path).await?;
        Ok(self
            .client
            .request(method, &url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .header(REQUESTED_AUTH_HEADER, REQUESTED_AUTH_VALUE))
    }

    pub async fn get(&self, path: &str) -> SinkResult<reqwest::Response> {
        let request = self.authenticated(Method::GET, path).await?;
        Ok(request.send().await?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> SinkResult<T> {
        let response = self.get(path).await?;
        check_status(&response)?;
        Ok(response.json::<T>().await?)
    }

    pub async fn get_text(&self, path: &str) -> SinkResult<String> {
        let response = self.get(path).await?;
        check_status(&response)?;
        Ok(response.text().await?)
    }

    pub async fn post_builder(&self, path: &str) -> SinkResult<RequestBuilder> {
        self.authenticated(Method::POST, path).await
    }

    pub async fn put_builder(&self, path: &str) -> SinkResult<RequestBuilder> {
        self.authenticated(Method::PUT, path).await
    }
}

fn check_status(response: &reqwest::Response) -> SinkResult<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(SinkError::OpencastError(format!("{} returned {}", response.url(), response.status())))
    }
}

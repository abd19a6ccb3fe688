use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Thin PostgREST client. Every table in the clinic schema is reached through `/rest/v1/<table>`.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", error_text),
                404 => anyhow!("Resource not found: {}", error_text),
                409 => anyhow!("Conflict: {}", error_text),
                _ => anyhow!("API error ({}): {}", status, error_text),
            });
        }

        // PostgREST answers 204 with an empty body for writes without `return=representation`.
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(serde_json::from_value(Value::Array(vec![]))?);
        }

        let data = serde_json::from_slice::<T>(&bytes)?;
        Ok(data)
    }

    /// Select rows and decode them.
    pub async fn select<T>(&self, path: &str, auth_token: &str) -> Result<Vec<T>>
    where T: DeserializeOwned {
        let rows: Vec<Value> = self.request(Method::GET, path, Some(auth_token), None).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(Into::into))
            .collect()
    }

    /// Select the first matching row, if any.
    pub async fn select_one<T>(&self, path: &str, auth_token: &str) -> Result<Option<T>>
    where T: DeserializeOwned {
        let mut rows = self.select::<T>(path, auth_token).await?;
        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows.remove(0)))
        }
    }

    /// Insert a row and return the stored representation.
    pub async fn insert<T>(&self, table: &str, auth_token: &str, body: Value) -> Result<T>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/{}", table);
        let rows: Vec<Value> = self.request_with_headers(
            Method::POST,
            &path,
            Some(auth_token),
            Some(body),
            Some(Self::representation_headers()),
        ).await?;

        let row = rows.into_iter().next()
            .ok_or_else(|| anyhow!("Insert into {} returned no rows", table))?;
        Ok(serde_json::from_value(row)?)
    }

    /// Patch rows matching `filter` (a PostgREST query string such as `id=eq.<id>`).
    pub async fn update<T>(&self, table: &str, filter: &str, auth_token: &str, body: Value) -> Result<Vec<T>>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/{}?{}", table, filter);
        let rows: Vec<Value> = self.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(body),
            Some(Self::representation_headers()),
        ).await?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(Into::into))
            .collect()
    }

    pub async fn delete(&self, table: &str, filter: &str, auth_token: &str) -> Result<()> {
        let path = format!("/rest/v1/{}?{}", table, filter);
        let _: Value = self.request(Method::DELETE, &path, Some(auth_token), None).await?;
        Ok(())
    }

    pub fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_utils::test_utils::TestConfig;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(url: &str) -> AppConfig {
        let mut config = TestConfig::with_mock_server(url).to_app_config();
        config.supabase_anon_key = "anon".to_string();
        config
    }

    #[tokio::test]
    async fn insert_returns_first_row() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/specialties"))
            .and(header("Prefer", "return=representation"))
            .and(header("apikey", "anon"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{"id": 7, "name": "Pneumologia"}])))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config_for(&server.uri()));
        let row: Value = client
            .insert("specialties", "token", json!({"name": "Pneumologia"}))
            .await
            .unwrap();

        assert_eq!(row["id"], 7);
    }

    #[tokio::test]
    async fn maps_not_found_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config_for(&server.uri()));
        let err = client.select::<Value>("/rest/v1/doctors", "token").await.unwrap_err();
        assert!(err.to_string().contains("Resource not found"));
    }

    #[tokio::test]
    async fn empty_body_decodes_as_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config_for(&server.uri()));
        client.delete("working_hours", "id=eq.1", "token").await.unwrap();
    }
}

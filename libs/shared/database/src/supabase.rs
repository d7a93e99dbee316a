use async_trait::async_trait;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::error::DatabaseError;
use crate::store::{DocumentStore, Filter};

/// PostgREST-backed store. Uniqueness guarantees come from the indexes in
/// `migrations/`; a violated index surfaces as HTTP 409.
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

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, DatabaseError> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.anon_key)
                .map_err(|_| DatabaseError::Auth("Invalid anon key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let bearer = auth_token.unwrap_or(&self.anon_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", bearer))
                .map_err(|_| DatabaseError::Auth("Invalid bearer token".to_string()))?,
        );

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T, DatabaseError>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut req = self.client.request(method, &url)
            .headers(self.get_headers(auth_token)?);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, error_text);

            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DatabaseError::Auth(error_text),
                StatusCode::NOT_FOUND => DatabaseError::NotFound(error_text),
                StatusCode::CONFLICT => DatabaseError::UniqueViolation(error_text),
                _ => DatabaseError::Request(format!("{}: {}", status, error_text)),
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    fn table_path(collection: &str, filters: &[Filter]) -> String {
        if filters.is_empty() {
            return format!("/rest/v1/{}", collection);
        }

        let query = filters.iter().map(Filter::to_query).collect::<Vec<_>>().join("&");
        format!("/rest/v1/{}?{}", collection, query)
    }
}

#[async_trait]
impl DocumentStore for SupabaseClient {
    async fn find(
        &self,
        collection: &str,
        filters: &[Filter],
        auth_token: Option<&str>,
    ) -> Result<Vec<Value>, DatabaseError> {
        let path = Self::table_path(collection, filters);
        self.request(Method::GET, &path, auth_token, None).await
    }

    async fn insert(
        &self,
        collection: &str,
        document: Value,
        auth_token: Option<&str>,
    ) -> Result<Value, DatabaseError> {
        let path = Self::table_path(collection, &[]);
        let mut rows: Vec<Value> = self
            .request(Method::POST, &path, auth_token, Some(document))
            .await?;

        if rows.is_empty() {
            return Err(DatabaseError::Request(format!("insert into {} returned no rows", collection)));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        changes: Value,
        auth_token: Option<&str>,
    ) -> Result<Value, DatabaseError> {
        let path = Self::table_path(collection, &[Filter::eq("id", id)]);
        let mut rows: Vec<Value> = self
            .request(Method::PATCH, &path, auth_token, Some(changes))
            .await?;

        if rows.is_empty() {
            return Err(DatabaseError::NotFound(format!("{} {}", collection, id)));
        }
        Ok(rows.swap_remove(0))
    }

    async fn delete(
        &self,
        collection: &str,
        id: &str,
        auth_token: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let path = Self::table_path(collection, &[Filter::eq("id", id)]);
        let rows: Vec<Value> = self.request(Method::DELETE, &path, auth_token, None).await?;

        if rows.is_empty() {
            return Err(DatabaseError::NotFound(format!("{} {}", collection, id)));
        }
        Ok(())
    }
}

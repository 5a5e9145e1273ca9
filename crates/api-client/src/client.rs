//! HTTP client for the CRM backend.
//! Reads go through the shared `RequestCache`; writes always hit the network.

use std::sync::Arc;
use std::time::Duration;

use crm_cache::{HttpMethod, RequestCache};
use crm_core::config::{ApiConfig, AppConfig};
use crm_core::types::*;
use crm_core::{CrmError, CrmResult};
use crm_segmentation::{serialize_group, RuleGroup};
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

pub struct CrmClient {
    http: reqwest::Client,
    base_url: String,
    cache: Arc<RequestCache<Value>>,
}

impl CrmClient {
    pub fn new(config: &ApiConfig, cache: Arc<RequestCache<Value>>) -> CrmResult<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| CrmError::Config(format!("invalid base_url '{base_url}': {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| CrmError::Config(e.to_string()))?;

        info!(base_url = %base_url, "CRM client ready");
        Ok(Self {
            http,
            base_url,
            cache,
        })
    }

    pub fn from_config(config: &AppConfig) -> CrmResult<Self> {
        let cache = Arc::new(RequestCache::from_config(&config.cache));
        Self::new(&config.api, cache)
    }

    pub fn cache(&self) -> &Arc<RequestCache<Value>> {
        &self.cache
    }

    /// Absolute `http(s)://` paths are used verbatim; anything else is
    /// appended to the base URL.
    pub fn resolve(&self, path: &str) -> CrmResult<Url> {
        let lower = path.to_ascii_lowercase();
        let full = if lower.starts_with("http://") || lower.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        };
        Url::parse(&full).map_err(|e| CrmError::Validation(format!("invalid URL '{full}': {e}")))
    }

    fn resolve_with_query(&self, path: &str, query: &[(&str, String)]) -> CrmResult<Url> {
        let mut url = self.resolve(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    // ─── Transport ──────────────────────────────────────────────────────────

    /// A body that does not decode as `T` fails the fetch, so it is never
    /// cached.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> CrmResult<T> {
        let fetch_url = url.clone();
        let value = self
            .cache
            .fetch_with_cache(Some(HttpMethod::Get), url.as_str(), move || async move {
                let value = self
                    .send(reqwest::Method::GET, fetch_url, None::<&()>)
                    .await?;
                if let Err(e) = <T as Deserialize>::deserialize(&value) {
                    debug!(error = %e, "Discarding undecodable response");
                    return Err(CrmError::Serialization(e));
                }
                Ok(value)
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn post_json<B, T>(&self, url: Url, body: Option<&B>) -> CrmResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let value = self
            .cache
            .fetch_with_cache(Some(HttpMethod::Post), url.as_str(), || {
                self.send(reqwest::Method::POST, url.clone(), body)
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn send<B>(&self, method: reqwest::Method, url: Url, body: Option<&B>) -> CrmResult<Value>
    where
        B: Serialize + ?Sized,
    {
        debug!(method = %method, url = %url, "Calling CRM backend");
        let mut request = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CrmError::Fetch(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "CRM backend returned an error");
            return Err(CrmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CrmError::Fetch(e.to_string()))?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    // ─── Session ────────────────────────────────────────────────────────────

    pub async fn health(&self) -> CrmResult<Health> {
        self.get_json(self.resolve("/api/public/health")?).await
    }

    pub async fn me(&self) -> CrmResult<Me> {
        self.get_json(self.resolve("/api/me")?).await
    }

    // ─── Customers & orders ─────────────────────────────────────────────────

    pub async fn list_customers(&self, search: Option<&str>) -> CrmResult<Vec<Customer>> {
        let query: Vec<(&str, String)> = search
            .filter(|q| !q.is_empty())
            .map(|q| vec![("search", q.to_string())])
            .unwrap_or_default();
        self.get_json(self.resolve_with_query("/api/customers", &query)?)
            .await
    }

    pub async fn create_customer(&self, customer: &NewCustomer) -> CrmResult<Customer> {
        self.post_json(self.resolve("/api/customers")?, Some(customer))
            .await
    }

    pub async fn list_orders(&self, customer_id: Option<i64>) -> CrmResult<Vec<OrderRow>> {
        let query: Vec<(&str, String)> = customer_id
            .map(|id| vec![("customerId", id.to_string())])
            .unwrap_or_default();
        self.get_json(self.resolve_with_query("/api/orders", &query)?)
            .await
    }

    pub async fn create_order(&self, order: &NewOrder) -> CrmResult<CreatedOrder> {
        self.post_json(self.resolve("/api/orders")?, Some(order)).await
    }

    // ─── Segments ───────────────────────────────────────────────────────────

    pub async fn list_segments(&self) -> CrmResult<Vec<Segment>> {
        self.get_json(self.resolve("/api/segments")?).await
    }

    pub async fn create_segment(&self, name: &str, criteria: &RuleGroup) -> CrmResult<Segment> {
        let body = NewSegment {
            name: name.to_string(),
            rule_json: serialize_group(criteria)?,
        };
        self.post_json(self.resolve("/api/segments")?, Some(&body))
            .await
    }

    /// Ask the backend how many customers currently match `criteria`.
    pub async fn preview_segment(&self, criteria: &RuleGroup) -> CrmResult<AudiencePreview> {
        let body = PreviewRequest {
            rule_json: serialize_group(criteria)?,
        };
        self.post_json(self.resolve("/api/segments/preview")?, Some(&body))
            .await
    }

    pub async fn segment_size(&self, segment_id: i64) -> CrmResult<SegmentSize> {
        self.get_json(self.resolve(&format!("/api/segments/{segment_id}/preview-size"))?)
            .await
    }

    // ─── Campaigns ──────────────────────────────────────────────────────────

    pub async fn list_campaigns(&self) -> CrmResult<Vec<Campaign>> {
        self.get_json(self.resolve("/api/campaigns")?).await
    }

    pub async fn create_campaign(&self, campaign: &NewCampaign) -> CrmResult<Campaign> {
        self.post_json(self.resolve("/api/campaigns")?, Some(campaign))
            .await
    }

    pub async fn campaign_stats(&self, campaign_id: i64) -> CrmResult<CampaignStats> {
        self.get_json(self.resolve(&format!("/api/campaigns/{campaign_id}/stats"))?)
            .await
    }

    pub async fn campaign_logs(&self, campaign_id: i64) -> CrmResult<Vec<CampaignLogEntry>> {
        self.get_json(self.resolve(&format!("/api/campaigns/{campaign_id}/logs"))?)
            .await
    }

    /// Push the campaign's pending messages through the vendor simulator.
    pub async fn send_campaign(&self, campaign_id: i64) -> CrmResult<SendSummary> {
        self.post_json(
            self.resolve(&format!("/api/vendor/send/{campaign_id}"))?,
            None::<&()>,
        )
        .await
    }

    pub async fn suggest_messages(&self, objective: &str) -> CrmResult<Vec<String>> {
        let body = SuggestRequest {
            objective: objective.to_string(),
        };
        let suggestions: Suggestions = self
            .post_json(self.resolve("/api/ai/suggest-messages")?, Some(&body))
            .await?;
        Ok(suggestions.suggestions)
    }

    // ─── Dashboard ──────────────────────────────────────────────────────────

    pub async fn dashboard_stats(&self) -> CrmResult<DashboardStats> {
        self.get_json(self.resolve("/api/dashboard/stats")?).await
    }
}

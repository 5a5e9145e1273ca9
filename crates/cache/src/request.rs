//! Memoized request execution. Only `GET` reads are cached; any other method
//! goes straight to the caller's fetch.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use crm_core::CrmError;
use tracing::debug;

use crate::local::RequestCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn is_cacheable(&self) -> bool {
        matches!(self, HttpMethod::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = CrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(CrmError::Validation(format!("unsupported HTTP method '{other}'"))),
        }
    }
}

/// Cache key for a request: `"<METHOD>:<url>"`, method defaulting to `GET`.
pub fn build_key(method: Option<HttpMethod>, url: &str) -> String {
    format!("{}:{url}", method.unwrap_or_default())
}

impl<V: Clone> RequestCache<V> {
    /// Serve a `GET` from the cache when fresh, otherwise run `perform_fetch`
    /// and remember its result. Failures propagate untouched and leave the
    /// cache as it was. Concurrent misses on one key each fetch; the last to
    /// finish wins the slot.
    pub async fn fetch_with_cache<F, Fut, E>(
        &self,
        method: Option<HttpMethod>,
        url: &str,
        perform_fetch: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let method = method.unwrap_or_default();
        if !method.is_cacheable() {
            metrics::counter!("crm.cache.bypass").increment(1);
            debug!(method = %method, url = url, "Bypassing request cache");
            return perform_fetch().await;
        }

        let key = build_key(Some(method), url);
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let value = perform_fetch().await?;
        self.put(key, value.clone());
        Ok(value)
    }
}

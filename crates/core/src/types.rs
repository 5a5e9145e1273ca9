//! Request and response bodies exchanged with the CRM backend.
//!
//! The backend speaks camelCase JSON and emits local ISO date-times, so every
//! timestamp here is a `NaiveDateTime`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ─── Customers ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub total_visits: Option<i64>,
    #[serde(default)]
    pub total_spend: Option<f64>,
    #[serde(default)]
    pub last_active_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
}

// ─── Orders ─────────────────────────────────────────────────────────────────

/// Flattened order row as returned by `GET /api/orders`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderRow {
    pub id: i64,
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    pub amount: f64,
    #[serde(default)]
    pub date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub customer_id: i64,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrder {
    pub id: i64,
    pub amount: f64,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

// ─── Segments ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: i64,
    pub name: String,
    /// Serialized rule tree, stored verbatim by the backend.
    #[serde(default)]
    pub rule_json: Option<String>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewSegment {
    pub name: String,
    pub rule_json: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub rule_json: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AudiencePreview {
    pub audience_size: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SegmentSize {
    pub segment_id: i64,
    pub audience_size: u64,
}

// ─── Campaigns ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: i64,
    pub name: String,
    pub message: String,
    #[serde(default)]
    pub segment: Option<Segment>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewCampaign {
    pub segment_id: i64,
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CampaignStats {
    pub total: u64,
    pub sent: u64,
    pub failed: u64,
}

/// Outcome of pushing a campaign's pending messages through the vendor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SendSummary {
    #[serde(default)]
    pub campaign_id: Option<i64>,
    pub sent: u64,
    pub failed: u64,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeliveryStatus {
    Sent,
    Failed,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignLogEntry {
    pub id: i64,
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    pub status: DeliveryStatus,
    #[serde(default)]
    pub vendor_message_id: Option<String>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
}

// ─── AI suggestions ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuggestRequest {
    pub objective: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Suggestions {
    #[serde(default)]
    pub suggestions: Vec<String>,
}

// ─── Dashboard / session ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_customers: u64,
    pub total_orders: u64,
    pub total_campaigns: u64,
    #[serde(default)]
    pub total_income: Option<f64>,
    #[serde(default)]
    pub last_campaign: Option<LastCampaign>,
}

/// The backend sends `{}` when no campaign exists yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LastCampaign {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sent: Option<u64>,
    #[serde(default)]
    pub failed: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
}

impl LastCampaign {
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub auth_enabled: bool,
    #[serde(default)]
    pub frontend_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Me {
    pub name: String,
}

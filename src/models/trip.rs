use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

pub const DETAIL_SUCCESS: &str = "SUCCESS";
pub const DETAIL_FAILED: &str = "FAILED";

/// A trip as the API sends it. Scalar fields the API sometimes sends as
/// `null` read as their default, so one sparse record never sinks the list.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: i64,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub operator_id: i64,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub user_cpan: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub amount: f64,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub status: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tap_in_at: Option<String>,
    #[serde(default)]
    pub tap_out_at: Option<String>,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub trip_details: Vec<TripDetail>,
    /// Undeclared fallback amount some payloads carry; only used for sorting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saldo_potong_normal: Option<f64>,
}

impl Trip {
    /// First detail of the given tap type, in payload order.
    pub fn detail(&self, kind: TapType) -> Option<&TripDetail> {
        self.trip_details.iter().find(|detail| detail.kind == kind)
    }

    pub fn tap_in(&self) -> Option<&TripDetail> {
        self.detail(TapType::TapIn)
    }

    pub fn tap_out(&self) -> Option<&TripDetail> {
        self.detail(TapType::TapOut)
    }

    pub fn final_amount(&self) -> f64 {
        self.amount
    }

    /// Tap-out charge when one was recorded, otherwise the fallback amount.
    /// A zero tap-out amount counts as "not recorded".
    pub fn charged_amount(&self) -> Option<f64> {
        match self.tap_out().map(|detail| detail.amount) {
            Some(amount) if amount != 0.0 => Some(amount),
            _ => self.saldo_potong_normal,
        }
    }

    pub fn masked_cpan(&self) -> String {
        let chars: Vec<char> = self.user_cpan.chars().collect();
        let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
        format!("***{tail}")
    }

    /// Stuck trips: entry charged, exit charge failed.
    pub fn can_force_payment(&self) -> bool {
        self.tap_in().is_some_and(|d| d.status == DETAIL_SUCCESS)
            && self.tap_out().is_some_and(|d| d.status == DETAIL_FAILED)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum TapType {
    #[serde(rename = "TAP_IN")]
    TapIn,
    #[serde(rename = "TAP_OUT")]
    TapOut,
    #[default]
    #[serde(other)]
    Unknown,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripDetail {
    pub id: i64,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub trip_id: i64,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub group_id: i64,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub device_id: i64,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "type", default)]
    pub kind: TapType,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub amount: f64,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub status: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub qr_content: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        rename = "CreatedAt",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at_upper: Option<DateTime<Utc>>,
    #[serde(default)]
    pub group: Option<TripGroup>,
}

impl TripDetail {
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        self.created_at_upper.or(self.created_at)
    }

    /// Where the tap happened: stop id, else vehicle body code, else stop name.
    pub fn location_label(&self) -> String {
        let Some(group) = &self.group else {
            return String::new();
        };
        if group.halte_id != 0 {
            return group.halte_id.to_string();
        }
        if group.fleet_id != 0 {
            return group
                .fleet
                .as_ref()
                .map(|fleet| fleet.body_code.clone())
                .unwrap_or_default();
        }
        group
            .halte
            .as_ref()
            .map(|halte| halte.name.clone())
            .unwrap_or_default()
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TripGroup {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub halte_id: i64,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub fleet_id: i64,
    #[serde(default)]
    pub halte: Option<Halte>,
    #[serde(default)]
    pub fleet: Option<Fleet>,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Halte {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub name: String,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Fleet {
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub body_code: String,
}

/// `{ "data": [...] }` as returned by the trips endpoint.
#[derive(Debug, Deserialize)]
pub struct TripsEnvelope {
    #[serde(default)]
    pub data: Option<Vec<Trip>>,
}

impl TripsEnvelope {
    pub fn into_trips(self) -> Vec<Trip> {
        self.data.unwrap_or_default()
    }
}

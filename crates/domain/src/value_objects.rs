//! Value objects shared by purchases and print orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(Uuid);

impl CustomerId {
    /// Creates a new random customer ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a customer ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CustomerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CustomerId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<CustomerId> for Uuid {
    fn from(id: CustomerId) -> Self {
        id.0
    }
}

/// Money amount represented in minor currency units to avoid floating point
/// issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in minor units (e.g., 1500 = $15.00).
    minor_units: i64,
}

impl Money {
    /// Creates a new Money amount from minor units.
    pub fn from_minor_units(minor_units: i64) -> Self {
        Self { minor_units }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { minor_units: 0 }
    }

    /// Returns the amount in minor units.
    pub fn minor_units(&self) -> i64 {
        self.minor_units
    }

    /// Returns the major-unit portion (whole number).
    pub fn major_units(&self) -> i64 {
        self.minor_units / 100
    }

    /// Returns the minor-unit remainder after major units.
    pub fn minor_part(&self) -> i64 {
        self.minor_units.abs() % 100
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.minor_units > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.minor_units == 0
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.minor_units < 0 {
            write!(f, "-{}.{:02}", self.major_units().abs(), self.minor_part())
        } else {
            write!(f, "{}.{:02}", self.major_units(), self.minor_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            minor_units: self.minor_units + rhs.minor_units,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.minor_units += rhs.minor_units;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// Print customization options captured at checkout for a print purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintCustomization {
    /// Physical book size code (e.g., "A5-portrait").
    pub book_size: String,

    /// Optional text printed on the spine.
    pub spine_text: Option<String>,
}

impl PrintCustomization {
    /// Creates a customization with the given book size and no spine text.
    pub fn with_book_size(book_size: impl Into<String>) -> Self {
        Self {
            book_size: book_size.into(),
            spine_text: None,
        }
    }
}

/// Shipment tracking fields populated opportunistically from fulfiller
/// webhooks. None of these fields gate a state transition.
///
/// Absent fields are skipped during serialization so a stored update only
/// carries the fields the webhook actually reported; see `merge_from`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingInfo {
    /// Carrier name (e.g., "DHL").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,

    /// Carrier tracking number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,

    /// Carrier tracking URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_url: Option<String>,

    /// When the shipment was dispatched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatched_at: Option<DateTime<Utc>>,

    /// When the shipment was delivered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
}

impl TrackingInfo {
    /// Merges fields present in `update` over the current values.
    ///
    /// Absent fields in `update` leave existing values untouched, so a
    /// partial webhook never erases previously reported tracking data.
    /// Merging the same update twice is a no-op.
    pub fn merge_from(&mut self, update: &TrackingInfo) {
        if update.carrier.is_some() {
            self.carrier = update.carrier.clone();
        }
        if update.tracking_number.is_some() {
            self.tracking_number = update.tracking_number.clone();
        }
        if update.tracking_url.is_some() {
            self.tracking_url = update.tracking_url.clone();
        }
        if update.dispatched_at.is_some() {
            self.dispatched_at = update.dispatched_at;
        }
        if update.delivered_at.is_some() {
            self.delivered_at = update.delivered_at;
        }
    }

    /// Returns true if no tracking field has been populated yet.
    pub fn is_empty(&self) -> bool {
        self.carrier.is_none()
            && self.tracking_number.is_none()
            && self.tracking_url.is_none()
            && self.dispatched_at.is_none()
            && self.delivered_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_id_new_creates_unique_ids() {
        let id1 = CustomerId::new();
        let id2 = CustomerId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_money_from_minor_units() {
        let money = Money::from_minor_units(1534);
        assert_eq!(money.minor_units(), 1534);
        assert_eq!(money.major_units(), 15);
        assert_eq!(money.minor_part(), 34);
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_minor_units(1234).to_string(), "12.34");
        assert_eq!(Money::from_minor_units(5).to_string(), "0.05");
        assert_eq!(Money::from_minor_units(-1234).to_string(), "-12.34");
    }

    #[test]
    fn test_money_sum() {
        let total: Money = [1500, 2000]
            .iter()
            .map(|&m| Money::from_minor_units(m))
            .sum();
        assert_eq!(total.minor_units(), 3500);
    }

    #[test]
    fn test_money_comparison() {
        assert!(Money::from_minor_units(100).is_positive());
        assert!(Money::from_minor_units(0).is_zero());
    }

    #[test]
    fn test_tracking_merge_keeps_existing_fields() {
        let mut tracking = TrackingInfo {
            carrier: Some("DHL".to_string()),
            tracking_number: Some("TRK-1".to_string()),
            ..TrackingInfo::default()
        };

        let update = TrackingInfo {
            tracking_url: Some("https://track.example/TRK-1".to_string()),
            ..TrackingInfo::default()
        };
        tracking.merge_from(&update);

        assert_eq!(tracking.carrier.as_deref(), Some("DHL"));
        assert_eq!(tracking.tracking_number.as_deref(), Some("TRK-1"));
        assert_eq!(
            tracking.tracking_url.as_deref(),
            Some("https://track.example/TRK-1")
        );
    }

    #[test]
    fn test_tracking_merge_is_idempotent() {
        let update = TrackingInfo {
            carrier: Some("Royal Mail".to_string()),
            tracking_number: Some("RM-42".to_string()),
            ..TrackingInfo::default()
        };

        let mut tracking = TrackingInfo::default();
        tracking.merge_from(&update);
        let after_first = tracking.clone();
        tracking.merge_from(&update);

        assert_eq!(tracking, after_first);
    }

    #[test]
    fn test_tracking_is_empty() {
        assert!(TrackingInfo::default().is_empty());

        let tracking = TrackingInfo {
            carrier: Some("DHL".to_string()),
            ..TrackingInfo::default()
        };
        assert!(!tracking.is_empty());
    }

    #[test]
    fn test_customization_serialization_roundtrip() {
        let customization = PrintCustomization {
            book_size: "A5-portrait".to_string(),
            spine_text: Some("Nora's Adventure".to_string()),
        };
        let json = serde_json::to_string(&customization).unwrap();
        let deserialized: PrintCustomization = serde_json::from_str(&json).unwrap();
        assert_eq!(customization, deserialized);
    }
}

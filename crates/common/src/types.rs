use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a purchased line item.
///
/// Wraps a UUID to provide type safety and prevent mixing up
/// purchase IDs with other UUID-based identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseId(Uuid);

impl PurchaseId {
    /// Creates a new random purchase ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a purchase ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PurchaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PurchaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for PurchaseId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<PurchaseId> for Uuid {
    fn from(id: PurchaseId) -> Self {
        id.0
    }
}

/// Unique identifier for a fulfiller-facing print order record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrintOrderId(Uuid);

impl PrintOrderId {
    /// Creates a new random print order ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a print order ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PrintOrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PrintOrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for PrintOrderId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<PrintOrderId> for Uuid {
    fn from(id: PrintOrderId) -> Self {
        id.0
    }
}

/// Identifier grouping all purchases created in one checkout.
///
/// One checkout may produce several purchases (line items); they all share
/// one order reference, which is also sent to the fulfiller as the merchant
/// reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderReference(Uuid);

impl OrderReference {
    /// Generates a fresh order reference.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an order reference from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OrderReference {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrderReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for OrderReference {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<OrderReference> for Uuid {
    fn from(reference: OrderReference) -> Self {
        reference.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purchase_id_new_creates_unique_ids() {
        let id1 = PurchaseId::new();
        let id2 = PurchaseId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn purchase_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = PurchaseId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn print_order_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = PrintOrderId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn order_reference_serialization_roundtrip() {
        let reference = OrderReference::new();
        let json = serde_json::to_string(&reference).unwrap();
        let deserialized: OrderReference = serde_json::from_str(&json).unwrap();
        assert_eq!(reference, deserialized);
    }

    #[test]
    fn order_reference_displays_as_uuid() {
        let uuid = Uuid::new_v4();
        let reference = OrderReference::from_uuid(uuid);
        assert_eq!(reference.to_string(), uuid.to_string());
    }
}

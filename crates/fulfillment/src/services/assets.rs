//! Print-ready asset preparation trait and in-memory implementation.
//!
//! Rendering the purchased artifact into print-ready files (interior PDF,
//! cover) is delegated to an external collaborator; the submitter only needs
//! the resulting asset URLs.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FulfillmentError;

/// One print-ready file placed on a named print area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintAsset {
    pub print_area: String,
    pub url: String,
}

/// Trait for print asset preparation.
#[async_trait]
pub trait AssetService: Send + Sync {
    /// Produces the print-ready assets for one line item from its source
    /// artifact.
    async fn prepare_assets(
        &self,
        sku: &str,
        source_url: &str,
    ) -> Result<Vec<PrintAsset>, FulfillmentError>;
}

#[derive(Debug, Default)]
struct InMemoryAssetState {
    prepared: u32,
    fail_on_prepare: bool,
}

/// In-memory asset service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAssetService {
    state: Arc<RwLock<InMemoryAssetState>>,
}

impl InMemoryAssetService {
    /// Creates a new in-memory asset service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail preparation calls.
    pub fn set_fail_on_prepare(&self, fail: bool) {
        self.state.write().unwrap().fail_on_prepare = fail;
    }

    /// Returns the number of successful preparations.
    pub fn prepared_count(&self) -> u32 {
        self.state.read().unwrap().prepared
    }
}

#[async_trait]
impl AssetService for InMemoryAssetService {
    async fn prepare_assets(
        &self,
        sku: &str,
        source_url: &str,
    ) -> Result<Vec<PrintAsset>, FulfillmentError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_prepare {
            return Err(FulfillmentError::AssetPreparation {
                sku: sku.to_string(),
                reason: "render pipeline unavailable".to_string(),
            });
        }

        state.prepared += 1;
        Ok(vec![PrintAsset {
            print_area: "default".to_string(),
            url: format!("{source_url}#print-ready"),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prepare_returns_print_ready_asset() {
        let service = InMemoryAssetService::new();

        let assets = service
            .prepare_assets("BOOK-A5", "https://assets.example/story.pdf")
            .await
            .unwrap();

        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].print_area, "default");
        assert!(assets[0].url.starts_with("https://assets.example/story.pdf"));
        assert_eq!(service.prepared_count(), 1);
    }

    #[tokio::test]
    async fn test_fail_on_prepare() {
        let service = InMemoryAssetService::new();
        service.set_fail_on_prepare(true);

        let result = service
            .prepare_assets("BOOK-A5", "https://assets.example/story.pdf")
            .await;

        assert!(matches!(
            result,
            Err(FulfillmentError::AssetPreparation { .. })
        ));
        assert_eq!(service.prepared_count(), 0);
    }
}

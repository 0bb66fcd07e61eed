use crate::types::{Asset, ProviderKind};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Static table of assets users may pick from, keyed by display name.
///
/// Order is preserved so the front end can lay out buttons deterministically.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetCatalog {
    assets: Vec<Asset>,
}

impl Default for AssetCatalog {
    fn default() -> Self {
        Self::new(vec![
            Asset::new("Bitcoin", "BTCUSDT", ProviderKind::CryptoExchange),
            Asset::new("Ethereum", "ETHUSDT", ProviderKind::CryptoExchange),
            Asset::new("EUR/USD", "EURUSD", ProviderKind::Forex),
            Asset::new("GBP/USD", "GBPUSD", ProviderKind::Forex),
            Asset::new("USD/JPY", "USDJPY", ProviderKind::Forex),
        ])
    }
}

impl AssetCatalog {
    /// Later duplicates of a display name are dropped.
    pub fn new(assets: Vec<Asset>) -> Self {
        let mut out: Vec<Asset> = Vec::with_capacity(assets.len());
        for asset in assets {
            if out.iter().any(|a| a.name == asset.name) {
                tracing::warn!(asset = %asset.name, "duplicate catalog entry ignored");
                continue;
            }
            out.push(asset);
        }
        Self { assets: out }
    }

    /// Load a catalog from a JSON file of the form `{"assets": [{"name", "symbol", "provider"}]}`.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read catalog {}", path.display()))?;
        let parsed: AssetCatalog = serde_json::from_str(&raw)
            .with_context(|| format!("parse catalog {}", path.display()))?;
        anyhow::ensure!(!parsed.assets.is_empty(), "catalog {} is empty", path.display());
        Ok(Self::new(parsed.assets))
    }

    pub fn get(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.iter()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_routes_by_provider() {
        let catalog = AssetCatalog::default();
        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog.get("Bitcoin").unwrap().provider, ProviderKind::CryptoExchange);
        assert_eq!(catalog.get("USD/JPY").unwrap().provider, ProviderKind::Forex);
        assert!(catalog.get("Dogecoin").is_none());
    }

    #[test]
    fn parses_catalog_json_and_drops_duplicates() {
        let raw = r#"{"assets":[
            {"name":"Solana","symbol":"SOLUSDT","provider":"crypto_exchange"},
            {"name":"Solana","symbol":"SOLBUSD","provider":"crypto_exchange"},
            {"name":"AUD/USD","symbol":"AUDUSD","provider":"forex"}
        ]}"#;
        let parsed: AssetCatalog = serde_json::from_str(raw).unwrap();
        let catalog = AssetCatalog::new(parsed.assets);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("Solana").unwrap().symbol.0, "SOLUSDT");
    }
}

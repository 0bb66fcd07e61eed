//! Chat commands mapped onto registry operations.

use crate::catalog::AssetCatalog;
use crate::registry::SubscriberRegistry;
use crate::types::{Asset, SubscriberId};
use serde_json::{json, Value};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Subscribe,
    Unsubscribe,
    /// Display name from `/asset <name>` or a keyboard button.
    SelectAsset(String),
    Help,
    Unknown,
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let (head, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
        // Group chats address commands as `/start@SomeBot`.
        let head = head.split('@').next().unwrap_or(head);
        match head {
            "/start" | "/subscribe" => Command::Subscribe,
            "/stop" | "/unsubscribe" => Command::Unsubscribe,
            "/asset" if !rest.trim().is_empty() => Command::SelectAsset(rest.trim().to_string()),
            "/help" | "/asset" => Command::Help,
            _ => Command::Unknown,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Subscribed { new: bool },
    Unsubscribed { was_subscribed: bool },
    AssetSelected(Asset),
    NotSubscribed,
    UnknownAsset(String),
    Help,
    UnknownCommand,
}

impl Reply {
    pub fn text(&self, catalog: &AssetCatalog) -> String {
        match self {
            Reply::Subscribed { new: true } => {
                "✅ You are subscribed!\n\nPick an asset 👇\nSignals are sent on a fixed schedule.".to_string()
            }
            Reply::Subscribed { new: false } => "You are already subscribed. Pick an asset 👇".to_string(),
            Reply::Unsubscribed { was_subscribed: true } => "👋 Unsubscribed. Send /start to come back.".to_string(),
            Reply::Unsubscribed { was_subscribed: false } => "You were not subscribed.".to_string(),
            Reply::AssetSelected(asset) => format!("✅ Asset set to {}\nYou will receive its signals.", asset.name),
            Reply::NotSubscribed => "Send /start to subscribe before picking an asset.".to_string(),
            Reply::UnknownAsset(name) => format!("Unknown asset {name:?}. Available: {}", asset_names(catalog)),
            Reply::Help | Reply::UnknownCommand => format!(
                "/start - subscribe\n/asset <name> - pick an asset ({})\n/stop - unsubscribe",
                asset_names(catalog)
            ),
        }
    }

    /// Whether the reply should carry the asset keyboard.
    pub fn offers_assets(&self) -> bool {
        matches!(self, Reply::Subscribed { .. } | Reply::UnknownAsset(_))
    }
}

pub fn apply(registry: &SubscriberRegistry, catalog: &AssetCatalog, id: SubscriberId, cmd: Command) -> Reply {
    match cmd {
        Command::Subscribe => Reply::Subscribed {
            new: registry.subscribe(id),
        },
        Command::Unsubscribe => Reply::Unsubscribed {
            was_subscribed: registry.unsubscribe(id),
        },
        Command::SelectAsset(name) => match catalog.get(&name) {
            None => Reply::UnknownAsset(name),
            Some(asset) if registry.select_asset(id, asset.clone()) => Reply::AssetSelected(asset.clone()),
            Some(_) => Reply::NotSubscribed,
        },
        Command::Help => Reply::Help,
        Command::Unknown => Reply::UnknownCommand,
    }
}

/// Inline keyboard with one button per catalog asset, two per row.
pub fn asset_keyboard(catalog: &AssetCatalog) -> Value {
    let buttons: Vec<Value> = catalog
        .iter()
        .map(|a| json!({ "text": a.name, "callback_data": a.name }))
        .collect();
    let rows: Vec<Vec<Value>> = buttons.chunks(2).map(|c| c.to_vec()).collect();
    json!({ "inline_keyboard": rows })
}

fn asset_names(catalog: &AssetCatalog) -> String {
    catalog.iter().map(|a| a.name.as_str()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("/start"), Command::Subscribe);
        assert_eq!(Command::parse("  /start@SignalBot  "), Command::Subscribe);
        assert_eq!(Command::parse("/stop"), Command::Unsubscribe);
        assert_eq!(Command::parse("/asset EUR/USD"), Command::SelectAsset("EUR/USD".into()));
        assert_eq!(Command::parse("/asset"), Command::Help);
        assert_eq!(Command::parse("hello"), Command::Unknown);
    }

    #[test]
    fn selection_requires_subscription_and_known_asset() {
        let reg = SubscriberRegistry::new();
        let catalog = AssetCatalog::default();
        let id = SubscriberId(5);

        assert_eq!(
            apply(&reg, &catalog, id, Command::SelectAsset("Bitcoin".into())),
            Reply::NotSubscribed
        );
        assert!(reg.is_empty());

        assert_eq!(apply(&reg, &catalog, id, Command::Subscribe), Reply::Subscribed { new: true });
        assert_eq!(
            apply(&reg, &catalog, id, Command::SelectAsset("Dogecoin".into())),
            Reply::UnknownAsset("Dogecoin".into())
        );
        match apply(&reg, &catalog, id, Command::SelectAsset("Bitcoin".into())) {
            Reply::AssetSelected(a) => assert_eq!(a.symbol.0, "BTCUSDT"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            apply(&reg, &catalog, id, Command::Unsubscribe),
            Reply::Unsubscribed { was_subscribed: true }
        );
        assert!(reg.is_empty());
    }

    #[test]
    fn keyboard_has_two_buttons_per_row() {
        let kb = asset_keyboard(&AssetCatalog::default());
        let rows = kb["inline_keyboard"].as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].as_array().unwrap().len(), 2);
        assert_eq!(rows[2].as_array().unwrap().len(), 1);
        assert_eq!(rows[0][0]["callback_data"], "Bitcoin");
    }
}

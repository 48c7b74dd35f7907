//! Versioned transport format for sharing a recipe together with its
//! full dependency closure. Two encodings: a human-readable plain form
//! with a header line, and a compact deflate + URL-safe-base64 form that
//! fits in a share link.

use std::collections::HashMap;
use std::io::{Read, Write};

use anyhow::Result;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::graph;
use crate::models::Item;

pub const BUNDLE_VERSION: i64 = 2;

const PLAIN_SEPARATOR: &str = "---";

/// A recipe plus its transitive dependency closure, with no surrounding
/// store context. Wire field names are kept short; bundles travel over
/// clipboards and URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(rename = "v")]
    pub version: i64,
    #[serde(rename = "root")]
    pub root_id: String,
    pub items: Vec<Item>,
}

/// Build a bundle from the item map: the root plus everything reachable
/// from it, root first.
pub fn export(root_id: &str, items: &HashMap<String, Item>) -> Result<Bundle> {
    let closure = graph::transitive_closure(root_id, items);
    if closure.is_empty() {
        return Err(EngineError::ItemNotFound(root_id.to_string()).into());
    }
    Ok(Bundle {
        version: BUNDLE_VERSION,
        root_id: root_id.to_string(),
        items: closure,
    })
}

/// `"Recipe: <name>\n---\n" + JSON`, readable enough to paste into a
/// chat message and still machine-parseable.
pub fn encode_plain(bundle: &Bundle) -> Result<String> {
    let root_name = bundle
        .items
        .iter()
        .find(|item| item.id == bundle.root_id)
        .map_or("Shared Items", |item| item.name.as_str());
    Ok(format!(
        "Recipe: {root_name}\n{PLAIN_SEPARATOR}\n{}",
        serde_json::to_string(bundle)?
    ))
}

/// Deflate the JSON envelope and URL-safe-encode it.
pub fn encode_compact(bundle: &Bundle) -> Result<String> {
    let json = serde_json::to_string(bundle)?;
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(json.as_bytes())?;
    Ok(URL_SAFE_NO_PAD.encode(encoder.finish()?))
}

/// A shareable link carrying the compact bundle as a query parameter.
/// Transmission (share sheet, clipboard) is the caller's concern.
pub fn share_link(base_url: &str, bundle: &Bundle) -> Result<String> {
    let compact = encode_compact(bundle)?;
    Ok(format!("{base_url}?recipe={compact}"))
}

fn decode_compact(text: &str) -> Option<serde_json::Value> {
    let bytes = URL_SAFE_NO_PAD.decode(text).ok()?;
    let mut json = String::new();
    DeflateDecoder::new(&bytes[..]).read_to_string(&mut json).ok()?;
    serde_json::from_str(&json).ok()
}

/// Decode any of the three accepted shapes: bare JSON, plain form with
/// the `---` separator, or the compact form. Fails with
/// [`EngineError::InvalidBundleFormat`] when none apply and
/// [`EngineError::UnsupportedBundleVersion`] when the envelope is from a
/// different format generation.
pub fn decode(text: &str) -> Result<Bundle> {
    let trimmed = text.trim();

    let value: Option<serde_json::Value> = if trimmed.starts_with('{') {
        serde_json::from_str(trimmed).ok()
    } else {
        // A compact payload may itself contain "---" (base64 url-safe
        // includes '-'), so a failed separator parse falls through.
        trimmed
            .split_once(PLAIN_SEPARATOR)
            .and_then(|(_, tail)| serde_json::from_str(tail.trim()).ok())
            .or_else(|| decode_compact(trimmed))
    };
    // Last resort: raw JSON that happens not to start with a brace
    // (leading noise from a copy/paste).
    let value = value
        .or_else(|| serde_json::from_str(trimmed).ok())
        .ok_or(EngineError::InvalidBundleFormat)?;

    let version = value.get("v").and_then(serde_json::Value::as_i64).unwrap_or(0);
    if version != BUNDLE_VERSION {
        return Err(EngineError::UnsupportedBundleVersion(version).into());
    }

    serde_json::from_value(value).map_err(|_| EngineError::InvalidBundleFormat.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Component, ItemKind};

    fn leaf(id: &str, name: &str) -> Item {
        Item {
            id: id.to_string(),
            name: name.to_string(),
            kind: ItemKind::Food,
            category: String::new(),
            calories_per_100: 100,
            protein_per_100: 5.0,
            fluid_per_100: 0.0,
            default_amount: 100.0,
            usage_score: 0.0,
            last_used: None,
            components: Vec::new(),
            weight_coefficient: 1.0,
            portion_weight: None,
            notes: None,
            updated_at: String::new(),
        }
    }

    fn sample_map() -> HashMap<String, Item> {
        let mut recipe = leaf("r", "Soup");
        recipe.kind = ItemKind::Recipe;
        recipe.components = vec![Component {
            item_id: "a".to_string(),
            amount: 200.0,
        }];
        [leaf("a", "Carrot"), recipe]
            .into_iter()
            .map(|i| (i.id.clone(), i))
            .collect()
    }

    #[test]
    fn test_export_closure_matches_graph() {
        let items = sample_map();
        let bundle = export("r", &items).unwrap();
        assert_eq!(bundle.version, BUNDLE_VERSION);
        assert_eq!(bundle.root_id, "r");
        let ids: Vec<&str> = bundle.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["r", "a"]);
    }

    #[test]
    fn test_export_unknown_root_fails() {
        let err = export("ghost", &sample_map()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::ItemNotFound(_))
        ));
    }

    #[test]
    fn test_plain_roundtrip() {
        let bundle = export("r", &sample_map()).unwrap();
        let text = encode_plain(&bundle).unwrap();
        assert!(text.starts_with("Recipe: Soup\n---\n"));

        let decoded = decode(&text).unwrap();
        assert_eq!(decoded.root_id, "r");
        assert_eq!(decoded.items.len(), 2);
    }

    #[test]
    fn test_compact_roundtrip() {
        let bundle = export("r", &sample_map()).unwrap();
        let compact = encode_compact(&bundle).unwrap();
        // URL-safe: no '+', '/', '=' anywhere.
        assert!(!compact.contains(['+', '/', '=']));

        let decoded = decode(&compact).unwrap();
        assert_eq!(decoded.root_id, "r");
        let ids: Vec<&str> = decoded.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["r", "a"]);
    }

    #[test]
    fn test_bare_json_accepted() {
        let bundle = export("r", &sample_map()).unwrap();
        let json = serde_json::to_string(&bundle).unwrap();
        let decoded = decode(&json).unwrap();
        assert_eq!(decoded.items.len(), 2);
    }

    #[test]
    fn test_invalid_format_rejected() {
        let err = decode("definitely not a bundle").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::InvalidBundleFormat)
        ));
    }

    #[test]
    fn test_wrong_version_rejected() {
        let err = decode(r#"{"v":1,"root":"r","items":[]}"#).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::UnsupportedBundleVersion(1))
        ));
    }

    #[test]
    fn test_share_link_carries_compact_payload() {
        let bundle = export("r", &sample_map()).unwrap();
        let link = share_link("https://morsel.example/app", &bundle).unwrap();
        let (base, payload) = link.split_once("?recipe=").unwrap();
        assert_eq!(base, "https://morsel.example/app");

        let decoded = decode(payload).unwrap();
        assert_eq!(decoded.root_id, "r");
    }
}

//! `catalog` request/response. Pre-2.0 addons call this action `directory`.

use serde_json::Value;

use mediaurl_core::version::SdkGeneration;

use super::directory::{is_directory, migrate_v2, rename_root_id};
use super::item;

/// Returns the wire action name to use instead of `catalog`, if any.
pub(super) fn migrate_request(request: &mut Value, generation: SdkGeneration) -> Option<&'static str> {
    if !generation.is_legacy_v1() {
        return None;
    }
    if let Some(obj) = request.as_object_mut() {
        if let Some(catalog_id) = obj.remove("catalogId") {
            obj.insert("rootId".into(), catalog_id);
        }
    }
    Some("directory")
}

pub(super) fn migrate_response(response: &mut Value, generation: SdkGeneration) {
    let Some(obj) = response.as_object_mut() else {
        return;
    };
    match generation {
        SdkGeneration::LegacyV1 => {
            if let Some(items) = obj.get_mut("items").and_then(Value::as_array_mut) {
                for entry in items.iter_mut() {
                    item::migrate_response(entry, generation);
                    if is_directory(entry) {
                        if let Some(dir) = entry.as_object_mut() {
                            rename_root_id(dir);
                        }
                    }
                }
            }
            rename_root_id(obj);
        }
        SdkGeneration::LegacyV2 => {
            if let Some(items) = obj.get_mut("items").and_then(Value::as_array_mut) {
                for entry in items.iter_mut() {
                    if is_directory(entry) {
                        if let Some(dir) = entry.as_object_mut() {
                            migrate_v2(dir, true);
                        }
                    }
                }
            }
            migrate_v2(obj, false);
        }
        SdkGeneration::Current => {}
    }
}

//! Legacy-v2 directory shape: `options.imageShape`, inline `items`.

use serde_json::{json, Map, Value};

/// Rewrite a directory object to the 2.2 shape in place.
///
/// `options.imageShape` → `options.shape`, shape `regular` → `portrait`,
/// and (when `migrate_items`) an inline `items` array becomes
/// `initialData = { items, nextCursor: null }`.
pub(super) fn migrate_v2(directory: &mut Map<String, Value>, migrate_items: bool) {
    if let Some(options) = directory.get_mut("options").and_then(Value::as_object_mut) {
        if let Some(shape) = options.remove("imageShape") {
            if !shape.is_null() {
                options.insert("shape".into(), shape);
            }
        }
        if options.get("shape").and_then(Value::as_str) == Some("regular") {
            options.insert("shape".into(), Value::from("portrait"));
        }
    }

    if migrate_items && directory.get("items").is_some_and(Value::is_array) {
        if let Some(items) = directory.remove("items") {
            directory.insert(
                "initialData".into(),
                json!({ "items": items, "nextCursor": null }),
            );
        }
    }
}

/// `rootId` → `catalogId`, only when `rootId` is present.
pub(super) fn rename_root_id(obj: &mut Map<String, Value>) {
    if let Some(root_id) = obj.remove("rootId") {
        obj.insert("catalogId".into(), root_id);
    }
}

pub(super) fn is_directory(item: &Value) -> bool {
    item.get("type").and_then(Value::as_str) == Some("directory")
}

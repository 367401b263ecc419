//! `item` response: `similarItems` directories.

use serde_json::Value;

use mediaurl_core::version::SdkGeneration;

use super::directory::{is_directory, migrate_v2, rename_root_id};

pub(super) fn migrate_response(item: &mut Value, generation: SdkGeneration) {
    let Some(similar) = item
        .get_mut("similarItems")
        .and_then(Value::as_array_mut)
    else {
        return;
    };

    for entry in similar.iter_mut().filter_map(Value::as_object_mut) {
        match generation {
            SdkGeneration::LegacyV1 => rename_root_id(entry),
            SdkGeneration::LegacyV2 => {
                if entry.get("type").map_or(true, Value::is_null) {
                    entry.insert("type".into(), Value::from("directory"));
                }
                migrate_v2(entry, true);
                if let Some(items) = entry
                    .get_mut("initialData")
                    .and_then(|d| d.get_mut("items"))
                    .and_then(Value::as_array_mut)
                {
                    for nested in items.iter_mut() {
                        if is_directory(nested) {
                            if let Some(dir) = nested.as_object_mut() {
                                migrate_v2(dir, true);
                            }
                        }
                    }
                }
            }
            SdkGeneration::Current => {}
        }
    }
}

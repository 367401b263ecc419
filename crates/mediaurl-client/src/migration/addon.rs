//! `addon` response: pre-2.0 and pre-2.2 descriptors.
//!
//! The descriptor's own `sdkVersion` selects the rules.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use mediaurl_core::version::SdkGeneration;

use super::directory::{is_directory, migrate_v2, rename_root_id};

pub(super) fn migrate_response(payload: &mut Value) {
    let Some(addon) = payload.as_object_mut() else {
        return;
    };
    if addon.get("type").and_then(Value::as_str) == Some("server") {
        return;
    }

    let generation = SdkGeneration::of(addon.get("sdkVersion").and_then(Value::as_str));

    if generation.is_legacy_v1() {
        migrate_v1(addon);
    }

    if !addon.contains_key("pages") {
        if let Some(dashboards) = addon.get("dashboards").filter(|d| !d.is_null()) {
            let page = json!({ "dashboards": dashboards });
            addon.insert("pages".into(), Value::Array(vec![page]));
        }
    }
    addon.remove("dashboards");

    if generation.is_legacy_v2() {
        migrate_v2_addon(addon);
    }
}

fn migrate_v1(addon: &mut Map<String, Value>) {
    addon.remove("poster");

    if let Some(Value::Object(flags)) = addon.remove("flags") {
        addon.extend(flags);
    }

    if let Some(metadata) = addon.remove("metadata") {
        if let Some(url) = metadata.get("url").filter(|u| is_truthy(u)) {
            push_to_array(addon, "endpoints", url.clone());
        }
    }

    if let Some(kind) = addon.remove("type") {
        if kind.as_str() == Some("repository") {
            addon.entry("actions").or_insert_with(|| json!([]));
            addon.insert("_isLegacyRepositoryAddon".into(), Value::Bool(true));
        }
    }

    if let Some(request_args) = addon.remove("requestArgs") {
        let has_triggers = addon
            .get("triggers")
            .and_then(Value::as_array)
            .is_some_and(|t| !t.is_empty());
        if !has_triggers && !request_args.is_null() {
            addon.insert("triggers".into(), request_args);
        }
    }

    if let Some(requirements) = addon.get_mut("requirements").and_then(Value::as_array_mut) {
        let collapsed: Vec<Value> = requirements
            .iter()
            .filter_map(|req| match req {
                Value::String(_) => Some(req.clone()),
                other => other
                    .get("url")
                    .or_else(|| other.get("id"))
                    .filter(|v| v.is_string())
                    .cloned(),
            })
            .collect();
        *requirements = collapsed;
    }

    let root_directories = addon.remove("rootDirectories");
    let mut has_directory = false;
    if let Some(actions) = addon.get_mut("actions").and_then(Value::as_array_mut) {
        for action in actions.iter_mut() {
            if action.as_str() == Some("directory") {
                *action = Value::from("catalog");
                has_directory = true;
            }
        }
        actions.retain(|a| a.as_str() != Some("iptv"));
    }
    if has_directory {
        match root_directories {
            Some(dirs) if !dirs.is_null() => {
                addon.insert("catalogs".into(), dirs);
            }
            _ => {
                addon.remove("catalogs");
            }
        }
    }

    let default_options = addon.remove("defaultDirectoryOptions");
    let default_features = addon.remove("defaultDirectoryFeatures");
    if default_options.is_some() || default_features.is_some() {
        apply_catalog_defaults(addon, default_options, default_features);
    }

    if let Some(dashboards) = addon.get_mut("dashboards").and_then(Value::as_array_mut) {
        for dashboard in dashboards.iter_mut().filter_map(Value::as_object_mut) {
            migrate_v1_dashboard(dashboard);
        }
    }
}

/// Merge the addon-wide directory defaults under every catalog's own
/// options/features, creating a single catalog if there are none.
fn apply_catalog_defaults(
    addon: &mut Map<String, Value>,
    default_options: Option<Value>,
    default_features: Option<Value>,
) {
    let has_catalogs = addon
        .get("catalogs")
        .and_then(Value::as_array)
        .is_some_and(|c| !c.is_empty());
    if !has_catalogs {
        addon.insert("catalogs".into(), json!([{}]));
    }
    let Some(catalogs) = addon.get_mut("catalogs").and_then(Value::as_array_mut) else {
        return;
    };
    for catalog in catalogs.iter_mut().filter_map(Value::as_object_mut) {
        for (key, defaults) in [("options", &default_options), ("features", &default_features)] {
            let mut merged = defaults
                .as_ref()
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            if let Some(own) = catalog.get(key).and_then(Value::as_object) {
                merged.extend(own.clone());
            }
            catalog.insert(key.into(), Value::Object(merged));
        }
    }
}

fn migrate_v1_dashboard(dashboard: &mut Map<String, Value>) {
    static PREFIXED_ID: OnceLock<Regex> = OnceLock::new();

    rename_root_id(dashboard);

    let has_catalog_id = dashboard.get("catalogId").is_some_and(is_truthy);
    if !has_catalog_id {
        let re = PREFIXED_ID.get_or_init(|| Regex::new(r"^([^/:]+?)/(.+)").expect("valid regex"));
        let catalog_id = dashboard
            .get("id")
            .and_then(Value::as_str)
            .and_then(|id| re.captures(id))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        if let Some(catalog_id) = catalog_id {
            dashboard.insert("catalogId".into(), Value::from(catalog_id));
        }
    }

    let show = dashboard
        .get("config")
        .and_then(|c| c.get("showOnHomescreen"))
        .and_then(Value::as_bool);
    if let Some(show) = show {
        dashboard.insert("hideOnHomescreen".into(), Value::Bool(!show));
        dashboard.remove("config");
    }
}

fn migrate_v2_addon(addon: &mut Map<String, Value>) {
    if let Some(catalogs) = addon.get_mut("catalogs").and_then(Value::as_array_mut) {
        for catalog in catalogs.iter_mut().filter_map(Value::as_object_mut) {
            migrate_v2(catalog, true);
        }
    }
    if let Some(pages) = addon.get_mut("pages").and_then(Value::as_array_mut) {
        for page in pages.iter_mut() {
            let Some(dashboards) = page.get_mut("dashboards").and_then(Value::as_array_mut) else {
                continue;
            };
            for dashboard in dashboards.iter_mut() {
                let Some(obj) = dashboard.as_object_mut() else {
                    continue;
                };
                if obj.get("type").map_or(true, Value::is_null) {
                    obj.insert("type".into(), Value::from("directory"));
                }
                if is_directory(dashboard) {
                    if let Some(obj) = dashboard.as_object_mut() {
                        migrate_v2(obj, true);
                    }
                }
            }
        }
    }
}

fn push_to_array(obj: &mut Map<String, Value>, key: &str, value: Value) {
    let entry = obj.entry(key).or_insert_with(|| json!([]));
    if let Some(arr) = entry.as_array_mut() {
        arr.push(value);
    }
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

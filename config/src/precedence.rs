//! # Configuration Precedence
//!
//! Merges a site block over the `_defaults` block.
//!
//! # Precedence Order
//! 1. Site block (highest priority)
//! 2. `_defaults` block (lowest priority)
//!
//! Every key is replaced wholesale by the site value, with no deep merge. The
//! one exception is `static`: static fields accumulate, so the two `static`
//! objects are shallow-merged with the site winning per field name.

use serde_json::{Map, Value};

/// Key whose object value is shallow-merged instead of replaced.
pub const STATIC_KEY: &str = "static";

/// Merge a site configuration block over the defaults block.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Produces the resolved (not yet validated) configuration map for one site.
///
/// ## Usage
/// ```rust
/// use config::merge_site_config;
/// use serde_json::json;
///
/// let defaults = json!({"batchSize": 50, "static": {"Source__c": "catalog"}});
/// let site = json!({"batchSize": 10, "static": {"Brand__c": "acme"}});
/// let merged = merge_site_config(
///     defaults.as_object().unwrap(),
///     site.as_object().unwrap(),
/// );
/// assert_eq!(merged["batchSize"], 10);
/// assert_eq!(merged["static"]["Source__c"], "catalog");
/// assert_eq!(merged["static"]["Brand__c"], "acme");
/// ```
///
/// ## Merge Rules
/// - Keys only in one block are copied as-is.
/// - Keys in both blocks take the site value exactly.
/// - `static` is shallow-merged when both values are objects; if either side
///   is not an object the site value replaces the default like any other key.
pub fn merge_site_config(defaults: &Map<String, Value>, site: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = defaults.clone();
    let mut changes = Vec::new();

    for (key, site_value) in site {
        if key == STATIC_KEY {
            if let (Some(Value::Object(default_static)), Value::Object(site_static)) =
                (defaults.get(STATIC_KEY), site_value)
            {
                let mut statics = default_static.clone();
                for (name, value) in site_static {
                    statics.insert(name.clone(), value.clone());
                }
                changes.push(format!("{STATIC_KEY} (+{} fields)", site_static.len()));
                merged.insert(key.clone(), Value::Object(statics));
                continue;
            }
        }

        if defaults.contains_key(key) {
            changes.push(key.clone());
        }
        merged.insert(key.clone(), site_value.clone());
    }

    if !changes.is_empty() {
        tracing::debug!("Site configuration overrides defaults: {:?}", changes);
    }

    merged
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn small_map() -> impl Strategy<Value = Map<String, Value>> {
        prop::collection::btree_map("[a-d]", any::<i64>(), 0..5).prop_map(|entries| {
            entries
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect()
        })
    }

    fn block() -> impl Strategy<Value = Map<String, Value>> {
        (small_map(), small_map()).prop_map(|(mut top, statics)| {
            top.insert(STATIC_KEY.to_string(), Value::Object(statics));
            top
        })
    }

    proptest! {
        #[test]
        fn test_non_static_keys_take_site_value(defaults in block(), site in block()) {
            let merged = merge_site_config(&defaults, &site);
            for (key, value) in &site {
                if key != STATIC_KEY {
                    prop_assert_eq!(&merged[key], value);
                }
            }
            for (key, value) in &defaults {
                if !site.contains_key(key) {
                    prop_assert_eq!(&merged[key], value);
                }
            }
        }

        #[test]
        fn test_static_union_with_site_winning(defaults in block(), site in block()) {
            let merged = merge_site_config(&defaults, &site);
            let merged_static = merged[STATIC_KEY].as_object().unwrap();
            let default_static = defaults[STATIC_KEY].as_object().unwrap();
            let site_static = site[STATIC_KEY].as_object().unwrap();

            for (name, value) in site_static {
                prop_assert_eq!(&merged_static[name], value);
            }
            for (name, value) in default_static {
                if !site_static.contains_key(name) {
                    prop_assert_eq!(&merged_static[name], value);
                }
            }
            prop_assert!(merged_static.keys().all(|k| default_static.contains_key(k) || site_static.contains_key(k)));
        }
    }
}

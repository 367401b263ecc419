//! Version migration engine.
//!
//! Addons built against older SDKs speak older wire shapes. Each action with
//! known legacy shapes has a [`Migration`] variant; its request/response
//! transforms rewrite the payload into the current shape before structural
//! validation. Transforms are pure: the input is never modified, and a
//! payload that needed no change comes back borrowed.
//!
//! | action     | request                       | response                               |
//! |------------|-------------------------------|----------------------------------------|
//! | addon      | -                             | v1 descriptor rewrite, v2 directories  |
//! | repository | validated as `addon` request  | per-addon `addon` migration            |
//! | catalog    | v1: `directory`, `rootId`     | v1 `rootId`, v2 directories            |
//! | item       | -                             | `similarItems` directories             |

mod addon;
mod catalog;
mod directory;
mod item;

use std::borrow::Cow;

use serde_json::Value;

use mediaurl_core::version::SdkGeneration;
use mediaurl_core::{Action, Direction, ModelKind, SchemaError, Validator};

/// Output of a single transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Migrated<'a> {
    /// Wire action name, when it differs from the logical action.
    pub action: Option<&'static str>,
    /// Whether the action validator still has to run.
    pub validate: bool,
    pub payload: Cow<'a, Value>,
}

impl<'a> Migrated<'a> {
    fn unchanged(payload: &'a Value) -> Self {
        Self {
            action: None,
            validate: true,
            payload: Cow::Borrowed(payload),
        }
    }

    /// True if the transform left the payload structurally equal.
    pub fn is_unchanged(&self) -> bool {
        matches!(self.payload, Cow::Borrowed(_))
    }
}

/// Closed set of actions with registered migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Migration {
    Addon,
    Repository,
    Catalog,
    Item,
    /// No legacy shapes known for this action.
    Unregistered,
}

impl Migration {
    pub fn for_action(action: &Action) -> Self {
        match action {
            Action::Addon => Self::Addon,
            Action::Repository => Self::Repository,
            Action::Catalog => Self::Catalog,
            Action::Item => Self::Item,
            _ => Self::Unregistered,
        }
    }

    /// Apply the `direction` transform. `authority` is the SDK version of the
    /// addon that decides which rules apply (the called addon). The `addon`
    /// response ignores it and uses the descriptor's own `sdkVersion`.
    pub fn apply<'a>(
        self,
        direction: Direction,
        payload: &'a Value,
        authority: Option<&str>,
        validator: &dyn Validator,
    ) -> Result<Migrated<'a>, SchemaError> {
        let generation = SdkGeneration::of(authority);
        let migrated = match (self, direction) {
            (Self::Addon, Direction::Response) => Migrated {
                payload: rewrite(payload, addon::migrate_response),
                ..Migrated::unchanged(payload)
            },
            (Self::Repository, Direction::Request) => {
                let validated = validator.validate(&Action::Addon, Direction::Request, payload.clone())?;
                Migrated {
                    action: None,
                    validate: false,
                    payload: reuse(payload, validated),
                }
            }
            (Self::Repository, Direction::Response) => {
                let addons = payload.as_array().ok_or_else(|| {
                    SchemaError::new("repository.response", "expected an array of addons")
                })?;
                let mut migrated = Vec::with_capacity(addons.len());
                for entry in addons {
                    let mut entry = entry.clone();
                    addon::migrate_response(&mut entry);
                    migrated.push(validator.validate_model(ModelKind::Addon, entry)?);
                }
                Migrated {
                    action: None,
                    validate: false,
                    payload: reuse(payload, Value::Array(migrated)),
                }
            }
            (Self::Catalog, Direction::Request) => {
                let mut out = payload.clone();
                let action = catalog::migrate_request(&mut out, generation);
                Migrated {
                    action,
                    validate: true,
                    payload: reuse(payload, out),
                }
            }
            (Self::Catalog, Direction::Response) => Migrated {
                payload: rewrite(payload, |p| catalog::migrate_response(p, generation)),
                ..Migrated::unchanged(payload)
            },
            (Self::Item, Direction::Response) => Migrated {
                payload: rewrite(payload, |p| item::migrate_response(p, generation)),
                ..Migrated::unchanged(payload)
            },
            _ => Migrated::unchanged(payload),
        };
        Ok(migrated)
    }
}

/// Run `f` on a copy of `payload`; borrow the original if nothing changed.
fn rewrite<'a>(payload: &'a Value, f: impl FnOnce(&mut Value)) -> Cow<'a, Value> {
    let mut out = payload.clone();
    f(&mut out);
    reuse(payload, out)
}

fn reuse(original: &Value, new: Value) -> Cow<'_, Value> {
    if *original == new {
        Cow::Borrowed(original)
    } else {
        Cow::Owned(new)
    }
}

/// A migrated and validated payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    /// Action name to put on the wire (e.g. `directory` for old catalogs).
    pub action: String,
    pub payload: Value,
}

/// Migrate `payload`, then run the action validator unless the migration
/// opted out.
pub fn validate_action(
    validator: &dyn Validator,
    action: &Action,
    direction: Direction,
    payload: &Value,
    authority: Option<&str>,
) -> Result<Validated, SchemaError> {
    let migrated = Migration::for_action(action).apply(direction, payload, authority, validator)?;
    let wire_action = migrated
        .action
        .map(str::to_string)
        .unwrap_or_else(|| action.as_str().to_string());
    let payload = migrated.payload.into_owned();
    let payload = if migrated.validate {
        validator.validate(action, direction, payload)?
    } else {
        payload
    };
    Ok(Validated {
        action: wire_action,
        payload,
    })
}

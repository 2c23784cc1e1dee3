use deck_core::schema::{HookMeta, SchemaHooksExt};
use deck_core::{DeckApp, ServiceMethodKind};
use deck_schema::{schema_error, validate, SchemaErrors};
use serde::Deserialize;
use serde_json::{Map, Value};
use validator::Validate;

use crate::services::StudioParams;

pub const ERROR_MESSAGE: &str = "Card validation failed";

pub const STAT_FIELDS: [&str; 6] = ["hp", "attack", "defense", "specialAttack", "specialDefense", "speed"];

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CardWrite {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "name must be 1 to 100 characters"))]
    name: Option<String>,

    #[serde(default, rename = "type")]
    #[validate(length(max = 50))]
    kind: Option<String>,

    #[serde(default)]
    #[validate(range(min = 0, max = 9999))]
    hp: Option<i64>,
    #[serde(default)]
    #[validate(range(min = 0, max = 9999))]
    attack: Option<i64>,
    #[serde(default)]
    #[validate(range(min = 0, max = 9999))]
    defense: Option<i64>,
    #[serde(default)]
    #[validate(range(min = 0, max = 9999))]
    special_attack: Option<i64>,
    #[serde(default)]
    #[validate(range(min = 0, max = 9999))]
    special_defense: Option<i64>,
    #[serde(default)]
    #[validate(range(min = 0, max = 9999))]
    speed: Option<i64>,

    #[serde(default)]
    card_design: Option<String>,
}

/// Form values arrive as text: `"39"` becomes `39`, blank means absent.
fn coerce_stat(field: &str, value: Value, errs: &mut SchemaErrors) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(n) => Some(Value::from(n)),
            Err(_) => {
                errs.push_field(field, "must be an integer");
                None
            }
        },
        Value::Number(n) if n.is_i64() => Some(Value::Number(n)),
        _ => {
            errs.push_field(field, "must be an integer");
            None
        }
    }
}

/// Rewrites a card payload into its stored field set. Anything else the
/// client sent (`image`, `imageUrl`, `id`, ...) is dropped: the image
/// reference only ever comes from the blob store.
fn normalize(data: &mut Value, method: ServiceMethodKind) -> anyhow::Result<()> {
    let Some(obj) = data.as_object_mut() else {
        return Err(schema_error(ERROR_MESSAGE, "body must be a JSON object"));
    };

    let mut out = Map::new();
    let mut errs = SchemaErrors::new();

    match obj.remove("name") {
        Some(Value::String(name)) => {
            out.insert("name".to_string(), Value::String(name.trim().to_string()));
        }
        Some(Value::Null) | None => {}
        Some(other) => {
            out.insert("name".to_string(), other);
        }
    }

    match obj.remove("type") {
        Some(Value::Null) => {
            out.insert("type".to_string(), Value::String(String::new()));
        }
        Some(Value::String(kind)) => {
            out.insert("type".to_string(), Value::String(kind.trim().to_string()));
        }
        Some(other) => {
            out.insert("type".to_string(), other);
        }
        None => {}
    }

    for field in STAT_FIELDS {
        if let Some(value) = obj.remove(field).and_then(|v| coerce_stat(field, v, &mut errs)) {
            out.insert(field.to_string(), value);
        }
    }

    match obj.remove("cardDesign") {
        Some(Value::String(reference)) => {
            let reference = reference.trim();
            let value = if reference.is_empty() || reference == "null" {
                Value::Null
            } else {
                Value::String(reference.to_string())
            };
            out.insert("cardDesign".to_string(), value);
        }
        Some(Value::Null) => {
            out.insert("cardDesign".to_string(), Value::Null);
        }
        Some(_) => errs.push_field("cardDesign", "must be a design id or name"),
        None => {}
    }

    errs.into_result(ERROR_MESSAGE)?;

    validate::<CardWrite>(&Value::Object(out.clone()), ERROR_MESSAGE)?;

    if method == ServiceMethodKind::Create {
        out.entry("type").or_insert_with(|| Value::String(String::new()));
        for field in STAT_FIELDS {
            out.entry(field).or_insert_with(|| Value::from(0));
        }
        out.entry("cardDesign").or_insert(Value::Null);
    }

    *data = Value::Object(out);
    Ok(())
}

fn require_name(data: &Value, _meta: &HookMeta<Value, StudioParams>) -> anyhow::Result<()> {
    if data.get("name").and_then(Value::as_str).is_some() {
        return Ok(());
    }
    let mut errs = SchemaErrors::new();
    errs.push_field("name", "is required");
    errs.into_result(ERROR_MESSAGE)
}

pub fn register(app: &DeckApp<Value, StudioParams>) -> anyhow::Result<()> {
    app.service("cards")?.hooks(|h| {
        h.schema(|s| {
            s.on_writes()
                .resolve(|data, meta| normalize(data, meta.method))
                .on_create()
                .validate(require_name);
        });
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use deck_core::errors::DeckError;
    use serde_json::json;

    fn errors_of(err: &anyhow::Error) -> Value {
        let deck = DeckError::from_anyhow(err).expect("deck error");
        assert_eq!(deck.code(), 400);
        deck.to_json()["errors"].clone()
    }

    #[test]
    fn form_text_is_coerced_and_defaults_fill_create() {
        let mut data = json!({
            "name": "  Charmander ",
            "type": "Fire",
            "hp": "39",
            "attack": "52",
            "speed": "",
            "cardDesign": "",
            "image": {"filename": "c.png", "contentType": "image/png", "size": 3},
            "imageUrl": "/files/forged",
        });

        normalize(&mut data, ServiceMethodKind::Create).unwrap();

        assert_eq!(
            data,
            json!({
                "name": "Charmander",
                "type": "Fire",
                "hp": 39,
                "attack": 52,
                "defense": 0,
                "specialAttack": 0,
                "specialDefense": 0,
                "speed": 0,
                "cardDesign": null,
            })
        );
    }

    #[test]
    fn patch_keeps_only_what_was_sent() {
        let mut data = json!({ "hp": 40 });
        normalize(&mut data, ServiceMethodKind::Patch).unwrap();
        assert_eq!(data, json!({ "hp": 40 }));
    }

    #[test]
    fn non_numeric_stats_are_field_errors() {
        let mut data = json!({ "name": "Pikachu", "hp": "lots", "speed": 1.5 });
        let err = normalize(&mut data, ServiceMethodKind::Create).unwrap_err();

        let errors = errors_of(&err);
        assert_eq!(errors["hp"], json!(["must be an integer"]));
        assert_eq!(errors["speed"], json!(["must be an integer"]));
    }

    #[test]
    fn stat_range_and_name_length_are_enforced() {
        let mut data = json!({ "name": "", "defense": "10000" });
        let err = normalize(&mut data, ServiceMethodKind::Update).unwrap_err();

        let errors = errors_of(&err);
        assert!(errors.get("name").is_some());
        assert!(errors.get("defense").is_some());
    }

    #[test]
    fn design_reference_is_trimmed() {
        let mut data = json!({ "cardDesign": "  Fire " });
        normalize(&mut data, ServiceMethodKind::Patch).unwrap();
        assert_eq!(data["cardDesign"], "Fire");
    }
}

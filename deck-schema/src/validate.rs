use serde::de::DeserializeOwned;
use serde_json::Value;
use validator::Validate;

use crate::SchemaErrors;

fn friendly_message(code: &str) -> Option<&'static str> {
    match code {
        "required" => Some("is required"),
        "length" => Some("has invalid length"),
        "range" => Some("is out of range"),
        "url" => Some("must be a valid URL"),
        _ => None,
    }
}

/// `special_attack` -> `specialAttack`, matching the JSON field names.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn join_path(prefix: &str, field: &str) -> String {
    let field = camel_case(field);
    if prefix.is_empty() {
        field
    } else {
        format!("{prefix}.{field}")
    }
}

fn push_validation_errors(out: &mut SchemaErrors, prefix: &str, errs: &validator::ValidationErrors) {
    for (field, kind) in errs.errors() {
        match kind {
            validator::ValidationErrorsKind::Field(field_errors) => {
                let key = join_path(prefix, field);
                for e in field_errors {
                    let msg = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .or_else(|| friendly_message(&e.code).map(str::to_string))
                        .unwrap_or_else(|| e.code.to_string());
                    out.push_field(&key, msg);
                }
            }
            validator::ValidationErrorsKind::Struct(nested) => {
                push_validation_errors(out, &join_path(prefix, field), nested.as_ref());
            }
            validator::ValidationErrorsKind::List(list) => {
                let base = join_path(prefix, field);
                for (idx, nested) in list {
                    push_validation_errors(out, &format!("{base}[{idx}]"), nested.as_ref());
                }
            }
        }
    }
}

/// Deserializes `data` into `T` and runs its `validator` rules.
/// Both kinds of failure come back as one `400 BadRequest`.
pub fn validate<T>(data: &Value, error_message: &str) -> anyhow::Result<T>
where
    T: DeserializeOwned + Validate,
{
    let parsed: T = serde_json::from_value(data.clone()).map_err(|e| {
        let mut errs = SchemaErrors::new();
        errs.push_schema(e.to_string());
        errs.into_bad_request_anyhow(error_message)
    })?;

    parsed.validate().map_err(|e| {
        let mut out = SchemaErrors::new();
        push_validation_errors(&mut out, "", &e);
        out.into_bad_request_anyhow(error_message)
    })?;

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use deck_core::errors::DeckError;
    use serde::Deserialize;
    use serde_json::json;
    use validator::Validate;

    use super::{camel_case, validate};

    #[derive(Debug, Deserialize, Validate)]
    #[serde(rename_all = "camelCase")]
    struct Stats {
        #[validate(range(min = 0, max = 9999))]
        special_attack: i64,
    }

    #[derive(Debug, Deserialize, Validate)]
    #[serde(rename_all = "camelCase")]
    struct CardInput {
        #[validate(length(min = 1, max = 100, message = "name must be 1 to 100 characters"))]
        name: String,

        #[validate(nested)]
        stats: Stats,

        #[validate(nested)]
        moves: Vec<Move>,
    }

    #[derive(Debug, Deserialize, Validate)]
    struct Move {
        #[validate(length(min = 1))]
        label: String,
    }

    #[test]
    fn nested_and_list_errors_use_json_paths() {
        let data = json!({
            "name": "",
            "stats": {"specialAttack": 10000},
            "moves": [{"label": "Ember"}, {"label": ""}]
        });

        let err = validate::<CardInput>(&data, "Card validation failed").unwrap_err();
        let deck = DeckError::from_anyhow(&err).unwrap();
        assert_eq!(deck.code(), 400);

        let errors = deck.errors.as_ref().unwrap();
        assert_eq!(errors["name"][0], "name must be 1 to 100 characters");
        assert_eq!(errors["stats.specialAttack"][0], "is out of range");
        assert_eq!(errors["moves[1].label"][0], "has invalid length");
    }

    #[test]
    fn type_mismatch_is_a_schema_error() {
        let err = validate::<Stats>(&json!({"specialAttack": "lots"}), "Card validation failed").unwrap_err();
        let deck = DeckError::from_anyhow(&err).unwrap();

        assert_eq!(deck.code(), 400);
        assert!(deck.errors.as_ref().unwrap()["_schema"][0].is_string());
    }

    #[test]
    fn camel_case_matches_serde_renaming() {
        assert_eq!(camel_case("special_defense"), "specialDefense");
        assert_eq!(camel_case("hp"), "hp");
    }
}

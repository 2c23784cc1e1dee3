use deck_core::schema::{HookMeta, SchemaHooksExt};
use deck_core::DeckApp;
use deck_schema::{schema_error, validate, SchemaErrors};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use validator::{Validate, ValidationError};

use crate::services::StudioParams;

pub const ERROR_MESSAGE: &str = "Design validation failed";

fn non_negative(n: &Number) -> Result<(), ValidationError> {
    if n.as_f64().is_some_and(|v| v >= 0.0) {
        Ok(())
    } else {
        Err(ValidationError::new("range").with_message("must be a number >= 0".into()))
    }
}

fn default_weight() -> String {
    "normal".to_string()
}

fn default_alignment() -> String {
    "left".to_string()
}

fn default_title_size() -> String {
    "24px".to_string()
}

fn default_text_size() -> String {
    "16px".to_string()
}

/// The visual properties of a design. Numbers keep the exact JSON form
/// they were submitted in.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DesignStyles {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 8))]
    pub gradient_colors: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "non_negative"))]
    pub border_width: Option<Number>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_style: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "non_negative"))]
    pub border_radius: Option<Number>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "non_negative"))]
    pub shadow_blur: Option<Number>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats_bg_color: Option<String>,

    #[serde(rename = "customCSS", default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 10000))]
    pub custom_css: Option<String>,

    #[serde(default = "default_weight")]
    pub title_font_weight: String,

    #[serde(default = "default_alignment")]
    pub title_alignment: String,

    #[serde(default = "default_title_size")]
    pub title_size: String,

    #[serde(default = "default_weight")]
    pub text_font_weight: String,

    #[serde(default = "default_text_size")]
    pub text_size: String,
}

impl Default for DesignStyles {
    fn default() -> Self {
        Self {
            background: None,
            gradient_colors: None,
            border_color: None,
            border_width: None,
            border_style: None,
            border_radius: None,
            shadow_color: None,
            shadow_blur: None,
            title_color: None,
            text_color: None,
            stats_bg_color: None,
            custom_css: None,
            title_font_weight: default_weight(),
            title_alignment: default_alignment(),
            title_size: default_title_size(),
            text_font_weight: default_weight(),
            text_size: default_text_size(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct DesignWrite {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "name must be 1 to 100 characters"))]
    name: Option<String>,

    #[serde(default)]
    #[validate(nested)]
    styles: DesignStyles,
}

/// `24` and `"24"` become `"24px"`; anything else is left alone.
fn px_size(value: &mut Value) {
    let bare = match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() && s.trim().parse::<f64>().is_ok() => Some(s.trim().to_string()),
        _ => None,
    };
    if let Some(bare) = bare {
        *value = Value::String(format!("{bare}px"));
    }
}

/// Trims the name, normalizes sizes, applies style defaults and rewrites
/// the payload into its stored shape `{ name?, styles }`.
fn normalize(data: &mut Value) -> anyhow::Result<()> {
    let Some(obj) = data.as_object_mut() else {
        return Err(schema_error(ERROR_MESSAGE, "body must be a JSON object"));
    };

    if let Some(Value::String(name)) = obj.get_mut("name") {
        *name = name.trim().to_string();
    }
    if let Some(Value::Object(styles)) = obj.get_mut("styles") {
        for key in ["titleSize", "textSize"] {
            if let Some(v) = styles.get_mut(key) {
                px_size(v);
            }
        }
    }

    let parsed: DesignWrite = validate(data, ERROR_MESSAGE)?;

    let mut out = serde_json::Map::new();
    if let Some(name) = parsed.name {
        out.insert("name".to_string(), Value::String(name));
    }
    out.insert("styles".to_string(), serde_json::to_value(parsed.styles)?);
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
    app.service("designs")?.hooks(|h| {
        h.schema(|s| {
            s.on_replace()
                .resolve(|data, _meta| normalize(data))
                .on_create()
                .validate(require_name);
        });
    });
    Ok(())
}

//! CSS rendering of a design, as the gallery draws it.

use serde_json::{json, Number, Value};

use super::designs_schema::DesignStyles;

fn px(n: Option<&Number>, default: &str) -> String {
    match n {
        Some(n) if n.as_f64().is_some_and(|v| v > 0.0) => format!("{n}px"),
        _ => format!("{default}px"),
    }
}

fn or<'a>(v: &'a Option<String>, default: &'a str) -> &'a str {
    v.as_deref().filter(|s| !s.is_empty()).unwrap_or(default)
}

pub fn card_background(styles: &DesignStyles) -> String {
    match &styles.gradient_colors {
        Some(colors) if colors.len() > 1 => format!("linear-gradient(45deg, {})", colors.join(", ")),
        _ => or(&styles.background, "#ffffff").to_string(),
    }
}

/// `{ card, title, text, stats, customCSS? }`, camelCase CSS properties.
pub fn design_css(styles: &DesignStyles) -> Value {
    let mut css = json!({
        "card": {
            "background": card_background(styles),
            "border": format!(
                "{} {} {}",
                px(styles.border_width.as_ref(), "2"),
                or(&styles.border_style, "solid"),
                or(&styles.border_color, "#000000"),
            ),
            "borderRadius": px(styles.border_radius.as_ref(), "8"),
            "boxShadow": format!(
                "0 0 {} {}",
                px(styles.shadow_blur.as_ref(), "4"),
                or(&styles.shadow_color, "rgba(0,0,0,0.2)"),
            ),
            "color": or(&styles.text_color, "#000000"),
        },
        "title": {
            "color": or(&styles.title_color, "#000000"),
            "fontWeight": styles.title_font_weight,
            "textAlign": styles.title_alignment,
            "fontSize": styles.title_size,
        },
        "text": {
            "fontWeight": styles.text_font_weight,
            "fontSize": styles.text_size,
        },
        "stats": {
            "backgroundColor": or(&styles.stats_bg_color, "#f5f5f5"),
        },
    });

    if let Some(custom) = styles.custom_css.as_deref().filter(|s| !s.trim().is_empty()) {
        css["customCSS"] = Value::String(custom.to_string());
    }
    css
}

/// CSS for a stored design record; a malformed `styles` renders defaults.
pub fn record_css(design: &Value) -> Value {
    let styles = design
        .get("styles")
        .cloned()
        .and_then(|v| serde_json::from_value::<DesignStyles>(v).ok())
        .unwrap_or_default();
    design_css(&styles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_wins_over_background() {
        let styles = DesignStyles {
            background: Some("#ff0000".into()),
            gradient_colors: Some(vec!["#fff".into(), "#f00".into()]),
            ..Default::default()
        };
        assert_eq!(card_background(&styles), "linear-gradient(45deg, #fff, #f00)");

        let single = DesignStyles {
            background: Some("#ff0000".into()),
            gradient_colors: Some(vec!["#fff".into()]),
            ..Default::default()
        };
        assert_eq!(card_background(&single), "#ff0000");
    }

    #[test]
    fn record_css_fills_in_gallery_defaults() {
        let css = record_css(&json!({"name": "Fire", "styles": {"borderWidth": 3, "borderColor": "#f00"}}));

        assert_eq!(css["card"]["border"], "3px solid #f00");
        assert_eq!(css["card"]["borderRadius"], "8px");
        assert_eq!(css["card"]["boxShadow"], "0 0 4px rgba(0,0,0,0.2)");
        assert_eq!(css["title"]["fontSize"], "24px");
        assert_eq!(css["stats"]["backgroundColor"], "#f5f5f5");
        assert!(css.get("customCSS").is_none());
    }
}

use crate::services::StudioParams;

pub const EXPAND_CONFIG_KEY: &str = "cards.expandDesign";
pub const REPLACED_IMAGES_CONFIG_KEY: &str = "cards.replacedImages";

/// Card query options, read from the REST query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardParams {
    /// `?expand=`; `None` falls back to the service default.
    pub expand: Option<bool>,
    /// `?cardDesign=<id>` gallery filter.
    pub card_design: Option<String>,
}

impl CardParams {
    pub fn expand_design(&self, default: bool) -> bool {
        self.expand.unwrap_or(default)
    }
}

impl From<&StudioParams> for CardParams {
    fn from(params: &StudioParams) -> Self {
        let expand = params.query_value("expand").map(|raw| {
            let raw = raw.trim();
            !(raw.is_empty() || raw.eq_ignore_ascii_case("none") || raw.eq_ignore_ascii_case("false"))
        });

        let card_design = params
            .query_value("cardDesign")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Self { expand, card_design }
    }
}

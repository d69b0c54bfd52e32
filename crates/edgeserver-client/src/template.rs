//! Rich message templates attached to bot replies.
//!
//! These types carry no behavior; they mirror what the server renders as
//! buttons, carousels, charts and tables.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::serde_util::null_as_default;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateType {
    Text,
    Image,
    Video,
    Audio,
    Location,
    Button,
    Carousel,
    Chart,
    Table,
    /// Literal this client does not know yet.
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateActionType {
    Message,
    Uri,
    Emit,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageAspectRatio {
    Rectangle,
    Square,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSize {
    Cover,
    Contain,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableRowType {
    Object,
    Array,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableColumnFormat {
    Date,
    DateTime,
    Currency,
    #[serde(other)]
    Unknown,
}

/// Structured message template. Which optional fields are set depends on
/// `template_type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageTemplate {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub template_type: TemplateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub quick_replies: Vec<QuickReply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_content_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_aspect_ratio: Option<ImageAspectRatio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<ImageSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<TemplateButton>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_action: Option<TemplateAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<TemplateColumn>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_options: Option<Vec<ChartOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_chart: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<TemplateTable>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub references: Vec<TemplateReference>,
    /// Superseded by `text`; still sent by older servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickReply {
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateButton {
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub action: TemplateAction,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateAction {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub action_type: TemplateActionType,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

/// One card of a carousel template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateColumn {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_aspect_ratio: Option<ImageAspectRatio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<ImageSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_background_color: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub buttons: Vec<TemplateButton>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_action: Option<TemplateAction>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartOption {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub chart_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub spec: serde_json::Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateTable {
    #[serde(default, deserialize_with = "null_as_default")]
    pub row_type: TableRowType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub columns: Vec<TableColumn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<TablePagination>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumn {
    #[serde(default, deserialize_with = "null_as_default")]
    pub header: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<TableColumnFormat>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePagination {
    #[serde(default, deserialize_with = "null_as_default")]
    pub size: u32,
}

/// Citation shown under a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateReference {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub uri: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_button_template() {
        let template: MessageTemplate = serde_json::from_value(serde_json::json!({
            "type": "BUTTON",
            "text": "Pick one",
            "buttons": [
                {"label": "Docs", "action": {"type": "URI", "text": null, "uri": "https://example.com", "payload": null}},
                {"label": "Again", "action": {"type": "EMIT", "eventName": "retry", "payload": {"n": 1}}}
            ],
            "quickReplies": [{"text": "yes"}]
        }))
        .expect("decode");

        assert_eq!(template.template_type, TemplateType::Button);
        let buttons = template.buttons.expect("buttons");
        assert_eq!(buttons[0].action.action_type, TemplateActionType::Uri);
        assert_eq!(buttons[1].action.event_name.as_deref(), Some("retry"));
        assert_eq!(template.quick_replies.len(), 1);
    }

    #[test]
    fn decodes_table_template_with_formats() {
        let template: MessageTemplate = serde_json::from_value(serde_json::json!({
            "type": "TABLE",
            "table": {
                "rowType": "OBJECT",
                "columns": [{"header": "When", "key": "at", "format": "DATE_TIME"}],
                "pagination": {"size": 20},
                "data": [{"at": "2024-01-01T00:00:00Z"}]
            }
        }))
        .expect("decode");

        let table = template.table.expect("table");
        assert_eq!(table.row_type, TableRowType::Object);
        assert_eq!(table.columns[0].format, Some(TableColumnFormat::DateTime));
        assert_eq!(table.pagination, Some(TablePagination { size: 20 }));
    }

    #[test]
    fn unknown_literals_decode_as_unknown() {
        let template: MessageTemplate = serde_json::from_value(serde_json::json!({
            "type": "MARKDOWN",
            "imageAspectRatio": "wide",
            "imageSize": "fill",
            "buttons": [{"label": "Go", "action": {"type": "POSTBACK"}}],
            "table": {
                "rowType": "MATRIX",
                "columns": [{"header": "Cost", "key": "c", "format": "PERCENT"}]
            }
        }))
        .expect("decode");

        assert_eq!(template.template_type, TemplateType::Unknown);
        assert_eq!(template.image_aspect_ratio, Some(ImageAspectRatio::Unknown));
        assert_eq!(template.image_size, Some(ImageSize::Unknown));
        let buttons = template.buttons.expect("buttons");
        assert_eq!(buttons[0].action.action_type, TemplateActionType::Unknown);
        let table = template.table.expect("table");
        assert_eq!(table.row_type, TableRowType::Unknown);
        assert_eq!(table.columns[0].format, Some(TableColumnFormat::Unknown));
    }

    #[test]
    fn nulls_and_missing_fields_fall_back_to_defaults() {
        let template: MessageTemplate = serde_json::from_value(serde_json::json!({
            "type": null,
            "quickReplies": [{"text": null}],
            "buttons": [{"label": null, "action": null}],
            "columns": [{"title": null, "text": null, "buttons": null}],
            "chartOptions": [{"type": "bar", "title": null, "spec": null}],
            "table": {
                "rowType": null,
                "columns": [{"header": null, "key": null}],
                "pagination": {"size": null},
                "data": null
            },
            "references": [{"title": null, "uri": null}]
        }))
        .expect("decode");

        assert_eq!(template.template_type, TemplateType::Unknown);
        assert_eq!(template.quick_replies[0].text, "");
        let buttons = template.buttons.expect("buttons");
        assert_eq!(buttons[0].label, "");
        assert_eq!(buttons[0].action, TemplateAction::default());
        let columns = template.columns.expect("columns");
        assert_eq!(columns[0].title, "");
        assert!(columns[0].buttons.is_empty());
        let chart = &template.chart_options.expect("charts")[0];
        assert_eq!(chart.chart_type, "bar");
        assert_eq!(chart.title, "");
        assert!(chart.spec.is_empty());
        let table = template.table.expect("table");
        assert_eq!(table.row_type, TableRowType::Unknown);
        assert_eq!(table.columns[0].header, "");
        assert_eq!(table.pagination, Some(TablePagination { size: 0 }));
        assert!(table.data.is_empty());
        assert_eq!(template.references[0].uri, "");
    }

    #[test]
    fn template_without_type_still_decodes() {
        let template: MessageTemplate =
            serde_json::from_value(serde_json::json!({"text": "plain"})).expect("decode");
        assert_eq!(template.template_type, TemplateType::Unknown);
        assert_eq!(template.text.as_deref(), Some("plain"));
    }

    #[test]
    fn omits_unset_optional_fields() {
        let template: MessageTemplate =
            serde_json::from_value(serde_json::json!({"type": "TEXT", "text": "hi"}))
                .expect("decode");
        let encoded = serde_json::to_value(&template).expect("encode");
        assert_eq!(encoded, serde_json::json!({"type": "TEXT", "text": "hi"}));
    }
}

//! Rendered control values

use serde::{Deserialize, Serialize};

use super::ComponentId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonStyle {
    #[default]
    Primary,
    Secondary,
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub default: bool,
}

/// One rendered interactive control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Control {
    Button {
        custom_id: ComponentId,
        label: String,
        style: ButtonStyle,
        #[serde(skip_serializing_if = "Option::is_none")]
        emoji: Option<String>,
        disabled: bool,
    },
    Link {
        url: String,
        label: String,
    },
    Select {
        custom_id: ComponentId,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
        options: Vec<SelectOption>,
        min_values: u8,
        max_values: u8,
        disabled: bool,
    },
}

impl Control {
    /// Row width the control occupies on the remote surface
    pub fn default_width(&self) -> usize {
        match self {
            Control::Button { .. } | Control::Link { .. } => 1,
            Control::Select { .. } => 5,
        }
    }

    /// Id the remote side reports back on interaction, if any
    pub fn custom_id(&self) -> Option<&ComponentId> {
        match self {
            Control::Button { custom_id, .. } | Control::Select { custom_id, .. } => Some(custom_id),
            Control::Link { .. } => None,
        }
    }
}

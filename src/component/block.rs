//! The merged content block value

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One merged visual block. Content units write into it additively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

impl ContentBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field
    pub fn field(&mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> &mut Self {
        self.fields.push(Field {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    /// Append to the description, separated by a newline
    pub fn append_description(&mut self, text: &str) -> &mut Self {
        match &mut self.description {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(text);
            }
            None => self.description = Some(text.to_string()),
        }
        self
    }

    /// True when no unit wrote anything
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::media_type::MediaType;

pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";
pub const APPLICATION_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// A request body definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub content: IndexMap<String, MediaType>,

    #[serde(default)]
    pub required: bool,
}

impl RequestBody {
    /// The first declared media type, which decides how the body binds.
    pub fn primary_media_type(&self) -> Option<&str> {
        self.content.keys().next().map(String::as_str)
    }

    /// Whether the body binds as individual form fields.
    pub fn is_form(&self) -> bool {
        matches!(
            self.primary_media_type(),
            Some(MULTIPART_FORM_DATA | APPLICATION_FORM_URLENCODED)
        )
    }
}

/// A reference or inline request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestBodyOrRef {
    Ref {
        #[serde(rename = "$ref")]
        ref_path: String,
    },
    RequestBody(RequestBody),
}

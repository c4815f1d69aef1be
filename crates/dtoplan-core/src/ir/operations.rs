use std::collections::BTreeSet;

use serde::Serialize;

use super::models::Deprecation;
use super::types::{MappedType, NormalizedName};
use crate::parse::security::SecuritySchemeType;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
    Trace,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
            HttpMethod::Trace => "TRACE",
        }
    }
}

/// Where a parameter binds. Declaration order is the canonical
/// positional order of an operation's parameter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterLocation {
    Path,
    Header,
    Query,
    Cookie,
    FormField,
    Body,
}

/// A planned operation parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterPlan {
    pub name: NormalizedName,
    pub ident: String,
    pub wire_name: String,
    pub location: ParameterLocation,
    pub mapped: MappedType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<Deprecation>,
    /// Part content type for multipart form fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// One media type of a body and the type it maps to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaTypePlan {
    pub media_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped: Option<MappedType>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestBodyPlan {
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub contents: Vec<MediaTypePlan>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderPlan {
    pub name: String,
    pub mapped: MappedType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<Deprecation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponsePlan {
    /// Status code or `default`.
    pub status: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contents: Vec<MediaTypePlan>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<HeaderPlan>,
}

impl ResponsePlan {
    pub fn is_success(&self) -> bool {
        self.status.starts_with('2')
    }
}

/// What an operation returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReturnType {
    /// No success response carries content.
    Void,
    /// All success media types agree on one type.
    Typed { mapped: MappedType },
    /// Success media types map to different types.
    Untyped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityRequirementPlan {
    pub scheme: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<SecuritySchemeType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

/// A fully resolved API operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationPlan {
    pub operation_id: String,
    pub name: NormalizedName,
    pub method: HttpMethod,
    pub path: String,
    /// Placeholder names in `path`, in template order.
    pub path_slots: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub parameters: Vec<ParameterPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBodyPlan>,
    pub responses: Vec<ResponsePlan>,
    pub return_type: ReturnType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<SecurityRequirementPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<Deprecation>,
}

impl OperationPlan {
    /// Every mapped type the operation mentions.
    pub fn mapped_types(&self) -> impl Iterator<Item = &MappedType> {
        let params = self.parameters.iter().map(|p| &p.mapped);
        let body = self
            .request_body
            .iter()
            .flat_map(|b| b.contents.iter().filter_map(|c| c.mapped.as_ref()));
        let responses = self.responses.iter().flat_map(|r| {
            r.contents
                .iter()
                .filter_map(|c| c.mapped.as_ref())
                .chain(r.headers.iter().map(|h| &h.mapped))
        });
        params.chain(body).chain(responses)
    }

    pub fn parameter(&self, wire_name: &str) -> Option<&ParameterPlan> {
        self.parameters.iter().find(|p| p.wire_name == wire_name)
    }
}

/// Plan for one grouped interface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceFilePlan {
    /// Target interface name.
    pub name: String,
    pub group_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub module_path: String,
    pub operations: Vec<OperationPlan>,
    pub references: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub external_imports: BTreeSet<String>,
}

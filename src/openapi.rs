// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! OpenAPI 3 document model and the derivations the importer needs.
//!
//! Only the parts of the document that drive the generated `Product` and
//! `Backend` are modelled: `info`, `servers`, global `security` and
//! `components.securitySchemes`. Everything else is ignored on parse.
//!
//! # Name derivation
//!
//! | Title | [`system_name_from_openapi_title`] | [`k8s_name_from_openapi_title`] |
//! |---|---|---|
//! | `My API!` | `my_api_` | `myapi` |
//! | `Petstore` | `petstore` | `petstore` |

use crate::constants::DEFAULT_OPENAPI_SERVER_URL;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Parsed OpenAPI document.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenApiDocument {
    pub openapi: String,
    pub info: Info,
    #[serde(default)]
    pub servers: Vec<Server>,
    /// Global security requirements: scheme name to required scopes.
    #[serde(default)]
    pub security: Vec<BTreeMap<String, Vec<String>>>,
    #[serde(default)]
    pub components: Components,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Info {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Server {
    pub url: String,
    #[serde(default)]
    pub variables: BTreeMap<String, ServerVariable>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ServerVariable {
    pub default: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    #[serde(default)]
    pub security_schemes: BTreeMap<String, SecurityScheme>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum SecurityScheme {
    #[serde(rename = "apiKey")]
    ApiKey {
        name: String,
        #[serde(rename = "in")]
        location: ApiKeyLocation,
    },
    #[serde(rename = "http")]
    Http { scheme: String },
    #[serde(rename = "oauth2")]
    OAuth2 {},
    #[serde(rename = "openIdConnect")]
    OpenIdConnect {
        #[serde(rename = "openIdConnectUrl", default)]
        open_id_connect_url: String,
    },
    /// Any other scheme type, such as `mutualTLS`.
    #[serde(other)]
    Unsupported,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    Query,
    Header,
    Cookie,
}

/// A global security requirement resolved against `components.securitySchemes`.
#[derive(Clone, Debug, PartialEq)]
pub struct SecurityRequirement<'a> {
    pub name: &'a str,
    pub scheme: &'a SecurityScheme,
    pub scopes: &'a [String],
}

impl OpenApiDocument {
    /// The first declared server, which is the one the backend points at.
    #[must_use]
    pub fn first_server(&self) -> Option<&Server> {
        self.servers.first()
    }

    /// Global security requirements with their schemes.
    ///
    /// Requirements naming an undeclared scheme are skipped.
    #[must_use]
    pub fn global_security_requirements(&self) -> Vec<SecurityRequirement<'_>> {
        self.security
            .iter()
            .flat_map(|requirement| requirement.iter())
            .filter_map(|(name, scopes)| {
                let Some(scheme) = self.components.security_schemes.get(name) else {
                    debug!(scheme = %name, "Security requirement references undeclared scheme");
                    return None;
                };
                Some(SecurityRequirement {
                    name,
                    scheme,
                    scopes,
                })
            })
            .collect()
    }
}

/// Parse a JSON or YAML OpenAPI document and check it is usable.
///
/// # Errors
///
/// Returns a parse error for malformed input and [`Error::OpenApiDocument`] when the
/// document is not OpenAPI 3 or has no title.
pub fn parse_openapi_document(raw: &str) -> Result<OpenApiDocument> {
    let document: OpenApiDocument = if raw.trim_start().starts_with('{') {
        serde_json::from_str(raw)?
    } else {
        serde_yaml::from_str(raw)?
    };
    validate_openapi_document(&document)?;
    Ok(document)
}

/// Semantic checks the importer relies on.
///
/// # Errors
///
/// Returns [`Error::OpenApiDocument`] describing the first problem found.
pub fn validate_openapi_document(document: &OpenApiDocument) -> Result<()> {
    if !document.openapi.starts_with("3.") {
        return Err(Error::OpenApiDocument(format!(
            "unsupported openapi version '{}', expected 3.x",
            document.openapi
        )));
    }
    if document.info.title.trim().is_empty() {
        return Err(Error::OpenApiDocument("info.title is required".to_string()));
    }
    Ok(())
}

/// System name from a title: lower-cased, every non-word character replaced by `_`.
#[must_use]
pub fn system_name_from_openapi_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Kubernetes name prefix from a title: lower-cased, non-alphanumerics dropped.
#[must_use]
pub fn k8s_name_from_openapi_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// Render a server URL, substituting each `{variable}` with its declared default.
///
/// With no server the OpenAPI default of `/` is returned.
///
/// # Errors
///
/// Returns [`Error::UndeclaredServerVariable`] when the template references a
/// variable the server does not declare.
pub fn render_openapi_server_url(server: Option<&Server>) -> Result<String> {
    let Some(server) = server else {
        return Ok(DEFAULT_OPENAPI_SERVER_URL.to_string());
    };

    let mut rendered = String::with_capacity(server.url.len());
    let mut rest = server.url.as_str();
    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());

        // Only `{word}` is a variable; anything else stays literal, brace included.
        if name_len == 0 || !after[name_len..].starts_with('}') {
            rendered.push('{');
            rest = after;
            continue;
        }

        let variable = &after[..name_len];
        let value = server
            .variables
            .get(variable)
            .ok_or_else(|| Error::UndeclaredServerVariable {
                url: server.url.clone(),
                variable: variable.to_string(),
            })?;
        rendered.push_str(&value.default);
        rest = &after[name_len + 1..];
    }
    rendered.push_str(rest);
    Ok(rendered)
}

#[cfg(test)]
#[path = "openapi_tests.rs"]
mod openapi_tests;

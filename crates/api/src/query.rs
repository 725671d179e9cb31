//! Query parameter types for API handlers.

use serde::Deserialize;

/// `?fields=a,b` attribute selection.
#[derive(Debug, Default, Deserialize)]
pub struct FieldsParams {
    pub fields: Option<String>,
}

/// Query parameters for the digital identity list endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListIdentityParams {
    pub fields: Option<String>,
    pub status: Option<String>,
    pub trust_level: Option<String>,
}

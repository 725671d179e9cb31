//! The TMF720 digital identity record.
//!
//! Wire names are camelCase; the TMF polymorphism attributes keep their
//! `@` prefix (`@type`, `@baseType`, `@schemaLocation`, `@referredType`).

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::mutation::Notifiable;
use crate::types::{ResourceId, Timestamp};

/// Resource kind name used in event payloads and error messages.
pub const RESOURCE_KIND: &str = "digitalIdentity";

/// Path the resource collection is served under; `href`s are built from it.
pub const COLLECTION_PATH: &str = "/tmf-api/digitalIdentityManagement/v4/digitalIdentity";

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Lifecycle status of a digital identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityStatus {
    Unknown,
    Active,
    Suspended,
    Archived,
    #[default]
    Pending,
}

impl IdentityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Archived => "archived",
            Self::Pending => "pending",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "unknown" => Ok(Self::Unknown),
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "archived" => Ok(Self::Archived),
            "pending" => Ok(Self::Pending),
            _ => Err(CoreError::Validation(format!(
                "Invalid status: '{s}'. Must be one of: unknown, active, suspended, archived, pending"
            ))),
        }
    }
}

impl std::fmt::Display for IdentityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a single credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialState {
    Active,
    Inactive,
    Expired,
}

// ---------------------------------------------------------------------------
// Building blocks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quantity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePeriod {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date_time: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date_time: Option<Timestamp>,
}

/// An attachment carried inline or by reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRefOrValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Quantity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_for: Option<TimePeriod>,
    #[serde(rename = "@referredType", skip_serializing_if = "Option::is_none")]
    pub referred_type: Option<String>,
    #[serde(rename = "@baseType", skip_serializing_if = "Option::is_none")]
    pub base_type: Option<String>,
    #[serde(rename = "@schemaLocation", skip_serializing_if = "Option::is_none")]
    pub schema_location: Option<String>,
    #[serde(rename = "@type", skip_serializing_if = "Option::is_none")]
    pub at_type: Option<String>,
}

/// An email or phone contact point (`@type` says which).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMedium {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_for: Option<TimePeriod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(rename = "@baseType", skip_serializing_if = "Option::is_none")]
    pub base_type: Option<String>,
    #[serde(rename = "@schemaLocation", skip_serializing_if = "Option::is_none")]
    pub schema_location: Option<String>,
    #[serde(rename = "@type", skip_serializing_if = "Option::is_none")]
    pub at_type: Option<String>,
}

/// A login/password or token credential (`@type` says which).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<CredentialState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_for: Option<TimePeriod>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contact_medium: Vec<ContactMedium>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_credential: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(rename = "@baseType", skip_serializing_if = "Option::is_none")]
    pub base_type: Option<String>,
    #[serde(rename = "@schemaLocation", skip_serializing_if = "Option::is_none")]
    pub schema_location: Option<String>,
    #[serde(rename = "@type", skip_serializing_if = "Option::is_none")]
    pub at_type: Option<String>,
}

/// A party playing a role with respect to the identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedParty {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "@referredType", skip_serializing_if = "Option::is_none")]
    pub referred_type: Option<String>,
    #[serde(rename = "@baseType", skip_serializing_if = "Option::is_none")]
    pub base_type: Option<String>,
    #[serde(rename = "@schemaLocation", skip_serializing_if = "Option::is_none")]
    pub schema_location: Option<String>,
    #[serde(rename = "@type", skip_serializing_if = "Option::is_none")]
    pub at_type: Option<String>,
}

/// Reference to a party or resource held elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "@referredType", skip_serializing_if = "Option::is_none")]
    pub referred_type: Option<String>,
    #[serde(rename = "@baseType", skip_serializing_if = "Option::is_none")]
    pub base_type: Option<String>,
    #[serde(rename = "@schemaLocation", skip_serializing_if = "Option::is_none")]
    pub schema_location: Option<String>,
    #[serde(rename = "@type", skip_serializing_if = "Option::is_none")]
    pub at_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A stored digital identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigitalIdentity {
    pub id: ResourceId,
    pub href: String,
    pub creation_date: Timestamp,
    pub last_update: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default)]
    pub status: IdentityStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachment: Vec<AttachmentRefOrValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contact_medium: Vec<ContactMedium>,
    #[serde(default)]
    pub credential: Vec<Credential>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub individual_identified: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub party_role_identified: Vec<RelatedParty>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_party: Vec<RelatedParty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_identified: Option<EntityRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_for: Option<TimePeriod>,
    #[serde(rename = "@baseType", skip_serializing_if = "Option::is_none")]
    pub base_type: Option<String>,
    #[serde(rename = "@schemaLocation", skip_serializing_if = "Option::is_none")]
    pub schema_location: Option<String>,
    #[serde(rename = "@type", skip_serializing_if = "Option::is_none")]
    pub at_type: Option<String>,
}

impl DigitalIdentity {
    /// Materialise a new record from validated input.
    ///
    /// `base_url` is the public origin of the service, without a trailing
    /// slash; the `href` is built from it and the collection path.
    pub fn from_input(input: DigitalIdentityInput, id: ResourceId, base_url: &str, now: Timestamp) -> Self {
        let href = format!("{base_url}{COLLECTION_PATH}/{id}");
        Self {
            id,
            href,
            creation_date: now,
            last_update: now,
            nickname: input.nickname,
            status: input.status.unwrap_or_default(),
            attachment: input.attachment,
            contact_medium: input.contact_medium,
            credential: input.credential,
            individual_identified: input.individual_identified,
            party_role_identified: input.party_role_identified,
            related_party: input.related_party,
            resource_identified: input.resource_identified,
            valid_for: input.valid_for,
            base_type: input.base_type,
            schema_location: input.schema_location,
            at_type: input.at_type,
        }
    }

    /// Whether any credential carries the given trust level.
    pub fn has_trust_level(&self, trust_level: &str) -> bool {
        self.credential
            .iter()
            .any(|c| c.trust_level.as_deref() == Some(trust_level))
    }
}

impl Notifiable for DigitalIdentity {
    const KIND: &'static str = RESOURCE_KIND;

    fn resource_id(&self) -> &str {
        &self.id
    }
}

// ---------------------------------------------------------------------------
// Input DTO
// ---------------------------------------------------------------------------

/// Client-supplied fields of a digital identity.
///
/// Used as the create body and, after key checks, to validate the nested
/// parts of a patch body. Server-owned fields (`id`, `href`, dates) are
/// not part of it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigitalIdentityInput {
    pub nickname: Option<String>,
    pub status: Option<IdentityStatus>,
    #[serde(default)]
    pub attachment: Vec<AttachmentRefOrValue>,
    #[serde(default)]
    pub contact_medium: Vec<ContactMedium>,
    #[serde(default)]
    pub credential: Vec<Credential>,
    pub individual_identified: Option<EntityRef>,
    #[serde(default)]
    pub party_role_identified: Vec<RelatedParty>,
    #[serde(default)]
    pub related_party: Vec<RelatedParty>,
    pub resource_identified: Option<EntityRef>,
    pub valid_for: Option<TimePeriod>,
    #[serde(rename = "@baseType")]
    pub base_type: Option<String>,
    #[serde(rename = "@schemaLocation")]
    pub schema_location: Option<String>,
    #[serde(rename = "@type")]
    pub at_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

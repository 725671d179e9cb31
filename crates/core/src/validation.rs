//! Create and patch validation rules for digital identities.

use serde_json::{Map, Value};

use crate::digital_identity::{ContactMedium, DigitalIdentityInput, RelatedParty};
use crate::error::CoreError;

/// Attributes the server owns; a patch may not touch them.
const IMMUTABLE_ATTRIBUTES: [&str; 2] = ["id", "href"];

/// Validate the body of a create request.
pub fn validate_create(input: &DigitalIdentityInput) -> Result<(), CoreError> {
    if input.credential.is_empty() {
        return Err(CoreError::Validation("Credential is mandatory".into()));
    }

    if input.individual_identified.is_none()
        && input.party_role_identified.is_empty()
        && input.resource_identified.is_none()
    {
        return Err(CoreError::Validation(
            "At least one of individualIdentified, partyRoleIdentified, or \
             resourceIdentified must be provided"
                .into(),
        ));
    }

    validate_parts(input)
}

/// Validate the body of a patch request.
///
/// Returns the typed view of the patch so callers do not parse it twice.
pub fn validate_patch(changes: &Map<String, Value>) -> Result<DigitalIdentityInput, CoreError> {
    if IMMUTABLE_ATTRIBUTES.iter().any(|k| changes.contains_key(*k)) {
        return Err(CoreError::Validation("Cannot update id or href".into()));
    }

    let input: DigitalIdentityInput = serde_json::from_value(Value::Object(changes.clone()))
        .map_err(|e| CoreError::Validation(format!("Invalid patch body: {e}")))?;

    validate_parts(&input)?;
    Ok(input)
}

/// Rules for nested parts, shared by create and patch.
fn validate_parts(input: &DigitalIdentityInput) -> Result<(), CoreError> {
    for cred in &input.credential {
        if is_blank(&cred.id) || is_blank(&cred.at_type) {
            return Err(CoreError::Validation(
                "Credential must have id and @type".into(),
            ));
        }
        validate_contact_media(&cred.contact_medium)?;
    }

    validate_contact_media(&input.contact_medium)?;

    if let Some(individual) = &input.individual_identified {
        if is_blank(&individual.id) {
            return Err(CoreError::Validation(
                "individualIdentified must have id".into(),
            ));
        }
    }

    validate_parties(&input.party_role_identified, "partyRoleIdentified")?;
    validate_parties(&input.related_party, "relatedParty")?;

    if let Some(resource) = &input.resource_identified {
        if is_blank(&resource.id) {
            return Err(CoreError::Validation(
                "resourceIdentified must have id".into(),
            ));
        }
    }

    Ok(())
}

fn validate_parties(parties: &[RelatedParty], field: &str) -> Result<(), CoreError> {
    if parties
        .iter()
        .any(|p| is_blank(&p.id) || is_blank(&p.referred_type))
    {
        return Err(CoreError::Validation(format!(
            "{field} must have id and @referredType"
        )));
    }
    Ok(())
}

fn validate_contact_media(media: &[ContactMedium]) -> Result<(), CoreError> {
    if media.iter().any(|m| is_blank(&m.id) || is_blank(&m.at_type)) {
        return Err(CoreError::Validation(
            "contactMedium must have id and @type".into(),
        ));
    }
    Ok(())
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

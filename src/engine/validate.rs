use crate::limits::*;
use crate::model::{NewBooking, NewResource, ResourcePatch};

use super::EngineError;

fn require(field: &'static str, value: &str) -> Result<(), EngineError> {
    if value.trim().is_empty() {
        return Err(EngineError::MissingField(field));
    }
    Ok(())
}

fn check_len(value: &str, max: usize, what: &'static str) -> Result<(), EngineError> {
    if value.len() > max {
        return Err(EngineError::LimitExceeded(what));
    }
    Ok(())
}

fn check_opt_len(value: Option<&String>, max: usize, what: &'static str) -> Result<(), EngineError> {
    value.map_or(Ok(()), |v| check_len(v, max, what))
}

pub(crate) fn validate_new_resource(input: &NewResource) -> Result<(), EngineError> {
    require("id", &input.id)?;
    require("name", &input.name)?;
    require("type", &input.kind)?;
    check_len(&input.id, MAX_ID_LEN, "resource id too long")?;
    check_len(&input.name, MAX_FIELD_LEN, "resource name too long")?;
    check_len(&input.kind, MAX_FIELD_LEN, "resource type too long")?;
    check_opt_len(input.location.as_ref(), MAX_FIELD_LEN, "location too long")?;
    check_opt_len(input.status.as_ref(), MAX_FIELD_LEN, "status too long")?;
    check_opt_len(input.description.as_ref(), MAX_TEXT_LEN, "description too long")?;
    Ok(())
}

pub(crate) fn validate_patch(patch: &ResourcePatch) -> Result<(), EngineError> {
    if let Some(name) = &patch.name {
        require("name", name)?;
    }
    if let Some(kind) = &patch.kind {
        require("type", kind)?;
    }
    check_opt_len(patch.name.as_ref(), MAX_FIELD_LEN, "resource name too long")?;
    check_opt_len(patch.kind.as_ref(), MAX_FIELD_LEN, "resource type too long")?;
    check_opt_len(patch.location.as_ref(), MAX_FIELD_LEN, "location too long")?;
    check_opt_len(patch.status.as_ref(), MAX_FIELD_LEN, "status too long")?;
    check_opt_len(patch.description.as_ref(), MAX_TEXT_LEN, "description too long")?;
    Ok(())
}

pub(crate) fn validate_new_booking(input: &NewBooking) -> Result<(), EngineError> {
    require("id", &input.id)?;
    require("resourceId", &input.resource_id)?;
    require("userId", &input.user_id)?;
    if input.start_time.is_none() {
        return Err(EngineError::MissingField("startTime"));
    }
    if input.end_time.is_none() {
        return Err(EngineError::MissingField("endTime"));
    }
    check_len(&input.id, MAX_ID_LEN, "booking id too long")?;
    check_len(&input.resource_id, MAX_ID_LEN, "resource id too long")?;
    check_len(&input.user_id, MAX_FIELD_LEN, "user id too long")?;
    check_opt_len(input.user_name.as_ref(), MAX_FIELD_LEN, "user name too long")?;
    check_opt_len(input.user_role.as_ref(), MAX_FIELD_LEN, "user role too long")?;
    check_opt_len(input.purpose.as_ref(), MAX_TEXT_LEN, "purpose too long")?;
    Ok(())
}

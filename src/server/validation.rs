use std::fmt;

use serde_json::json;

use crate::server::dto::{
    AddAuthorizeRequest, CheckAuthorizeRequest, CreateVersionRequest, LivesRequest, MaskInput,
    PageParams, TeamMembersRequest,
};
use crate::server::response::ApiError;
use crate::service::recycle::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::service::{AuthGrant, AuthTarget};
use crate::types::{AuthType, FileType, Mask};

const MAX_NAME_LEN: usize = 100;
const MAX_IDS_PER_REQUEST: usize = 200;

/// Every problem found in one request, in field order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<String>);

impl ValidationErrors {
    fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, Self> {
        if self.0.is_empty() { Ok(value()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("; "))
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::bad_request(errors.to_string()).with_data(json!({ "errors": errors.0 }))
    }
}

/// Ids plus the application they must belong to.
#[derive(Debug, PartialEq, Eq)]
pub struct LivesQuery {
    pub application_id: String,
    pub ids: Vec<String>,
}

fn check_name(errors: &mut ValidationErrors, entity: &str, name: &str) {
    if name.trim().is_empty() {
        errors.push(format!("{entity} name cannot be empty"));
    } else if name.len() > MAX_NAME_LEN {
        errors.push(format!("{entity} name cannot exceed {MAX_NAME_LEN} characters"));
    } else if name.chars().any(char::is_control) {
        errors.push(format!("{entity} name cannot contain control characters"));
    }
}

fn check_id(errors: &mut ValidationErrors, field: &str, id: &str) {
    if id.trim().is_empty() {
        errors.push(format!("{field} is required"));
    }
}

fn check_ids(errors: &mut ValidationErrors, field: &str, ids: &[String]) {
    if ids.len() > MAX_IDS_PER_REQUEST {
        errors.push(format!("{field} cannot list more than {MAX_IDS_PER_REQUEST} ids"));
    }
    if ids.iter().any(|id| id.trim().is_empty()) {
        errors.push(format!("{field} cannot contain empty ids"));
    }
}

fn parse_auth_type(errors: &mut ValidationErrors, raw: &str) -> Option<AuthType> {
    let parsed = AuthType::parse(raw);
    if parsed.is_none() {
        errors.push(format!("unknown authorization type: {raw}"));
    }
    parsed
}

fn parse_mask(errors: &mut ValidationErrors, input: &MaskInput) -> Option<Mask> {
    let mask = match input {
        MaskInput::Bits(bits) if Mask::ALL.has(Mask::new(*bits)) => Some(Mask::new(*bits)),
        MaskInput::Bits(_) => None,
        MaskInput::Names(names) => Mask::parse_many(names),
    };

    match mask {
        Some(mask) if !mask.is_empty() => Some(mask),
        _ => {
            errors.push("mask must name at least one of admin, edit, delete, view");
            None
        }
    }
}

pub fn validate_name(entity: &str, name: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_name(&mut errors, entity, name);
    errors.finish(|| ())
}

/// Maps the plural path segment (`pages`, `templates`, ...) to a file type.
pub fn parse_kind(kind: &str) -> Result<FileType, ValidationErrors> {
    FileType::from_plural(kind)
        .ok_or_else(|| ValidationErrors(vec![format!("unknown file kind: {kind}")]))
}

pub fn validate_lives(req: LivesRequest) -> Result<LivesQuery, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_id(&mut errors, "application_id", &req.application_id);
    check_ids(&mut errors, "ids", &req.ids);

    errors.finish(|| LivesQuery {
        application_id: req.application_id,
        ids: req.ids,
    })
}

pub fn validate_version(req: &CreateVersionRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_id(&mut errors, "content_id", &req.content_id);
    let relation_ids: Vec<String> = req.relations.iter().map(|(_, id)| id.clone()).collect();
    check_ids(&mut errors, "relations", &relation_ids);
    errors.finish(|| ())
}

pub fn validate_team_members(req: TeamMembersRequest) -> Result<Vec<String>, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if req.user_ids.is_empty() {
        errors.push("user_ids cannot be empty");
    }
    check_ids(&mut errors, "user_ids", &req.user_ids);
    errors.finish(|| req.user_ids)
}

/// Returns `(page, size)`. Page defaults to 1, size to the listing default.
pub fn validate_page(params: &PageParams) -> Result<(u32, u32), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let page = params.page.unwrap_or(1);
    let size = params.size.unwrap_or(DEFAULT_PAGE_SIZE);

    if page == 0 {
        errors.push("page starts at 1");
    }
    if size == 0 || size > MAX_PAGE_SIZE {
        errors.push(format!("size must be between 1 and {MAX_PAGE_SIZE}"));
    }
    errors.finish(|| (page, size))
}

pub fn validate_add_authorize(req: AddAuthorizeRequest) -> Result<AuthGrant, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let auth_type = parse_auth_type(&mut errors, &req.auth_type);
    check_id(&mut errors, "type_id", &req.type_id);
    if req.target_ids.is_empty() {
        errors.push("target_ids cannot be empty");
    }
    check_ids(&mut errors, "target_ids", &req.target_ids);
    let mask = parse_mask(&mut errors, &req.mask);

    match (auth_type, mask) {
        (Some(auth_type), Some(mask)) if errors.0.is_empty() => Ok(AuthGrant {
            auth_type,
            type_id: req.type_id,
            target_ids: req.target_ids,
            mask,
            allow: req.allow,
        }),
        _ => Err(errors),
    }
}

pub fn validate_check_authorize(
    req: &CheckAuthorizeRequest,
) -> Result<(AuthTarget, Mask), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let auth_type = parse_auth_type(&mut errors, &req.auth_type);
    check_id(&mut errors, "type_id", &req.type_id);
    let mask = parse_mask(&mut errors, &req.mask);

    match (auth_type, mask) {
        (Some(auth_type), Some(mask)) if errors.0.is_empty() => {
            Ok((AuthTarget::scope(auth_type, req.type_id.clone()), mask))
        }
        _ => Err(errors),
    }
}

pub fn validate_scope(auth_type: &str, type_id: &str) -> Result<AuthTarget, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let parsed = parse_auth_type(&mut errors, auth_type);
    check_id(&mut errors, "type_id", type_id);

    match parsed {
        Some(auth_type) if errors.0.is_empty() => Ok(AuthTarget::scope(auth_type, type_id)),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_request(auth_type: &str, targets: &[&str], mask: MaskInput) -> AddAuthorizeRequest {
        AddAuthorizeRequest {
            auth_type: auth_type.to_string(),
            type_id: "app-1".to_string(),
            target_ids: targets.iter().map(|t| t.to_string()).collect(),
            mask,
            allow: true,
        }
    }

    #[test]
    fn test_add_authorize_with_names() {
        let grant = validate_add_authorize(add_request(
            "application",
            &["t1"],
            MaskInput::Names(vec!["edit".to_string(), "view".to_string()]),
        ))
        .unwrap();
        assert_eq!(grant.auth_type, AuthType::Application);
        assert_eq!(grant.mask, Mask::EDIT.union(Mask::VIEW));
    }

    #[test]
    fn test_add_authorize_collects_every_error() {
        let errors = validate_add_authorize(add_request("namespace", &[], MaskInput::Bits(32)))
            .unwrap_err();
        assert_eq!(errors.0.len(), 3);
        assert!(errors.0[0].contains("namespace"));
    }

    #[test]
    fn test_empty_mask_is_rejected() {
        let result = validate_add_authorize(add_request("file", &["t1"], MaskInput::Bits(0)));
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("templates").unwrap(), FileType::Template);
        assert!(parse_kind("template").is_err());
    }

    #[test]
    fn test_lives_rejects_blank_ids() {
        let errors = validate_lives(LivesRequest {
            application_id: String::new(),
            ids: vec!["a".to_string(), " ".to_string()],
        })
        .unwrap_err();
        assert_eq!(
            errors.0,
            vec![
                "application_id is required".to_string(),
                "ids cannot contain empty ids".to_string()
            ]
        );
    }

    #[test]
    fn test_team_members_require_ids() {
        let errors = validate_team_members(TeamMembersRequest { user_ids: vec![] }).unwrap_err();
        assert_eq!(errors.0, vec!["user_ids cannot be empty".to_string()]);

        let ids = validate_team_members(TeamMembersRequest {
            user_ids: vec!["u1".to_string()],
        })
        .unwrap();
        assert_eq!(ids, vec!["u1".to_string()]);
    }

    #[test]
    fn test_page_defaults_and_bounds() {
        assert_eq!(validate_page(&PageParams::default()).unwrap(), (1, DEFAULT_PAGE_SIZE));
        assert!(validate_page(&PageParams { page: Some(0), size: None }).is_err());
        assert!(validate_page(&PageParams { page: None, size: Some(MAX_PAGE_SIZE + 1) }).is_err());
        assert_eq!(
            validate_page(&PageParams { page: Some(3), size: Some(5) }).unwrap(),
            (3, 5)
        );
    }

    #[test]
    fn test_name_rules() {
        assert!(validate_name("Application", "site").is_ok());
        assert!(validate_name("Application", "").is_err());
        assert!(validate_name("Application", &"x".repeat(101)).is_err());
    }
}

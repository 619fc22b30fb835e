use serde::{Deserialize, Serialize};

use crate::types::{Content, FileRecord, Relations, User};

#[derive(Debug, Deserialize)]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub owner_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateApplicationRequest {
    pub organization_id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub organization_id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ListTeamsParams {
    pub organization_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TeamMembersRequest {
    #[serde(default)]
    pub user_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TeamMembersResponse {
    pub team_id: String,
    /// Ids whose membership actually changed.
    pub changed: Vec<String>,
    pub members: Vec<User>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFileRequest {
    pub application_id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct FileDetail {
    #[serde(flatten)]
    pub file: FileRecord,
    pub contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
pub struct CreateVersionRequest {
    pub content_id: String,
    #[serde(default)]
    pub relations: Relations<String>,
    #[serde(default)]
    pub schemas: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub content_id: String,
    pub version_number: i64,
}

#[derive(Debug, Deserialize)]
pub struct FileStatusRequest {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct LivesRequest {
    pub application_id: String,
    #[serde(default)]
    pub ids: Vec<String>,
}

/// A mask given either as raw bits or as capability names.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MaskInput {
    Bits(u32),
    Names(Vec<String>),
}

#[derive(Debug, Deserialize)]
pub struct AddAuthorizeRequest {
    #[serde(rename = "type")]
    pub auth_type: String,
    pub type_id: String,
    pub target_ids: Vec<String>,
    pub mask: MaskInput,
    #[serde(default = "default_allow")]
    pub allow: bool,
}

fn default_allow() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct AddAuthorizeResponse {
    pub inserted: Vec<String>,
    pub updated: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListAuthorizesParams {
    #[serde(rename = "type")]
    pub auth_type: String,
    pub type_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckAuthorizeRequest {
    #[serde(rename = "type")]
    pub auth_type: String,
    pub type_id: String,
    pub mask: MaskInput,
}

#[derive(Debug, Serialize)]
pub struct CheckAuthorizeResponse {
    pub allowed: bool,
}

//! Global variables, templates, variable declarations, and preview.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use phoneprov_core::Permission;
use phoneprov_core::template::Template;
use phoneprov_core::template_vars::{TemplateVariable, VarType};
use phoneprov_core::vars::{GlobalVariable, VarMap};
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetVariableRequest {
    pub value: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TemplateRequest {
    pub name: String,
    pub content: String,
    pub description: Option<String>,
}

/// Variable declaration payload; the template id comes from the path.
#[derive(Debug, Deserialize)]
pub struct DeclarationRequest {
    pub name: String,
    pub var_type: VarType,
    pub default_value: Option<String>,
    #[serde(default)]
    pub required: bool,
    pub validation_regex: Option<String>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    #[serde(default)]
    pub options: Vec<String>,
    pub parent_id: Option<i64>,
    pub visible_when: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub device_id: i64,
    /// Render this template instead of the device's active config.
    pub template_id: Option<i64>,
    /// Override tier applied on top of everything else.
    #[serde(default)]
    pub variables: VarMap,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub rendered: String,
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<GlobalVariable>>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ManageVariables)?;

    let db = state.db.lock();
    Ok(Json(db.list_variables()?))
}

pub async fn set(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key): Path<String>,
    Json(req): Json<SetVariableRequest>,
) -> ApiResult<Json<GlobalVariable>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ManageVariables)?;

    let db = state.db.lock();
    db.set_variable(&key, &req.value, req.description.as_deref())?;
    db.append_audit(&ctx.principal, "variable.set", "global_variable", None, Some(&key))?;
    let variable = db
        .get_variable(&key)?
        .ok_or_else(|| ApiError::NotFound(format!("variable {key}")))?;
    Ok(Json(variable))
}

pub async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ManageVariables)?;

    let db = state.db.lock();
    if !db.delete_variable(&key)? {
        return Err(ApiError::NotFound(format!("variable {key}")));
    }
    db.append_audit(&ctx.principal, "variable.delete", "global_variable", None, Some(&key))?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn list_templates(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Template>>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ManageVersions)?;

    let db = state.db.lock();
    Ok(Json(db.list_templates()?))
}

pub async fn create_template(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<TemplateRequest>,
) -> ApiResult<Json<Template>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ManageVersions)?;

    let db = state.db.lock();
    let template = db.create_template(&req.name, &req.content, req.description.as_deref())?;
    db.append_audit(&ctx.principal, "template.create", "template", Some(template.id), None)?;
    Ok(Json(template))
}

pub async fn get_template(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<Template>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ManageVersions)?;

    let db = state.db.lock();
    let template = db
        .get_template(id)?
        .ok_or_else(|| ApiError::NotFound(format!("template {id}")))?;
    Ok(Json(template))
}

pub async fn update_template(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<TemplateRequest>,
) -> ApiResult<Json<Template>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ManageVersions)?;

    let db = state.db.lock();
    let template = db.update_template(id, &req.name, &req.content, req.description.as_deref())?;
    db.append_audit(&ctx.principal, "template.update", "template", Some(id), None)?;
    Ok(Json(template))
}

pub async fn list_declarations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<TemplateVariable>>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ManageVariables)?;

    let db = state.db.lock();
    Ok(Json(db.list_template_variables(id)?))
}

/// Create or replace a declaration, keyed by (template, name).
pub async fn save_declaration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<DeclarationRequest>,
) -> ApiResult<Json<TemplateVariable>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ManageVariables)?;

    let decl = TemplateVariable {
        id: 0,
        template_id: id,
        name: req.name,
        var_type: req.var_type,
        default_value: req.default_value,
        required: req.required,
        validation_regex: req.validation_regex,
        min_value: req.min_value,
        max_value: req.max_value,
        options: req.options,
        parent_id: req.parent_id,
        visible_when: req.visible_when,
    };

    let db = state.db.lock();
    db.get_template(id)?.ok_or_else(|| ApiError::NotFound(format!("template {id}")))?;
    let row_id = db.save_template_variable(&decl)?;
    db.append_audit(&ctx.principal, "declaration.save", "template_variable", Some(row_id), Some(&decl.name))?;
    Ok(Json(TemplateVariable { id: row_id, ..decl }))
}

/// Render what a device would receive, without touching any state.
pub async fn preview(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PreviewRequest>,
) -> ApiResult<Json<PreviewResponse>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ManageVersions)?;

    let db = state.db.lock();
    let rendered = db.render_preview(req.device_id, req.template_id, req.variables)?;
    Ok(Json(PreviewResponse { rendered }))
}

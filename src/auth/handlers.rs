use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            ForgotPasswordRequest, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
            ResetPasswordRequest, UpdateProfileRequest, UserProfile,
        },
        errors::AuthError,
        extractors::AuthUser,
        middleware::authenticate,
        reset::PasswordResetFlow,
        services::AuthService,
    },
    state::AppState,
};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

/// Routes behind the bearer-token check. Mounted under `/api`.
pub fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/user",
            get(get_profile).post(update_profile).put(update_profile),
        )
        .route_layer(middleware::from_fn_with_state(state, authenticate))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "rejected request body");
            Err(AuthError::InvalidInput("invalid request body".into()))
        }
    }
}

#[instrument(skip(svc, payload))]
pub async fn register(
    State(svc): State<AuthService>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), AuthError> {
    let req = json_body(payload)?;
    svc.register(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("user registered successfully")),
    ))
}

#[instrument(skip(svc, payload))]
pub async fn login(
    State(svc): State<AuthService>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AuthError> {
    let req = json_body(payload)?;
    let token = svc.login(&req.username, &req.password).await?;
    Ok(Json(LoginResponse {
        message: "login successful".into(),
        token,
    }))
}

#[instrument(skip(flow, payload))]
pub async fn forgot_password(
    State(flow): State<PasswordResetFlow>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AuthError> {
    let req = json_body(payload)?;
    flow.request_reset(&req.email).await?;
    Ok(Json(MessageResponse::new("password reset email sent")))
}

#[instrument(skip(flow, payload))]
pub async fn reset_password(
    State(flow): State<PasswordResetFlow>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AuthError> {
    let req = json_body(payload)?;
    flow.confirm_reset(&req.token, &req.password).await?;
    Ok(Json(MessageResponse::new("password has been reset")))
}

#[instrument(skip(svc))]
pub async fn get_profile(
    State(svc): State<AuthService>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserProfile>, AuthError> {
    Ok(Json(svc.profile(user_id).await?))
}

#[instrument(skip(svc, payload))]
pub async fn update_profile(
    State(svc): State<AuthService>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AuthError> {
    let req = json_body(payload)?;
    svc.update_profile(user_id, &req.name, &req.surname).await?;
    info!(%user_id, "profile update accepted");
    Ok(Json(MessageResponse::new("user updated successfully")))
}

//! RPC adapter: the account and session operations as tonic-style unary calls.
//!
//! Each method takes a `tonic::Request` and answers with a `tonic::Response`
//! or a `tonic::Status`, so a generated service trait can delegate to it
//! one-to-one. Callers are trusted services, so user IDs travel in the
//! message rather than in a bearer token.

use serde::{Deserialize, Serialize};
use tonic::{Request, Response, Status};
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;
use crate::models::{
    ChangePasswordRequest, LoginRequest, LogoutResponse, RefreshRequest, RegisterRequest,
    TokenResponse, UpdateProfileRequest, UserResponse, ValidateRequest, ValidateResponse,
};

impl From<AppError> for Status {
    fn from(e: AppError) -> Self {
        match e {
            AppError::Validation(m) => Status::invalid_argument(m),
            AppError::NotFound(m) => Status::not_found(m),
            AppError::Conflict(m) => Status::already_exists(m),
            AppError::Unauthorized(m) => Status::unauthenticated(m),
            AppError::Forbidden(m) => Status::permission_denied(m),
            AppError::Internal(m) => {
                tracing::error!(error = %m, "rpc failed");
                Status::internal("Internal server error")
            }
        }
    }
}

fn status(e: impl Into<AppError>) -> Status {
    let e: AppError = e.into();
    Status::from(e)
}

fn parse_user_id(raw: &str) -> Result<Uuid, Status> {
    Uuid::parse_str(raw).map_err(|_| Status::invalid_argument("user_id must be a UUID"))
}

/// Message naming a single user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserIdRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub user_id: String,
    pub profile: UpdateProfileRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeUserPasswordRequest {
    pub user_id: String,
    pub passwords: ChangePasswordRequest,
}

/// Unary RPC handlers over the shared [`AppState`].
#[derive(Clone)]
pub struct AccountsRpc {
    state: AppState,
}

impl AccountsRpc {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub async fn login(
        &self,
        request: Request<LoginRequest>,
    ) -> Result<Response<TokenResponse>, Status> {
        let body = request.into_inner();
        let pair = self
            .state
            .sessions
            .login(&body.email, &body.password)
            .await
            .map_err(status)?;
        Ok(Response::new(TokenResponse::bearer(
            pair,
            self.state.config.access_token_ttl_secs(),
        )))
    }

    pub async fn refresh_token(
        &self,
        request: Request<RefreshRequest>,
    ) -> Result<Response<TokenResponse>, Status> {
        let body = request.into_inner();
        let pair = self
            .state
            .sessions
            .refresh(&body.refresh_token)
            .await
            .map_err(status)?;
        Ok(Response::new(TokenResponse::bearer(
            pair,
            self.state.config.access_token_ttl_secs(),
        )))
    }

    pub async fn logout(
        &self,
        request: Request<UserIdRequest>,
    ) -> Result<Response<LogoutResponse>, Status> {
        let user_id = parse_user_id(&request.into_inner().user_id)?;
        self.state.sessions.logout(user_id).await.map_err(status)?;
        Ok(Response::new(LogoutResponse { success: true }))
    }

    pub async fn validate_token(
        &self,
        request: Request<ValidateRequest>,
    ) -> Result<Response<ValidateResponse>, Status> {
        let body = request.into_inner();
        let user_id = self
            .state
            .sessions
            .validate_token(&body.access_token)
            .map_err(status)?;
        Ok(Response::new(ValidateResponse { user_id }))
    }

    pub async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<UserResponse>, Status> {
        let body = request.into_inner();
        let user = self
            .state
            .users
            .register(&body.email, &body.password, body.name.as_deref())
            .await
            .map_err(status)?;
        Ok(Response::new(user.into()))
    }

    pub async fn get_user(
        &self,
        request: Request<UserIdRequest>,
    ) -> Result<Response<UserResponse>, Status> {
        let user_id = parse_user_id(&request.into_inner().user_id)?;
        let user = self.state.users.get(user_id).await.map_err(status)?;
        Ok(Response::new(user.into()))
    }

    pub async fn update_user(
        &self,
        request: Request<UpdateUserRequest>,
    ) -> Result<Response<UserResponse>, Status> {
        let body = request.into_inner();
        let user_id = parse_user_id(&body.user_id)?;
        let user = self
            .state
            .users
            .update_profile(user_id, body.profile.into())
            .await
            .map_err(status)?;
        Ok(Response::new(user.into()))
    }

    pub async fn change_password(
        &self,
        request: Request<ChangeUserPasswordRequest>,
    ) -> Result<Response<()>, Status> {
        let body = request.into_inner();
        let user_id = parse_user_id(&body.user_id)?;
        self.state
            .users
            .change_password(
                user_id,
                &body.passwords.current_password,
                &body.passwords.new_password,
            )
            .await
            .map_err(status)?;
        Ok(Response::new(()))
    }

    pub async fn delete_user(
        &self,
        request: Request<UserIdRequest>,
    ) -> Result<Response<()>, Status> {
        let user_id = parse_user_id(&request.into_inner().user_id)?;
        self.state.users.delete(user_id).await.map_err(status)?;
        Ok(Response::new(()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use acct_core::auth::password::MIN_BCRYPT_COST;
    use acct_core::kv::MemoryKvStore;
    use acct_core::users::MemoryUserDirectory;
    use tonic::Code;

    use super::*;
    use crate::config::ApiConfig;

    fn rpc() -> AccountsRpc {
        let mut config = ApiConfig::new("rpc-test-secret");
        config.bcrypt_cost = MIN_BCRYPT_COST;
        AccountsRpc::new(AppState::new(
            config,
            Arc::new(MemoryKvStore::new()),
            Arc::new(MemoryUserDirectory::new()),
        ))
    }

    async fn register(rpc: &AccountsRpc, email: &str) -> UserResponse {
        rpc.register(Request::new(RegisterRequest {
            email: email.into(),
            password: "password123".into(),
            name: None,
        }))
        .await
        .unwrap()
        .into_inner()
    }

    fn login_request(email: &str, password: &str) -> Request<LoginRequest> {
        Request::new(LoginRequest {
            email: email.into(),
            password: password.into(),
        })
    }

    #[tokio::test]
    async fn session_lifecycle_over_rpc() {
        let rpc = rpc();
        let user = register(&rpc, "a@x.com").await;

        let tokens = rpc
            .login(login_request("a@x.com", "password123"))
            .await
            .unwrap()
            .into_inner();
        let validated = rpc
            .validate_token(Request::new(ValidateRequest {
                access_token: tokens.access_token.clone(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(validated.user_id, user.id);

        rpc.logout(Request::new(UserIdRequest {
            user_id: user.id.to_string(),
        }))
        .await
        .unwrap();

        let err = rpc
            .refresh_token(Request::new(RefreshRequest {
                refresh_token: tokens.refresh_token,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unauthenticated);
    }

    #[tokio::test]
    async fn error_kinds_map_to_status_codes() {
        let rpc = rpc();
        register(&rpc, "a@x.com").await;

        let bad_login = rpc
            .login(login_request("a@x.com", "wrongpassword"))
            .await
            .unwrap_err();
        assert_eq!(bad_login.code(), Code::Unauthenticated);
        assert_eq!(bad_login.message(), "Invalid credentials");

        let duplicate = rpc
            .register(Request::new(RegisterRequest {
                email: "a@x.com".into(),
                password: "password123".into(),
                name: None,
            }))
            .await
            .unwrap_err();
        assert_eq!(duplicate.code(), Code::AlreadyExists);

        let bad_id = rpc
            .get_user(Request::new(UserIdRequest {
                user_id: "nope".into(),
            }))
            .await
            .unwrap_err();
        assert_eq!(bad_id.code(), Code::InvalidArgument);

        let missing = rpc
            .delete_user(Request::new(UserIdRequest {
                user_id: Uuid::new_v4().to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(missing.code(), Code::NotFound);
    }

    #[test]
    fn internal_errors_hide_detail() {
        let status = Status::from(AppError::Internal("redis: connection refused".into()));
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "Internal server error");
    }

    #[tokio::test]
    async fn account_updates_over_rpc() {
        let rpc = rpc();
        let user = register(&rpc, "a@x.com").await;

        let updated = rpc
            .update_user(Request::new(UpdateUserRequest {
                user_id: user.id.to_string(),
                profile: UpdateProfileRequest {
                    email: None,
                    name: Some("Ay".into()),
                },
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(updated.name.as_deref(), Some("Ay"));

        rpc.change_password(Request::new(ChangeUserPasswordRequest {
            user_id: user.id.to_string(),
            passwords: ChangePasswordRequest {
                current_password: "password123".into(),
                new_password: "password456".into(),
            },
        }))
        .await
        .unwrap();
        rpc.login(login_request("a@x.com", "password456"))
            .await
            .unwrap();

        let fetched = rpc
            .get_user(Request::new(UserIdRequest {
                user_id: user.id.to_string(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(fetched.email, "a@x.com");
    }
}

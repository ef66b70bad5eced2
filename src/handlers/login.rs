use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::services::AuthOutcome;
use crate::state::AppState;

/// ログインリクエスト
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// TOTP認証コード（6桁の数字）
    pub code: String,
}

/// ログインレスポンス
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub id: Uuid,
    pub username: String,
}

/// ログインハンドラー
///
/// POST /api/login
///
/// 処理フロー:
/// 1. リクエストバリデーション
/// 2. 認証サービスで判定（期限 → パスワード → TOTP の順）
/// 3. 結果をHTTPステータスへ写像
///
/// # Security
/// - Expired のみ403で区別する
/// - UserNotFound / InvalidPassword / InvalidSecondFactor は
///   同一の401に畳み込む（列挙・推測オラクルの防止）
/// - コードの形式チェックもここでは行わない（形式不正も同じ401にする）
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    validate_login_request(&request)?;

    let outcome = state
        .auth_service
        .authenticate(&request.username, &request.password, &request.code)
        .await?;

    match outcome {
        AuthOutcome::Success { id, username } => Ok(Json(LoginResponse { id, username })),
        AuthOutcome::Expired => Err(AppError::CredentialExpired),
        AuthOutcome::UserNotFound
        | AuthOutcome::InvalidPassword
        | AuthOutcome::InvalidSecondFactor => {
            Err(AppError::Authentication("invalid_credentials".to_string()))
        }
    }
}

/// ログインリクエストのバリデーション
fn validate_login_request(request: &LoginRequest) -> Result<(), AppError> {
    if request.username.trim().is_empty() {
        return Err(AppError::Validation("ユーザー名は必須です".to_string()));
    }
    if request.password.is_empty() {
        return Err(AppError::Validation("パスワードは必須です".to_string()));
    }
    if request.code.is_empty() {
        return Err(AppError::Validation("認証コードは必須です".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, password: &str, code: &str) -> LoginRequest {
        LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
            code: code.to_string(),
        }
    }

    #[test]
    fn test_validate_empty_username() {
        let result = validate_login_request(&request("", "password123", "123456"));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_empty_password() {
        let result = validate_login_request(&request("alice", "", "123456"));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_empty_code() {
        let result = validate_login_request(&request("alice", "password123", ""));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_valid_request() {
        let result = validate_login_request(&request("alice", "password123", "123456"));
        assert!(result.is_ok());
    }
}

use axum::{Json, extract::State};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;
use crate::services::qr;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IssuePasswordRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct IssuePasswordResponse {
    pub id: Uuid,
    pub username: String,
    /// 平文パスワード（このレスポンスでのみ露出する）
    pub password: String,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    /// パスワードを埋め込んだQRコード（data URL）。生成失敗時は省略
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
}

/// パスワード発行ハンドラー
///
/// POST /api/password/issue
///
/// # Security
/// - 平文パスワードはログに出力しない
/// - QRコード生成はレコード永続化の後。失敗しても発行自体は成功とする
pub async fn issue_password(
    State(state): State<AppState>,
    Json(request): Json<IssuePasswordRequest>,
) -> Result<Json<IssuePasswordResponse>, AppError> {
    validate_username(&request.username)?;

    let issued = state
        .provisioning_service
        .issue_password(&request.username, &mut OsRng)
        .await?;

    // QRコード生成失敗は非致命（レコードは既に永続化済み）
    let qr_code = match qr::encode_to_base64_png(&issued.password) {
        Ok(image) => Some(format!("data:image/png;base64,{image}")),
        Err(e) => {
            tracing::warn!(error = %e, username = %issued.username, "QRコード生成に失敗（発行は成功）");
            None
        }
    };

    Ok(Json(IssuePasswordResponse {
        id: issued.id,
        username: issued.username,
        password: issued.password,
        issued_at: issued.issued_at,
        qr_code,
    }))
}

/// username バリデーション（発行系ハンドラー共通）
pub(crate) fn validate_username(username: &str) -> Result<(), AppError> {
    if username.trim().is_empty() {
        return Err(AppError::Validation("ユーザー名は必須です".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_empty_username() {
        assert!(validate_username("").is_err());
    }

    #[test]
    fn test_validate_whitespace_username() {
        assert!(validate_username("   ").is_err());
    }

    #[test]
    fn test_validate_valid_username() {
        assert!(validate_username("alice").is_ok());
    }
}

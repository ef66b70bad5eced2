use axum::{Json, extract::State};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::handlers::password::validate_username;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IssueSecondFactorRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct IssueSecondFactorResponse {
    pub username: String,
    /// Base32エンコードされた共有シークレット
    pub secret: String,
    /// 認証アプリ登録用の otpauth URL
    pub otpauth_url: String,
    /// otpauth URL を埋め込んだQRコード（data URL）。生成失敗時は省略
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
}

/// 2FAシークレット発行ハンドラー
///
/// POST /api/2fa/issue
///
/// レコードが存在しないユーザーには404を返す。
/// 再発行は旧シークレットを即時無効化する（単一アクティブシークレット）。
///
/// # Security
/// - シークレット平文はログ出力禁止
/// - QRコード生成はレコード永続化の後。失敗しても発行自体は成功とする
pub async fn issue_second_factor(
    State(state): State<AppState>,
    Json(request): Json<IssueSecondFactorRequest>,
) -> Result<Json<IssueSecondFactorResponse>, AppError> {
    validate_username(&request.username)?;

    let issued = state
        .provisioning_service
        .issue_second_factor(&request.username, &mut OsRng)
        .await?;

    // QRコード生成失敗は非致命（シークレットは既に永続化済み）
    let qr_code = match state
        .totp_service
        .qr_base64(&issued.username, &issued.secret)
    {
        Ok(image) => Some(format!("data:image/png;base64,{image}")),
        Err(e) => {
            tracing::warn!(error = %e, username = %issued.username, "QRコード生成に失敗（発行は成功）");
            None
        }
    };

    Ok(Json(IssueSecondFactorResponse {
        username: issued.username,
        secret: issued.secret,
        otpauth_url: issued.otpauth_url,
        qr_code,
    }))
}

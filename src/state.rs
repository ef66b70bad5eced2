use std::sync::Arc;

use secrecy::ExposeSecret;
use sqlx::PgPool;

use crate::config::Config;
use crate::error::AppError;
use crate::repositories::CredentialRepository;
use crate::services::{AuthService, ProvisioningService, TotpService};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL コネクションプール
    pub db_pool: PgPool,
    /// アプリケーション設定（Arc で共有）
    pub config: Arc<Config>,
    /// クレデンシャルリポジトリ
    pub credential_repo: CredentialRepository,
    /// TOTPサービス
    pub totp_service: TotpService,
    /// 認証サービス
    pub auth_service: AuthService<CredentialRepository>,
    /// プロビジョニングサービス
    pub provisioning_service: ProvisioningService<CredentialRepository>,
}

impl AppState {
    /// 新しい AppState を作成
    pub fn new(db_pool: PgPool, config: Config) -> Result<Self, AppError> {
        let config = Arc::new(config);
        let credential_repo = CredentialRepository::new(db_pool.clone());
        let totp_service = TotpService::new(
            config.totp_issuer.clone(),
            config.encryption_key.expose_secret(),
        )?;
        let auth_service = AuthService::new(credential_repo.clone(), totp_service.clone());
        let provisioning_service = ProvisioningService::new(
            credential_repo.clone(),
            totp_service.clone(),
            config.password_length,
        );

        Ok(Self {
            db_pool,
            config,
            credential_repo,
            totp_service,
            auth_service,
            provisioning_service,
        })
    }
}

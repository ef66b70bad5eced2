use rand::{CryptoRng, RngCore};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::CredentialRecord;
use crate::repositories::CredentialStore;
use crate::services::TotpService;
use crate::services::{password, secret};

/// 発行されたパスワード
///
/// `password` はこの値を通じてのみ露出する。ログ出力禁止
#[derive(Debug)]
pub struct IssuedPassword {
    pub id: Uuid,
    pub username: String,
    pub password: String,
    pub issued_at: OffsetDateTime,
}

/// 発行された2FAシークレット
#[derive(Debug)]
pub struct IssuedSecondFactor {
    pub username: String,
    /// Base32エンコードされた共有シークレット
    pub secret: String,
    /// 認証アプリ登録用の otpauth URL（QRコードのペイロード）
    pub otpauth_url: String,
}

/// プロビジョニングサービス
#[derive(Clone)]
pub struct ProvisioningService<S> {
    store: S,
    totp_service: TotpService,
    password_length: usize,
}

impl<S: CredentialStore> ProvisioningService<S> {
    /// 新しい ProvisioningService を作成
    pub fn new(store: S, totp_service: TotpService, password_length: usize) -> Self {
        Self {
            store,
            totp_service,
            password_length,
        }
    }

    /// 新しいパスワードを発行
    ///
    /// レコードが無ければ作成し、あれば上書きする（旧パスワードは即時無効）。
    /// issued_at を現在時刻にリセットして expired をクリアするため、
    /// 期限切れアカウントの復旧経路を兼ねる。
    /// 設定済みの2FAシークレットは維持される
    pub async fn issue_password<R>(
        &self,
        username: &str,
        rng: &mut R,
    ) -> Result<IssuedPassword, AppError>
    where
        R: RngCore + CryptoRng,
    {
        let plaintext = secret::generate_password(rng, self.password_length)?;
        let password_hash = password::hash_password(&plaintext)?;
        let now = OffsetDateTime::now_utc();

        let record = match self.store.get_by_username(username).await? {
            Some(mut record) => {
                record.password_hash = password_hash;
                record.issued_at = Some(now);
                record.expired = false;
                record
            }
            None => CredentialRecord::new(username, password_hash, now),
        };
        self.store.put(&record).await?;

        tracing::info!(username = %username, id = %record.id, "パスワード発行完了");

        Ok(IssuedPassword {
            id: record.id,
            username: record.username,
            password: plaintext,
            issued_at: now,
        })
    }

    /// 新しい2FAシークレットを発行
    ///
    /// レコードが存在しない場合は UserNotFound。
    /// 既存シークレットは上書きされ、旧シークレットで設定済みの
    /// 認証アプリは即時無効になる（単一アクティブシークレット）
    pub async fn issue_second_factor<R>(
        &self,
        username: &str,
        rng: &mut R,
    ) -> Result<IssuedSecondFactor, AppError>
    where
        R: RngCore + CryptoRng,
    {
        let Some(mut record) = self.store.get_by_username(username).await? else {
            tracing::warn!(username = %username, "2FA発行失敗: ユーザー不在");
            return Err(AppError::UserNotFound);
        };

        let totp_secret = secret::generate_totp_secret(rng);
        record.totp_secret_encrypted = Some(self.totp_service.encrypt_secret(&totp_secret)?);
        self.store.put(&record).await?;

        let otpauth_url = self.totp_service.provisioning_url(username, &totp_secret)?;

        tracing::info!(username = %username, "2FAシークレット発行完了");

        Ok(IssuedSecondFactor {
            username: record.username,
            secret: totp_secret,
            otpauth_url,
        })
    }
}

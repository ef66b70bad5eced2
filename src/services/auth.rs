use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::AppError;
use crate::repositories::CredentialStore;
use crate::services::TotpService;
use crate::services::password::{self, DUMMY_HASH};

/// クレデンシャルの有効期限（6ヶ月 = 180日を秒で表現）
pub const CREDENTIAL_EXPIRY_SECS: i64 = 60 * 60 * 24 * 180;

/// 認証の最終結果
///
/// トランスポート層はこの列挙型をHTTPステータスへ純粋に写像する。
/// Expired のみ区別し、それ以外の失敗は全て同一の401に畳み込むこと
/// （ユーザー列挙・二要素推測オラクルの防止）
#[derive(Debug, PartialEq, Eq)]
pub enum AuthOutcome {
    Success { id: Uuid, username: String },
    UserNotFound,
    Expired,
    InvalidPassword,
    InvalidSecondFactor,
}

/// 認証サービス
#[derive(Clone)]
pub struct AuthService<S> {
    store: S,
    totp_service: TotpService,
}

impl<S: CredentialStore> AuthService<S> {
    /// 新しい AuthService を作成
    pub fn new(store: S, totp_service: TotpService) -> Self {
        Self {
            store,
            totp_service,
        }
    }

    /// 認証を実行
    ///
    /// 処理フロー（順序は固定。入れ替え禁止）:
    /// 1. username でレコード取得（不在 → UserNotFound）
    /// 2. 期限チェック（期限切れ → expired をマークして Expired）
    /// 3. パスワード検証（不一致 → InvalidPassword）
    /// 4. TOTP検証（未設定・形式不正・不一致 → InvalidSecondFactor）
    /// 5. 全て通過 → Success（issued_at を現在時刻に更新）
    ///
    /// 期限チェックはパスワード検証より先。期限切れクレデンシャルから
    /// パスワードの正否を漏らさない
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        code: &str,
    ) -> Result<AuthOutcome, AppError> {
        let Some(mut record) = self.store.get_by_username(username).await? else {
            // タイミング攻撃対策: ユーザー不在時もダミーのパスワード検証を実行
            // これにより、ユーザーの存在有無を応答時間から推測できなくなる
            let _ = password::verify_password(password, DUMMY_HASH);
            tracing::warn!(username = %username, "認証失敗: ユーザー不在");
            return Ok(AuthOutcome::UserNotFound);
        };

        let now = OffsetDateTime::now_utc();

        // 期限は issued_at から毎回再計算する（expired フラグは補助）
        if is_expired(record.issued_at, now) {
            if !record.expired {
                record.expired = true;
                self.store.put(&record).await?;
            }
            tracing::warn!(username = %username, "認証失敗: クレデンシャル期限切れ");
            return Ok(AuthOutcome::Expired);
        }

        if !password::verify_password(password, &record.password_hash) {
            tracing::warn!(username = %username, "認証失敗: パスワード不一致");
            return Ok(AuthOutcome::InvalidPassword);
        }

        // 2FA未設定のレコードは第二要素を検証できないため失敗として扱う
        let Some(encrypted) = record.totp_secret_encrypted.as_deref() else {
            tracing::warn!(username = %username, "認証失敗: 2FA未設定");
            return Ok(AuthOutcome::InvalidSecondFactor);
        };

        let secret = self.totp_service.decrypt_secret(encrypted)?;
        let now_secs = now.unix_timestamp() as u64;
        if !self.totp_service.verify_code(&secret, code, now_secs)? {
            tracing::warn!(username = %username, "認証失敗: 認証コード不一致");
            return Ok(AuthOutcome::InvalidSecondFactor);
        }

        // 認証成功: issued_at を更新して有効期限をローリングさせる
        record.issued_at = Some(now);
        record.expired = false;
        self.store.put(&record).await?;

        tracing::info!(username = %username, "認証成功");
        Ok(AuthOutcome::Success {
            id: record.id,
            username: record.username,
        })
    }
}

/// 発行日時から期限切れかどうかを再計算
///
/// issued_at が無いレコードは常に期限切れ扱い
fn is_expired(issued_at: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
    match issued_at {
        Some(issued_at) => now - issued_at > Duration::seconds(CREDENTIAL_EXPIRY_SECS),
        None => true,
    }
}

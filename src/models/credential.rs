use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// ユーザーのクレデンシャルレコード
///
/// パスワードは argon2id の PHC 文字列としてのみ保存される。
/// TOTPシークレットは AES-256-GCM で暗号化されて保存される。
/// 平文パスワード・平文シークレットはログに出力禁止
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CredentialRecord {
    pub id: Uuid,
    /// 一意なユーザー名（作成後は不変）
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    /// nonce (12バイト) + 暗号文。2FA未設定なら None
    #[serde(skip)]
    pub totp_secret_encrypted: Option<Vec<u8>>,
    /// 最後にパスワードを発行した日時。None は常に期限切れ扱い
    #[serde(with = "time::serde::rfc3339::option")]
    pub issued_at: Option<OffsetDateTime>,
    /// 認証時に再計算される補助フラグ（正は issued_at から導出）
    pub expired: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl CredentialRecord {
    /// 初回パスワード発行でレコードを作成
    pub fn new(username: &str, password_hash: String, issued_at: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash,
            totp_secret_encrypted: None,
            issued_at: Some(issued_at),
            expired: false,
            created_at: issued_at,
            updated_at: issued_at,
        }
    }
}

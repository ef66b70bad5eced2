use sqlx::PgPool;

use crate::error::AppError;
use crate::models::CredentialRecord;
use crate::repositories::CredentialStore;

#[derive(Clone)]
pub struct CredentialRepository {
    pool: PgPool,
}

impl CredentialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl CredentialStore for CredentialRepository {
    /// username でクレデンシャルを検索
    ///
    /// # Note
    /// DB セットアップ後は `query_as!` マクロに変更してコンパイル時SQL検証を有効にすること
    async fn get_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRecord>, AppError> {
        let record = sqlx::query_as::<_, CredentialRecord>(
            r#"
            SELECT id, username, password_hash, totp_secret_encrypted,
                   issued_at, expired, created_at, updated_at
            FROM credentials
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// レコードを upsert
    ///
    /// # Note
    /// 単一文の upsert。同一 username への並行書き込みは
    /// Postgres の行ロックで直列化される
    async fn put(&self, record: &CredentialRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO credentials
                (id, username, password_hash, totp_secret_encrypted, issued_at, expired)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (username) DO UPDATE
            SET password_hash = EXCLUDED.password_hash,
                totp_secret_encrypted = EXCLUDED.totp_secret_encrypted,
                issued_at = EXCLUDED.issued_at,
                expired = EXCLUDED.expired,
                updated_at = NOW()
            "#,
        )
        .bind(record.id)
        .bind(&record.username)
        .bind(&record.password_hash)
        .bind(record.totp_secret_encrypted.as_deref())
        .bind(record.issued_at)
        .bind(record.expired)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

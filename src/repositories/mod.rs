pub mod credential;
#[cfg(test)]
pub mod memory;

pub use credential::CredentialRepository;

use crate::error::AppError;
use crate::models::CredentialRecord;

/// クレデンシャルストアの抽象
///
/// username をキーとする get / put（upsert）のみを提供する。
/// テストではインメモリ実装に差し替える
pub trait CredentialStore: Clone + Send + Sync {
    /// username でレコードを検索
    async fn get_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRecord>, AppError>;

    /// レコードを upsert（username キー）
    async fn put(&self, record: &CredentialRecord) -> Result<(), AppError>;
}

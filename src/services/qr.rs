use crate::error::AppError;

/// 任意の文字列ペイロードをQRコード画像（Base64エンコードPNG）に変換
///
/// クレデンシャルレコードの永続化が完了した後にのみ呼び出すこと。
/// 失敗してもレコードには影響しない（呼び出し側で非致命として扱う）
pub fn encode_to_base64_png(payload: &str) -> Result<String, AppError> {
    qrcodegen_image::draw_base64(payload).map_err(|e| {
        tracing::error!(error = %e, "QRコード生成エラー");
        AppError::Internal(anyhow::anyhow!("qr encode error"))
    })
}

use data_encoding::BASE32;
use rand::seq::SliceRandom;
use rand::{CryptoRng, Rng, RngCore};

use crate::error::AppError;

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
/// パスワードに使用する記号セット
pub const SPECIAL_CHARS: &[u8] = b"!@#$%^&*()_+-=[]{}";

/// パスワードの最小長
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// TOTPシークレットのバイト長（160ビット）
const TOTP_SECRET_LEN: usize = 20;

/// ランダムパスワードを生成
///
/// 大文字・小文字・数字・記号を必ず各1文字以上含む。
/// 各クラスから1文字ずつ確保した後、残りを全クラスの和集合から
/// 一様に選び、確保した文字が先頭に固定されないよう全体をシャッフルする。
///
/// 乱数源は呼び出し側から注入する（本番は `OsRng`、テストはシード付き）
///
/// # Errors
/// `length` が8未満の場合は `AppError::Validation`
pub fn generate_password<R>(rng: &mut R, length: usize) -> Result<String, AppError>
where
    R: RngCore + CryptoRng,
{
    if length < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "パスワード長は{MIN_PASSWORD_LENGTH}文字以上を指定してください"
        )));
    }

    let classes = [UPPERCASE, LOWERCASE, DIGITS, SPECIAL_CHARS];
    let union: Vec<u8> = classes.concat();

    let mut bytes = Vec::with_capacity(length);
    for class in classes {
        bytes.push(class[rng.gen_range(0..class.len())]);
    }
    while bytes.len() < length {
        bytes.push(union[rng.gen_range(0..union.len())]);
    }
    bytes.shuffle(rng);

    // 全クラスASCIIのため変換は常に成功する
    String::from_utf8(bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("password bytes not utf8")))
}

/// TOTP用の共有シークレットを生成
///
/// 20バイト（160ビット）の乱数をBase32でエンコードする
pub fn generate_totp_secret<R>(rng: &mut R) -> String
where
    R: RngCore + CryptoRng,
{
    let mut bytes = [0u8; TOTP_SECRET_LEN];
    rng.fill_bytes(&mut bytes);
    BASE32.encode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn test_rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_generate_password_length() {
        let mut rng = test_rng();
        for length in [8, 12, 24, 64] {
            let password = generate_password(&mut rng, length).unwrap();
            assert_eq!(password.len(), length);
        }
    }

    #[test]
    fn test_generate_password_contains_all_classes() {
        let mut rng = test_rng();
        // 最小長でも各クラス1文字の保証が成り立つこと
        for _ in 0..100 {
            let password = generate_password(&mut rng, 8).unwrap();
            let bytes = password.as_bytes();
            assert!(bytes.iter().any(u8::is_ascii_uppercase), "{password}");
            assert!(bytes.iter().any(u8::is_ascii_lowercase), "{password}");
            assert!(bytes.iter().any(u8::is_ascii_digit), "{password}");
            assert!(
                bytes.iter().any(|b| SPECIAL_CHARS.contains(b)),
                "{password}"
            );
        }
    }

    #[test]
    fn test_generate_password_alphabet_only() {
        let mut rng = test_rng();
        let password = generate_password(&mut rng, 24).unwrap();
        let union: Vec<u8> = [UPPERCASE, LOWERCASE, DIGITS, SPECIAL_CHARS].concat();
        assert!(password.bytes().all(|b| union.contains(&b)));
    }

    #[test]
    fn test_generate_password_too_short() {
        let mut rng = test_rng();
        let result = generate_password(&mut rng, 7);
        assert!(result.is_err());
    }

    #[test]
    fn test_generate_password_deterministic_with_seed() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        assert_eq!(
            generate_password(&mut a, 24).unwrap(),
            generate_password(&mut b, 24).unwrap()
        );
    }

    #[test]
    fn test_generate_totp_secret() {
        let mut rng = test_rng();
        let secret = generate_totp_secret(&mut rng);
        // Base32エンコードされた20バイト = 32文字
        assert_eq!(secret.len(), 32);
        assert!(
            secret
                .chars()
                .all(|c| "ABCDEFGHIJKLMNOPQRSTUVWXYZ234567".contains(c))
        );
    }

    #[test]
    fn test_generate_totp_secret_unique() {
        let mut rng = test_rng();
        let a = generate_totp_secret(&mut rng);
        let b = generate_totp_secret(&mut rng);
        assert_ne!(a, b);
    }
}

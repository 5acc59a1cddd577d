pub mod ip;
pub mod url_validator;

pub use url_validator::{NormalizedUrl, is_valid_url, normalize_url, validate_url};

/// 默认字母表：大小写字母 + 数字，共 62 个字符
pub const DEFAULT_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub const DEFAULT_CODE_LENGTH: usize = 6;

pub fn generate_random_code(length: usize) -> String {
    generate_code_from(DEFAULT_ALPHABET, length)
}

/// 从给定字母表中独立均匀地抽取 `length` 个字符
///
/// 不是密码学安全的随机数；字母表为空时返回空字符串
pub fn generate_code_from(alphabet: &str, length: usize) -> String {
    use std::iter;

    let chars: Vec<char> = alphabet.chars().collect();
    if chars.is_empty() {
        return String::new();
    }

    iter::repeat_with(|| chars[rand::random_range(0..chars.len())])
        .take(length)
        .collect()
}

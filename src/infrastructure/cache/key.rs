//! 缓存键派生
//!
//! 把有序的标量列表折叠成短小、稳定的字符串键：
//! 各部分转成字符串（缺失为空串）后用 `|` 连接，
//! 再按 `hash = hash * 31 + code_unit` 做32位有符号回绕混合，
//! 最后取绝对值用36进制表示并加上命名空间前缀。
//!
//! 纯函数，不依赖任何无序结构，跨进程重启结果一致。

use crate::shared::constants::cache::{KEY_PREFIX, KEY_SEPARATOR};

/// 参与缓存键派生的单个标量
#[derive(Debug, Clone, PartialEq)]
pub enum KeyPart<'a> {
    Text(&'a str),
    Integer(i64),
    Number(f64),
    Absent,
}

impl KeyPart<'_> {
    fn write_to(&self, buf: &mut String) {
        match self {
            KeyPart::Text(text) => buf.push_str(text),
            KeyPart::Integer(value) => buf.push_str(&value.to_string()),
            // f64 的 Display 对整数值不带小数部分（25.0 -> "25"）
            KeyPart::Number(value) => buf.push_str(&value.to_string()),
            KeyPart::Absent => {}
        }
    }
}

impl<'a> From<&'a str> for KeyPart<'a> {
    fn from(value: &'a str) -> Self {
        KeyPart::Text(value)
    }
}

impl<'a> From<&'a String> for KeyPart<'a> {
    fn from(value: &'a String) -> Self {
        KeyPart::Text(value.as_str())
    }
}

impl From<u32> for KeyPart<'_> {
    fn from(value: u32) -> Self {
        KeyPart::Integer(i64::from(value))
    }
}

impl From<usize> for KeyPart<'_> {
    fn from(value: usize) -> Self {
        KeyPart::Integer(value as i64)
    }
}

impl From<i64> for KeyPart<'_> {
    fn from(value: i64) -> Self {
        KeyPart::Integer(value)
    }
}

impl From<f64> for KeyPart<'_> {
    fn from(value: f64) -> Self {
        KeyPart::Number(value)
    }
}

impl<'a, T> From<Option<T>> for KeyPart<'a>
where
    T: Into<KeyPart<'a>>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(KeyPart::Absent, Into::into)
    }
}

/// 从有序标量列表派生缓存键
pub fn make_key(parts: &[KeyPart<'_>]) -> String {
    let mut raw = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            raw.push_str(KEY_SEPARATOR);
        }
        part.write_to(&mut raw);
    }

    let mut hash: i32 = 0;
    for unit in raw.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(i32::from(unit));
    }

    format!("{}{}", KEY_PREFIX, to_base36(hash.unsigned_abs()))
}

/// 便捷宏：`cache_key!("teach-me", PROMPT_VERSION, ctx.streak, ctx.bmi)`
#[macro_export]
macro_rules! cache_key {
    ($($part:expr),* $(,)?) => {
        $crate::infrastructure::cache::key::make_key(&[
            $($crate::infrastructure::cache::key::KeyPart::from($part)),*
        ])
    };
}

fn to_base36(mut value: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_string();
    }

    let mut out = Vec::with_capacity(7);
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        // "a|b": (97*31 + 124)*31 + 98 = 97159
        assert_eq!(make_key(&["a".into(), "b".into()]), "cache_22yv");
        assert_eq!(make_key(&[]), "cache_0");
    }

    #[test]
    fn test_deterministic() {
        let first = cache_key!("workout-plan", "v1", Some("fat_loss"), 12u32, Some(24.5f64));
        let second = cache_key!("workout-plan", "v1", Some("fat_loss"), 12u32, Some(24.5f64));
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_part_difference_changes_key() {
        assert_ne!(cache_key!("a", "b"), cache_key!("a", "c"));
        assert_ne!(cache_key!("progress", "v1", 3u32, 10usize), cache_key!("progress", "v1", 3u32, 11usize));
    }

    #[test]
    fn test_absent_renders_as_empty_string() {
        let absent: Option<f64> = None;
        assert_eq!(cache_key!("x", absent, "y"), cache_key!("x", "", "y"));
        // 缺失与零值不同
        assert_ne!(cache_key!("x", absent), cache_key!("x", 0u32));
    }

    #[test]
    fn test_integral_float_matches_integer() {
        assert_eq!(cache_key!(25.0f64), cache_key!(25u32));
        assert_ne!(cache_key!(24.5f64), cache_key!(25u32));
    }

    #[test]
    fn test_discriminator_isolates_capabilities() {
        let bmi = Some(22.0f64);
        assert_ne!(
            cache_key!("workout-plan", "v1", 5u32, bmi),
            cache_key!("teach-me", "v1", 5u32, bmi)
        );
    }

    #[test]
    fn test_min_i32_hash_does_not_overflow() {
        assert_eq!(to_base36(i32::MIN.unsigned_abs()), "zik0zk");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}

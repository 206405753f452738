// ==========================================
// 表格行导入管道 - 表头标准化
// ==========================================
// 规则: NFKD 兼容分解后丢弃非 ASCII 字符（重音字母保留基字母）
//       仅保留字母/数字/下划线/空白/连字符 → TRIM → 小写
//       连续的空白与连字符合并为单个下划线
// ==========================================

use unicode_normalization::UnicodeNormalization;

/// 表头标准化为标识符（纯函数，结果仅含 ASCII）
///
/// # 示例
/// - "First Name!" → "first_name"
/// - "  Already_OK  " → "already_ok"
pub fn normalize_header(raw: &str) -> String {
    let kept: String = raw
        .nfkd()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_ascii_whitespace() || matches!(c, '_' | '-'))
        .collect();

    let lowered = kept.trim().to_ascii_lowercase();

    let mut normalized = String::with_capacity(lowered.len());
    let mut in_separator = false;
    for c in lowered.chars() {
        if c == '-' || c.is_ascii_whitespace() {
            if !in_separator {
                normalized.push('_');
                in_separator = true;
            }
        } else {
            normalized.push(c);
            in_separator = false;
        }
    }
    normalized
}

/// 批量标准化表头
pub fn normalize_headers<I, S>(headers: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    headers
        .into_iter()
        .map(|h| normalize_header(h.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize_header("First Name!"), "first_name");
        assert_eq!(normalize_header("  Already_OK  "), "already_ok");
    }

    #[test]
    fn test_collapse_whitespace_and_hyphens() {
        assert_eq!(normalize_header("Due  -  Date"), "due_date");
        assert_eq!(normalize_header("e-mail\taddress"), "e_mail_address");
    }

    #[test]
    fn test_underscores_are_kept_verbatim() {
        assert_eq!(normalize_header("a__b"), "a__b");
    }

    #[test]
    fn test_accent_folding_and_non_ascii_dropped() {
        assert_eq!(normalize_header("Código Postal"), "codigo_postal");
        assert_eq!(normalize_header("材料号 ID"), "id");
        assert!(normalize_header("重量(吨)").is_ascii());
    }

    #[test]
    fn test_compatibility_decomposition() {
        assert_eq!(normalize_header("Česká Łódź"), "ceska_odz");
        assert_eq!(normalize_header("Straße Nº"), "strae_no");
        assert_eq!(normalize_header("ﬁeld"), "field");
        assert_eq!(normalize_header("Ｑｔｙ"), "qty");
    }

    #[test]
    fn test_empty_and_symbol_only() {
        assert_eq!(normalize_header(""), "");
        assert_eq!(normalize_header("!!!"), "");
    }

    #[test]
    fn test_normalize_headers_batch() {
        assert_eq!(
            normalize_headers(["ID", "Full Name"]),
            vec!["id".to_string(), "full_name".to_string()]
        );
    }
}

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

pub mod digest;
pub mod markdown;

/// 将文本转换为 URL 友好的别名
pub fn to_slug(text: &str) -> String {
    slug::slugify(text.trim())
}

/// 将相对路径逐段转换为别名，保留目录分隔符
pub fn path_to_slug(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(to_slug)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// 去掉路径最后一段的扩展名（`a/b.c.mdx` -> `a/b.c`）
pub fn strip_extension(path: &str) -> &str {
    let file_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[file_start..].rfind('.') {
        // 以点开头的文件名（如 `.mdx`）没有可去掉的扩展名
        Some(0) | None => path,
        Some(dot) => &path[..file_start + dot],
    }
}

/// 确保路径以斜杠开头
pub fn ensure_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// 规范化基础路径：以斜杠开头，除根路径外不以斜杠结尾
pub fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        ensure_leading_slash(trimmed)
    }
}

/// 拼接路由：`join_path("/", "tags/a")` 得到 `/tags/a`，不会出现双斜杠
pub fn join_path(base: &str, rest: &str) -> String {
    let base = base.trim_end_matches('/');
    let rest = rest.trim_start_matches('/');
    if rest.is_empty() {
        return normalize_base_path(base);
    }
    format!("{}/{}", base, rest)
}

/// 解析前置数据中的日期
///
/// 支持 `2020-01-31`、RFC 3339，以及 `2020-01-31 10:00:00`（可带时区）。
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn strips_only_the_final_extension() {
        assert_eq!(strip_extension("intro.mdx"), "intro");
        assert_eq!(strip_extension("docs/getting.started.md"), "docs/getting.started");
        assert_eq!(strip_extension("v1.2/readme"), "v1.2/readme");
        assert_eq!(strip_extension("hero/.mdx"), "hero/.mdx");
    }

    #[test]
    fn slugs_are_lowercased_and_trimmed() {
        assert_eq!(to_slug("  Rust Lang "), "rust-lang");
        assert_eq!(to_slug("C++ & Go"), "c-go");
        assert_eq!(path_to_slug("2020/Hello World"), "2020/hello-world");
    }

    #[test]
    fn base_paths_are_normalized() {
        assert_eq!(normalize_base_path("blog/"), "/blog");
        assert_eq!(normalize_base_path(""), "/");
        assert_eq!(normalize_base_path("/"), "/");
        assert_eq!(join_path("/", "tags/rust"), "/tags/rust");
        assert_eq!(join_path("/blog", "page/2"), "/blog/page/2");
        assert_eq!(join_path("/blog", ""), "/blog");
    }

    #[test]
    fn parses_common_front_matter_dates() {
        let day = parse_date("2021-03-04").unwrap();
        assert_eq!((day.year(), day.month(), day.day()), (2021, 3, 4));

        let rfc = parse_date("2021-03-04T10:00:00+02:00").unwrap();
        assert_eq!(rfc.to_rfc3339(), "2021-03-04T08:00:00+00:00");

        assert!(parse_date("2021-03-04 10:00:00").is_some());
        assert!(parse_date("yesterday").is_none());
    }
}

use anyhow::Result;
use pulldown_cmark::{html, Event, Options, Parser, Tag};

/// 每分钟阅读字数
const WORDS_PER_MINUTE: usize = 265;

/// 摘要默认截断长度（字符数）
pub const EXCERPT_PRUNE_LENGTH: usize = 140;

fn parser_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// 将Markdown渲染为HTML
pub fn render(markdown: &str) -> Result<String> {
    let parser = Parser::new_ext(markdown, parser_options());

    let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut html_output, parser);

    Ok(html_output)
}

/// 提取纯文本，丢弃标记、HTML 与 JSX 片段
pub fn plain_text(markdown: &str) -> String {
    let mut text = String::with_capacity(markdown.len());

    for event in Parser::new_ext(markdown, parser_options()) {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            Event::End(Tag::Paragraph) | Event::End(Tag::Heading(..)) | Event::End(Tag::Item) => {
                text.push(' ')
            }
            _ => {}
        }
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32, 0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0x3040..=0x30FF | 0xAC00..=0xD7AF)
}

/// 统计字数：英文按空白分词，中日韩字符逐字计数
pub fn word_count(markdown: &str) -> usize {
    let text = plain_text(markdown);
    let cjk = text.chars().filter(|c| is_cjk(*c)).count();
    let words = text
        .split_whitespace()
        .filter(|w| w.chars().any(|c| !is_cjk(c)))
        .count();
    words + cjk
}

/// 估算阅读时间（分钟），四舍五入且至少为 1
pub fn time_to_read(markdown: &str) -> u64 {
    let words = word_count(markdown);
    let minutes = (words as f64 / WORDS_PER_MINUTE as f64).round() as u64;
    minutes.max(1)
}

/// 生成摘要：超过 `prune_length` 时在单词边界截断并追加省略号
pub fn excerpt(markdown: &str, prune_length: usize) -> String {
    let text = plain_text(markdown);
    if text.chars().count() <= prune_length {
        return text;
    }

    let cut: String = text.chars().take(prune_length).collect();
    let trimmed = match cut.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => &cut[..idx],
        _ => cut.as_str(),
    };
    format!("{}…", trimmed.trim_end())
}

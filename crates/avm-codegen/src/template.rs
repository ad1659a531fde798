//! The template-variable text format: lines `NAME=VALUE`, with an optional
//! `prefix="..."` line overriding the default `TMPL_` prefix for every
//! subsequent line in the file. Blank lines and `#`-comment lines are
//! skipped. Values parse as `0x`-prefixed hex bytes, `"..."`-quoted UTF-8
//! string bytes, or decimal `u64`.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateValue {
    U64(u64),
    Bytes(Vec<u8>),
}

pub fn parse_template_text(text: &str) -> Result<HashMap<String, TemplateValue>, String> {
    let mut prefix = "TMPL_".to_string();
    let mut out = HashMap::new();
    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("prefix=") {
            prefix = unquote(rest).ok_or_else(|| format!("line {}: malformed prefix", line_no + 1))?;
            continue;
        }
        let (name, value_text) = line
            .split_once('=')
            .ok_or_else(|| format!("line {}: expected NAME=VALUE", line_no + 1))?;
        let value = parse_value(value_text).ok_or_else(|| format!("line {}: malformed value", line_no + 1))?;
        out.insert(format!("{}{}", prefix, name), value);
    }
    Ok(out)
}

fn parse_value(text: &str) -> Option<TemplateValue> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x") {
        let bytes = (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
            .collect::<Option<Vec<u8>>>()?;
        return Some(TemplateValue::Bytes(bytes));
    }
    if let Some(quoted) = unquote(text) {
        return Some(TemplateValue::Bytes(quoted.into_bytes()));
    }
    text.parse::<u64>().ok().map(TemplateValue::U64)
}

fn unquote(text: &str) -> Option<String> {
    let text = text.trim();
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    Some(inner.to_string())
}

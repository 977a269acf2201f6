//! Plain-text rendering helpers for the console browser.

use serde_json::Value;

const CELL_WIDTH: usize = 60;

/// Render rows under `headers` as an aligned text table headed by `title`.
pub fn table(title: &str, headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    out.push_str(title);
    out.push('\n');
    let header: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    push_row(&mut out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&mut out, &rule, &widths);
    if rows.is_empty() {
        out.push_str("  (none)\n");
    }
    for row in rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let mut line = String::new();
    for (i, width) in widths.iter().enumerate() {
        let cell = cells.get(i).map(String::as_str).unwrap_or("");
        line.push_str("  ");
        line.push_str(cell);
        let pad = width.saturating_sub(cell.chars().count());
        line.extend(std::iter::repeat(' ').take(pad));
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

pub fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

/// Strings print bare, everything else as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Value column of a fields table: scalars inline, nested values as `[View]`.
pub fn cell(value: &Value) -> String {
    if is_scalar(value) {
        truncate(&display_value(value), CELL_WIDTH)
    } else {
        "[View]".to_string()
    }
}

pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max.saturating_sub(3)).collect();
    short.push_str("...");
    short
}

/// Interpret typed input as JSON, keeping it as a plain string otherwise.
pub fn parse_input(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// One-line label for an element of a list.
pub fn item_label(item: &Value) -> String {
    let Value::Object(map) = item else {
        return truncate(&display_value(item), 30);
    };
    if let Some(title) = map.get("title") {
        let mut label = format!("title: {}", display_value(title));
        if let Some(ts) = map.get("timestamp") {
            label.push_str(&format!(" (timestamp: {})", display_value(ts)));
        }
        return label;
    }
    for key in ["timestamp", "content"] {
        if let Some(value) = map.get(key) {
            return format!("{key}: {}", truncate(&display_value(value), 30));
        }
    }
    match map.iter().next() {
        Some((key, value)) => format!("{key}: {}", truncate(&display_value(value), 30)),
        None => "{}".to_string(),
    }
}

/// Parse a 1-based menu number against a list of `len` entries.
pub fn pick(choice: &str, len: usize) -> Option<usize> {
    match choice.trim().parse::<usize>() {
        Ok(n) if (1..=len).contains(&n) => Some(n - 1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_aligned_tables() {
        let out = table(
            "Collections",
            &["#", "Collection ID"],
            &[
                vec!["1".into(), "users".into()],
                vec!["10".into(), "x".into()],
            ],
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Collections");
        assert_eq!(lines[1], "  #   Collection ID");
        assert_eq!(lines[2], "  --  -------------");
        assert_eq!(lines[3], "  1   users");
        assert_eq!(lines[4], "  10  x");
    }

    #[test]
    fn empty_tables_say_none() {
        let out = table("Documents", &["#", "Document ID"], &[]);
        assert!(out.contains("(none)"));
    }

    #[test]
    fn nested_values_render_as_view() {
        assert_eq!(cell(&json!("plain")), "plain");
        assert_eq!(cell(&json!(3)), "3");
        assert_eq!(cell(&json!(null)), "null");
        assert_eq!(cell(&json!({"a": 1})), "[View]");
        assert_eq!(cell(&json!([1, 2])), "[View]");
        assert_eq!(cell(&json!("x".repeat(80))).chars().count(), 60);
    }

    #[test]
    fn parses_json_input_or_falls_back_to_text() {
        assert_eq!(parse_input("42"), json!(42));
        assert_eq!(parse_input("true"), json!(true));
        assert_eq!(parse_input(r#"{"a": [1]}"#), json!({"a": [1]}));
        assert_eq!(parse_input("hello world"), json!("hello world"));
        assert_eq!(parse_input(""), json!(""));
    }

    #[test]
    fn labels_list_items() {
        assert_eq!(
            item_label(&json!({"title": "Intro", "timestamp": 5})),
            "title: Intro (timestamp: 5)"
        );
        assert_eq!(item_label(&json!({"content": "body"})), "content: body");
        assert_eq!(item_label(&json!({"z": 1})), "z: 1");
        assert_eq!(item_label(&json!({})), "{}");
        assert_eq!(item_label(&json!(7)), "7");
    }

    #[test]
    fn picks_one_based_entries() {
        assert_eq!(pick("1", 3), Some(0));
        assert_eq!(pick(" 3 ", 3), Some(2));
        assert_eq!(pick("0", 3), None);
        assert_eq!(pick("4", 3), None);
        assert_eq!(pick("a", 3), None);
    }
}

//! Ad hoc field extraction from unstructured full-detail documents.

use crate::document::FieldValue;

/// Name of the section holding text that precedes the first heading
pub const BODY: &str = "body";

/// Split a full-detail body into named fields.
///
/// - A JSON object yields one field per top-level key, in sorted key order.
/// - Otherwise Markdown ATX headings (`#` to `######`) open snake_cased
///   sections; text before the first heading lands in `body`.
/// - Plain text becomes a single `body` field.
pub fn extract_fields(body: &str) -> Vec<(String, FieldValue)> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if trimmed.starts_with('{') {
        if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(trimmed) {
            return map
                .iter()
                .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
                .collect();
        }
    }

    let mut fields: Vec<(String, FieldValue)> = Vec::new();
    let mut current = BODY.to_string();
    let mut lines: Vec<&str> = Vec::new();

    for line in body.lines() {
        if let Some(title) = heading_title(line) {
            push_section(&mut fields, &current, &lines);
            current = unique_name(&fields, &slugify(title));
            lines.clear();
        } else {
            lines.push(line);
        }
    }
    push_section(&mut fields, &current, &lines);
    fields
}

fn heading_title(line: &str) -> Option<&str> {
    let line = line.trim_start();
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some(rest.trim().trim_end_matches('#').trim())
}

fn push_section(fields: &mut Vec<(String, FieldValue)>, name: &str, lines: &[&str]) {
    let text = lines.join("\n");
    let text = text.trim();
    if !text.is_empty() {
        fields.push((name.to_string(), FieldValue::Text(text.to_string())));
    }
}

fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug.to_string()
    }
}

fn unique_name(fields: &[(String, FieldValue)], base: &str) -> String {
    let taken = |name: &str| fields.iter().any(|(n, _)| n == name);
    if !taken(base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}_{n}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

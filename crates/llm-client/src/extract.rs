/// Extract a JSON document from model text that may carry markdown fences or
/// surrounding prose.
pub fn extract_json_from_text(text: &str) -> Option<String> {
    if let Some(start) = text.find("```json") {
        if let Some(end) = text[start + 7..].find("```") {
            return Some(text[start + 7..start + 7 + end].trim().to_string());
        }
    }

    if let Some(start) = text.find("```") {
        if let Some(end) = text[start + 3..].find("```") {
            let candidate = text[start + 3..start + 3 + end].trim();
            if candidate.starts_with('{') || candidate.starts_with('[') {
                return Some(candidate.to_string());
            }
        }
    }

    if let Some(start) = text.find('{') {
        if let Some(end) = matching_brace(&text[start..]) {
            return Some(text[start..start + end].to_string());
        }
    }

    let trimmed = text.trim();
    if (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'))
    {
        return Some(trimmed.to_string());
    }

    None
}

/// Byte offset just past the brace closing the object that opens `text`.
/// Braces inside string literals are ignored.
fn matching_brace(text: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Normalize a file base name into a page title that is also safe as a URL path segment.
///
/// Spaces and dots become hyphens, anything outside ASCII letters, Cyrillic `А-Яа-я`,
/// digits, `-` and `_` is dropped, hyphen runs collapse, and edge hyphens are trimmed.
/// Case is preserved. The result may be empty.
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        let ch = match ch {
            ' ' | '.' => '-',
            other => other,
        };
        if !is_title_char(ch) {
            continue;
        }
        if ch == '-' && out.ends_with('-') {
            continue;
        }
        out.push(ch);
    }
    out.trim_matches('-').to_string()
}

/// Split a file name into base name and extension (dot included).
///
/// Leading dots never start an extension: `.env` has none, `..a.txt` splits as `..a` + `.txt`.
pub fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(index) if file_name[..index].chars().any(|ch| ch != '.') => {
            (&file_name[..index], &file_name[index..])
        }
        _ => (file_name, ""),
    }
}

/// Sanitized base name joined with the untouched extension.
///
/// A base that sanitizes to nothing leaves the name as is: `%%.md` would otherwise
/// become the hidden `.md`, which a later pass reads as base `md`.
pub fn sanitized_file_name(file_name: &str) -> String {
    let (base, extension) = split_extension(file_name);
    let base = sanitize(base);
    if base.is_empty() {
        return file_name.to_string();
    }
    format!("{base}{extension}")
}

fn is_title_char(ch: char) -> bool {
    // Ё/ё sit outside the contiguous А..я block and are dropped.
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ('А'..='я').contains(&ch)
}

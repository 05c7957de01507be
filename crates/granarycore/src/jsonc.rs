//! Tolerant JSON reading shared by manifest and profile files.
//!
//! Third-party mod authors hand-edit their descriptors, so the files in the
//! wild routinely carry `//` comments and trailing commas. Strict
//! `serde_json` rejects both; this module strips them (outside string
//! literals) before handing the text to serde.

use serde::de::DeserializeOwned;

/// Parse a JSON document that may contain `//` comments and trailing commas.
pub fn from_str_lenient<T: DeserializeOwned>(text: &str) -> serde_json::Result<T> {
    serde_json::from_str(&sanitize(text))
}

/// Strip `//` comments and trailing commas outside string literals.
pub fn sanitize(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    let mut in_string = false;
    let mut escaped = false;

    while i < chars.len() {
        let c = chars[i];

        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
                i += 1;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            ',' => {
                // Drop the comma if the next significant character closes a
                // container.
                let mut j = i + 1;
                loop {
                    match chars.get(j) {
                        Some(ch) if ch.is_whitespace() => j += 1,
                        Some('/') if chars.get(j + 1) == Some(&'/') => {
                            while j < chars.len() && chars[j] != '\n' {
                                j += 1;
                            }
                        }
                        _ => break,
                    }
                }
                match chars.get(j) {
                    Some('}') | Some(']') => {}
                    _ => out.push(c),
                }
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

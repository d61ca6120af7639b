//! Robust JSON extraction from LLM output. A pure, deterministic
//! resolver — no regex cleanup, a bracket-balance state machine instead,
//! to keep it property-testable.

/// Attempt, in order: (a) direct parse, (b) strip a markdown fence, (c)
/// locate the first balanced `[...]`/`{...}` anywhere in the text. Returns
/// the canonical (re-serialised, compact) JSON text on success.
pub fn resolve(text: &str) -> Option<String> {
    let trimmed = text.trim();

    if let Some(value) = try_parse(trimmed) {
        return Some(value);
    }

    if let Some(fenced) = strip_markdown_fence(trimmed) {
        if let Some(value) = try_parse(fenced.trim()) {
            return Some(value);
        }
        if let Some(balanced) = find_balanced_json(fenced) {
            if let Some(value) = try_parse(balanced) {
                return Some(value);
            }
        }
    }

    if let Some(balanced) = find_balanced_json(trimmed) {
        if let Some(value) = try_parse(balanced) {
            return Some(value);
        }
    }

    None
}

fn try_parse(candidate: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(candidate).ok()?;
    serde_json::to_string(&value).ok()
}

/// Strip a surrounding ` ```json ... ``` ` (or bare ` ``` ... ``` `) fence.
fn strip_markdown_fence(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_open = &text[start + 3..];
    let after_open = after_open.strip_prefix("json").unwrap_or(after_open);
    let after_open = after_open.strip_prefix('\n').unwrap_or(after_open);
    let end = after_open.find("```")?;
    Some(&after_open[..end])
}

/// Scan for the first balanced `[...]` or `{...}`, honouring string
/// literals and backslash escapes so brackets inside strings don't
/// confuse the depth counter. Also covers an explanatory prefix followed
/// by a balanced JSON value: the scan simply starts wherever the first
/// opening bracket appears, prose or not.
fn find_balanced_json(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(|&b| b == b'[' || b == b'{')?;
    let open = bytes[start];
    let close = if open == b'[' { b']' } else { b'}' };

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b if b == open => depth += 1,
            b if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_parse() {
        assert_eq!(resolve("[1,2]"), Some("[1,2]".to_string()));
    }

    #[test]
    fn markdown_fenced() {
        assert_eq!(resolve("```json\n[1,2]\n```"), Some("[1,2]".to_string()));
    }

    #[test]
    fn explanatory_prefix() {
        assert_eq!(resolve("Here's: [1,2]."), Some("[1,2]".to_string()));
    }

    #[test]
    fn irrecoverable_returns_none() {
        assert_eq!(resolve("not json"), None);
    }

    #[test]
    fn brackets_inside_strings_do_not_confuse_balance() {
        let input = r#"noise {"a": "[ this looks like a bracket ]"} trailing"#;
        let resolved = resolve(input).unwrap();
        let value: serde_json::Value = serde_json::from_str(&resolved).unwrap();
        assert_eq!(value["a"], "[ this looks like a bracket ]");
    }

    proptest::proptest! {
        #[test]
        fn direct_json_round_trips(n in proptest::collection::vec(any_i32(), 0..8)) {
            let text = serde_json::to_string(&n).unwrap();
            let resolved = resolve(&text).unwrap();
            let original: serde_json::Value = serde_json::from_str(&text).unwrap();
            let round_tripped: serde_json::Value = serde_json::from_str(&resolved).unwrap();
            proptest::prop_assert_eq!(original, round_tripped);
        }
    }

    fn any_i32() -> impl proptest::strategy::Strategy<Value = i32> {
        proptest::prelude::any::<i32>()
    }
}

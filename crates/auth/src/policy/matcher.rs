//! Resource and action pattern matching.
//!
//! Resource patterns are `/`-separated:
//! - `*` alone matches every resource;
//! - a trailing `*` segment matches any deeper path (one or more segments);
//! - a `*` or `:name` segment elsewhere matches exactly one non-empty segment;
//! - any other segment must match exactly.
//!
//! Action patterns are `*`, a method name (case-insensitive) or an
//! alternation such as `GET|HEAD`.

pub fn resource_matches(pattern: &str, resource: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    let mut wanted = pattern.split('/').peekable();
    let mut actual = resource.split('/');

    while let Some(p) = wanted.next() {
        let last = wanted.peek().is_none();
        let Some(segment) = actual.next() else {
            return false;
        };

        match p {
            "*" if last => return true,
            "*" => {
                if segment.is_empty() {
                    return false;
                }
            }
            param if param.starts_with(':') && param.len() > 1 => {
                if segment.is_empty() {
                    return false;
                }
            }
            exact => {
                if exact != segment {
                    return false;
                }
            }
        }
    }

    actual.next().is_none()
}

pub fn action_matches(pattern: &str, action: &str) -> bool {
    pattern
        .split('|')
        .map(str::trim)
        .any(|p| p == "*" || p.eq_ignore_ascii_case(action))
}

//! Path helpers for nut names
//!
//! Nut names are `/`-separated relative paths. The first segment of a name is
//! never purely numeric because that position is reserved for version numbers
//! in served URLs.

/// Whether `value` is an optionally negative base-10 integer
///
/// Matches `-?\d+` over the whole string.
#[must_use]
pub fn is_number(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// First segment of a path, ignoring one leading `/`
#[must_use]
pub fn first_segment(path: &str) -> &str {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    trimmed.split('/').next().unwrap_or(trimmed)
}

/// Whether the first segment of a path is purely numeric
#[must_use]
pub fn has_numeric_first_segment(path: &str) -> bool {
    is_number(first_segment(path))
}

/// Join path parts with exactly one `/` between them
///
/// A leading `/` on the first non-empty part and a trailing `/` on the last
/// one are preserved.
#[must_use]
pub fn merge_path(parts: &[&str]) -> String {
    let parts: Vec<&str> = parts.iter().copied().filter(|p| !p.is_empty()).collect();
    let Some(first) = parts.first() else {
        return String::new();
    };

    let mut merged = String::new();
    if first.starts_with('/') {
        merged.push('/');
    }

    let mut wrote = false;
    for part in &parts {
        let inner = part.trim_matches('/');
        if inner.is_empty() {
            continue;
        }
        if wrote {
            merged.push('/');
        }
        merged.push_str(inner);
        wrote = true;
    }

    if parts.last().is_some_and(|p| p.ends_with('/')) && !merged.ends_with('/') {
        merged.push('/');
    }
    merged
}

/// Resolve `.` and `..` segments
///
/// Returns `None` when `..` climbs above the first segment.
#[must_use]
pub fn simplify_path(path: &str) -> Option<String> {
    let absolute = path.starts_with('/');
    let mut stack: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop()?;
            }
            other => stack.push(other),
        }
    }

    let joined = stack.join("/");
    Some(if absolute { format!("/{joined}") } else { joined })
}

/// Number of directories above the file named by `name`
#[must_use]
pub fn path_depth(name: &str) -> usize {
    let trimmed = name.strip_prefix('/').unwrap_or(name);
    trimmed.matches('/').count()
}

/// Relative prefix climbing from the directory of `name` back to the root
#[must_use]
pub fn source_root_for(name: &str) -> String {
    "../".repeat(path_depth(name))
}

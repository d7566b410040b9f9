//! Redis-style glob matching for key patterns.
//!
//! The fallback tier has to honour the same patterns that `SCAN MATCH` accepts on
//! the remote tier, so that `clear("products:*")` removes exactly the same keys in
//! both places.
//!
//! Supported syntax:
//!
//! - `*` matches any sequence (including empty)
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]`, `[^abc]` character classes
//! - `\x` matches `x` literally

/// Returns `true` if `key` matches the glob `pattern`.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();

    let (mut p, mut k) = (0usize, 0usize);
    // Position after the last `*` seen and the key index it was tried against.
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        if p < pattern.len() {
            match pattern[p] {
                '*' => {
                    backtrack = Some((p + 1, k));
                    p += 1;
                    continue;
                }
                '?' => {
                    p += 1;
                    k += 1;
                    continue;
                }
                '[' => {
                    if let Some((matched, next)) = match_class(&pattern, p, key[k]) {
                        if matched {
                            p = next;
                            k += 1;
                            continue;
                        }
                    } else if key[k] == '[' {
                        // Unterminated class is a literal `[`
                        p += 1;
                        k += 1;
                        continue;
                    }
                }
                '\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == key[k] {
                        p += 2;
                        k += 1;
                        continue;
                    }
                }
                c => {
                    if c == key[k] {
                        p += 1;
                        k += 1;
                        continue;
                    }
                }
            }
        }

        match backtrack {
            Some((star_p, star_k)) => {
                p = star_p;
                k = star_k + 1;
                backtrack = Some((star_p, star_k + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Matches `c` against the class starting at `pattern[start] == '['`.
///
/// Returns `(matched, index after ']')`, or `None` if the class is unterminated.
fn match_class(pattern: &[char], start: usize, c: char) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = matches!(pattern.get(i), Some('^'));
    if negate {
        i += 1;
    }

    let mut matched = false;
    let mut first = true;
    while i < pattern.len() {
        let mut current = pattern[i];
        if current == ']' && !first {
            return Some((matched != negate, i + 1));
        }
        first = false;

        if current == '\\' && i + 1 < pattern.len() {
            i += 1;
            current = pattern[i];
        }

        if i + 2 < pattern.len() && pattern[i + 1] == '-' && pattern[i + 2] != ']' {
            let (lo, hi) = ordered(current, pattern[i + 2]);
            if (lo..=hi).contains(&c) {
                matched = true;
            }
            i += 3;
        } else {
            if current == c {
                matched = true;
            }
            i += 1;
        }
    }

    None
}

fn ordered(a: char, b: char) -> (char, char) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Returns `true` if the pattern contains no glob metacharacters, i.e. it can
/// only ever match the single key equal to itself.
pub fn is_literal(pattern: &str) -> bool {
    !pattern.contains(['*', '?', '[', '\\'])
}

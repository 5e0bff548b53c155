//! Placeholder fixup for backends that bind with `$n` markers.

/// Rewrite `?` and `:name` parameter markers to `$1, $2, …` in order,
/// leaving quoted runs and `::` casts untouched. Applied by drivers when
/// the connection's `fixup_parameters` option is on.
pub fn fixup_parameters(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut n = 0u32;
    let mut in_squote = false;
    let mut in_dquote = false;

    while let Some(c) = chars.next() {
        if in_squote {
            out.push(c);
            if c == '\'' {
                in_squote = false;
            }
            continue;
        }
        if in_dquote {
            out.push(c);
            if c == '"' {
                in_dquote = false;
            }
            continue;
        }
        match c {
            '\'' => {
                in_squote = true;
                out.push(c);
            }
            '"' => {
                in_dquote = true;
                out.push(c);
            }
            '?' => {
                n += 1;
                out.push_str(&format!("${n}"));
            }
            ':' => {
                if chars.peek() == Some(&':') {
                    chars.next();
                    out.push_str("::");
                } else if chars
                    .peek()
                    .map(|c| c.is_ascii_alphanumeric() || *c == '_')
                    .unwrap_or(false)
                {
                    while let Some(&c) = chars.peek() {
                        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    n += 1;
                    out.push_str(&format!("${n}"));
                } else {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_marks_become_numbered() {
        assert_eq!(
            fixup_parameters("UPDATE T SET A=? WHERE K=?"),
            "UPDATE T SET A=$1 WHERE K=$2"
        );
    }

    #[test]
    fn test_named_markers_become_numbered() {
        assert_eq!(
            fixup_parameters("SELECT * FROM T WHERE A = :a AND B = :b-2"),
            "SELECT * FROM T WHERE A = $1 AND B = $2"
        );
    }

    #[test]
    fn test_quoted_strings_preserved() {
        assert_eq!(
            fixup_parameters("SELECT '?' || \":x\" FROM T WHERE K = ?"),
            "SELECT '?' || \":x\" FROM T WHERE K = $1"
        );
    }

    #[test]
    fn test_casts_preserved() {
        assert_eq!(
            fixup_parameters("SELECT K::text FROM T WHERE K = :k"),
            "SELECT K::text FROM T WHERE K = $1"
        );
    }

    #[test]
    fn test_no_markers_is_identity() {
        let sql = "SELECT 1";
        assert_eq!(fixup_parameters(sql), sql);
    }
}

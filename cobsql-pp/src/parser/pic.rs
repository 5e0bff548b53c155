//! PIC clause analysis: map a COBOL data description entry onto the closed
//! set of host-variable storage classes.

use cobol_pg::CobolVarType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Usage {
    Display,
    Packed,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignClause {
    Default,
    Leading,
    LeadingSeparate,
    Trailing,
    TrailingSeparate,
}

/// Outcome of analysing one `level name PIC … [USAGE …] [SIGN …].` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PicEntry {
    pub level: u8,
    pub name: String,
    pub var_type: CobolVarType,
    pub length: u32,
    pub scale: u32,
}

/// A group item header (`01 NAME.`) with no picture of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    pub level: u8,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Elementary(PicEntry),
    Group(GroupEntry),
}

/// Expand a picture string into `(category, int digits, frac digits)`.
/// Supported pictures: `[S]9…[V9…]`, `X…`, `N…`, with `(n)` repeats.
fn analyze_picture(pic: &str) -> Option<(char, bool, u32, u32)> {
    let mut chars = pic.chars().peekable();
    let mut signed = false;
    let mut category: Option<char> = None;
    let mut int_digits = 0u32;
    let mut frac_digits = 0u32;
    let mut after_v = false;

    if chars.peek().map(|c| c.eq_ignore_ascii_case(&'S')) == Some(true) {
        signed = true;
        chars.next();
    }

    while let Some(c) = chars.next() {
        let symbol = c.to_ascii_uppercase();
        let count = if chars.peek() == Some(&'(') {
            chars.next();
            let mut digits = String::new();
            for c in chars.by_ref() {
                if c == ')' {
                    break;
                }
                digits.push(c);
            }
            digits.parse::<u32>().ok()?
        } else {
            1
        };

        match symbol {
            '9' => {
                if category.get_or_insert('9') != &'9' {
                    return None;
                }
                if after_v {
                    frac_digits += count;
                } else {
                    int_digits += count;
                }
            }
            'V' => {
                if category != Some('9') || after_v {
                    return None;
                }
                after_v = true;
            }
            'X' | 'N' => {
                if signed || after_v {
                    return None;
                }
                if category.get_or_insert(symbol) != &symbol {
                    return None;
                }
                int_digits += count;
            }
            _ => return None, // edited pictures are not host variables
        }
    }

    let category = category?;
    if category != '9' && signed {
        return None;
    }
    Some((category, signed, int_digits, frac_digits))
}

/// Parse one declaration line (already stripped of its trailing period)
/// into tokens. Returns `None` for lines that are not data description
/// entries at all (blank, paragraph names, …).
pub fn parse_declaration(line: &str) -> Option<Result<Declaration, String>> {
    let tokens: Vec<&str> = line
        .trim_end()
        .trim_end_matches('.')
        .split_whitespace()
        .collect();
    if tokens.len() < 2 {
        return None;
    }
    let level: u8 = tokens[0].parse().ok()?;
    if !(1..=49).contains(&level) && level != 77 {
        return None;
    }
    let name = tokens[1].to_string();

    if tokens.len() == 2 {
        return Some(Ok(Declaration::Group(GroupEntry { level, name })));
    }

    let mut picture: Option<&str> = None;
    let mut usage = Usage::Display;
    let mut sign = SignClause::Default;

    let mut i = 2;
    while i < tokens.len() {
        let tok = tokens[i].to_ascii_uppercase();
        match tok.as_str() {
            "PIC" | "PICTURE" => {
                let mut j = i + 1;
                if j < tokens.len() && tokens[j].eq_ignore_ascii_case("IS") {
                    j += 1;
                }
                if j >= tokens.len() {
                    return Some(Err(format!("missing picture string after PIC for {name}")));
                }
                picture = Some(tokens[j]);
                i = j;
            }
            "USAGE" => {
                // the usage keyword itself follows; handled next iteration
            }
            "IS" => {}
            "COMP-3" | "COMPUTATIONAL-3" | "PACKED-DECIMAL" => usage = Usage::Packed,
            "COMP" | "COMP-4" | "COMP-5" | "COMPUTATIONAL" | "COMPUTATIONAL-4"
            | "COMPUTATIONAL-5" | "BINARY" => usage = Usage::Binary,
            "DISPLAY" => usage = Usage::Display,
            "SIGN" => {}
            "LEADING" => {
                sign = SignClause::Leading;
            }
            "TRAILING" => {
                sign = SignClause::Trailing;
            }
            "SEPARATE" => {
                sign = match sign {
                    SignClause::Leading | SignClause::LeadingSeparate => {
                        SignClause::LeadingSeparate
                    }
                    _ => SignClause::TrailingSeparate,
                };
            }
            "CHARACTER" => {}
            "VALUE" | "VALUES" => break, // initial value, irrelevant here
            "OCCURS" => {
                return Some(Err(format!("OCCURS is not supported for host variable {name}")));
            }
            _ => {}
        }
        i += 1;
    }

    let Some(pic) = picture else {
        return Some(Ok(Declaration::Group(GroupEntry { level, name })));
    };

    let Some((category, signed, int_digits, frac_digits)) = analyze_picture(pic) else {
        return Some(Err(format!("unsupported picture {pic} for {name}")));
    };

    let (var_type, length, scale) = match category {
        'X' => (CobolVarType::Alphanumeric, int_digits, 0),
        'N' => (CobolVarType::Japanese, int_digits, 0),
        _ => {
            let digits = int_digits + frac_digits;
            if digits > 18 {
                return Some(Err(format!("more than 18 digits in picture {pic} for {name}")));
            }
            let var_type = match (usage, signed, sign) {
                (Usage::Packed, true, _) => CobolVarType::SignedNumberPd,
                (Usage::Packed, false, _) => CobolVarType::UnsignedNumberPd,
                (Usage::Binary, true, _) => CobolVarType::SignedBinary,
                (Usage::Binary, false, _) => CobolVarType::UnsignedBinary,
                (Usage::Display, false, _) => CobolVarType::UnsignedNumber,
                (Usage::Display, true, SignClause::LeadingSeparate) => {
                    CobolVarType::SignedNumberLs
                }
                (Usage::Display, true, SignClause::Leading) => CobolVarType::SignedNumberLc,
                (Usage::Display, true, SignClause::TrailingSeparate) => {
                    CobolVarType::SignedNumberTs
                }
                (Usage::Display, true, _) => CobolVarType::SignedNumberTc,
            };
            (var_type, digits, frac_digits)
        }
    };

    Some(Ok(Declaration::Elementary(PicEntry {
        level,
        name,
        var_type,
        length,
        scale,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(line: &str) -> PicEntry {
        match parse_declaration(line).unwrap().unwrap() {
            Declaration::Elementary(e) => e,
            other => panic!("expected elementary item, got {other:?}"),
        }
    }

    #[test]
    fn test_display_numerics() {
        let e = entry("       01 HV-A PIC 9(4).");
        assert_eq!(e.var_type, CobolVarType::UnsignedNumber);
        assert_eq!((e.length, e.scale), (4, 0));

        let e = entry("       01 HV-B PIC S9(4)V9(2).");
        assert_eq!(e.var_type, CobolVarType::SignedNumberTc);
        assert_eq!((e.length, e.scale), (6, 2));

        let e = entry("       01 HV-C PIC S9(3) SIGN LEADING SEPARATE.");
        assert_eq!(e.var_type, CobolVarType::SignedNumberLs);

        let e = entry("       01 HV-D PIC S9(3) SIGN IS TRAILING SEPARATE CHARACTER.");
        assert_eq!(e.var_type, CobolVarType::SignedNumberTs);
    }

    #[test]
    fn test_usages() {
        let e = entry("       01 HV-P PIC S9(7)V99 COMP-3.");
        assert_eq!(e.var_type, CobolVarType::SignedNumberPd);
        assert_eq!((e.length, e.scale), (9, 2));

        let e = entry("       01 HV-N PIC 9(9) USAGE COMP-5.");
        assert_eq!(e.var_type, CobolVarType::UnsignedBinary);

        let e = entry("       77 HV-M PIC S9(9) BINARY.");
        assert_eq!(e.var_type, CobolVarType::SignedBinary);
    }

    #[test]
    fn test_character_pictures() {
        let e = entry("       01 NAME PIC X(30).");
        assert_eq!(e.var_type, CobolVarType::Alphanumeric);
        assert_eq!(e.length, 30);

        let e = entry("       01 KANA PIC N(10).");
        assert_eq!(e.var_type, CobolVarType::Japanese);

        let e = entry("       01 FLAGX PIC XXX.");
        assert_eq!(e.length, 3);
    }

    #[test]
    fn test_group_and_rejects() {
        assert!(matches!(
            parse_declaration("       01 VARTEXT.").unwrap().unwrap(),
            Declaration::Group(GroupEntry { level: 1, .. })
        ));
        assert!(parse_declaration("       MOVE A TO B").is_none());
        assert!(parse_declaration("").is_none());
        assert!(parse_declaration("       01 BAD PIC Z(4).").unwrap().is_err());
        assert!(parse_declaration("       01 BAD PIC 9(19).").unwrap().is_err());
    }
}

// ABOUTME: Lissp's symbol munger: encodes special characters into valid identifiers via Quotez

use std::sync::LazyLock;

use regex::{Captures, Regex};
use unicode_normalization::UnicodeNormalization;

/// Finds Quotez. Written in upper case and wrapped in a `Qz` and `_`.
///
/// This format contains an underscore and both upper-case and
/// lower-case letters, which makes it distinct from the standard Python
/// naming conventions (`lower_case_with_underscores`,
/// `UPPER_CASE_WITH_UNDERSCORES`, and `CapWords`), as well as the
/// extremely rare bigram "Qz", which makes the Quotez (but not the
/// normalization) reversible in the usual cases, and also cannot
/// introduce a leading underscore, which can have special meaning in
/// Python.
static FIND_QUOTEZ: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Qz([0-9A-Z][0-9A-Zhx]*?)_").expect("Quotez pattern"));

/// Python's `str.isidentifier`: an XID_Start (or underscore) character
/// followed by XID_Continue characters.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if unicode_ident::is_xid_start(c) || c == '_' => {
            chars.all(unicode_ident::is_xid_continue)
        }
        _ => false,
    }
}

/// Lissp's symbol munger.
///
/// Encodes Lissp symbols with special characters into valid,
/// human-readable (if unpythonic) Python identifiers, using NFKC
/// normalization and Quotez. E.g. `*FOO-BAR*` becomes
/// `QzSTAR_FOOQzH_BARQzSTAR_`.
///
/// Full stops are handled separately, as those are meaningful to Hissp.
pub fn munge(s: &str) -> String {
    // Normalization always applies; Python identifiers are NFKC-folded.
    let s: String = s.nfkc().collect();
    if is_identifier(&s) {
        return s; // Nothing to munge.
    }
    s.split('.')
        .map(munge_part)
        .collect::<Vec<_>>()
        .join(".")
}

fn munge_part(part: &str) -> String {
    if part.is_empty() {
        return String::new();
    }
    let encoded: String = part.chars().map(qz_encode).collect();
    if is_identifier(&encoded) {
        return encoded;
    }
    // The segment still opens with an identifier-illegal character
    // (digits munge only in first position).
    let mut chars = encoded.chars();
    match chars.next() {
        Some(first) => format!("{}{}", force_qz_encode(first), chars.as_str()),
        None => encoded,
    }
}

/// Converts a character to its Quotez encoding, unless it's already
/// valid in a Python identifier.
pub fn qz_encode(c: char) -> String {
    if unicode_ident::is_xid_continue(c) || c == '_' {
        return c.to_string();
    }
    force_qz_encode(c)
}

/// Converts a character to its Quotez encoding, even if it's valid in a
/// Python identifier.
///
/// Characters encode in one of three ways, preferring the first
/// available: short names, Unicode names (spaces as `x`, hyphens as
/// `h`), and hexadecimal ordinals.
pub fn force_qz_encode(c: char) -> String {
    if let Some(name) = short_name(c) {
        return format!("Qz{name}_");
    }
    if let Some(name) = unicode_names2::name(c) {
        let name = name.to_string().replace(' ', "x").replace('-', "h");
        return format!("Qz{name}_");
    }
    format!("Qz0X{:X}_", c as u32)
}

/// Shorter names for Quotez. ASCII control characters don't munge to
/// names; digits only munge in first position; letters, underscore,
/// comma, colon, and tilde never munge.
fn short_name(c: char) -> Option<&'static str> {
    Some(match c {
        '!' => "BANG",
        '"' => "QUOT",
        '#' => "HASH",
        '$' => "DOLR",
        '%' => "PCENT",
        '&' => "ET",
        '\'' => "APOS",
        '(' => "LPAR",
        ')' => "RPAR",
        '*' => "STAR",
        '+' => "PLUS",
        '-' => "H", // Hyphen-minus
        '.' => "DOT",
        '/' => "SOL",
        ';' => "SEMI",
        '<' => "LT", // Less Than or LefT.
        '=' => "EQ",
        '>' => "GT", // Greater Than or riGhT.
        '?' => "QUERY",
        '@' => "AT",
        '[' => "LSQB",
        '\\' => "BSOL",
        ']' => "RSQB",
        '^' => "HAT",
        '`' => "GRAVE",
        '{' => "LCUB",
        '|' => "VERT",
        '}' => "RCUB",
        _ => return None,
    })
}

fn short_char(quotez: &str) -> Option<char> {
    Some(match quotez {
        "QzBANG_" => '!',
        "QzQUOT_" => '"',
        "QzHASH_" => '#',
        "QzDOLR_" => '$',
        "QzPCENT_" => '%',
        "QzET_" => '&',
        "QzAPOS_" => '\'',
        "QzLPAR_" => '(',
        "QzRPAR_" => ')',
        "QzSTAR_" => '*',
        "QzPLUS_" => '+',
        "QzH_" => '-',
        "QzDOT_" => '.',
        "QzSOL_" => '/',
        "QzSEMI_" => ';',
        "QzLT_" => '<',
        "QzEQ_" => '=',
        "QzGT_" => '>',
        "QzQUERY_" => '?',
        "QzAT_" => '@',
        "QzLSQB_" => '[',
        "QzBSOL_" => '\\',
        "QzRSQB_" => ']',
        "QzHAT_" => '^',
        "QzGRAVE_" => '`',
        "QzLCUB_" => '{',
        "QzVERT_" => '|',
        "QzRCUB_" => '}',
        _ => return None,
    })
}

/// The inverse of `munge`. Decodes any Quotez into characters.
///
/// Characters can be encoded in one of three ways: short names, Unicode
/// names, and ordinals. `demunge` will decode any of these, and leaves
/// the remaining text as-is, along with any invalid Quotez.
pub fn demunge(s: &str) -> String {
    FIND_QUOTEZ
        .replace_all(s, |caps: &Captures| qz_decode(caps))
        .into_owned()
}

fn qz_decode(caps: &Captures) -> String {
    let whole = &caps[0];
    if let Some(c) = short_char(whole) {
        return c.to_string();
    }
    let inner = &caps[1];
    let name = inner.replace('x', " ").replace('h', "-");
    if let Some(c) = unicode_names2::character(&name) {
        return c.to_string();
    }
    if let Some(hex) = inner.strip_prefix("0X") {
        if let Ok(n) = u32::from_str_radix(hex, 16) {
            if let Some(c) = char::from_u32(n) {
                return c.to_string();
            }
        }
    }
    whole.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_munge_earmuffs() {
        assert_eq!(munge("*FOO-BAR*"), "QzSTAR_FOOQzH_BARQzSTAR_");
    }

    #[test]
    fn test_munge_identity_on_identifiers() {
        assert_eq!(munge("foo"), "foo");
        assert_eq!(munge("_private"), "_private");
        assert_eq!(munge("foo2"), "foo2");
    }

    #[test]
    fn test_munge_dotted() {
        // Full stops are preserved; each segment encodes independently.
        assert_eq!(munge("foo.bar"), "foo.bar");
        assert_eq!(munge("foo.bar-baz"), "foo.barQzH_baz");
        assert_eq!(munge("math..inf"), "math..inf");
    }

    #[test]
    fn test_munge_leading_digit() {
        let munged = munge("4foo");
        assert!(is_identifier(&munged), "{munged:?}");
        assert_eq!(demunge(&munged), "4foo");
    }

    #[test]
    fn test_munge_operators() {
        assert_eq!(munge("+"), "QzPLUS_");
        assert_eq!(munge("-"), "QzH_");
        assert_eq!(munge("<="), "QzLT_QzEQ_");
    }

    #[test]
    fn test_demunge() {
        assert_eq!(demunge("QzPLUS_"), "+");
        assert_eq!(demunge("QzSTAR_FOOQzH_BARQzSTAR_"), "*FOO-BAR*");
    }

    #[test]
    fn test_demunge_all_three_encodings() {
        // Short name, Unicode name, and ordinal all decode; invalid
        // Quotez pass through untouched.
        assert_eq!(demunge("QzFOO_QzGT_QzHYPHENhMINUS_Qz0X3E_bar"), "QzFOO_>->bar");
    }

    #[test]
    fn test_unicode_name_encoding() {
        // No short name for the section sign; falls back to its
        // Unicode name.
        assert_eq!(force_qz_encode('§'), "QzSECTIONxSIGN_");
        assert_eq!(demunge("QzSECTIONxSIGN_"), "§");
    }

    #[test]
    fn test_munge_idempotent() {
        let once = munge("*foo-bar*");
        assert_eq!(munge(&once), once);
    }

    proptest! {
        #[test]
        fn prop_munge_idempotent(s in "\\PC*") {
            let once = munge(&s);
            prop_assert_eq!(munge(&once), once.clone());
        }

        #[test]
        fn prop_munge_demunge_stable(s in "[!-~]+") {
            // munge(demunge(munge(s))) == munge(s), except for inputs
            // that already contain the escape bigram.
            prop_assume!(!s.contains("Qz"));
            let once = munge(&s);
            prop_assert_eq!(munge(&demunge(&once)), once.clone());
        }

        #[test]
        fn prop_demunge_inverts_munge(s in "[!-~]+") {
            prop_assume!(!s.contains("Qz"));
            prop_assert_eq!(demunge(&munge(&s)), s.clone());
        }
    }
}

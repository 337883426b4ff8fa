//! Persian/Arabic text normalization
//!
//! Canonicalizes the glyph and digit variants that show up in the feed
//! so that comparison, search and sorting all see one spelling. Arabic
//! presentation forms fold to their Persian equivalents, eastern digits
//! fold to ASCII, zero-width joiners and the tatweel are stripped, and
//! whitespace runs collapse to a single space.

/// Normalize a string for comparison, search indexing and sort keys.
///
/// Idempotent: `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(input: &str) -> String {
    let mut folded = String::with_capacity(input.len());
    for ch in input.chars() {
        fold_char(ch, &mut folded);
    }
    // Collapse whitespace runs and trim in one pass.
    let mut out = String::with_capacity(folded.len());
    for word in folded.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

fn fold_char(ch: char, out: &mut String) {
    match ch {
        // Arabic yeh variants -> Persian yeh
        'ي' | 'ى' | 'ئ' => out.push('ی'),
        // Arabic kaf -> Persian kaf
        'ك' => out.push('ک'),
        // Lam-alef ligature
        'ﻻ' => out.push_str("لا"),
        'ة' => out.push('ه'),
        'ؤ' => out.push('و'),
        'إ' | 'أ' | 'آ' => out.push('ا'),
        // ZWNJ, ZWJ, tatweel
        '\u{200c}' | '\u{200d}' | '\u{0640}' => {}
        // Extended Arabic-Indic (Persian) digits
        '\u{06F0}'..='\u{06F9}' => out.push(ascii_digit(ch as u32 - 0x06F0)),
        // Arabic-Indic digits
        '\u{0660}'..='\u{0669}' => out.push(ascii_digit(ch as u32 - 0x0660)),
        _ => out.push(ch),
    }
}

fn ascii_digit(offset: u32) -> char {
    (b'0' + offset as u8) as char
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_yeh_variants_to_one_codepoint() {
        assert_eq!(normalize("علي"), "علی");
        assert_eq!(normalize("موسى"), "موسی");
        assert_eq!(normalize("علي"), normalize("علی"));
    }

    #[test]
    fn folds_kaf_and_hamza_forms() {
        assert_eq!(normalize("بانك"), "بانک");
        assert_eq!(normalize("مسألة"), "مساله");
        assert_eq!(normalize("مؤسسه"), "موسسه");
    }

    #[test]
    fn maps_both_digit_families_to_ascii() {
        assert_eq!(normalize("۰۱۲۳۴۵۶۷۸۹"), "0123456789");
        assert_eq!(normalize("٠١٢٣٤٥٦٧٨٩"), "0123456789");
    }

    #[test]
    fn strips_zero_width_and_collapses_whitespace() {
        assert_eq!(normalize("نیم\u{200c}فاصله"), "نیمفاصله");
        assert_eq!(normalize("  a \t b\n\nc  "), "a b c");
    }

    #[test]
    fn idempotent() {
        let samples = ["  كتاب\u{200c}ها ۱۲٣ ", "plain ascii", "", "ﻻزم"];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn empty_and_whitespace_only_become_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \t "), "");
    }
}

//! Character class predicates.

#[inline(always)]
/// Returns `true` for an ASCII digit.
pub fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

#[inline(always)]
/// Returns `true` for a space or horizontal tab.
pub fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t')
}

#[inline(always)]
/// Returns `true` for CR or LF.
pub fn is_newline(c: u8) -> bool {
    matches!(c, b'\r' | b'\n')
}

#[inline(always)]
/// Returns `true` for anything except a comma, CR or LF.
pub fn not_comma_or_newline(c: u8) -> bool {
    !matches!(c, b',' | b'\r' | b'\n')
}

#[inline(always)]
/// Returns `true` for an ASCII letter.
pub fn is_alphabetic(c: u8) -> bool {
    c.is_ascii_alphabetic()
}

#[inline(always)]
/// Returns `true` for an ASCII letter or digit.
pub fn is_alphanumeric(c: u8) -> bool {
    c.is_ascii_alphanumeric()
}

/// Chilean RUT validation (modulo-11 check digit).
///
/// Accepts formatted input ("12.345.678-5") or bare ("12345678-5",
/// "123456785"); the last character is always the check digit, `K`
/// case-insensitive.

/// Strips dots, hyphens and spaces and splits off the check digit.
/// Returns None when the remainder is not a plausible RUT body.
pub fn normalize(raw: &str) -> Option<(String, char)> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '.' | '-' | ' '))
        .collect();

    if cleaned.len() < 2 {
        return None;
    }

    let mut chars = cleaned.chars();
    let check = chars.next_back()?.to_ascii_uppercase();
    let body: String = chars.collect();

    if body.is_empty() || body.len() > 8 {
        return None;
    }
    if !body.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if !(check.is_ascii_digit() || check == 'K') {
        return None;
    }

    Some((body, check))
}

/// Computes the modulo-11 check digit for a digit-only RUT body.
pub fn check_digit(body: &str) -> Option<char> {
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let factors = [2u32, 3, 4, 5, 6, 7];
    let sum: u32 = body
        .chars()
        .rev()
        .zip(factors.iter().cycle())
        .map(|(c, factor)| c.to_digit(10).unwrap_or(0) * factor)
        .sum();

    Some(match 11 - (sum % 11) {
        11 => '0',
        10 => 'K',
        d => char::from_digit(d, 10)?,
    })
}

pub fn is_valid(raw: &str) -> bool {
    match normalize(raw) {
        Some((body, check)) => check_digit(&body) == Some(check),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_valid_ruts() {
        assert!(is_valid("11111111-1"));
        assert!(is_valid("12345678-5"));
        assert!(is_valid("11111112-K"));
        assert!(is_valid("11111112-k"));
        assert!(is_valid("51111111-0"));
    }

    #[test]
    fn test_accepts_formatted_input() {
        assert!(is_valid("12.345.678-5"));
        assert!(is_valid("123456785"));
        assert!(is_valid(" 12.345.678 - 5 "));
    }

    #[test]
    fn test_rejects_corrupted_check_digit() {
        assert!(!is_valid("12345678-9"));
        assert!(!is_valid("11111111-K"));
        assert!(!is_valid("11111112-1"));
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(!is_valid(""));
        assert!(!is_valid("K"));
        assert!(!is_valid("12A45678-5"));
        assert!(!is_valid("123456789012-3"));
        assert!(!is_valid("1234567-X"));
    }

    #[test]
    fn test_check_digit_covers_all_residues() {
        assert_eq!(check_digit("11111111"), Some('1'));
        assert_eq!(check_digit("11111112"), Some('K'));
        assert_eq!(check_digit("51111111"), Some('0'));
        assert_eq!(check_digit(""), None);
        assert_eq!(check_digit("12a4"), None);
    }
}

//! Helpers for showing command output to people.

use std::string::FromUtf8Error;

const SECTION_SIGN: [u8; 2] = [0xc2, 0xa7];

/// Remove the section signs (`§`) servers use to introduce color and
/// formatting codes, then decode the output as UTF-8.
///
/// Only the sign itself is removed; the code character after it stays.
///
/// # Errors
/// Returns `Err` if what remains is not valid UTF-8.
///
/// # Examples
///
/// ```
/// use mc_rcon::strip_formatting;
///
/// let text = strip_formatting("§6There are 0 players online".as_bytes()).unwrap();
/// assert_eq!(text, "6There are 0 players online");
/// ```
pub fn strip_formatting(output: &[u8]) -> Result<String, FromUtf8Error> {
    let mut stripped = Vec::with_capacity(output.len());
    let mut rest = output;

    while let Some(first) = rest.first() {
        if rest.starts_with(&SECTION_SIGN) {
            rest = &rest[SECTION_SIGN.len()..];
        } else {
            stripped.push(*first);
            rest = &rest[1..];
        }
    }

    String::from_utf8(stripped)
}

#[cfg(test)]
mod tests {
    use super::strip_formatting;

    #[test]
    fn test_strip_formatting() {
        let output = "§eThere are §c2§e of a max of 20 players online".as_bytes();

        assert_eq!(
            strip_formatting(output).unwrap(),
            "eThere are c2e of a max of 20 players online"
        );
        assert_eq!(strip_formatting(b"").unwrap(), "");
    }

    #[test]
    fn test_invalid_utf8() {
        assert!(strip_formatting(b"\xa7broken").is_err());
    }
}

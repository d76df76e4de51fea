use garde::Validate;

use crate::error::Result;

#[derive(Debug, Validate)]
struct PostFields<'a> {
    #[garde(length(chars, min = 1, max = 200))]
    title: &'a str,
    #[garde(length(chars, max = 100000))]
    body: &'a str,
}

/// Validates a post's title (1 to 200 characters) and body (at most
/// 100 000 characters).
pub fn validate_post(title: &str, body: &str) -> Result<()> {
    PostFields { title, body }.validate()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_required() {
        assert!(validate_post("Hello", "").is_ok());
        assert!(validate_post("", "World").is_err());
    }

    #[test]
    fn title_limit_counts_characters() {
        assert!(validate_post(&"é".repeat(200), "").is_ok());
        assert!(validate_post(&"é".repeat(201), "").is_err());
    }
}

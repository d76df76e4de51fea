use garde::Validate;

use crate::error::Result;

#[derive(Debug, Validate)]
struct Registration<'a> {
    #[garde(email)]
    email: &'a str,
    #[garde(length(min = 1, max = 128))]
    password: &'a str,
}

/// Validates registration input: a well-formed email and a password of
/// 1 to 128 bytes.
pub fn validate_registration(email: &str, password: &str) -> Result<()> {
    Registration { email, password }.validate()?;
    Ok(())
}

use anyhow::{bail, Result};

/// Validate a client name supplied with a reservation.
/// Rules: non-empty after trimming, max 64 chars, printable characters only.
pub fn validate_cliente(cliente: &str) -> Result<()> {
    if cliente.trim().is_empty() {
        bail!("cliente is required");
    }
    if cliente.len() > 64 {
        bail!("cliente exceeds 64 characters (got {})", cliente.len());
    }
    if cliente.chars().any(|c| c.is_control()) {
        bail!("cliente must not contain control characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_clients() {
        assert!(validate_cliente("alice").is_ok());
        assert!(validate_cliente("Bob Smith").is_ok());
        assert!(validate_cliente("cliente-42").is_ok());
    }

    #[test]
    fn invalid_clients() {
        assert!(validate_cliente("").is_err());
        assert!(validate_cliente("   ").is_err());
        assert!(validate_cliente("line\nbreak").is_err());
        assert!(validate_cliente(&"a".repeat(65)).is_err());
    }
}

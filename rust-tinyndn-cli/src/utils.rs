//! Utility functions for the tinyNDN CLI

use anyhow::{Context, Result};

/// Parse hex input, tolerating whitespace and a `0x` prefix.
pub fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
        .unwrap_or(&cleaned);
    hex::decode(digits).context("Invalid hex input")
}

/// Format a byte size as a human-readable string
pub fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    }
}

/// Print a section header in the CLI output
pub fn print_header(title: &str) {
    let separator = "=".repeat(title.len());
    println!("\n{}", title);
    println!("{}", separator);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("0x0a 0B").unwrap(), vec![0x0a, 0x0b]);
        assert_eq!(parse_hex("0700").unwrap(), vec![0x07, 0x00]);
        assert!(parse_hex("0g").is_err());
        assert!(parse_hex("abc").is_err());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(12), "12 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
    }
}

//! Logging helpers built on the `log` facade.
//!
//! The crate itself only emits through `log` macros; applications that do not
//! install their own logger can call [`init_logger`] to get `env_logger`
//! output controlled by `RUST_LOG`.

/// Initializes `env_logger`. Call once at program start.
pub fn init_logger() {
    let _ = env_logger::builder().try_init();
}

/// Renders a byte slice as spaced uppercase hex for log output.
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_dump_formats_spaced_uppercase() {
        assert_eq!(hex_dump(&[0x10, 0x7B, 0x01, 0x7C, 0x16]), "10 7B 01 7C 16");
        assert_eq!(hex_dump(&[]), "");
    }
}

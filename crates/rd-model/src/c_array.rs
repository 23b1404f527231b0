use std::fmt::Write as _;
use std::path::Path;

use crate::error::ModelError;

/// Array name used by the embedded firmware.
pub const DEFAULT_ARRAY_NAME: &str = "g_model";
/// Include guard of the generated header.
pub const DEFAULT_INCLUDE_GUARD: &str = "MODEL_DATA_H";

const BYTES_PER_LINE: usize = 12;

/// Render `bytes` as a C header: a length constant plus an
/// `unsigned char` array under an include guard, ready to compile into a
/// resource-constrained target.
///
/// # Example
/// ```
/// use rd_model::c_array::{to_c_source, parse_c_source};
/// let source = to_c_source(&[0xde, 0xad], "g_model", "MODEL_DATA_H");
/// assert!(source.contains("#ifndef MODEL_DATA_H"));
/// assert_eq!(parse_c_source(&source).unwrap(), vec![0xde, 0xad]);
/// ```
#[must_use]
pub fn to_c_source(bytes: &[u8], array_name: &str, include_guard: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "#ifndef {include_guard}");
    let _ = writeln!(out, "#define {include_guard}");
    out.push('\n');
    let _ = writeln!(out, "/* Generated by roardet-train. Do not edit. */");
    let _ = writeln!(out, "const unsigned int {array_name}_len = {};", bytes.len());
    let _ = writeln!(out, "const unsigned char {array_name}[] = {{");
    for chunk in bytes.chunks(BYTES_PER_LINE) {
        out.push_str("    ");
        for (i, b) in chunk.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let _ = write!(out, "0x{b:02x},");
        }
        out.push('\n');
    }
    let _ = writeln!(out, "}};");
    out.push('\n');
    let _ = writeln!(out, "#endif  /* {include_guard} */");
    out
}

/// Write the header for `bytes` to `path` using the default array name and
/// include guard.
///
/// # Errors
/// Returns an error on I/O failure.
pub fn write_c_header(path: impl AsRef<Path>, bytes: &[u8]) -> Result<(), ModelError> {
    let source = to_c_source(bytes, DEFAULT_ARRAY_NAME, DEFAULT_INCLUDE_GUARD);
    std::fs::write(path, source)?;
    Ok(())
}

/// Recover the raw bytes from a header produced by [`to_c_source`].
///
/// Used by the artifact/header round-trip check; tolerant of whitespace but
/// not of hand edits beyond that.
///
/// # Errors
/// Returns [`ModelError::Header`] if the array body cannot be located or a
/// byte fails to parse.
pub fn parse_c_source(source: &str) -> Result<Vec<u8>, ModelError> {
    let open = source
        .find("[] = {")
        .ok_or_else(|| ModelError::Header("array opening not found".into()))?;
    let body = &source[open + "[] = {".len()..];
    let close = body
        .find('}')
        .ok_or_else(|| ModelError::Header("array closing not found".into()))?;

    let mut bytes = Vec::new();
    for token in body[..close].split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let hex = token
            .strip_prefix("0x")
            .ok_or_else(|| ModelError::Header(format!("unexpected token: {token}")))?;
        let value = u8::from_str_radix(hex, 16)
            .map_err(|e| ModelError::Header(format!("bad byte {token}: {e}")))?;
        bytes.push(value);
    }
    Ok(bytes)
}

use std::path::Path;

use anyhow::{anyhow, Context};
use encoding_rs::{Encoding, UTF_8};

/// Reads a text file, honoring a BOM when present and otherwise decoding with `label`
/// (any WHATWG encoding label, e.g. `windows-1254`; default UTF-8).
pub fn read_text_file(path: &Path, label: Option<&str>) -> anyhow::Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("read: {}", path.display()))?;
    decode_text(&bytes, label).with_context(|| format!("decode: {}", path.display()))
}

pub fn decode_text(bytes: &[u8], label: Option<&str>) -> anyhow::Result<String> {
    let fallback = match label.map(str::trim).filter(|s| !s.is_empty()) {
        Some(l) => {
            Encoding::for_label(l.as_bytes()).ok_or_else(|| anyhow!("unknown encoding: {l}"))?
        }
        None => UTF_8,
    };
    let (text, used, had_errors) = fallback.decode(bytes);
    if had_errors && used == UTF_8 {
        return Err(anyhow!(
            "input is not valid UTF-8 (pass --encoding, e.g. windows-1254)"
        ));
    }
    Ok(text.into_owned())
}

pub fn write_text_file(path: &Path, text: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir: {}", parent.display()))?;
    }
    std::fs::write(path, text).with_context(|| format!("write: {}", path.display()))
}

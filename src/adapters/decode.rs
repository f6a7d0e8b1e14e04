use crate::domain::model::ResponseBody;
use crate::utils::error::{HarnessError, Result};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];

/// windows-1252 code points for bytes 0x80..=0x9F; zero marks an unassigned byte.
const CP1252_HIGH: [u16; 32] = [
    0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160, 0x2039,
    0x0152, 0, 0x017D, 0, 0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, 0x02DC,
    0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Charset {
    Utf8,
    Utf16Le,
    Utf16Be,
    Latin1,
    Ascii,
    Windows1252,
}

impl Charset {
    fn from_label(label: &str) -> Option<Self> {
        match label.trim().trim_matches('"').to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Charset::Utf8),
            "utf-16" | "utf-16le" => Some(Charset::Utf16Le),
            "utf-16be" => Some(Charset::Utf16Be),
            "iso-8859-1" | "latin1" | "latin-1" | "l1" => Some(Charset::Latin1),
            "us-ascii" | "ascii" => Some(Charset::Ascii),
            "windows-1252" | "cp1252" => Some(Charset::Windows1252),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Charset::Utf8 => "utf-8",
            Charset::Utf16Le => "utf-16le",
            Charset::Utf16Be => "utf-16be",
            Charset::Latin1 => "iso-8859-1",
            Charset::Ascii => "us-ascii",
            Charset::Windows1252 => "windows-1252",
        }
    }

    fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            Charset::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_string),
            Charset::Utf16Le => decode_utf16(bytes, u16::from_le_bytes),
            Charset::Utf16Be => decode_utf16(bytes, u16::from_be_bytes),
            Charset::Latin1 => Some(bytes.iter().map(|&b| char::from(b)).collect()),
            Charset::Ascii => bytes
                .is_ascii()
                .then(|| bytes.iter().map(|&b| char::from(b)).collect()),
            Charset::Windows1252 => bytes
                .iter()
                .map(|&b| match b {
                    0x80..=0x9F => match CP1252_HIGH[(b - 0x80) as usize] {
                        0 => None,
                        code => char::from_u32(code as u32),
                    },
                    _ => Some(char::from(b)),
                })
                .collect(),
        }
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).ok()
}

fn declared_charset(content_type: Option<&str>) -> Option<&str> {
    content_type?.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim().eq_ignore_ascii_case("charset").then_some(value)
    })
}

/// Turns raw body bytes into text. Tries a byte-order mark first, then the
/// charset from `Content-Type`, then strict UTF-8; gives up with a decode error
/// naming every encoding that was attempted.
pub fn decode_text(bytes: &[u8], content_type: Option<&str>) -> Result<String> {
    if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
        if let Some(text) = Charset::Utf8.decode(rest) {
            return Ok(text);
        }
    } else if let Some(rest) = bytes.strip_prefix(UTF16LE_BOM) {
        if let Some(text) = Charset::Utf16Le.decode(rest) {
            return Ok(text);
        }
    } else if let Some(rest) = bytes.strip_prefix(UTF16BE_BOM) {
        if let Some(text) = Charset::Utf16Be.decode(rest) {
            return Ok(text);
        }
    }

    let mut attempted: Vec<String> = Vec::new();

    if let Some(label) = declared_charset(content_type) {
        match Charset::from_label(label) {
            Some(charset) => {
                if let Some(text) = charset.decode(bytes) {
                    return Ok(text);
                }
                tracing::debug!("Body is not valid {} despite declared charset", charset.name());
                attempted.push(charset.name().to_string());
            }
            None => {
                tracing::debug!("Ignoring unsupported charset label: {}", label);
                attempted.push(format!("{} (unsupported)", label.trim()));
            }
        }
    }

    if !attempted.iter().any(|name| name == Charset::Utf8.name()) {
        if let Some(text) = Charset::Utf8.decode(bytes) {
            return Ok(text);
        }
        attempted.push(Charset::Utf8.name().to_string());
    }

    Err(HarnessError::Decode {
        message: format!(
            "{} byte body could not be decoded as text (tried {})",
            bytes.len(),
            attempted.join(", ")
        ),
        raw: Some(String::from_utf8_lossy(bytes).into_owned()),
    })
}

/// Decodes a body into JSON when possible, keeping non-JSON text as-is.
/// Never fails: bytes that cannot be decoded become `Undecodable`, and the
/// error surfaces only when something reads the body.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> ResponseBody {
    if bytes.is_empty() {
        return ResponseBody::Empty;
    }

    let text = match decode_text(bytes, content_type) {
        Ok(text) => text,
        Err(HarnessError::Decode { message, raw }) => {
            tracing::debug!("Response body kept undecoded: {}", message);
            return ResponseBody::Undecodable {
                message,
                raw: raw.unwrap_or_else(|| String::from_utf8_lossy(bytes).into_owned()),
            };
        }
        Err(e) => {
            return ResponseBody::Undecodable {
                message: e.to_string(),
                raw: String::from_utf8_lossy(bytes).into_owned(),
            }
        }
    };
    if text.trim().is_empty() {
        return ResponseBody::Empty;
    }

    match serde_json::from_str(&text) {
        Ok(value) => ResponseBody::Json(value),
        Err(e) => {
            tracing::debug!("Response body is not JSON: {}", e);
            ResponseBody::Text(text)
        }
    }
}

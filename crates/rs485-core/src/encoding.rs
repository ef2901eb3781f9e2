use encoding_rs::{Encoding, GBK, UTF_16LE, UTF_8};

use crate::LineEnding;

/// How command text becomes bytes on the wire and how reply bytes become text.
///
/// Line terminators go through the same encoding as the text, so a UTF-16
/// device sees `0A 00` for a newline, not a bare `0A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// Send UTF-8; guess the reply encoding.
    Auto,
    Utf8,
    Utf16,
    /// 7-bit ASCII; anything else becomes `?` in both directions.
    Ascii,
    Gbk,
}

impl std::str::FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "auto" => Self::Auto,
            "utf8" | "utf-8" => Self::Utf8,
            "utf16" | "utf-16" => Self::Utf16,
            "ascii" => Self::Ascii,
            "gbk" | "gb2312" => Self::Gbk,
            other => return Err(format!("unsupported encoding '{other}'")),
        })
    }
}

impl TextEncoding {
    /// Bytes per code unit. Terminators are only matched on unit boundaries.
    pub fn unit_width(&self) -> usize {
        match self {
            Self::Utf16 => 2,
            _ => 1,
        }
    }

    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Self::Auto | Self::Utf8 => text.as_bytes().to_vec(),
            // encoding_rs only encodes to ASCII-compatible targets
            Self::Utf16 => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Self::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
            Self::Gbk => GBK.encode(text).0.into_owned(),
        }
    }

    pub fn terminator(&self, ending: LineEnding) -> Vec<u8> {
        self.encode(ending.as_str())
    }

    /// `text` followed by the encoded terminator.
    pub fn encode_line(&self, text: &str, ending: LineEnding) -> Vec<u8> {
        let mut line = self.encode(text);
        line.extend(self.terminator(ending));
        line
    }

    /// Split the first complete line off `pending`, dropping its terminator.
    /// Bytes after it stay in `pending`.
    pub fn take_line(&self, pending: &mut Vec<u8>, ending: LineEnding) -> Option<Vec<u8>> {
        let terminator = self.terminator(ending);
        let step = self.unit_width();
        let pos = (0..pending.len())
            .step_by(step)
            .find(|&at| pending[at..].starts_with(&terminator))?;
        let mut line: Vec<u8> = pending.drain(..pos + terminator.len()).collect();
        line.truncate(pos);
        Some(line)
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        let encoding: &'static Encoding = match self {
            Self::Auto => return guess_and_decode(bytes),
            Self::Ascii => {
                return bytes.iter().map(|&b| if b.is_ascii() { b as char } else { '?' }).collect()
            }
            Self::Utf8 => UTF_8,
            Self::Utf16 => UTF_16LE,
            Self::Gbk => GBK,
        };
        encoding.decode_without_bom_handling(bytes).0.into_owned()
    }
}

/// BOM first, then strict UTF-8, then chardetng's guess.
fn guess_and_decode(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return encoding
            .decode_without_bom_handling(&bytes[bom_len..])
            .0
            .into_owned();
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_owned();
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    detector
        .guess(None, true)
        .decode_without_bom_handling(bytes)
        .0
        .into_owned()
}

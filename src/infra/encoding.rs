use std::{fmt, fmt::Write as _, str::FromStr};

use thiserror::Error;

/// Character encoding used to read and write source files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Latin1,
    Ascii,
}

#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("unsupported encoding `{0}`")]
    Unsupported(String),
    #[error("invalid utf-8 at byte {offset}")]
    InvalidUtf8 { offset: usize },
    #[error("non-ascii byte 0x{byte:02x} at offset {offset}")]
    NonAscii { byte: u8, offset: usize },
    #[error("utf-16le input has an odd length of {len} bytes")]
    OddLength { len: usize },
    #[error("unpaired utf-16 surrogate 0x{unit:04x}")]
    UnpairedSurrogate { unit: u16 },
}

impl FromStr for TextEncoding {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "utf-16le" | "utf16le" | "ucs2" | "ucs-2" => Ok(TextEncoding::Utf16Le),
            "latin1" | "iso-8859-1" | "binary" => Ok(TextEncoding::Latin1),
            "ascii" | "us-ascii" => Ok(TextEncoding::Ascii),
            _ => Err(EncodingError::Unsupported(s.to_string())),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf16Le => "utf-16le",
            TextEncoding::Latin1 => "latin1",
            TextEncoding::Ascii => "ascii",
        };
        f.write_str(name)
    }
}

impl TextEncoding {
    pub fn decode(self, bytes: Vec<u8>) -> Result<String, EncodingError> {
        match self {
            TextEncoding::Utf8 => String::from_utf8(bytes).map_err(|err| {
                EncodingError::InvalidUtf8 {
                    offset: err.utf8_error().valid_up_to(),
                }
            }),
            TextEncoding::Ascii => {
                if let Some(offset) = bytes.iter().position(|byte| !byte.is_ascii()) {
                    return Err(EncodingError::NonAscii {
                        byte: bytes[offset],
                        offset,
                    });
                }
                String::from_utf8(bytes).map_err(|err| EncodingError::InvalidUtf8 {
                    offset: err.utf8_error().valid_up_to(),
                })
            }
            TextEncoding::Latin1 => Ok(bytes.iter().map(|&byte| char::from(byte)).collect()),
            TextEncoding::Utf16Le => {
                if bytes.len() % 2 != 0 {
                    return Err(EncodingError::OddLength { len: bytes.len() });
                }
                let units = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
                char::decode_utf16(units)
                    .map(|unit| {
                        unit.map_err(|err| EncodingError::UnpairedSurrogate {
                            unit: err.unpaired_surrogate(),
                        })
                    })
                    .collect()
            }
        }
    }

    /// Encode `text`. Characters outside a narrow charset become HTML numeric
    /// character references.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            TextEncoding::Latin1 => encode_narrow(text, 0xFF),
            TextEncoding::Ascii => encode_narrow(text, 0x7F),
        }
    }
}

fn encode_narrow(text: &str, max: u32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len());
    let mut reference = String::new();
    for ch in text.chars() {
        let code = u32::from(ch);
        match u8::try_from(code) {
            Ok(byte) if code <= max => bytes.push(byte),
            _ => {
                reference.clear();
                let _ = write!(reference, "&#x{code:X};");
                bytes.extend_from_slice(reference.as_bytes());
            }
        }
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_names() {
        assert_eq!("UTF-8".parse::<TextEncoding>().unwrap(), TextEncoding::Utf8);
        assert_eq!("utf8".parse::<TextEncoding>().unwrap(), TextEncoding::Utf8);
        assert_eq!("ucs2".parse::<TextEncoding>().unwrap(), TextEncoding::Utf16Le);
        assert_eq!(
            "iso-8859-1".parse::<TextEncoding>().unwrap(),
            TextEncoding::Latin1
        );
        assert_eq!("ascii".parse::<TextEncoding>().unwrap(), TextEncoding::Ascii);
        assert!(matches!(
            "shift_jis".parse::<TextEncoding>(),
            Err(EncodingError::Unsupported(_))
        ));
    }

    #[test]
    fn utf8_is_strict() {
        let err = TextEncoding::Utf8
            .decode(vec![b'a', 0xFF, b'b'])
            .expect_err("invalid utf-8");
        assert!(matches!(err, EncodingError::InvalidUtf8 { offset: 1 }));
    }

    #[test]
    fn ascii_rejects_high_bytes() {
        let err = TextEncoding::Ascii
            .decode("é".as_bytes().to_vec())
            .expect_err("non-ascii");
        assert!(matches!(err, EncodingError::NonAscii { offset: 0, .. }));
    }

    #[test]
    fn latin1_maps_bytes_to_code_points() {
        let text = TextEncoding::Latin1.decode(vec![b'c', 0xE9]).expect("decode");
        assert_eq!(text, "c\u{e9}");
        assert_eq!(TextEncoding::Latin1.encode(&text), vec![b'c', 0xE9]);
    }

    #[test]
    fn narrow_encodings_escape_wide_characters() {
        assert_eq!(TextEncoding::Latin1.encode("a\u{2212}b"), b"a&#x2212;b".to_vec());
        assert_eq!(TextEncoding::Ascii.encode("\u{e9}"), b"&#xE9;".to_vec());
    }

    #[test]
    fn utf16le_decodes_surrogate_pairs() {
        let bytes = TextEncoding::Utf16Le.encode("x\u{1D465}");
        assert_eq!(bytes.len(), 6);
        assert_eq!(TextEncoding::Utf16Le.decode(bytes).unwrap(), "x\u{1D465}");
    }

    #[test]
    fn utf16le_rejects_odd_length_and_lone_surrogates() {
        assert!(matches!(
            TextEncoding::Utf16Le.decode(vec![0x61]),
            Err(EncodingError::OddLength { len: 1 })
        ));
        assert!(matches!(
            TextEncoding::Utf16Le.decode(vec![0x00, 0xD8]),
            Err(EncodingError::UnpairedSurrogate { unit: 0xD800 })
        ));
    }
}

#![forbid(unsafe_code)]

use std::fmt;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use taskhub_kernel_contracts::push::PushNotificationDisplay;

pub const VAPID_PUBLIC_KEY_LEN: usize = 65;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushCodecError {
    InvalidBase64,
    InvalidKeyLength { expected: usize, got: usize },
    NotUncompressedPoint,
}

impl fmt::Display for PushCodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBase64 => write!(f, "key is not valid base64"),
            Self::InvalidKeyLength { expected, got } => {
                write!(f, "key must be {expected} bytes, got {got}")
            }
            Self::NotUncompressedPoint => write!(f, "key is not an uncompressed P-256 point"),
        }
    }
}

impl std::error::Error for PushCodecError {}

/// Application server key handed to the push service on subscribe.
#[derive(Clone, PartialEq, Eq)]
pub struct VapidPublicKey([u8; VAPID_PUBLIC_KEY_LEN]);

impl VapidPublicKey {
    /// Accepts URL-safe base64 with or without padding; standard-alphabet
    /// characters are normalised first.
    pub fn from_base64url(raw: &str) -> Result<Self, PushCodecError> {
        let bytes = decode_lenient(raw)?;
        if bytes.len() != VAPID_PUBLIC_KEY_LEN {
            return Err(PushCodecError::InvalidKeyLength {
                expected: VAPID_PUBLIC_KEY_LEN,
                got: bytes.len(),
            });
        }
        if bytes[0] != 0x04 {
            return Err(PushCodecError::NotUncompressedPoint);
        }
        let mut key = [0u8; VAPID_PUBLIC_KEY_LEN];
        key.copy_from_slice(&bytes);
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }
}

impl fmt::Debug for VapidPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VapidPublicKey({})", self.to_base64url())
    }
}

fn decode_lenient(raw: &str) -> Result<Vec<u8>, PushCodecError> {
    let normalised: String = raw
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    URL_SAFE_NO_PAD
        .decode(normalised.as_bytes())
        .map_err(|_| PushCodecError::InvalidBase64)
}

/// Standard base64, the form stored in `p256dh`/`auth` columns.
pub fn encode_key_material(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode_key_material(raw: &str) -> Result<Vec<u8>, PushCodecError> {
    decode_lenient(raw)
}

/// Decodes a push message body into what the notification shows.
/// Never fails: anything unreadable falls back to the defaults.
pub fn parse_push_payload(data: Option<&[u8]>) -> PushNotificationDisplay {
    let mut display = PushNotificationDisplay::default();
    let Some(data) = data else {
        return display;
    };
    if data.is_empty() {
        return display;
    }

    match serde_json::from_slice::<serde_json::Value>(data) {
        Ok(serde_json::Value::Null) | Err(_) => {
            let text = String::from_utf8_lossy(data);
            if !text.is_empty() {
                display.body = text.into_owned();
            }
        }
        Ok(value) => {
            let field = |name: &str| {
                value
                    .get(name)
                    .and_then(serde_json::Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            };
            if let Some(title) = field("title") {
                display.title = title;
            }
            if let Some(body) = field("body") {
                display.body = body;
            }
            if let Some(tag) = field("tag") {
                display.tag = tag;
            }
            if let Some(url) = field("url") {
                display.url = url;
            }
        }
    }
    display
}

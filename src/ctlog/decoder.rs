// CT Log Entry Decoder
//
// Turns a raw get-entries item into the subject common name of the logged
// certificate or precertificate.

use super::client::RawLogEntry;
use crate::error::Result;
use crate::types::CertFinderError;
use base64::Engine;
use x509_parser::prelude::*;

/// MerkleTreeLeaf header: version, leaf type, timestamp, entry type
const LEAF_HEADER_LEN: usize = 1 + 1 + 8 + 2;

/// SHA-256 of the issuer key, prefixed to precertificate entries
const ISSUER_KEY_HASH_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Certificate,
    Precertificate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEntry {
    pub index: u64,
    pub kind: EntryKind,
    pub common_name: Option<String>,
}

pub trait EntryDecoder: Send + Sync {
    fn decode(&self, index: u64, entry: &RawLogEntry) -> Result<DecodedEntry>;
}

/// Decoder for RFC 6962 `MerkleTreeLeaf` structures.
#[derive(Debug, Clone, Copy, Default)]
pub struct X509EntryDecoder;

impl EntryDecoder for X509EntryDecoder {
    fn decode(&self, index: u64, entry: &RawLogEntry) -> Result<DecodedEntry> {
        let fail = |message: String| CertFinderError::DecodeError { index, message };

        let leaf = base64::engine::general_purpose::STANDARD
            .decode(entry.leaf_input.trim())
            .map_err(|e| fail(format!("invalid leaf_input: {}", e)))?;

        if leaf.len() < LEAF_HEADER_LEN {
            return Err(fail(format!("leaf too short: {} bytes", leaf.len())));
        }
        if leaf[0] != 0 {
            return Err(fail(format!("unsupported version {}", leaf[0])));
        }
        if leaf[1] != 0 {
            return Err(fail(format!("unsupported leaf type {}", leaf[1])));
        }

        let entry_type = u16::from_be_bytes([leaf[10], leaf[11]]);
        let mut rest = &leaf[LEAF_HEADER_LEN..];

        match entry_type {
            0 => {
                let der = read_opaque24(&mut rest).ok_or_else(|| fail("truncated certificate".to_string()))?;
                let (_, cert) = X509Certificate::from_der(der)
                    .map_err(|e| fail(format!("unparsable certificate: {}", e)))?;
                Ok(DecodedEntry {
                    index,
                    kind: EntryKind::Certificate,
                    common_name: common_name(cert.subject()),
                })
            }
            1 => {
                take(&mut rest, ISSUER_KEY_HASH_LEN)
                    .ok_or_else(|| fail("truncated issuer key hash".to_string()))?;
                let der = read_opaque24(&mut rest).ok_or_else(|| fail("truncated precertificate".to_string()))?;
                let (_, tbs) = TbsCertificate::from_der(der)
                    .map_err(|e| fail(format!("unparsable precertificate: {}", e)))?;
                Ok(DecodedEntry {
                    index,
                    kind: EntryKind::Precertificate,
                    common_name: common_name(&tbs.subject),
                })
            }
            other => Err(fail(format!("unknown entry type {}", other))),
        }
    }
}

fn common_name(name: &X509Name<'_>) -> Option<String> {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(|cn| cn.trim().to_string())
        .filter(|cn| !cn.is_empty())
}

fn take<'a>(buf: &mut &'a [u8], len: usize) -> Option<&'a [u8]> {
    if buf.len() < len {
        return None;
    }
    let (head, tail) = buf.split_at(len);
    *buf = tail;
    Some(head)
}

/// `opaque <1..2^24-1>`: 24-bit big endian length followed by the bytes.
fn read_opaque24<'a>(buf: &mut &'a [u8]) -> Option<&'a [u8]> {
    let len = take(buf, 3)?;
    let len = u32::from_be_bytes([0, len[0], len[1], len[2]]) as usize;
    take(buf, len)
}

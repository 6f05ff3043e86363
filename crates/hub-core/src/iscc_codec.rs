//! Stand-in for the ISCC component library the hub is specified to consume
//! (`decode`, `compose`, `encode_instance`). Meta-/Content-/Data-Code
//! generation and full algorithmic conformance with the public ISCC
//! standard are an explicit non-goal of this hub; this module implements
//! only the composite-code envelope (header + concatenated per-unit
//! digests) the validator needs for its structural and cross-field checks.

use crate::error::HubError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainType {
    Meta,
    Content,
    Data,
    Instance,
    Iscc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubType {
    None,
    Wide,
}

#[derive(Debug, Clone)]
pub struct DecodedIscc {
    pub main_type: MainType,
    pub sub_type: SubType,
    pub version: u8,
    pub digest: Vec<u8>,
}

const BASE32: base32::Alphabet = base32::Alphabet::Rfc4648 { padding: false };

fn main_type_code(mt: MainType) -> u8 {
    match mt {
        MainType::Meta => 0,
        MainType::Content => 1,
        MainType::Data => 2,
        MainType::Instance => 3,
        MainType::Iscc => 4,
    }
}

fn main_type_from_code(c: u8) -> Result<MainType, HubError> {
    Ok(match c {
        0 => MainType::Meta,
        1 => MainType::Content,
        2 => MainType::Data,
        3 => MainType::Instance,
        4 => MainType::Iscc,
        _ => {
            return Err(HubError::InvalidIscc {
                message: "unknown ISCC MainType".into(),
            })
        }
    })
}

pub fn decode(s: &str) -> Result<DecodedIscc, HubError> {
    let payload = s.strip_prefix("ISCC:").ok_or_else(|| HubError::InvalidIscc {
        message: "missing ISCC: prefix".into(),
    })?;
    let bytes = base32::decode(BASE32, payload).ok_or_else(|| HubError::InvalidIscc {
        message: "invalid base32 in iscc_code".into(),
    })?;
    if bytes.len() < 2 {
        return Err(HubError::InvalidIscc {
            message: "iscc_code too short".into(),
        });
    }
    let main_type = main_type_from_code(bytes[0] >> 4)?;
    let sub_type = if (bytes[0] & 0x0F) == 1 {
        SubType::Wide
    } else {
        SubType::None
    };
    let version = bytes[1];
    let digest = bytes[2..].to_vec();
    Ok(DecodedIscc {
        main_type,
        sub_type,
        version,
        digest,
    })
}

pub fn encode(main_type: MainType, sub_type: SubType, version: u8, digest: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(2 + digest.len());
    let sub = match sub_type {
        SubType::None => 0u8,
        SubType::Wide => 1u8,
    };
    bytes.push((main_type_code(main_type) << 4) | sub);
    bytes.push(version);
    bytes.extend_from_slice(digest);
    format!("ISCC:{}", base32::encode(BASE32, &bytes))
}

/// Build an Instance-Code unit from a raw content digest (spec §4.B step 7's
/// "convert datahash to an Instance-Code unit").
pub fn encode_instance(digest: &[u8]) -> String {
    encode(MainType::Instance, SubType::None, 0, digest)
}

/// Compose ISCC-UNITs into one composite ISCC-CODE by truncating each unit's
/// digest to 64 bits, mirroring the non-WIDE composite form.
pub fn compose(units: &[String]) -> Result<String, HubError> {
    let mut digest = Vec::with_capacity(units.len() * 8);
    for unit in units {
        let decoded = decode(unit)?;
        let take = decoded.digest.len().min(8);
        digest.extend_from_slice(&decoded.digest[..take]);
    }
    Ok(encode(MainType::Iscc, SubType::None, 0, &digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_and_compose_roundtrip() {
        let digest = vec![7u8; 32];
        let instance = encode_instance(&digest);
        let composed = compose(&[instance]).unwrap();
        let decoded = decode(&composed).unwrap();
        assert_eq!(decoded.main_type, MainType::Iscc);
        assert_eq!(&decoded.digest[..], &digest[..8]);
    }
}

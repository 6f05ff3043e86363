//! declare command - build, sign, and submit a throwaway IsccNote
//!
//! Grounded in `scripts/demo_declare.py`/`scripts/declaration.py`: generates
//! (or loads) an Ed25519 key, hashes either a supplied file or random bytes
//! into a datahash, composes a one-unit `iscc_code`, signs the note per
//! spec §4.B's `eddsa-jcs-2022`-style JCS signing, and POSTs it to a running
//! hub's `/declaration` endpoint. This is developer smoke-test tooling, not
//! a production client.
//!
//! Usage:
//! ```bash
//! iscc-hub declare --url http://localhost:8080 --hub-id 1
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use ed25519_dalek::{Signer, SigningKey};
use rand::RngCore;
use sha2::{Digest, Sha256};

use iscc_hub_core::iscc_codec;
use iscc_hub_core::note::{IsccNote, NoteSignature};

use crate::{print_info, print_success};

/// Arguments for the declare command
#[derive(Args)]
pub struct DeclareArgs {
    /// Base URL of the running hub
    #[arg(long, default_value = "http://localhost:8080")]
    url: String,

    /// 12-bit hub id to embed in the nonce (must match the target hub's configured id)
    #[arg(long, default_value_t = 0)]
    hub_id: u16,

    /// Path to a file to hash instead of generating random content
    #[arg(long, value_name = "FILE")]
    file: Option<std::path::PathBuf>,

    /// 64-char hex Ed25519 seed; a fresh throwaway key is generated if omitted
    #[arg(long, value_name = "HEX")]
    seckey: Option<String>,

    /// Optional gateway URL or URI template to attach to the note
    #[arg(long)]
    gateway: Option<String>,
}

/// Run the declare command
pub async fn run(args: DeclareArgs) -> Result<()> {
    if args.hub_id > 4095 {
        anyhow::bail!("hub id must fit in 12 bits (0..=4095)");
    }

    let signing_key = match &args.seckey {
        Some(hex_seed) => {
            let bytes = hex::decode(hex_seed).context("seckey must be hex")?;
            let seed: [u8; 32] = bytes.try_into().map_err(|_| anyhow::anyhow!("seckey must be 32 bytes"))?;
            SigningKey::from_bytes(&seed)
        }
        None => {
            let mut seed = [0u8; 32];
            rand::rng().fill_bytes(&mut seed);
            SigningKey::from_bytes(&seed)
        }
    };

    let digest = match &args.file {
        Some(path) => {
            let content = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            Sha256::digest(&content).to_vec()
        }
        None => {
            let mut bytes = vec![0u8; 32];
            rand::rng().fill_bytes(&mut bytes);
            Sha256::digest(&bytes).to_vec()
        }
    };

    let datahash = format!("1e20{}", hex::encode(&digest));
    let instance = iscc_codec::encode_instance(&digest);
    let iscc_code = iscc_codec::compose(&[instance])?;

    let mut nonce = vec![0u8; 16];
    rand::rng().fill_bytes(&mut nonce);
    nonce[0] = (args.hub_id >> 4) as u8;
    nonce[1] = (((args.hub_id & 0xF) as u8) << 4) | (nonce[1] & 0x0F);

    let pubkey_multibase = {
        let mut bytes = vec![0xed, 0x01];
        bytes.extend_from_slice(signing_key.verifying_key().as_bytes());
        format!("z{}", bs58::encode(bytes).into_string())
    };

    let mut note = IsccNote {
        iscc_code,
        datahash,
        nonce: hex::encode(nonce),
        timestamp: Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        signature: NoteSignature {
            version: "ISCC-SIG v1.0".into(),
            pubkey: pubkey_multibase,
            proof: String::new(),
            controller: None,
            keyid: None,
        },
        gateway: args.gateway,
        metahash: None,
        units: None,
    };

    let mut value = serde_json::to_value(&note)?;
    value
        .get_mut("signature")
        .and_then(|s| s.as_object_mut())
        .expect("signature is always an object")
        .remove("proof");
    let canonical = serde_jcs::to_string(&value)?;
    let signature = signing_key.sign(canonical.as_bytes());
    note.signature.proof = format!("z{}", bs58::encode(signature.to_bytes()).into_string());

    print_info(&format!("submitting declaration for {}...", note.iscc_code));

    let endpoint = format!("{}/declaration", args.url.trim_end_matches('/'));
    let response = reqwest::Client::new().post(&endpoint).json(&note).send().await?;
    let status = response.status();
    let body: serde_json::Value = response.json().await.unwrap_or(serde_json::json!({}));

    if status.is_success() {
        print_success(&format!("declared ({status})"));
    } else {
        println!("{} {}", "✗".red().bold(), format!("hub rejected declaration ({status})"));
    }
    println!("{}", serde_json::to_string_pretty(&body)?);

    Ok(())
}

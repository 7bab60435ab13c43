//! Packet decoding command

use anyhow::{Context, Result};
use rust_tinyndn_common::{Data, Interest, PacketKind};
use serde_json::json;

use crate::utils::{format_bytes, parse_hex};

/// Decode a hex packet and print a summary
pub fn decode_packet(input: &str, as_json: bool) -> Result<()> {
    let wire = parse_hex(input)?;
    let kind = PacketKind::of(&wire).context("Not an Interest or Data packet")?;

    let summary = match kind {
        PacketKind::Interest => {
            let interest = Interest::decode(&wire).context("Malformed Interest")?;
            json!({
                "type": "Interest",
                "name": interest.name.to_string(),
                "nonce": format!("{:08x}", interest.nonce),
                "lifetime_ms": interest.lifetime_ms,
                "hop_limit": interest.hop_limit,
                "can_be_prefix": interest.can_be_prefix,
                "must_be_fresh": interest.must_be_fresh,
                "app_parameters": interest.app_parameters.as_ref().map(|p| p.len()),
                "size": wire.len(),
            })
        }
        PacketKind::Data => {
            let data = Data::decode(&wire).context("Malformed Data")?;
            json!({
                "type": "Data",
                "name": data.name.to_string(),
                "content_type": data.content_type,
                "freshness_period_ms": data.freshness_period_ms,
                "content": String::from_utf8_lossy(&data.content),
                "signature_type": data.signature_type,
                "size": wire.len(),
            })
        }
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if let Some(fields) = summary.as_object() {
        for (key, value) in fields {
            match (key.as_str(), value) {
                (_, serde_json::Value::Null) => continue,
                ("size", _) => println!("{:>20}: {}", key, format_bytes(wire.len())),
                (_, serde_json::Value::String(s)) => println!("{:>20}: {}", key, s),
                _ => println!("{:>20}: {}", key, value),
            }
        }
    }
    Ok(())
}

//! Packet encoding commands

use anyhow::{Context, Result};
use log::debug;
use rust_tinyndn_common::{Data, Interest, Name};

use crate::EncodeCommands;

/// Handle encode commands
pub fn handle_command(cmd: EncodeCommands) -> Result<()> {
    let wire = match cmd {
        EncodeCommands::Interest {
            name,
            lifetime,
            nonce,
            hop_limit,
            can_be_prefix,
            must_be_fresh,
        } => {
            let name = Name::from_uri(&name).with_context(|| format!("Invalid name: {}", name))?;
            let mut interest = Interest::new(name)
                .with_lifetime(lifetime)
                .with_can_be_prefix(can_be_prefix)
                .with_must_be_fresh(must_be_fresh)
                .with_hop_limit(hop_limit);
            if let Some(nonce) = nonce {
                interest = interest.with_nonce(nonce);
            }
            debug!("Encoding Interest {:?}", interest);
            interest.to_bytes().context("Failed to encode Interest")?
        }
        EncodeCommands::Data {
            name,
            content,
            freshness,
        } => {
            let name = Name::from_uri(&name).with_context(|| format!("Invalid name: {}", name))?;
            let mut data = Data::new(name, content.into_bytes());
            if let Some(freshness) = freshness {
                data = data.with_freshness_period(freshness);
            }
            debug!("Encoding Data {:?}", data);
            data.to_bytes().context("Failed to encode Data")?
        }
    };

    println!("{}", hex::encode(&wire));
    Ok(())
}

//! NDN packet types and structures.
//!
//! This module provides the Interest and Data packets exchanged by the
//! forwarder, with size probing, encoding into caller-owned buffers and
//! decoding from borrowed wire bytes.

use crate::error::Error;
use crate::name::Name;
use crate::tlv::{self, Decoder, Encoder};
use bytes::{Bytes, BytesMut};
use log::trace;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default Interest lifetime when the packet does not carry one.
pub const DEFAULT_INTEREST_LIFETIME_MS: u32 = 4000;

/// Default hop limit applied to locally built Interests.
pub const DEFAULT_HOP_LIMIT: u8 = 32;

/// SignatureType value for DigestSha256.
pub const SIGNATURE_DIGEST_SHA256: u64 = 0;

static NONCE_SEQUENCE: AtomicU32 = AtomicU32::new(0x9E37_79B9);

/// Produce a fresh Interest nonce.
pub fn generate_nonce() -> u32 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let step = NONCE_SEQUENCE.fetch_add(0x9E37_79B9, Ordering::Relaxed);
    (now.as_nanos() as u32) ^ step.rotate_left(7)
}

/// Top-level packet kinds understood by the forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Interest,
    Data,
}

impl PacketKind {
    /// Classify a wire packet by its outer TLV type.
    pub fn of(wire: &[u8]) -> Result<Self, Error> {
        match Decoder::new(wire).peek_type()? {
            tlv::TLV_INTEREST => Ok(PacketKind::Interest),
            tlv::TLV_DATA => Ok(PacketKind::Data),
            found => Err(Error::TlvWrongType {
                expected: tlv::TLV_INTEREST,
                found,
            }),
        }
    }
}

/// Represents an NDN Interest packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
    /// The name requested in the Interest.
    pub name: Name,

    /// Whether Data under a longer name may satisfy this Interest.
    pub can_be_prefix: bool,

    /// Whether cached Data must still be fresh.
    pub must_be_fresh: bool,

    /// A nonce value to detect looping.
    pub nonce: u32,

    /// Interest lifetime in milliseconds, when the packet carries one.
    pub lifetime_ms: Option<u32>,

    /// Hop limit (similar to IP TTL).
    pub hop_limit: Option<u8>,

    /// Opaque application parameters.
    pub app_parameters: Option<Bytes>,
}

impl Interest {
    /// Creates a new Interest packet.
    pub fn new(name: Name) -> Self {
        Self {
            name,
            can_be_prefix: false,
            must_be_fresh: false,
            nonce: generate_nonce(),
            lifetime_ms: Some(DEFAULT_INTEREST_LIFETIME_MS),
            hop_limit: Some(DEFAULT_HOP_LIMIT),
            app_parameters: None,
        }
    }

    /// Sets the Interest lifetime.
    pub fn with_lifetime(mut self, lifetime_ms: u32) -> Self {
        self.lifetime_ms = Some(lifetime_ms);
        self
    }

    /// The carried lifetime, or `default` when the packet has none.
    pub fn lifetime_or(&self, default: u32) -> u32 {
        self.lifetime_ms.unwrap_or(default)
    }

    /// Sets the nonce value.
    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }

    /// Sets the can_be_prefix flag.
    pub fn with_can_be_prefix(mut self, can_be_prefix: bool) -> Self {
        self.can_be_prefix = can_be_prefix;
        self
    }

    /// Sets the must_be_fresh flag.
    pub fn with_must_be_fresh(mut self, must_be_fresh: bool) -> Self {
        self.must_be_fresh = must_be_fresh;
        self
    }

    /// Sets or clears the hop limit.
    pub fn with_hop_limit(mut self, hop_limit: Option<u8>) -> Self {
        self.hop_limit = hop_limit;
        self
    }

    /// Attaches application parameters.
    pub fn with_app_parameters(mut self, params: impl Into<Bytes>) -> Self {
        self.app_parameters = Some(params.into());
        self
    }

    fn value_len(&self) -> usize {
        let mut len = self.name.encoded_len();
        if self.can_be_prefix {
            len += tlv::block_size(tlv::TLV_CAN_BE_PREFIX, 0);
        }
        if self.must_be_fresh {
            len += tlv::block_size(tlv::TLV_MUST_BE_FRESH, 0);
        }
        len += tlv::block_size(tlv::TLV_NONCE, 4);
        if let Some(lifetime) = self.lifetime_ms {
            len += tlv::block_size(
                tlv::TLV_INTEREST_LIFETIME,
                tlv::non_negative_integer_size(lifetime as u64),
            );
        }
        if self.hop_limit.is_some() {
            len += tlv::block_size(tlv::TLV_HOP_LIMIT, 1);
        }
        if let Some(params) = &self.app_parameters {
            len += tlv::block_size(tlv::TLV_APPLICATION_PARAMETERS, params.len());
        }
        len
    }

    /// Returns the wire format size of this Interest when encoded.
    pub fn encoded_len(&self) -> usize {
        tlv::block_size(tlv::TLV_INTEREST, self.value_len())
    }

    /// Writes the Interest block.
    pub fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        self.name.validate()?;
        enc.append_type(tlv::TLV_INTEREST)?;
        enc.append_length(self.value_len())?;
        self.name.encode(enc)?;
        if self.can_be_prefix {
            enc.append_block(tlv::TLV_CAN_BE_PREFIX, &[])?;
        }
        if self.must_be_fresh {
            enc.append_block(tlv::TLV_MUST_BE_FRESH, &[])?;
        }
        enc.append_type(tlv::TLV_NONCE)?;
        enc.append_length(4)?;
        enc.append_u32(self.nonce)?;
        if let Some(lifetime) = self.lifetime_ms {
            enc.append_non_negative_integer_block(tlv::TLV_INTEREST_LIFETIME, lifetime as u64)?;
        }
        if let Some(hop_limit) = self.hop_limit {
            enc.append_type(tlv::TLV_HOP_LIMIT)?;
            enc.append_length(1)?;
            enc.append_u8(hop_limit)?;
        }
        if let Some(params) = &self.app_parameters {
            enc.append_block(tlv::TLV_APPLICATION_PARAMETERS, params)?;
        }
        Ok(())
    }

    /// Writes the Interest into `buf`, returning the number of bytes used.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut enc = Encoder::new(buf);
        self.encode(&mut enc)?;
        Ok(enc.offset())
    }

    /// Encodes the Interest into a freshly sized buffer.
    pub fn to_bytes(&self) -> Result<Bytes, Error> {
        let mut buf = BytesMut::zeroed(self.encoded_len());
        self.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decodes an Interest from wire bytes.
    ///
    /// Unknown non-critical elements after the Name are skipped; unknown
    /// critical ones fail with [`Error::TlvWrongType`]. A missing Nonce is
    /// replaced by a freshly generated one.
    pub fn decode(wire: &[u8]) -> Result<Self, Error> {
        let value = Decoder::new(wire).expect_block(tlv::TLV_INTEREST)?;
        let mut dec = Decoder::new(value);
        let name = Name::decode(&mut dec)?;

        let mut interest = Interest {
            name,
            can_be_prefix: false,
            must_be_fresh: false,
            nonce: 0,
            lifetime_ms: None,
            hop_limit: None,
            app_parameters: None,
        };
        let mut nonce = None;

        while dec.has_remaining() {
            let (tlv_type, field) = dec.get_block()?;
            match tlv_type {
                tlv::TLV_CAN_BE_PREFIX => interest.can_be_prefix = true,
                tlv::TLV_MUST_BE_FRESH => interest.must_be_fresh = true,
                tlv::TLV_NONCE => {
                    if field.len() != 4 {
                        return Err(Error::TlvWrongLength(field.len()));
                    }
                    nonce = Some(Decoder::new(field).get_u32()?);
                }
                tlv::TLV_INTEREST_LIFETIME => {
                    let lifetime = Decoder::new(field).get_non_negative_integer(field.len())?;
                    interest.lifetime_ms = Some(u32::try_from(lifetime).unwrap_or(u32::MAX));
                }
                tlv::TLV_HOP_LIMIT => {
                    if field.len() != 1 {
                        return Err(Error::TlvWrongLength(field.len()));
                    }
                    interest.hop_limit = Some(field[0]);
                }
                tlv::TLV_APPLICATION_PARAMETERS => {
                    interest.app_parameters = Some(Bytes::copy_from_slice(field));
                }
                tlv::TLV_FORWARDING_HINT => trace!("[Interest] ignoring ForwardingHint"),
                other if tlv::is_critical(other) => {
                    return Err(Error::TlvWrongType {
                        expected: tlv::TLV_INTEREST,
                        found: other,
                    });
                }
                other => trace!("[Interest] skipping TLV {:#x}", other),
            }
        }

        interest.nonce = nonce.unwrap_or_else(generate_nonce);
        Ok(interest)
    }
}

/// Locates the HopLimit byte inside an encoded Interest.
///
/// Returns the absolute offset of the single HopLimit value byte, so a
/// forwarder can decrement it in a copied buffer without re-encoding.
pub fn hop_limit_offset(wire: &[u8]) -> Result<Option<usize>, Error> {
    let mut outer = Decoder::new(wire);
    outer.get_type()?;
    let length = outer.get_length()?;
    let base = outer.offset();
    let value = outer.get_raw_buffer(length)?;

    let mut dec = Decoder::new(value);
    while dec.has_remaining() {
        let (tlv_type, field) = dec.get_block()?;
        if tlv_type == tlv::TLV_HOP_LIMIT {
            if field.len() != 1 {
                return Err(Error::TlvWrongLength(field.len()));
            }
            return Ok(Some(base + dec.offset() - 1));
        }
    }
    Ok(None)
}

/// Represents an NDN Data packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    /// The name of the Data packet.
    pub name: Name,

    /// MetaInfo ContentType, if present.
    pub content_type: Option<u64>,

    /// MetaInfo FreshnessPeriod in milliseconds, if present.
    pub freshness_period_ms: Option<u64>,

    /// The content of the Data packet.
    pub content: Bytes,

    /// SignatureInfo SignatureType.
    pub signature_type: u64,

    /// Opaque signature bits.
    pub signature_value: Bytes,
}

impl Data {
    /// Creates a new Data packet.
    pub fn new(name: Name, content: impl Into<Bytes>) -> Self {
        Self {
            name,
            content_type: None,
            freshness_period_ms: None,
            content: content.into(),
            signature_type: SIGNATURE_DIGEST_SHA256,
            signature_value: Bytes::new(),
        }
    }

    /// Sets the freshness period.
    pub fn with_freshness_period(mut self, freshness_period_ms: u64) -> Self {
        self.freshness_period_ms = Some(freshness_period_ms);
        self
    }

    /// Sets the content type.
    pub fn with_content_type(mut self, content_type: u64) -> Self {
        self.content_type = Some(content_type);
        self
    }

    /// Sets the signature type and value.
    pub fn with_signature(mut self, signature_type: u64, value: impl Into<Bytes>) -> Self {
        self.signature_type = signature_type;
        self.signature_value = value.into();
        self
    }

    fn meta_info_len(&self) -> usize {
        let mut len = 0;
        if let Some(content_type) = self.content_type {
            len += tlv::block_size(
                tlv::TLV_CONTENT_TYPE,
                tlv::non_negative_integer_size(content_type),
            );
        }
        if let Some(freshness) = self.freshness_period_ms {
            len += tlv::block_size(
                tlv::TLV_FRESHNESS_PERIOD,
                tlv::non_negative_integer_size(freshness),
            );
        }
        len
    }

    fn signature_info_len(&self) -> usize {
        tlv::block_size(
            tlv::TLV_SIGNATURE_TYPE,
            tlv::non_negative_integer_size(self.signature_type),
        )
    }

    fn value_len(&self) -> usize {
        let meta = self.meta_info_len();
        let mut len = self.name.encoded_len();
        if meta > 0 {
            len += tlv::block_size(tlv::TLV_META_INFO, meta);
        }
        len += tlv::block_size(tlv::TLV_CONTENT, self.content.len());
        len += tlv::block_size(tlv::TLV_SIGNATURE_INFO, self.signature_info_len());
        len += tlv::block_size(tlv::TLV_SIGNATURE_VALUE, self.signature_value.len());
        len
    }

    /// Returns the wire format size of this Data when encoded.
    pub fn encoded_len(&self) -> usize {
        tlv::block_size(tlv::TLV_DATA, self.value_len())
    }

    /// Writes the Data block.
    pub fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        self.name.validate()?;
        enc.append_type(tlv::TLV_DATA)?;
        enc.append_length(self.value_len())?;
        self.name.encode(enc)?;

        let meta = self.meta_info_len();
        if meta > 0 {
            enc.append_type(tlv::TLV_META_INFO)?;
            enc.append_length(meta)?;
            if let Some(content_type) = self.content_type {
                enc.append_non_negative_integer_block(tlv::TLV_CONTENT_TYPE, content_type)?;
            }
            if let Some(freshness) = self.freshness_period_ms {
                enc.append_non_negative_integer_block(tlv::TLV_FRESHNESS_PERIOD, freshness)?;
            }
        }

        enc.append_block(tlv::TLV_CONTENT, &self.content)?;

        enc.append_type(tlv::TLV_SIGNATURE_INFO)?;
        enc.append_length(self.signature_info_len())?;
        enc.append_non_negative_integer_block(tlv::TLV_SIGNATURE_TYPE, self.signature_type)?;

        enc.append_block(tlv::TLV_SIGNATURE_VALUE, &self.signature_value)
    }

    /// Writes the Data into `buf`, returning the number of bytes used.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut enc = Encoder::new(buf);
        self.encode(&mut enc)?;
        Ok(enc.offset())
    }

    /// Encodes the Data into a freshly sized buffer.
    pub fn to_bytes(&self) -> Result<Bytes, Error> {
        let mut buf = BytesMut::zeroed(self.encoded_len());
        self.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decodes a Data packet from wire bytes.
    pub fn decode(wire: &[u8]) -> Result<Self, Error> {
        let value = Decoder::new(wire).expect_block(tlv::TLV_DATA)?;
        let mut dec = Decoder::new(value);
        let name = Name::decode(&mut dec)?;
        let mut data = Data::new(name, Bytes::new());

        while dec.has_remaining() {
            let (tlv_type, field) = dec.get_block()?;
            match tlv_type {
                tlv::TLV_META_INFO => {
                    let mut meta = Decoder::new(field);
                    while meta.has_remaining() {
                        let (meta_type, meta_value) = meta.get_block()?;
                        let mut number = Decoder::new(meta_value);
                        match meta_type {
                            tlv::TLV_CONTENT_TYPE => {
                                data.content_type =
                                    Some(number.get_non_negative_integer(meta_value.len())?);
                            }
                            tlv::TLV_FRESHNESS_PERIOD => {
                                data.freshness_period_ms =
                                    Some(number.get_non_negative_integer(meta_value.len())?);
                            }
                            _ => {}
                        }
                    }
                }
                tlv::TLV_CONTENT => data.content = Bytes::copy_from_slice(field),
                tlv::TLV_SIGNATURE_INFO => {
                    let mut info = Decoder::new(field);
                    data.signature_type =
                        info.expect_non_negative_integer_block(tlv::TLV_SIGNATURE_TYPE)?;
                }
                tlv::TLV_SIGNATURE_VALUE => data.signature_value = Bytes::copy_from_slice(field),
                other if tlv::is_critical(other) => {
                    return Err(Error::TlvWrongType {
                        expected: tlv::TLV_DATA,
                        found: other,
                    });
                }
                other => trace!("[Data] skipping TLV {:#x}", other),
            }
        }

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interest_packet() {
        let name = Name::from_uri("/test/interest").unwrap();
        let interest = Interest::new(name.clone())
            .with_can_be_prefix(true)
            .with_must_be_fresh(true)
            .with_nonce(42)
            .with_lifetime(1500);

        let wire = interest.to_bytes().unwrap();
        assert_eq!(wire.len(), interest.encoded_len());
        assert_eq!(PacketKind::of(&wire).unwrap(), PacketKind::Interest);

        let parsed = Interest::decode(&wire).unwrap();
        assert_eq!(parsed.name, name);
        assert!(parsed.can_be_prefix);
        assert!(parsed.must_be_fresh);
        assert_eq!(parsed.nonce, 42);
        assert_eq!(parsed.lifetime_ms, Some(1500));
        assert_eq!(parsed.hop_limit, Some(DEFAULT_HOP_LIMIT));
    }

    #[test]
    fn test_interest_defaults_when_fields_absent() {
        // Interest carrying only a Name.
        let wire = [0x05, 5, 0x07, 3, 0x08, 1, b'a'];
        let parsed = Interest::decode(&wire).unwrap();
        assert_eq!(parsed.lifetime_ms, None);
        assert_eq!(parsed.lifetime_or(DEFAULT_INTEREST_LIFETIME_MS), 4000);
        assert_eq!(parsed.hop_limit, None);
        assert!(!parsed.can_be_prefix);
    }

    #[test]
    fn test_interest_bad_nonce_width() {
        let wire = [0x05, 8, 0x07, 3, 0x08, 1, b'a', 0x0A, 1, 7];
        assert!(matches!(
            Interest::decode(&wire),
            Err(Error::TlvWrongLength(1))
        ));
    }

    #[test]
    fn test_interest_unknown_field_skipped() {
        let mut interest = Interest::new(Name::from_uri("/x").unwrap())
            .with_nonce(1)
            .to_bytes()
            .unwrap()
            .to_vec();
        // Append a non-critical unknown element and fix up the outer length.
        interest.extend_from_slice(&[0xFC, 1, 0xAA]);
        interest[1] += 3;
        let parsed = Interest::decode(&interest).unwrap();
        assert_eq!(parsed.nonce, 1);
    }

    #[test]
    fn test_unknown_critical_field_rejected() {
        let mut interest = Interest::new(Name::from_uri("/x").unwrap())
            .to_bytes()
            .unwrap()
            .to_vec();
        interest.extend_from_slice(&[0xFD, 0x01, 0x01, 1, 0xAA]);
        interest[1] += 5;
        assert!(matches!(
            Interest::decode(&interest),
            Err(Error::TlvWrongType { found: 0x101, .. })
        ));

        let mut data = Data::new(Name::from_uri("/d").unwrap(), Bytes::new())
            .to_bytes()
            .unwrap()
            .to_vec();
        data.extend_from_slice(&[0x1F, 0]);
        data[1] += 2;
        assert!(matches!(
            Data::decode(&data),
            Err(Error::TlvWrongType { found: 0x1F, .. })
        ));
    }

    #[test]
    fn test_forwarding_hint_ignored() {
        let mut interest = Interest::new(Name::from_uri("/x").unwrap())
            .with_nonce(7)
            .to_bytes()
            .unwrap()
            .to_vec();
        interest.extend_from_slice(&[0x1E, 2, 0x07, 0]);
        interest[1] += 4;
        assert_eq!(Interest::decode(&interest).unwrap().nonce, 7);
    }

    #[test]
    fn test_hop_limit_offset() {
        let interest = Interest::new(Name::from_uri("/a/b").unwrap()).with_hop_limit(Some(9));
        let wire = interest.to_bytes().unwrap();
        let at = hop_limit_offset(&wire).unwrap().unwrap();
        assert_eq!(wire[at], 9);

        let bare = Interest::new(Name::from_uri("/a").unwrap()).with_hop_limit(None);
        assert_eq!(hop_limit_offset(&bare.to_bytes().unwrap()).unwrap(), None);
    }

    #[test]
    fn test_data_packet() {
        let name = Name::from_uri("/test/data").unwrap();
        let data = Data::new(name.clone(), Bytes::from_static(b"Hello, NDN!"))
            .with_content_type(0)
            .with_freshness_period(10_000)
            .with_signature(SIGNATURE_DIGEST_SHA256, vec![0u8; 32]);

        let wire = data.to_bytes().unwrap();
        assert_eq!(wire.len(), data.encoded_len());
        assert_eq!(PacketKind::of(&wire).unwrap(), PacketKind::Data);

        let parsed = Data::decode(&wire).unwrap();
        assert_eq!(parsed, data);
    }

    #[test]
    fn test_data_without_meta_info() {
        let data = Data::new(Name::from_uri("/d").unwrap(), Bytes::new());
        let parsed = Data::decode(&data.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.freshness_period_ms, None);
        assert!(parsed.content.is_empty());
    }

    #[test]
    fn test_unknown_packet_type() {
        assert!(matches!(
            PacketKind::of(&[0x64, 0]),
            Err(Error::TlvWrongType { found: 0x64, .. })
        ));
        assert!(PacketKind::of(&[]).is_err());
    }

    #[test]
    fn test_truncated_packet_rejected() {
        let wire = Interest::new(Name::from_uri("/a/b/c").unwrap())
            .to_bytes()
            .unwrap();
        let truncated = &wire[..wire.len() - 3];
        assert!(matches!(
            Interest::decode(truncated),
            Err(Error::TlvOversize { .. })
        ));
    }
}

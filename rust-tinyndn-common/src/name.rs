//! Hierarchical NDN names.
//!
//! A [`Name`] is an ordered sequence of opaque byte components. Names are
//! compared component by component, and the comparison distinguishes a
//! proper prefix from a plain ordering difference ([`NameCmp`]), which is
//! what longest-prefix matching is built on.

use crate::error::Error;
use crate::tlv::{self, Decoder, Encoder};
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Maximum length of an NDN name component value.
pub const MAX_NAME_COMPONENT_LENGTH: usize = 72;

/// Maximum number of components in an NDN name.
pub const MAX_NAME_COMPONENTS: usize = 12;

/// Maximum encoded size of a Name block, type and length included.
pub const MAX_NAME_SIZE: usize = 892;

/// Four-way result of comparing two names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameCmp {
    /// Both names have identical components.
    Equal,
    /// The left name sorts first and is not a prefix of the right one.
    Less,
    /// The left name is a proper prefix of the right one.
    IsPrefix,
    /// The left name sorts last and does not extend the right one.
    Greater,
    /// The right name is a proper prefix of the left one.
    Extends,
}

impl NameCmp {
    /// Whether the left name is equal to or a prefix of the right one.
    pub fn is_prefix_or_equal(self) -> bool {
        matches!(self, NameCmp::Equal | NameCmp::IsPrefix)
    }

    /// Collapse into a total order (prefixes sort first).
    pub fn ordering(self) -> Ordering {
        match self {
            NameCmp::Equal => Ordering::Equal,
            NameCmp::Less | NameCmp::IsPrefix => Ordering::Less,
            NameCmp::Greater | NameCmp::Extends => Ordering::Greater,
        }
    }
}

/// Represents an NDN name component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameComponent(pub Bytes);

impl NameComponent {
    /// Creates a new name component from a byte slice.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Returns the component value.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the component value.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the component value is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encoded size of this component as a GenericNameComponent block.
    pub fn encoded_len(&self) -> usize {
        tlv::block_size(tlv::TLV_COMPONENT, self.0.len())
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.0.iter() {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "%{:02X}", b)?;
            }
        }
        Ok(())
    }
}

/// Represents an NDN name, which is a sequence of name components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    /// Creates a new empty NDN name.
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Parses a URI such as `/a/b%2Fc` or `ndn:/a/b`.
    ///
    /// Empty segments are skipped and `%XX` escapes are decoded into raw
    /// component bytes. Size limits are enforced.
    pub fn from_uri(uri: &str) -> Result<Self, Error> {
        let path = uri.strip_prefix("ndn:").unwrap_or(uri);
        if !path.starts_with('/') {
            return Err(Error::InvalidUri(uri.to_string()));
        }

        let mut name = Name::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let value = percent_decode(segment).ok_or_else(|| Error::InvalidUri(uri.to_string()))?;
            name.components.push(NameComponent::new(value));
        }
        name.validate()?;
        Ok(name)
    }

    /// Builds a name from already-split component values.
    pub fn from_components<I, C>(components: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = C>,
        C: Into<Bytes>,
    {
        let name = Self {
            components: components.into_iter().map(NameComponent::new).collect(),
        };
        name.validate()?;
        Ok(name)
    }

    /// Checks the component count, component sizes and total encoded size.
    pub fn validate(&self) -> Result<(), Error> {
        if self.components.len() > MAX_NAME_COMPONENTS {
            return Err(Error::TooManyComponents(self.components.len()));
        }
        if let Some(c) = self
            .components
            .iter()
            .find(|c| c.len() > MAX_NAME_COMPONENT_LENGTH)
        {
            return Err(Error::ComponentTooLong(c.len()));
        }
        let size = self.encoded_len();
        if size > MAX_NAME_SIZE {
            return Err(Error::NameTooLong(size));
        }
        Ok(())
    }

    /// Adds a component to the name.
    pub fn push(&mut self, component: NameComponent) -> &mut Self {
        self.components.push(component);
        self
    }

    /// Returns the number of components in the name.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns true if the name has no components.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns an iterator over the name components.
    pub fn components(&self) -> impl Iterator<Item = &NameComponent> {
        self.components.iter()
    }

    /// Gets a component at the specified index.
    pub fn get(&self, index: usize) -> Option<&NameComponent> {
        self.components.get(index)
    }

    /// Returns a prefix of this name with the specified length.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            components: self.components.iter().take(len).cloned().collect(),
        }
    }

    /// Checks if this name is a prefix of (or equal to) another name.
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.compare(other).is_prefix_or_equal()
    }

    /// Four-way comparison against `other`.
    pub fn compare(&self, other: &Self) -> NameCmp {
        let mut left = self.components.iter();
        let mut right = other.components.iter();
        loop {
            match (left.next(), right.next()) {
                (None, None) => return NameCmp::Equal,
                (None, Some(_)) => return NameCmp::IsPrefix,
                (Some(_), None) => return NameCmp::Extends,
                (Some(a), Some(b)) => match a.as_bytes().cmp(b.as_bytes()) {
                    Ordering::Equal => continue,
                    Ordering::Less => return NameCmp::Less,
                    Ordering::Greater => return NameCmp::Greater,
                },
            }
        }
    }

    /// Size of the Name block value (all component blocks).
    pub fn value_len(&self) -> usize {
        self.components.iter().map(NameComponent::encoded_len).sum()
    }

    /// Encoded size of the whole Name block.
    pub fn encoded_len(&self) -> usize {
        tlv::block_size(tlv::TLV_NAME, self.value_len())
    }

    /// Writes the Name block.
    pub fn encode(&self, enc: &mut Encoder<'_>) -> Result<(), Error> {
        enc.append_type(tlv::TLV_NAME)?;
        enc.append_length(self.value_len())?;
        for component in &self.components {
            enc.append_block(tlv::TLV_COMPONENT, component.as_bytes())?;
        }
        Ok(())
    }

    /// Writes the Name block into `buf`, returning the number of bytes used.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut enc = Encoder::new(buf);
        self.encode(&mut enc)?;
        Ok(enc.offset())
    }

    /// Encodes the Name block into a freshly sized buffer.
    pub fn to_bytes(&self) -> Result<Bytes, Error> {
        let mut buf = BytesMut::zeroed(self.encoded_len());
        self.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decodes a Name block at the decoder's cursor.
    pub fn decode(dec: &mut Decoder<'_>) -> Result<Self, Error> {
        let start = dec.offset();
        let value = dec.expect_block(tlv::TLV_NAME)?;
        let size = dec.offset() - start;
        if size > MAX_NAME_SIZE {
            return Err(Error::NameTooLong(size));
        }

        let mut components = Vec::new();
        for component in ComponentIter::new(value) {
            components.push(NameComponent::new(Bytes::copy_from_slice(component?)));
        }
        Ok(Self { components })
    }

    /// Decodes a Name block from the start of `wire`.
    pub fn from_wire(wire: &[u8]) -> Result<Self, Error> {
        Name::decode(&mut Decoder::new(wire))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }

        for component in &self.components {
            write!(f, "/{}", component)?;
        }

        Ok(())
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Name::from_uri(s)
    }
}

impl TryFrom<String> for Name {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Name::from_uri(&s)
    }
}

impl From<Name> for String {
    fn from(name: Name) -> Self {
        name.to_string()
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other).ordering()
    }
}

/// Iterator over the component values inside a Name block value.
///
/// Yields an error (and then stops) on the first malformed component.
#[derive(Debug, Clone)]
pub struct ComponentIter<'a> {
    dec: Decoder<'a>,
    count: usize,
    failed: bool,
}

impl<'a> ComponentIter<'a> {
    /// Iterate over the components in a Name *value* (without the outer header).
    pub fn new(value: &'a [u8]) -> Self {
        Self {
            dec: Decoder::new(value),
            count: 0,
            failed: false,
        }
    }

    fn next_component(&mut self) -> Result<&'a [u8], Error> {
        let component = self.dec.expect_block(tlv::TLV_COMPONENT)?;
        self.count += 1;
        if self.count > MAX_NAME_COMPONENTS {
            return Err(Error::TooManyComponents(self.count));
        }
        if component.len() > MAX_NAME_COMPONENT_LENGTH {
            return Err(Error::ComponentTooLong(component.len()));
        }
        Ok(component)
    }
}

impl<'a> Iterator for ComponentIter<'a> {
    type Item = Result<&'a [u8], Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || !self.dec.has_remaining() {
            return None;
        }
        let item = self.next_component();
        self.failed = item.is_err();
        Some(item)
    }
}

/// Opens the Name block at the start of `block` and iterates its components.
pub fn name_components(block: &[u8]) -> Result<ComponentIter<'_>, Error> {
    let mut dec = Decoder::new(block);
    let value = dec.expect_block(tlv::TLV_NAME)?;
    if dec.offset() > MAX_NAME_SIZE {
        return Err(Error::NameTooLong(dec.offset()));
    }
    Ok(ComponentIter::new(value))
}

/// Four-way comparison of two encoded Name blocks, without allocating.
pub fn compare_blocks(left: &[u8], right: &[u8]) -> Result<NameCmp, Error> {
    let mut a = name_components(left)?;
    let mut b = name_components(right)?;
    loop {
        match (a.next().transpose()?, b.next().transpose()?) {
            (None, None) => return Ok(NameCmp::Equal),
            (None, Some(_)) => return Ok(NameCmp::IsPrefix),
            (Some(_), None) => return Ok(NameCmp::Extends),
            (Some(x), Some(y)) => match x.cmp(y) {
                Ordering::Equal => continue,
                Ordering::Less => return Ok(NameCmp::Less),
                Ordering::Greater => return Ok(NameCmp::Greater),
            },
        }
    }
}

fn percent_decode(segment: &str) -> Option<Vec<u8>> {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hi = hex_value(*bytes.get(i + 1)?)?;
            let lo = hex_value(*bytes.get(i + 2)?)?;
            out.push(hi << 4 | lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Some(out)
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests;

//! Unit tests for the NDN name codec

use super::*;

#[test]
fn test_name_creation() {
    let name = Name::from_uri("/test/data/1").unwrap();

    assert_eq!(name.len(), 3);
    assert_eq!(name.get(0).unwrap().as_bytes(), b"test");
    assert_eq!(name.get(1).unwrap().as_bytes(), b"data");
    assert_eq!(name.get(2).unwrap().as_bytes(), b"1");

    assert_eq!(name.to_string(), "/test/data/1");
}

#[test]
fn test_uri_scheme_and_root() {
    assert_eq!(Name::from_uri("ndn:/a/b").unwrap().len(), 2);
    assert!(Name::from_uri("/").unwrap().is_empty());
    assert_eq!(Name::from_uri("//a///b/").unwrap().to_string(), "/a/b");
    assert!(matches!(
        Name::from_uri("a/b"),
        Err(Error::InvalidUri(_))
    ));
}

#[test]
fn test_percent_decoding() {
    let name = Name::from_uri("/hello%20world/%00%FF").unwrap();
    assert_eq!(name.get(0).unwrap().as_bytes(), b"hello world");
    assert_eq!(name.get(1).unwrap().as_bytes(), &[0x00, 0xFF]);
    assert_eq!(name.to_string(), "/hello%20world/%00%FF");

    assert!(Name::from_uri("/bad%2").is_err());
    assert!(Name::from_uri("/bad%zz").is_err());
}

#[test]
fn test_limits() {
    let long = "x".repeat(MAX_NAME_COMPONENT_LENGTH + 1);
    assert!(matches!(
        Name::from_uri(&format!("/{}", long)),
        Err(Error::ComponentTooLong(73))
    ));

    let many = "/c".repeat(MAX_NAME_COMPONENTS + 1);
    assert!(matches!(
        Name::from_uri(&many),
        Err(Error::TooManyComponents(13))
    ));

    // Twelve maximal components fit exactly in the size bound.
    let full = format!("/{}", "y".repeat(MAX_NAME_COMPONENT_LENGTH)).repeat(MAX_NAME_COMPONENTS);
    let name = Name::from_uri(&full).unwrap();
    assert_eq!(name.encoded_len(), MAX_NAME_SIZE);
}

#[test]
fn test_wire_round_trip() {
    let component = vec![0xABu8; MAX_NAME_COMPONENT_LENGTH];
    let mut components: Vec<Vec<u8>> = (0..11).map(|i| vec![i as u8; i + 1]).collect();
    components.push(component);
    let name = Name::from_components(components).unwrap();

    let wire = name.to_bytes().unwrap();
    assert_eq!(wire.len(), name.encoded_len());

    let decoded = Name::from_wire(&wire).unwrap();
    assert_eq!(decoded, name);
    assert_eq!(decoded.compare(&name), NameCmp::Equal);
}

#[test]
fn test_encoding_layout() {
    let name = Name::from_uri("/a/bc").unwrap();
    let wire = name.to_bytes().unwrap();
    assert_eq!(&wire[..], &[0x07, 7, 0x08, 1, b'a', 0x08, 2, b'b', b'c']);
}

#[test]
fn test_name_compare() {
    let abc = Name::from_uri("/a/b/c").unwrap();
    let abd = Name::from_uri("/a/b/d").unwrap();
    let ab = Name::from_uri("/a/b").unwrap();
    let b = Name::from_uri("/b").unwrap();

    assert_eq!(abc.compare(&abc.clone()), NameCmp::Equal);
    assert_eq!(abc.compare(&abd), NameCmp::Less);
    assert_eq!(abd.compare(&abc), NameCmp::Greater);
    assert_eq!(ab.compare(&abc), NameCmp::IsPrefix);
    assert_eq!(abc.compare(&ab), NameCmp::Extends);
    assert_eq!(b.compare(&ab), NameCmp::Greater);

    assert!(ab.is_prefix_of(&abc));
    assert!(!abc.is_prefix_of(&ab));
    assert!(!abd.is_prefix_of(&abc));
    assert!(Name::new().is_prefix_of(&abc));
}

#[test]
fn test_shorter_component_sorts_first() {
    let a = Name::from_uri("/ab").unwrap();
    let b = Name::from_uri("/abc").unwrap();
    assert_eq!(a.compare(&b), NameCmp::Less);
    assert!(a < b);
}

#[test]
fn test_compare_blocks_matches_compare() {
    let pairs = [
        ("/a/b", "/a/b"),
        ("/a", "/a/b"),
        ("/a/b/c", "/a"),
        ("/a/x", "/a/y"),
        ("/z", "/a/b"),
    ];
    for (l, r) in pairs {
        let left = Name::from_uri(l).unwrap();
        let right = Name::from_uri(r).unwrap();
        let cmp = compare_blocks(&left.to_bytes().unwrap(), &right.to_bytes().unwrap()).unwrap();
        assert_eq!(cmp, left.compare(&right), "{} vs {}", l, r);
    }
}

#[test]
fn test_malformed_component_rejected() {
    // Name block containing a component that claims 5 bytes but carries 1.
    let wire = [0x07, 3, 0x08, 5, b'a'];
    assert!(matches!(
        Name::from_wire(&wire),
        Err(Error::TlvOversize { .. })
    ));

    // Component with a foreign type.
    let wire = [0x07, 3, 0x09, 1, b'a'];
    assert!(matches!(
        Name::from_wire(&wire),
        Err(Error::TlvWrongType { expected: 0x08, found: 0x09 })
    ));
}

#[test]
fn test_serde_as_uri() {
    let name = Name::from_uri("/a/b%20c").unwrap();
    let json = serde_json::to_string(&name).unwrap();
    assert_eq!(json, "\"/a/b%20c\"");
    let back: Name = serde_json::from_str(&json).unwrap();
    assert_eq!(back, name);
}

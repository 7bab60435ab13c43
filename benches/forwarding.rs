use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_tinyndn::common::{Data, Interest, Name, Result};
use rust_tinyndn::fwd::name_tree::{Annotation, NameTree};
use rust_tinyndn::fwd::{Face, Forwarder, ForwarderConfig, ManualAlarm};

struct NullFace;

impl Face for NullFace {
    fn send(&mut self, packet: &[u8]) -> Result<()> {
        black_box(packet);
        Ok(())
    }
}

fn bench_name_codec(c: &mut Criterion) {
    let name = Name::from_uri("/aaa/bbb/ccc/ddd/eee/fff").unwrap();
    let wire = name.to_bytes().unwrap();
    c.bench_function("name_encode", |b| b.iter(|| black_box(&name).to_bytes().unwrap()));
    c.bench_function("name_decode", |b| b.iter(|| Name::from_wire(black_box(&wire)).unwrap()));
}

fn bench_prefix_match(c: &mut Criterion) {
    let mut fwd = Forwarder::new(ForwarderConfig::default(), ManualAlarm::new(0)).unwrap();
    let face = fwd.add_face(NullFace).unwrap();
    for i in 0..16 {
        let prefix = Name::from_uri(&format!("/route{}/sub", i)).unwrap();
        fwd.add_route(face, &prefix).unwrap();
    }
    let query = Name::from_uri("/route7/sub/a/b/c/d").unwrap().to_bytes().unwrap();
    let tree: &NameTree = fwd.name_tree();

    c.bench_function("name_tree_prefix_match", |b| {
        b.iter(|| tree.prefix_match(black_box(&query), Annotation::Fib).unwrap())
    });
}

fn bench_interest_data_round_trip(c: &mut Criterion) {
    let config = ForwarderConfig {
        cs_capacity: 1,
        ..Default::default()
    };
    let mut fwd = Forwarder::new(config, ManualAlarm::new(0)).unwrap();
    let up = fwd.add_face(NullFace).unwrap();
    let down = fwd.add_face(NullFace).unwrap();
    fwd.add_route(up, &Name::from_uri("/bench").unwrap()).unwrap();

    let names: Vec<Name> = (0..2)
        .map(|i| Name::from_uri(&format!("/bench/item{}", i)).unwrap())
        .collect();
    let data: Vec<Bytes> = names
        .iter()
        .map(|n| Data::new(n.clone(), "payload").to_bytes().unwrap())
        .collect();
    let mut nonce = 0u32;

    // Alternating names with a one-entry CS keeps every Interest a cache miss.
    c.bench_function("interest_data_round_trip", |b| {
        b.iter(|| {
            let i = (nonce & 1) as usize;
            nonce = nonce.wrapping_add(1);
            let interest = Interest::new(names[i].clone()).with_nonce(nonce).to_bytes().unwrap();
            fwd.receive(down, &interest).unwrap();
            fwd.receive(up, &data[i]).unwrap();
        })
    });
}

criterion_group!(
    benches,
    bench_name_codec,
    bench_prefix_match,
    bench_interest_data_round_trip
);
criterion_main!(benches);

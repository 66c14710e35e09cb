use criterion::{criterion_group, criterion_main};

mod modem;

criterion_group!(
    benches,
    modem::codec::bench_hex,
    modem::codec::bench_parsers,
    modem::transport::bench_command
);
criterion_main!(benches);

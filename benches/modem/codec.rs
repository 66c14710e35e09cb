use std::hint::black_box;

use criterion::{Criterion, Throughput};
use heapless::String;
use rand::Rng;
use wnclink::modem::command::{parse_ip_stats, parse_read_payload, socket_write};
use wnclink::modem::config::MAX_WRITE_BYTES;
use wnclink::modem::hex;
use wnclink::modem::sms::parse_sms_list;

fn random_payload(len: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.r#gen()).collect()
}

pub fn bench_hex(c: &mut Criterion) {
    let mut group = c.benchmark_group("hex");
    let payload = random_payload(MAX_WRITE_BYTES);
    let mut encoded: String<{ 2 * MAX_WRITE_BYTES }> = String::new();
    hex::encode_into(&payload, &mut encoded).expect("payload fits");
    group.throughput(Throughput::Bytes(payload.len() as u64));

    group.bench_function("encode", |b| {
        b.iter(|| {
            let mut out: String<{ 2 * MAX_WRITE_BYTES }> = String::new();
            hex::encode_into(black_box(&payload), &mut out).expect("payload fits");
            out
        })
    });
    group.bench_function("decode", |b| {
        let mut out = [0u8; MAX_WRITE_BYTES];
        b.iter(|| hex::decode(black_box(&encoded), &mut out))
    });
    group.bench_function("sockwrite_command", |b| {
        b.iter(|| socket_write(1, black_box(&payload)).expect("command fits"))
    });
    group.finish();
}

pub fn bench_parsers(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsers");
    let contrdp =
        "+CGCONTRDP: 1,5,\"m2m.com.attz\",10.64.1.5.255.255.255.0,10.64.1.1,8.8.8.8,8.8.4.4OK";
    let sockread = "@SOCKREAD:12,\"48656C6C6F2C20776F726C64\"OK";
    let cmgl = concat!(
        "+CMGL: 1,\"REC UNREAD\",\"+15551234567\",,\"18/03/07,12:00:00-32\"Hello there",
        "+CMGL: 2,\"REC READ\",\"+15557654321\",,\"18/03/06,09:30:00-32\"Seen already",
        "+CMGL: 3,0,,22",
        "OK"
    );

    group.bench_function("ip_stats", |b| b.iter(|| parse_ip_stats(black_box(contrdp))));
    group.bench_function("read_payload", |b| {
        b.iter(|| parse_read_payload(black_box(sockread)))
    });
    group.bench_function("sms_list", |b| b.iter(|| parse_sms_list(black_box(cmgl))));
    group.finish();
}

use std::collections::VecDeque;
use std::hint::black_box;

use criterion::{Criterion, Throughput};
use wnclink::modem::transport::{Terminator, Transport};
use wnclink::network::{Clock, Read, Write};

/// UART that answers every completed line with a canned response.
struct Loopback {
    reply: &'static [u8],
    rx: VecDeque<u8>,
}

impl Read for Loopback {
    type Error = ();

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut n = 0;
        while n < buf.len() {
            let Some(b) = self.rx.pop_front() else { break };
            buf[n] = b;
            n += 1;
        }
        Ok(n)
    }
}

impl Write for Loopback {
    type Error = ();

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.contains(&b'\r') {
            self.rx.extend(self.reply.iter().copied());
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

struct Ticks(u64);

impl Clock for Ticks {
    fn now_ms(&self) -> u64 {
        self.0
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0 += u64::from(ms);
    }
}

pub fn bench_command(c: &mut Criterion) {
    let mut group = c.benchmark_group("transport");
    let reply: &'static [u8] = b"\r\n@SOCKREAD:12,\"48656C6C6F2C20776F726C64\"\r\n\r\nOK\r\n";
    group.throughput(Throughput::Bytes(reply.len() as u64));

    group.bench_function("sockread_round_trip", |b| {
        let serial = Loopback {
            reply,
            rx: VecDeque::new(),
        };
        let mut transport = Transport::new(serial, Ticks(0));
        b.iter(|| {
            transport
                .send_command(black_box("AT@SOCKREAD=1,1500"), Terminator::CrLf, 1_000)
                .expect("uart never fails")
        })
    });
    group.finish();
}

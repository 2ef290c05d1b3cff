use std::sync::Arc;
use std::thread;

use rag_observability::{context, fields, Config, Logging, WriterSink};

#[test]
fn concurrent_flows_produce_whole_lines() {
    const FLOWS: usize = 32;

    let sink = Arc::new(WriterSink::new(Vec::<u8>::new()));
    let logging = Logging::builder(Config::default()).sink(sink.clone()).build();
    let payload = "x".repeat(2048);

    let handles: Vec<_> = (0..FLOWS)
        .map(|i| {
            let logger = logging.logger("flow");
            let payload = payload.clone();
            thread::spawn(move || {
                let _scope = context::with_context(fields! { "flow" => i });
                logger.info("payload", fields! { "data" => payload });
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let text = sink.with_writer(|buf| String::from_utf8(buf.clone()).unwrap());
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), FLOWS);
    let mut flows: Vec<usize> = lines
        .iter()
        .map(|line| {
            assert!(line.ends_with(&format!("[data={}]", payload)), "torn line: {}", line);
            let start = line.find("[flow=").unwrap() + "[flow=".len();
            let end = start + line[start..].find(']').unwrap();
            line[start..end].parse().unwrap()
        })
        .collect();
    flows.sort_unstable();
    assert_eq!(flows, (0..FLOWS).collect::<Vec<_>>());
}

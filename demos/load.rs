use std::sync::Arc;
use std::time::Instant;

use rag_observability::{context, fields, Config, Logging, NoopSink, OutputFormat};

fn run(format: OutputFormat, n: u64) {
    let logging = Logging::builder(Config::default().with_format(format))
        .sink(Arc::new(NoopSink))
        .build();
    let logger = logging.logger("load");
    let _request = context::with_context(fields! { "request_id" => "load-test", "stage" => "chunk" });

    let start = Instant::now();
    for i in 0..n {
        logger.info("load test record", fields! { "iteration" => i });
    }
    let elapsed = start.elapsed();
    println!(
        "{}: formatted {} records in {:?} (~{:.0} rec/s)",
        format,
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );
}

fn main() {
    run(OutputFormat::Readable, 100_000);
    run(OutputFormat::Json, 100_000);
}

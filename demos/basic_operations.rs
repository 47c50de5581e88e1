use std::io::SeekFrom;

use rust_bufstream::fio::new_file_transport;
use rust_bufstream::{BufferedStream, CancellationToken, MemoryIO};

#[tokio::main]
async fn main() {
    env_logger::init();

    let path = std::env::temp_dir().join("rust-bufstream-demo.dat");
    let mut stream = BufferedStream::with_capacity(
        new_file_transport(path.clone()).expect("failed to open demo file"),
        64,
    )
    .expect("failed to create buffered stream");

    for i in 0..10 {
        let line = format!("record-{:04}\n", i);
        stream.write(line.as_bytes()).expect("write failed");
    }

    let result = stream.seek(SeekFrom::Start(12));
    assert!(result.is_ok());

    let mut buf = [0u8; 12];
    let n = stream.read(&mut buf).expect("read failed");
    println!("second record: {:?}", String::from_utf8_lossy(&buf[..n]));
    stream.close().expect("close failed");

    // the async API shares one stream between tasks
    let memory = MemoryIO::new();
    let handle = memory.handle();
    let stream = std::sync::Arc::new(BufferedStream::new(memory).expect("failed to create stream"));
    let cancel = CancellationToken::new();

    let mut tasks = Vec::new();
    for id in 0..4u8 {
        let stream = stream.clone();
        let cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            stream.write_async(&[b'0' + id; 8], &cancel).await
        }));
    }
    for task in tasks {
        task.await.expect("task panicked").expect("async write failed");
    }
    stream.flush_async(&cancel).await.expect("flush failed");
    println!("memory transport holds {} bytes, counters: {:?}", handle.contents().len(), handle.counters());

    let _ = std::fs::remove_file(path);
}

#![allow(dead_code)]

use std::sync::Once;

use serialbuf::{BufferHandler, ByteSource, Clock, Executor};

static INIT_LOGGING: Once = Once::new();

/// Route `tracing` output through the test harness. First call wins.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .with_target(true)
            .with_ansi(false)
            .try_init();
    });
}

/// Consume every complete `delimiter`-terminated frame currently staged,
/// returning the frames without their delimiters.
pub fn drain_frames<S, X, C>(rx: &BufferHandler<S, X, C>, delimiter: &[u8]) -> Vec<String>
where
    S: ByteSource + 'static,
    X: Executor + 'static,
    C: Clock + 'static,
{
    let mut frames = Vec::new();
    while let Some(end) = rx.with_unread(|unread| {
        unread
            .windows(delimiter.len())
            .position(|window| window == delimiter)
    }) {
        let mut frame = vec![0u8; end + delimiter.len()];
        let copied = rx.read_bytes(&mut frame);
        assert_eq!(copied, frame.len());
        frames.push(String::from_utf8_lossy(&frame[..end]).into_owned());
    }
    frames
}

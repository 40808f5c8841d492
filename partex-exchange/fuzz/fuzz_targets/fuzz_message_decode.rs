#![no_main]

use std::sync::Arc;

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

use partex_core::{DirectMessage, MessageReader, MessageRegistry};
use partex_exchange::messages::{register_exchange_messages, BASE_FIELDS_COUNT};
use partex_exchange::{ExchangeConfig, SinglePartitionRequest};

fuzz_target!(|data: &[u8]| {
    let mut registry = MessageRegistry::new();
    register_exchange_messages(&mut registry);
    let registry = Arc::new(registry);

    for config in [
        ExchangeConfig::default(),
        ExchangeConfig::builder()
            .field_limit(BASE_FIELDS_COUNT)
            .max_frame_length(1024)
            .build()
            .unwrap(),
    ] {
        let mut codec = config.new_codec(registry.clone());
        let mut buf = BytesMut::from(data);
        while let Ok(Some(msg)) = codec.decode(&mut buf) {
            let _ = msg.direct_type();
        }
    }

    // Feed the raw bytes one at a time straight into the cursor.
    let mut reader = MessageReader::new();
    let mut msg = SinglePartitionRequest::default();
    for byte in data.chunks(1) {
        let mut input = byte;
        match reader.read(&mut msg, &mut input) {
            Ok(progress) if progress.is_complete() => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }
});

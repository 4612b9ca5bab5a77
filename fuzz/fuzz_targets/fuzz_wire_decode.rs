#![no_main]
use libfuzzer_sys::fuzz_target;
use nexuswire::wire::{Message, decode_message_with_limit};

fuzz_target!(|data: &[u8]| {
    if let Ok((_, Message::Msg(msg))) = decode_message_with_limit(data, 1 << 20) {
        let _ = msg.document();
    }
});

#![no_main]
use colorimeter_core::command::{self, CommandChannel};
use colorimeter_core::mocks::MemoryLink;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary serial traffic: partial lines, garbage, interleaved valid
    // commands. The channel may drop lines but must never panic.
    let mut link = MemoryLink::default();
    link.feed(data);
    let mut channel = CommandChannel::new();
    // A poll that returns None may just have dropped a malformed line, so
    // keep polling until the buffered bytes are provably exhausted.
    for _ in 0..=data.len() {
        if let Some(cmd) = channel.poll(&mut link) {
            let _ = match cmd.get("command") {
                None => command::missing_response(),
                Some(v) => command::unknown_response(v),
            };
        }
    }
    let _ = channel.decode_errors();
});

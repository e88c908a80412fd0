//! The line-delimited JSON serial protocol.
//!
//! Bytes are drained opportunistically each tick; a newline completes one
//! pending command. Partial lines persist across ticks. A completed line
//! that is not valid JSON is counted and dropped without a response; that
//! is the one place parse failure is silent by design.

use colorimeter_traits::{Channel, RawReading, SerialLink};
use serde_json::{Value, json};

use crate::pipeline::BlankReference;

#[derive(Debug, Default)]
pub struct CommandChannel {
    pending: Vec<u8>,
    decode_errors: u64,
}

impl CommandChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain available bytes; yield at most one decoded command per call.
    pub fn poll<L: SerialLink + ?Sized>(&mut self, link: &mut L) -> Option<Value> {
        while let Some(byte) = link.read_byte() {
            if byte != b'\n' {
                self.pending.push(byte);
                continue;
            }
            let line = std::mem::take(&mut self.pending);
            match serde_json::from_slice::<Value>(&line) {
                Ok(decoded) => return Some(decoded),
                Err(err) => {
                    self.decode_errors += 1;
                    tracing::debug!(error = %err, count = self.decode_errors, "dropping malformed command line");
                    return None;
                }
            }
        }
        None
    }

    /// Number of malformed lines dropped so far.
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors
    }
}

/// Response to a record with no `command` field.
pub fn missing_response() -> Value {
    json!({"command": "missing"})
}

/// Response to an unrecognized `command` value; the value is echoed back.
pub fn unknown_response(command: &Value) -> Value {
    json!({"command": command, "response": {"error": "unknown command"}})
}

/// Response to `read` when the sensor never initialized (Abort mode).
pub fn sensor_unavailable_response() -> Value {
    json!({"command": "read", "response": {"error": "sensor unavailable"}})
}

/// Response to `read`: current counts keyed by channel name, plus the
/// blank reference under the same keys when one exists.
pub fn read_response(raw: &RawReading, blank: Option<&BlankReference>) -> Value {
    let mut values = serde_json::Map::new();
    for ch in Channel::ALL {
        values.insert(ch.name().to_string(), json!(raw[ch.index()]));
    }
    let mut response = serde_json::Map::new();
    response.insert("values".to_string(), Value::Object(values));
    if let Some(blank) = blank {
        let mut blanks = serde_json::Map::new();
        for ch in Channel::ALL {
            blanks.insert(ch.name().to_string(), json!(blank.channel(ch)));
        }
        response.insert("blanks".to_string(), Value::Object(blanks));
    }
    json!({"command": "read", "response": Value::Object(response)})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MemoryLink;
    use colorimeter_traits::NUM_CHANNELS;

    #[test]
    fn assembles_lines_across_polls() {
        let mut link = MemoryLink::default();
        let mut chan = CommandChannel::new();

        link.feed(b"{\"comma");
        assert!(chan.poll(&mut link).is_none());
        link.feed(b"nd\": \"read\"}\n");
        let cmd = chan.poll(&mut link).expect("completed command");
        assert_eq!(cmd["command"], "read");
    }

    #[test]
    fn malformed_line_is_counted_and_silent() {
        let mut link = MemoryLink::default();
        let mut chan = CommandChannel::new();
        link.feed(b"not json\n");
        assert!(chan.poll(&mut link).is_none());
        assert_eq!(chan.decode_errors(), 1);
        link.feed(b"\n");
        assert!(chan.poll(&mut link).is_none());
        assert_eq!(chan.decode_errors(), 2);
    }

    #[test]
    fn one_command_per_poll() {
        let mut link = MemoryLink::default();
        let mut chan = CommandChannel::new();
        link.feed(b"{\"a\": 1}\n{\"b\": 2}\n");
        assert_eq!(chan.poll(&mut link).expect("first")["a"], 1);
        assert_eq!(chan.poll(&mut link).expect("second")["b"], 2);
        assert!(chan.poll(&mut link).is_none());
    }

    #[test]
    fn read_response_keys_every_channel() {
        let raw: RawReading = std::array::from_fn(|i| (i as u16 + 1) * 10);
        let rsp = read_response(&raw, None);
        assert_eq!(rsp["command"], "read");
        let values = rsp["response"]["values"].as_object().expect("values");
        assert_eq!(values.len(), NUM_CHANNELS);
        assert_eq!(values["415nm"], 10);
        assert_eq!(values["clear"], 100);
        assert!(rsp["response"].get("blanks").is_none());
    }

    #[test]
    fn read_response_includes_blanks_when_blanked() {
        let raw: RawReading = [100; NUM_CHANNELS];
        let blank = BlankReference::from_samples(&[[50; NUM_CHANNELS]]);
        let rsp = read_response(&raw, Some(&blank));
        let blanks = rsp["response"]["blanks"].as_object().expect("blanks");
        assert_eq!(blanks.len(), NUM_CHANNELS);
        assert_eq!(blanks["415nm"], 50.0);
    }

    #[test]
    fn unknown_command_echoes_the_value() {
        let rsp = unknown_response(&json!("ping"));
        assert_eq!(rsp["command"], "ping");
        assert_eq!(rsp["response"]["error"], "unknown command");
    }
}

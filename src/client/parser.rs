/// Incremental parser for `text/event-stream` bodies.
///
/// Only `data` fields are collected. Comment lines (starting with `:`) and
/// every other field (`event`, `id`, `retry`) are ignored. Lines may end in
/// `\n` or `\r\n`. A chunk boundary may fall anywhere, including inside a
/// multi-byte character.
#[derive(Debug, Default)]
pub struct EventStreamParser {
    pending: Vec<u8>,
    data: Vec<String>,
}

impl EventStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns the payloads of the events it completed.
    ///
    /// Multiple `data` lines within one event are joined with `\n`. An event
    /// without any `data` line produces nothing.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
                continue;
            }

            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };

            if field == "data" {
                self.data.push(value.to_string());
            }
        }

        events
    }

    /// True when bytes of an unfinished event are buffered.
    pub fn has_partial(&self) -> bool {
        !self.pending.is_empty() || !self.data.is_empty()
    }
}

//! Event records parsed from emulator output.

/// Marker ending the log prefix of an emulator line.
const PREFIX_END: &str = "> ";

/// One line of emulator output with its log prefix removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Leading `[...]` timestamp, when present
    pub timestamp: Option<String>,
    pub text: String,
}

impl EventRecord {
    /// Parse one output line.
    ///
    /// Everything up to and including the last `"> "` is the log prefix
    /// (`[00:00:00.010,000] <dbg> `). Lines without one are kept whole.
    pub fn parse(line: &str) -> Self {
        let line = line.strip_suffix('\r').unwrap_or(line);

        let timestamp = line
            .strip_prefix('[')
            .and_then(|rest| rest.split_once(']'))
            .map(|(ts, _)| ts.to_string());

        let text = match line.rfind(PREFIX_END) {
            Some(pos) => &line[pos + PREFIX_END.len()..],
            None => line,
        };

        EventRecord {
            timestamp,
            text: text.to_string(),
        }
    }
}

/// Parse captured output into records, in emission order.
pub fn parse_events(output: &str) -> Vec<EventRecord> {
    output.lines().map(EventRecord::parse).collect()
}

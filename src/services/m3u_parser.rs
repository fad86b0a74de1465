//! M3U playlist parser
//!
//! Turns a line-oriented M3U document into `ChannelDescriptor`s, lazily.
//! Every `#EXTINF:` line opens a pending descriptor; the next non-comment
//! line is its URL. Anything that doesn't fit is dropped, never fatal.
//! An `#EXTINF:` line without a comma carries no name and leaves the state
//! as it was, so a pending descriptor still takes the next URL.
//!
//! Only the display name is taken from `#EXTINF:`. Category, language and
//! country always get the sentinel defaults, even when the line carries
//! attributes such as `group-title`.

use crate::models::channel::{ChannelDescriptor, DEFAULT_NAME};

const EXTINF_TAG: &str = "#EXTINF:";
const BOM: char = '\u{feff}';

/// Metadata collected from an `#EXTINF:` line, waiting for its URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDescriptor {
    pub name: String,
}

/// Parser state between lines
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ParseState {
    #[default]
    Idle,
    PendingDescriptor(PendingDescriptor),
}

/// Classified input line
#[derive(Debug, PartialEq, Eq)]
enum LineEvent<'a> {
    /// `#EXTINF:` with a name after the first comma
    Metadata(&'a str),
    /// `#EXTINF:` without any comma
    MalformedMetadata,
    Url(&'a str),
    Ignored,
}

fn classify(raw: &str) -> LineEvent<'_> {
    let line = raw.trim_start_matches(BOM).trim();

    if let Some(rest) = line.strip_prefix(EXTINF_TAG) {
        return match rest.split_once(',') {
            Some((_, name)) => LineEvent::Metadata(name.trim()),
            None => LineEvent::MalformedMetadata,
        };
    }

    if line.is_empty() || line.starts_with('#') {
        LineEvent::Ignored
    } else {
        LineEvent::Url(line)
    }
}

/// Lazy iterator of descriptors over any source of lines
pub struct M3uParser<I> {
    lines: I,
    state: ParseState,
    dropped: usize,
}

impl<I, S> M3uParser<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    pub fn new(lines: I) -> Self {
        Self {
            lines,
            state: ParseState::Idle,
            dropped: 0,
        }
    }

    /// Metadata lines that never produced a descriptor so far
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn state(&self) -> &ParseState {
        &self.state
    }

    fn on_line(&mut self, raw: &str) -> Option<ChannelDescriptor> {
        match classify(raw) {
            LineEvent::Metadata(name) => {
                let name = if name.is_empty() { DEFAULT_NAME } else { name };
                let previous = std::mem::replace(
                    &mut self.state,
                    ParseState::PendingDescriptor(PendingDescriptor {
                        name: name.to_string(),
                    }),
                );
                self.drop_if_pending(previous);
                None
            }
            LineEvent::MalformedMetadata => {
                tracing::debug!(line = raw, "Ignoring #EXTINF line without a name");
                None
            }
            LineEvent::Url(url) => match std::mem::take(&mut self.state) {
                ParseState::PendingDescriptor(pending) => {
                    Some(ChannelDescriptor::new(pending.name, url))
                }
                ParseState::Idle => None,
            },
            LineEvent::Ignored => None,
        }
    }

    fn drop_if_pending(&mut self, previous: ParseState) {
        if let ParseState::PendingDescriptor(pending) = previous {
            tracing::debug!(name = %pending.name, "Dropping #EXTINF entry without URL");
            self.dropped += 1;
        }
    }
}

impl<I, S> Iterator for M3uParser<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    type Item = ChannelDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.lines.next() {
                Some(line) => {
                    if let Some(descriptor) = self.on_line(line.as_ref()) {
                        return Some(descriptor);
                    }
                }
                None => {
                    let trailing = std::mem::take(&mut self.state);
                    self.drop_if_pending(trailing);
                    return None;
                }
            }
        }
    }
}

/// Parse an in-memory document
pub fn parse_m3u(document: &str) -> M3uParser<std::str::Lines<'_>> {
    M3uParser::new(document.lines())
}

/// Descriptors plus the number of dropped metadata lines
#[derive(Debug, Clone, Default)]
pub struct ParsedPlaylist {
    pub channels: Vec<ChannelDescriptor>,
    pub dropped: usize,
}

/// Parse raw bytes (lossy UTF-8) into a collected playlist
pub fn parse_bytes(payload: &[u8]) -> ParsedPlaylist {
    let document = String::from_utf8_lossy(payload);
    let mut parser = parse_m3u(&document);
    let channels: Vec<ChannelDescriptor> = parser.by_ref().collect();

    ParsedPlaylist {
        channels,
        dropped: parser.dropped(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO_A: &str =
        "#EXTINF:-1,Channel One\nhttp://x/1.m3u8\n#EXTINF:-1,Channel Two\nhttp://x/2.m3u8";

    #[test]
    fn test_two_channels() {
        let channels: Vec<_> = parse_m3u(SCENARIO_A).collect();

        assert_eq!(
            channels,
            vec![
                ChannelDescriptor::new("Channel One", "http://x/1.m3u8"),
                ChannelDescriptor::new("Channel Two", "http://x/2.m3u8"),
            ]
        );
        assert_eq!(channels[0].category, "General");
        assert_eq!(channels[0].language, "Unknown");
        assert_eq!(channels[0].country, "Unknown");
        assert_eq!(channels[0].logo_url, None);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let first: Vec<_> = parse_m3u(SCENARIO_A).collect();
        let second: Vec<_> = parse_m3u(SCENARIO_A).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_attributes_do_not_set_category() {
        let doc = "#EXTM3U\n#EXTINF:-1 tvg-id=\"globo\" group-title=\"Sports\",Globo HD\nhttp://x/globo.ts";
        let channels: Vec<_> = parse_m3u(doc).collect();

        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "Globo HD");
        assert_eq!(channels[0].category, "General");
    }

    #[test]
    fn test_metadata_without_url_is_dropped() {
        let doc = "#EXTINF:-1,Lost\n#EXTINF:-1,Kept\nhttp://x/kept\n#EXTINF:-1,Trailing";
        let mut parser = parse_m3u(doc);
        let channels: Vec<_> = parser.by_ref().collect();

        // three metadata lines, two of them never get a URL
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "Kept");
        assert_eq!(parser.dropped(), 2);
        assert_eq!(parser.state(), &ParseState::Idle);
    }

    #[test]
    fn test_one_fewer_descriptor_than_metadata_lines() {
        let doc = "#EXTINF:-1,A\nhttp://x/a\n#EXTINF:-1,B\n#EXTINF:-1,C\nhttp://x/c\n";
        let metadata_lines = doc.lines().filter(|l| l.starts_with("#EXTINF:")).count();
        let parsed = parse_bytes(doc.as_bytes());

        assert_eq!(parsed.channels.len(), metadata_lines - 1);
        assert_eq!(parsed.dropped, 1);
    }

    #[test]
    fn test_orphan_url_and_comments_are_ignored() {
        let doc = "#EXTM3U\nhttp://x/orphan\n\n#EXTVLCOPT:http-user-agent=VLC\n#EXTINF:-1,Real\n# comment\n\nhttp://x/real\n";
        let channels: Vec<_> = parse_m3u(doc).collect();

        assert_eq!(channels, vec![ChannelDescriptor::new("Real", "http://x/real")]);
    }

    #[test]
    fn test_metadata_without_comma_keeps_pending() {
        let doc = "#EXTINF:-1,First\n#EXTINF:-1 no comma\nhttp://x/1\n";
        let parsed = parse_bytes(doc.as_bytes());

        assert_eq!(parsed.channels, vec![ChannelDescriptor::new("First", "http://x/1")]);
        assert_eq!(parsed.dropped, 0);
    }

    #[test]
    fn test_metadata_without_comma_alone_yields_nothing() {
        let mut parser = parse_m3u("#EXTINF:-1 no comma\nhttp://x/orphan\n");
        assert_eq!(parser.next(), None);
        assert_eq!(parser.dropped(), 0);
        assert_eq!(parser.state(), &ParseState::Idle);
    }

    #[test]
    fn test_crlf_bom_and_blank_name() {
        let doc = "\u{feff}#EXTM3U\r\n#EXTINF:-1,  Spaced  \r\nhttp://x/1\r\n#EXTINF:-1,\r\nhttp://x/2\r\n";
        let channels: Vec<_> = parse_m3u(doc).collect();

        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].name, "Spaced");
        assert_eq!(channels[0].url, "http://x/1");
        assert_eq!(channels[1].name, "Unknown");
    }

    #[test]
    fn test_name_keeps_text_after_first_comma() {
        let doc = "#EXTINF:-1,News, Weather & Traffic\nhttp://x/n";
        let channels: Vec<_> = parse_m3u(doc).collect();
        assert_eq!(channels[0].name, "News, Weather & Traffic");
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut payload = b"#EXTINF:-1,Caf".to_vec();
        payload.push(0xE9);
        payload.extend_from_slice(b"\nhttp://x/cafe\n");
        let parsed = parse_bytes(&payload);

        assert_eq!(parsed.channels.len(), 1);
        assert_eq!(parsed.channels[0].url, "http://x/cafe");
    }

    #[test]
    fn test_parser_over_owned_lines() {
        let lines = vec![
            "#EXTINF:-1,Owned".to_string(),
            "http://x/owned".to_string(),
        ];
        let channels: Vec<_> = M3uParser::new(lines.into_iter()).collect();
        assert_eq!(channels, vec![ChannelDescriptor::new("Owned", "http://x/owned")]);
    }
}

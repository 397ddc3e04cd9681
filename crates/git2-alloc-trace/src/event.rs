//! Allocation events and their two encodings: the tab-separated line written
//! by the file sink and the length-delimited record sent over the socket.

use std::ffi::{c_char, c_int, CStr};
use std::fmt;

/// Fixed size of the socket record header.
pub const HEADER_LEN: usize = 32;
/// Upper bound for one socket record; frames are dropped to stay below it.
pub const MAX_RECORD_LEN: usize = 64 * 1024;

const MAX_FILE_LEN: usize = 4096;
const UNKNOWN_FILE: &str = "<unknown>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Alloc,
    Resize,
    Dealloc,
}

impl EventKind {
    pub fn tag(self) -> char {
        match self {
            EventKind::Alloc => 'A',
            EventKind::Resize => 'R',
            EventKind::Dealloc => 'D',
        }
    }

    pub fn from_tag(tag: &str) -> Option<EventKind> {
        match tag {
            "A" => Some(EventKind::Alloc),
            "R" => Some(EventKind::Resize),
            "D" => Some(EventKind::Dealloc),
            _ => None,
        }
    }

    pub fn wire_code(self) -> u32 {
        match self {
            EventKind::Alloc => 1,
            EventKind::Resize => 2,
            EventKind::Dealloc => 3,
        }
    }

    pub fn from_wire_code(code: u32) -> Option<EventKind> {
        match code {
            1 => Some(EventKind::Alloc),
            2 => Some(EventKind::Resize),
            3 => Some(EventKind::Dealloc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSite {
    pub file: String,
    pub line: u32,
}

impl CallSite {
    pub fn new(file: impl Into<String>, line: u32) -> CallSite {
        CallSite {
            file: file.into(),
            line,
        }
    }

    pub fn unknown() -> CallSite {
        CallSite::new(UNKNOWN_FILE, 0)
    }

    /// Builds a call-site from the `(file, line)` pair native code hands to
    /// every allocator slot. A null `file` becomes `<unknown>`.
    pub unsafe fn from_raw(file: *const c_char, line: c_int) -> CallSite {
        let file = if file.is_null() {
            UNKNOWN_FILE.to_string()
        } else {
            CStr::from_ptr(file).to_string_lossy().into_owned()
        };
        CallSite {
            file,
            line: line.max(0) as u32,
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown event kind {0:?}")]
    UnknownKind(String),
    #[error("unknown wire event kind {0}")]
    UnknownWireKind(u32),
    #[error("missing {0} field")]
    MissingField(&'static str),
    #[error("invalid {field} field {value:?}")]
    InvalidField { field: &'static str, value: String },
    #[error("unexpected trailing data")]
    TrailingData,
    #[error("record truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
}

/// One allocator event. `size` and `site` are meaningful for `Alloc` and
/// `Resize`; `backtrace` is only carried by `Alloc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocEvent {
    pub kind: EventKind,
    pub address: usize,
    pub size: usize,
    pub site: Option<CallSite>,
    pub backtrace: Vec<String>,
}

impl AllocEvent {
    pub fn alloc(address: usize, size: usize, site: CallSite, backtrace: Vec<String>) -> Self {
        AllocEvent {
            kind: EventKind::Alloc,
            address,
            size,
            site: Some(site),
            backtrace,
        }
    }

    pub fn resize(address: usize, size: usize, site: CallSite) -> Self {
        AllocEvent {
            kind: EventKind::Resize,
            address,
            size,
            site: Some(site),
            backtrace: Vec::new(),
        }
    }

    pub fn dealloc(address: usize) -> Self {
        AllocEvent {
            kind: EventKind::Dealloc,
            address,
            size: 0,
            site: None,
            backtrace: Vec::new(),
        }
    }

    fn site_or_unknown(&self) -> CallSite {
        self.site.clone().unwrap_or_else(CallSite::unknown)
    }

    /// Renders the file-sink line, newline included.
    pub fn to_line(&self) -> String {
        let mut out = String::with_capacity(64);
        out.push(self.kind.tag());
        out.push('\t');
        out.push_str(&format!("{:#x}", self.address));
        if self.kind == EventKind::Dealloc {
            out.push('\n');
            return out;
        }

        let site = self.site_or_unknown();
        out.push_str(&format!("\t{}\t{}:{}", self.size, sanitize_field(&site.file), site.line));
        if self.kind == EventKind::Alloc {
            for frame in &self.backtrace {
                out.push('\t');
                out.push_str(&sanitize_field(frame));
            }
        }
        out.push('\n');
        out
    }

    /// Parses one file-sink line. The trailing newline is optional.
    pub fn parse_line(line: &str) -> Result<AllocEvent, DecodeError> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);
        let mut fields = line.split('\t');

        let tag = fields.next().unwrap_or_default();
        let kind = EventKind::from_tag(tag).ok_or_else(|| DecodeError::UnknownKind(tag.to_string()))?;
        let address = parse_address(fields.next().ok_or(DecodeError::MissingField("address"))?)?;

        if kind == EventKind::Dealloc {
            if fields.next().is_some() {
                return Err(DecodeError::TrailingData);
            }
            return Ok(AllocEvent::dealloc(address));
        }

        let size_field = fields.next().ok_or(DecodeError::MissingField("size"))?;
        let size = size_field
            .parse::<usize>()
            .map_err(|_| DecodeError::InvalidField {
                field: "size",
                value: size_field.to_string(),
            })?;
        let site = parse_site(fields.next().ok_or(DecodeError::MissingField("call-site"))?)?;
        let frames: Vec<String> = fields.map(str::to_string).collect();

        match kind {
            EventKind::Alloc => Ok(AllocEvent::alloc(address, size, site, frames)),
            _ => {
                if !frames.is_empty() {
                    return Err(DecodeError::TrailingData);
                }
                Ok(AllocEvent::resize(address, size, site))
            }
        }
    }

    /// Encodes the socket record: header, file path, then NUL-terminated
    /// frames for `Alloc`. Never longer than [`MAX_RECORD_LEN`].
    pub fn encode_record(&self) -> Vec<u8> {
        let (file, line) = match self.kind {
            EventKind::Dealloc => (String::new(), 0),
            _ => {
                let site = self.site_or_unknown();
                (site.file, site.line)
            }
        };
        let file = truncate_at_boundary(&file, MAX_FILE_LEN);

        let mut budget = MAX_RECORD_LEN - HEADER_LEN - file.len();
        let mut frames: Vec<&str> = Vec::new();
        if self.kind == EventKind::Alloc {
            for frame in &self.backtrace {
                let need = frame.len() + 1;
                if need > budget {
                    break;
                }
                budget -= need;
                frames.push(frame);
            }
        }

        let mut out = Vec::with_capacity(MAX_RECORD_LEN - budget);
        out.extend_from_slice(&self.kind.wire_code().to_le_bytes());
        out.extend_from_slice(&line.to_le_bytes());
        out.extend_from_slice(&(self.address as u64).to_le_bytes());
        out.extend_from_slice(&(self.size as u64).to_le_bytes());
        out.extend_from_slice(&(file.len() as u32).to_le_bytes());
        out.extend_from_slice(&(frames.len() as u32).to_le_bytes());
        out.extend_from_slice(file.as_bytes());
        for frame in frames {
            out.extend(frame.bytes().map(|b| if b == 0 { b' ' } else { b }));
            out.push(0);
        }
        out
    }

    /// Decodes exactly one record; trailing bytes are an error.
    pub fn decode_record(buf: &[u8]) -> Result<AllocEvent, DecodeError> {
        let (event, used) = AllocEvent::decode_record_prefix(buf)?;
        if used != buf.len() {
            return Err(DecodeError::TrailingData);
        }
        Ok(event)
    }

    /// Decodes the record at the start of `buf` and returns it with the
    /// number of bytes it occupied.
    pub fn decode_record_prefix(buf: &[u8]) -> Result<(AllocEvent, usize), DecodeError> {
        let truncated = |needed: usize| DecodeError::Truncated {
            needed,
            available: buf.len(),
        };
        if buf.len() < HEADER_LEN {
            return Err(truncated(HEADER_LEN));
        }

        let code = read_u32_le(buf, 0).ok_or_else(|| truncated(4))?;
        let kind = EventKind::from_wire_code(code).ok_or(DecodeError::UnknownWireKind(code))?;
        let line = read_u32_le(buf, 4).ok_or_else(|| truncated(8))?;
        let address = read_u64_le(buf, 8).ok_or_else(|| truncated(16))? as usize;
        let size = read_u64_le(buf, 16).ok_or_else(|| truncated(24))? as usize;
        let file_len = read_u32_le(buf, 24).ok_or_else(|| truncated(28))? as usize;
        let frame_count = read_u32_le(buf, 28).ok_or_else(|| truncated(32))? as usize;

        if kind != EventKind::Alloc && frame_count != 0 {
            return Err(DecodeError::InvalidField {
                field: "frame_count",
                value: frame_count.to_string(),
            });
        }

        if kind == EventKind::Dealloc && file_len != 0 {
            return Err(DecodeError::InvalidField {
                field: "file_len",
                value: file_len.to_string(),
            });
        }

        let mut pos = HEADER_LEN;
        let file_end = pos + file_len;
        let file_bytes = buf.get(pos..file_end).ok_or_else(|| truncated(file_end))?;
        let file = String::from_utf8_lossy(file_bytes).into_owned();
        pos = file_end;

        let mut frames = Vec::with_capacity(frame_count.min(256));
        for _ in 0..frame_count {
            let rest = &buf[pos..];
            let nul = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| truncated(buf.len() + 1))?;
            frames.push(String::from_utf8_lossy(&rest[..nul]).into_owned());
            pos += nul + 1;
        }

        let event = match kind {
            EventKind::Dealloc => AllocEvent::dealloc(address),
            EventKind::Resize => AllocEvent::resize(address, size, CallSite::new(file, line)),
            EventKind::Alloc => AllocEvent::alloc(address, size, CallSite::new(file, line), frames),
        };
        Ok((event, pos))
    }
}

fn parse_address(s: &str) -> Result<usize, DecodeError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    usize::from_str_radix(digits, 16).map_err(|_| DecodeError::InvalidField {
        field: "address",
        value: s.to_string(),
    })
}

fn parse_site(s: &str) -> Result<CallSite, DecodeError> {
    let invalid = || DecodeError::InvalidField {
        field: "call-site",
        value: s.to_string(),
    };
    let (file, line) = s.rsplit_once(':').ok_or_else(invalid)?;
    let line = line.parse::<u32>().map_err(|_| invalid())?;
    Ok(CallSite::new(file, line))
}

fn sanitize_field(s: &str) -> std::borrow::Cow<'_, str> {
    if s.contains(['\t', '\n', '\r']) {
        std::borrow::Cow::Owned(s.replace(['\t', '\n', '\r'], " "))
    } else {
        std::borrow::Cow::Borrowed(s)
    }
}

fn truncate_at_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn read_u32_le(b: &[u8], off: usize) -> Option<u32> {
    let slice = b.get(off..off + 4)?;
    Some(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

fn read_u64_le(b: &[u8], off: usize) -> Option<u64> {
    let slice = b.get(off..off + 8)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(slice);
    Some(u64::from_le_bytes(raw))
}

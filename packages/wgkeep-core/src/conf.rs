use crate::{error::CoreError, CoreResult};
use ipnet::Ipv4Net;
use std::{
    collections::HashSet,
    fmt,
    io::Write,
    net::Ipv4Addr,
    path::Path,
    str::FromStr,
};
use tempfile::NamedTempFile;

/// Comment convention carrying a peer's human-readable name. The marker must
/// sit on the line immediately before a `[Peer]` header; a blank line breaks
/// the association. Sections without it are unmanaged and pass through
/// rewrites untouched.
pub const NAME_MARKER: &str = "# Name:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Interface,
    Peer,
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionKind::Interface => write!(f, "Interface"),
            SectionKind::Peer => write!(f, "Peer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Entry { key: String, value: String },
    Comment(String),
}

#[derive(Debug, Clone)]
pub struct Section {
    kind: SectionKind,
    name: Option<String>,
    header_line: usize,
    lines: Vec<Line>,
}

impl Section {
    fn new(kind: SectionKind, name: Option<String>, header_line: usize) -> Self {
        Self {
            kind,
            name,
            header_line,
            lines: Vec::new(),
        }
    }

    pub fn kind(&self) -> SectionKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// First value for `key`, matched case-insensitively. Unknown keys are
    /// kept verbatim in `lines`, so lookups never disturb round-tripping.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|l| match l {
            Line::Entry { key: k, value } if k.eq_ignore_ascii_case(key) => {
                Some(value.as_str())
            }
            _ => None,
        })
    }

    fn require(&self, key: &str) -> CoreResult<&str> {
        self.get(key).ok_or_else(|| CoreError::MalformedConfig {
            line: self.header_line,
            reason: format!("[{}] section is missing {key}", self.kind),
        })
    }

    fn push_entry(&mut self, key: &str, value: &str) {
        self.lines.push(Line::Entry {
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    pub fn public_key(&self) -> CoreResult<&str> {
        self.require("PublicKey")
    }

    pub fn preshared_key(&self) -> Option<&str> {
        self.get("PresharedKey")
    }

    /// The single host address this peer is assigned, taken from the first
    /// element of `AllowedIPs`.
    pub fn assigned_address(&self) -> CoreResult<Ipv4Addr> {
        let value = self.require("AllowedIPs")?;
        let first = value.split(',').next().unwrap_or_default().trim();
        parse_host(first).ok_or_else(|| CoreError::MalformedConfig {
            line: self.header_line,
            reason: format!("unparseable AllowedIPs element: {first}"),
        })
    }
}

fn parse_host(s: &str) -> Option<Ipv4Addr> {
    if let Ok(net) = Ipv4Net::from_str(s) {
        return Some(net.addr());
    }
    Ipv4Addr::from_str(s).ok()
}

/// The parsed server configuration: one `[Interface]` section and any number
/// of `[Peer]` sections, in file order. The document is the sole source of
/// truth; allocation decisions re-derive usage from a fresh parse.
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    preamble: Vec<String>,
    sections: Vec<Section>,
    interface: usize,
}

impl ConfigDocument {
    pub fn interface(&self) -> &Section {
        &self.sections[self.interface]
    }

    pub fn interface_private_key(&self) -> CoreResult<&str> {
        self.interface().require("PrivateKey")
    }

    pub fn interface_listen_port(&self) -> CoreResult<u16> {
        let section = self.interface();
        let value = section.require("ListenPort")?;
        value.parse().map_err(|_| CoreError::MalformedConfig {
            line: section.header_line,
            reason: format!("unparseable ListenPort: {value}"),
        })
    }

    pub fn interface_address(&self) -> CoreResult<Ipv4Addr> {
        let section = self.interface();
        let value = section.require("Address")?;
        let first = value.split(',').next().unwrap_or_default().trim();
        parse_host(first).ok_or_else(|| CoreError::MalformedConfig {
            line: section.header_line,
            reason: format!("unparseable Address: {first}"),
        })
    }

    pub fn peers(&self) -> impl Iterator<Item = &Section> + '_ {
        self.sections
            .iter()
            .filter(|s| s.kind == SectionKind::Peer)
    }

    pub fn find_peer(&self, name: &str) -> Option<&Section> {
        self.peers().find(|s| s.name() == Some(name))
    }

    /// Every address currently spoken for: the interface's own address plus
    /// each peer's `AllowedIPs` hosts, managed or not. Unparseable entries in
    /// unmanaged sections are skipped rather than rejected.
    pub fn reserved_addresses(&self) -> HashSet<Ipv4Addr> {
        let mut reserved = HashSet::new();
        if let Some(value) = self.interface().get("Address") {
            for part in value.split(',') {
                if let Some(addr) = parse_host(part.trim()) {
                    reserved.insert(addr);
                }
            }
        }
        for peer in self.peers() {
            if let Some(value) = peer.get("AllowedIPs") {
                for part in value.split(',') {
                    if let Some(addr) = parse_host(part.trim()) {
                        reserved.insert(addr);
                    }
                }
            }
        }
        reserved
    }

    /// Appends a managed peer section after all existing sections.
    pub fn push_peer(
        &mut self,
        name: &str,
        public_key: &str,
        preshared_key: Option<&str>,
        address: Ipv4Addr,
    ) {
        let mut section = Section::new(SectionKind::Peer, Some(name.to_string()), 0);
        section.push_entry("PublicKey", public_key);
        if let Some(psk) = preshared_key {
            section.push_entry("PresharedKey", psk);
        }
        section.push_entry("AllowedIPs", &format!("{address}/32"));
        self.sections.push(section);
    }

    /// Removes the managed peer with `name`. Unnamed sections are never
    /// touched. Returns false when no such peer exists.
    pub fn remove_peer(&mut self, name: &str) -> bool {
        let before = self.sections.len();
        self.sections
            .retain(|s| !(s.kind == SectionKind::Peer && s.name() == Some(name)));
        let removed = self.sections.len() != before;
        if removed {
            self.interface = self
                .sections
                .iter()
                .position(|s| s.kind == SectionKind::Interface)
                .unwrap_or(0);
        }
        removed
    }
}

fn parse_header(line: &str, lineno: usize) -> CoreResult<SectionKind> {
    let inner = line
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| CoreError::MalformedConfig {
            line: lineno,
            reason: format!("unparseable section header: {line}"),
        })?;
    if inner.eq_ignore_ascii_case("interface") {
        Ok(SectionKind::Interface)
    } else if inner.eq_ignore_ascii_case("peer") {
        Ok(SectionKind::Peer)
    } else {
        Err(CoreError::MalformedConfig {
            line: lineno,
            reason: format!("unknown section: [{inner}]"),
        })
    }
}

fn flush_comments(
    pending: &mut Vec<String>,
    current: Option<&mut Section>,
    preamble: &mut Vec<String>,
) {
    if pending.is_empty() {
        return;
    }
    match current {
        Some(section) => section
            .lines
            .extend(pending.drain(..).map(Line::Comment)),
        None => preamble.append(pending),
    }
}

impl TryFrom<&str> for ConfigDocument {
    type Error = CoreError;

    fn try_from(raw: &str) -> CoreResult<Self> {
        let mut preamble: Vec<String> = Vec::new();
        let mut sections: Vec<Section> = Vec::new();
        let mut current: Option<Section> = None;
        let mut pending: Vec<String> = Vec::new();

        for (idx, raw_line) in raw.lines().enumerate() {
            let lineno = idx + 1;
            let line = raw_line.trim();

            if line.is_empty() {
                flush_comments(&mut pending, current.as_mut(), &mut preamble);
                continue;
            }

            if line.starts_with('#') {
                pending.push(line.to_string());
                continue;
            }

            if line.starts_with('[') {
                let kind = parse_header(line, lineno)?;
                let name = match pending.last() {
                    Some(comment) if comment.starts_with(NAME_MARKER) => {
                        let name = comment[NAME_MARKER.len()..].trim().to_string();
                        pending.pop();
                        if name.is_empty() {
                            None
                        } else {
                            Some(name)
                        }
                    }
                    _ => None,
                };
                flush_comments(&mut pending, current.as_mut(), &mut preamble);
                if let Some(section) = current.take() {
                    sections.push(section);
                }
                current = Some(Section::new(kind, name, lineno));
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                CoreError::MalformedConfig {
                    line: lineno,
                    reason: format!("expected `Key = Value`, got: {line}"),
                }
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(CoreError::MalformedConfig {
                    line: lineno,
                    reason: "entry with an empty key".to_string(),
                });
            }
            match current.as_mut() {
                Some(section) => {
                    flush_comments(&mut pending, Some(&mut *section), &mut preamble);
                    section.push_entry(key, value.trim());
                }
                None => {
                    return Err(CoreError::MalformedConfig {
                        line: lineno,
                        reason: format!("entry outside of a section: {line}"),
                    });
                }
            }
        }

        flush_comments(&mut pending, current.as_mut(), &mut preamble);
        if let Some(section) = current.take() {
            sections.push(section);
        }

        let mut interface = None;
        for (i, section) in sections.iter().enumerate() {
            match section.kind {
                SectionKind::Interface => {
                    if interface.is_some() {
                        return Err(CoreError::MalformedConfig {
                            line: section.header_line,
                            reason: "duplicate [Interface] section".to_string(),
                        });
                    }
                    interface = Some(i);
                }
                SectionKind::Peer => {
                    section.public_key()?;
                }
            }
        }
        let interface = interface.ok_or(CoreError::MalformedConfig {
            line: 1,
            reason: "missing [Interface] section".to_string(),
        })?;

        Ok(Self {
            preamble,
            sections,
            interface,
        })
    }
}

impl fmt::Display for ConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for comment in &self.preamble {
            writeln!(f, "{comment}")?;
            first = false;
        }
        for section in &self.sections {
            if !first {
                writeln!(f)?;
            }
            first = false;
            if let Some(name) = &section.name {
                writeln!(f, "{NAME_MARKER} {name}")?;
            }
            writeln!(f, "[{}]", section.kind)?;
            for line in &section.lines {
                match line {
                    Line::Entry { key, value } => writeln!(f, "{key} = {value}")?,
                    Line::Comment(comment) => writeln!(f, "{comment}")?,
                }
            }
        }
        Ok(())
    }
}

/// Writes `contents` to a temp file in the destination directory, fsyncs,
/// then renames over `path`. The rename is the single point of visibility:
/// readers either see the old file or the new one, never a torn write.
pub fn write_atomic(path: &Path, contents: &str) -> CoreResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let wrap = |source: std::io::Error| CoreError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(wrap)?;
    tmp.write_all(contents.as_bytes()).map_err(wrap)?;
    tmp.flush().map_err(wrap)?;
    tmp.as_file().sync_all().map_err(wrap)?;
    tmp.persist(path).map_err(|e| wrap(e.error))?;
    Ok(())
}

use std::borrow::Cow;
use std::fmt;

/// A parsed CirJSON-Pointer path such as `/a/0/b`.
///
/// The pointer is stored as one full escaped path string plus the byte
/// offset of each segment's leading `/`, so `as_str` is O(1) and any tail
/// of the pointer can be exposed as a substring without reallocation.
/// Property names are escaped with `~0` for `~` and `~1` for `/`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pointer {
    full: String,
    offsets: Vec<usize>,
}

impl Pointer {
    /// The empty pointer, referencing the document root.
    pub fn empty() -> Pointer {
        Pointer::default()
    }

    /// Parses an escaped pointer string. An un-rooted input (not starting
    /// with `/`) is treated as rooted.
    pub fn from_escaped(s: &str) -> Pointer {
        let mut ptr = Pointer::empty();
        if s.is_empty() {
            return ptr;
        }
        for seg in s.split('/').skip(if s.starts_with('/') { 1 } else { 0 }) {
            ptr.offsets.push(ptr.full.len());
            ptr.full.push('/');
            ptr.full.push_str(seg);
        }
        ptr
    }

    /// Appends a property-name segment, escaping `~` and `/`.
    pub fn push_property(&mut self, name: &str) -> &mut Pointer {
        self.offsets.push(self.full.len());
        self.full.push('/');
        for c in name.chars() {
            match c {
                '~' => self.full.push_str("~0"),
                '/' => self.full.push_str("~1"),
                _ => self.full.push(c),
            }
        }
        self
    }

    /// Appends an array-index segment.
    pub fn push_index(&mut self, index: u32) -> &mut Pointer {
        use fmt::Write;
        self.offsets.push(self.full.len());
        write!(self.full, "/{index}").unwrap();
        self
    }

    /// The full escaped path. O(1).
    pub fn as_str(&self) -> &str {
        &self.full
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.offsets.len()
    }

    /// The raw (escaped) text of segment `i`, without its leading `/`.
    pub fn segment(&self, i: usize) -> Option<&str> {
        let start = *self.offsets.get(i)? + 1;
        let end = self
            .offsets
            .get(i + 1)
            .copied()
            .unwrap_or(self.full.len());
        Some(&self.full[start..end])
    }

    /// The tail of the pointer starting at segment `i`, as a substring of
    /// the full path. `tail(0)` is the whole pointer.
    pub fn tail(&self, i: usize) -> Option<&str> {
        let start = *self.offsets.get(i)?;
        Some(&self.full[start..])
    }

    /// The unescaped property name of segment `i`.
    pub fn property(&self, i: usize) -> Option<Cow<'_, str>> {
        let raw = self.segment(i)?;
        if raw.contains('~') {
            Some(Cow::Owned(raw.replace("~1", "/").replace("~0", "~")))
        } else {
            Some(Cow::Borrowed(raw))
        }
    }

    /// The array index of segment `i`, if the segment is a valid
    /// non-negative integer index. Leading zeroes and values overflowing
    /// 32-bit signed are rejected.
    pub fn index(&self, i: usize) -> Option<i32> {
        parse_index(self.segment(i)?)
    }

    /// Whether segment `i` matches the given property name.
    pub fn matches_property(&self, i: usize, name: &str) -> bool {
        self.property(i).map_or(false, |p| p == name)
    }

    /// Whether segment `i` matches the given array index.
    pub fn matches_index(&self, i: usize, index: i32) -> bool {
        self.index(i) == Some(index)
    }

    /// Iterates raw (escaped) segments.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        (0..self.offsets.len()).filter_map(move |i| self.segment(i))
    }
}

/// Strict index parsing: non-negative decimal with no leading zeroes,
/// fitting in 32-bit signed.
fn parse_index(seg: &str) -> Option<i32> {
    if seg.is_empty() || seg.len() > 10 {
        return None;
    }
    if seg.len() > 1 && seg.starts_with('0') {
        return None;
    }
    if !seg.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    seg.parse::<i32>().ok()
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl<S: AsRef<str>> From<S> for Pointer {
    fn from(s: S) -> Self {
        Pointer::from_escaped(s.as_ref())
    }
}

impl serde::Serialize for Pointer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.full)
    }
}

impl<'de> serde::Deserialize<'de> for Pointer {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Pointer::from_escaped(&s))
    }
}

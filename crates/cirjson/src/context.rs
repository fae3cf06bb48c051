use crate::location::Location;
use crate::ptr::Pointer;
use std::any::Any;
use std::collections::HashSet;

/// Type of one nesting level.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ContextKind {
    Root,
    Array,
    Object,
}

impl ContextKind {
    /// Short description used in error messages.
    pub fn type_desc(self) -> &'static str {
        match self {
            ContextKind::Root => "root",
            ContextKind::Array => "Array",
            ContextKind::Object => "Object",
        }
    }
}

/// One level of the nesting stack. Frames live in a flat vector indexed by
/// depth; there are no parent links and no sharing between readers and
/// writers.
#[derive(Debug)]
pub struct Frame {
    pub kind: ContextKind,
    /// Entry index within this frame. Starts at -1; each completed entry
    /// advances it. The identity element of an array or object is not an
    /// entry and does not advance it.
    pub index: i32,
    /// Current property name; non-None only in Object context, between the
    /// property-name token and the completion of its value.
    name: Option<String>,
    /// Opaque slot for the data-binding layer. Never read or written by
    /// the streaming core itself.
    current_value: Option<Box<dyn Any>>,
    /// Where this frame was opened, for unclosed-structure diagnostics.
    pub start_location: Option<Location>,
    /// Names seen in this frame, when strict duplicate detection is on.
    seen_names: Option<HashSet<String>>,
}

impl Frame {
    fn new(kind: ContextKind, start_location: Option<Location>, detect_dups: bool) -> Self {
        Self {
            kind,
            index: -1,
            name: None,
            current_value: None,
            start_location,
            seen_names: detect_dups.then(HashSet::new),
        }
    }

    pub fn current_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn current_value(&self) -> Option<&dyn Any> {
        self.current_value.as_deref()
    }

    pub fn set_current_value(&mut self, value: Option<Box<dyn Any>>) {
        self.current_value = value;
    }

    /// Whether this frame contributes a path segment: an array with a
    /// valid entry index, or an object with a current name.
    pub fn has_path_segment(&self) -> bool {
        match self.kind {
            ContextKind::Root => false,
            ContextKind::Array => self.index >= 0,
            ContextKind::Object => self.name.is_some(),
        }
    }
}

/// Signals a duplicate property name within one object frame.
#[derive(Debug, PartialEq, Eq)]
pub struct DuplicateName(pub String);

/// The nesting stack of a reader or writer. The root context always
/// exists; nesting depth equals stack length minus one.
#[derive(Debug)]
pub struct ContextStack {
    frames: Vec<Frame>,
    detect_dups: bool,
}

impl ContextStack {
    pub fn new(detect_dups: bool) -> Self {
        Self {
            frames: vec![Frame::new(ContextKind::Root, None, false)],
            detect_dups,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn current(&self) -> &Frame {
        self.frames.last().expect("root context always exists")
    }

    pub fn current_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("root context always exists")
    }

    /// The frame at the given depth, 0 being the root.
    pub fn frame(&self, depth: usize) -> Option<&Frame> {
        self.frames.get(depth)
    }

    pub fn kind(&self) -> ContextKind {
        self.current().kind
    }

    pub fn in_root(&self) -> bool {
        self.kind() == ContextKind::Root
    }

    pub fn in_array(&self) -> bool {
        self.kind() == ContextKind::Array
    }

    pub fn in_object(&self) -> bool {
        self.kind() == ContextKind::Object
    }

    pub fn push_array(&mut self, start: Option<Location>) {
        self.frames
            .push(Frame::new(ContextKind::Array, start, false));
    }

    pub fn push_object(&mut self, start: Option<Location>) {
        self.frames
            .push(Frame::new(ContextKind::Object, start, self.detect_dups));
    }

    /// Pops the current frame, returning it. The root frame cannot be
    /// popped; popping at root depth returns None.
    pub fn pop(&mut self) -> Option<Frame> {
        if self.frames.len() == 1 {
            return None;
        }
        self.frames.pop()
    }

    /// Records the current property name, checking for duplicates when
    /// strict detection is enabled.
    pub fn set_current_name(&mut self, name: &str) -> Result<(), DuplicateName> {
        let frame = self.current_mut();
        if let Some(seen) = frame.seen_names.as_mut() {
            if !seen.insert(name.to_string()) {
                return Err(DuplicateName(name.to_string()));
            }
        }
        frame.name = Some(name.to_string());
        Ok(())
    }

    /// Clears the current name once its value completes.
    pub fn clear_current_name(&mut self) {
        self.current_mut().name = None;
    }

    /// Advances the entry index of the current frame.
    pub fn advance(&mut self) {
        self.current_mut().index += 1;
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current().current_name()
    }

    pub fn entry_index(&self) -> i32 {
        self.current().index
    }

    /// Builds the pointer to the current position by concatenating the
    /// path segments of enclosing frames. When `include_root` is set and
    /// the root frame has advanced past its first value, the root entry
    /// index is included as a leading segment.
    pub fn pointer(&self, include_root: bool) -> Pointer {
        let mut ptr = Pointer::empty();
        for frame in &self.frames {
            match frame.kind {
                ContextKind::Root => {
                    if include_root && frame.index >= 0 {
                        ptr.push_index(frame.index as u32);
                    }
                }
                ContextKind::Array => {
                    if frame.index >= 0 {
                        ptr.push_index(frame.index as u32);
                    }
                }
                ContextKind::Object => {
                    if let Some(name) = frame.current_name() {
                        ptr.push_property(name);
                    }
                }
            }
        }
        ptr
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_depth_tracking() {
        let mut stack = ContextStack::new(false);
        assert_eq!(stack.depth(), 0);
        assert!(stack.in_root());

        stack.push_object(None);
        assert_eq!(stack.depth(), 1);
        assert!(stack.in_object());

        stack.push_array(None);
        assert_eq!(stack.depth(), 2);
        assert!(stack.in_array());

        assert!(stack.pop().is_some());
        assert!(stack.pop().is_some());
        assert_eq!(stack.depth(), 0);
        // Root frame can never be popped.
        assert!(stack.pop().is_none());
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_pointer_construction() {
        let mut stack = ContextStack::new(false);
        stack.push_object(None);
        stack.set_current_name("array").unwrap();
        stack.advance();
        stack.push_array(None);
        stack.advance(); // entry 0
        stack.advance(); // entry 1
        stack.advance(); // entry 2
        stack.push_array(None);
        stack.advance(); // entry 0

        assert_eq!(stack.pointer(false).as_str(), "/array/2/0");
    }

    #[test]
    fn test_pointer_escapes_names() {
        let mut stack = ContextStack::new(false);
        stack.push_object(None);
        stack.set_current_name("a/b~c").unwrap();
        assert_eq!(stack.pointer(false).as_str(), "/a~1b~0c");
    }

    #[test]
    fn test_root_index_inclusion() {
        let mut stack = ContextStack::new(false);
        assert_eq!(stack.pointer(true).as_str(), "");
        stack.advance();
        assert_eq!(stack.pointer(true).as_str(), "/0");
        assert_eq!(stack.pointer(false).as_str(), "");
    }

    #[test]
    fn test_duplicate_detection() {
        let mut stack = ContextStack::new(true);
        stack.push_object(None);
        stack.set_current_name("a").unwrap();
        stack.clear_current_name();
        stack.set_current_name("b").unwrap();
        stack.clear_current_name();
        assert_eq!(
            stack.set_current_name("a"),
            Err(DuplicateName("a".to_string()))
        );

        // A fresh frame starts with a fresh name set.
        stack.push_object(None);
        assert!(stack.set_current_name("a").is_ok());
    }

    #[test]
    fn test_current_value_slot() {
        let mut stack = ContextStack::new(false);
        stack.push_object(None);
        stack
            .current_mut()
            .set_current_value(Some(Box::new(42usize)));
        let v = stack.current().current_value().unwrap();
        assert_eq!(v.downcast_ref::<usize>(), Some(&42));
        // The slot is per-frame.
        assert!(stack.frame(0).unwrap().current_value().is_none());
    }
}

//! Stack-disciplined scratch buffer.
//!
//! [`Scratch::frame`] marks the current top; everything pushed through the
//! returned frame is released when the frame is dropped, including on `?`
//! early returns. Frames nest, and the borrow checker enforces that inner
//! frames are released before outer ones.

#[derive(Debug, Default)]
pub struct Scratch<T> {
    buf: Vec<T>,
    depth: usize,
    high_water: usize,
}

impl<T: Copy> Scratch<T> {
    pub fn new() -> Self {
        Scratch {
            buf: Vec::new(),
            depth: 0,
            high_water: 0,
        }
    }

    /// Mark the current top of the stack.
    pub fn frame(&mut self) -> ScratchFrame<'_, T> {
        let mark = self.buf.len();
        self.depth += 1;
        ScratchFrame {
            scratch: self,
            mark,
        }
    }

    /// Elements currently held by open frames.
    pub fn in_use(&self) -> usize {
        self.buf.len()
    }

    /// Open frames.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Largest number of elements ever held at once.
    pub fn high_water(&self) -> usize {
        self.high_water
    }
}

pub struct ScratchFrame<'a, T: Copy> {
    scratch: &'a mut Scratch<T>,
    mark: usize,
}

impl<T: Copy> ScratchFrame<'_, T> {
    pub fn push(&mut self, v: T) {
        self.scratch.buf.push(v);
        self.scratch.high_water = self.scratch.high_water.max(self.scratch.buf.len());
    }

    pub fn as_slice(&self) -> &[T] {
        &self.scratch.buf[self.mark..]
    }

    pub fn len(&self) -> usize {
        self.scratch.buf.len() - self.mark
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open a nested frame on top of this one.
    pub fn frame(&mut self) -> ScratchFrame<'_, T> {
        self.scratch.frame()
    }
}

impl<T: Copy> Drop for ScratchFrame<'_, T> {
    fn drop(&mut self) {
        self.scratch.buf.truncate(self.mark);
        self.scratch.depth -= 1;
    }
}

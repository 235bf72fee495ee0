//! Block stack
//!
//! LIFO of block frames. Each frame is the index of the directive that opened
//! the block. All skip/restart decisions live in the engine.

#[derive(Debug, Clone, Default)]
pub struct BlockStack {
    frames: Vec<usize>,
}

impl BlockStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, index: usize) {
        self.frames.push(index);
    }

    pub fn pop(&mut self) -> Option<usize> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

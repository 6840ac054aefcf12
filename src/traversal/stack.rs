//! Matrix and clip stacks of a render target.

use std::fmt;
use std::ops::{Deref, DerefMut};

use glam::Mat4;

use crate::backend::ClipRect;

/// Model-view matrix stack.
///
/// The bottom entry is the base (usually the camera view) and can't be
/// popped.
#[derive(Debug, Clone)]
pub struct MatrixStack {
    stack: Vec<Mat4>,
    pushes: usize,
    pops: usize,
}

impl MatrixStack {
    pub fn new(base: Mat4) -> Self {
        Self {
            stack: vec![base],
            pushes: 0,
            pops: 0,
        }
    }

    /// Current model-view matrix
    pub fn top(&self) -> Mat4 {
        self.stack.last().copied().unwrap_or(Mat4::IDENTITY)
    }

    /// Push `top * local`
    pub fn push(&mut self, local: Mat4) {
        let combined = self.top() * local;
        self.push_replace(combined);
    }

    /// Push `matrix` as the new top, ignoring the current one
    pub fn push_replace(&mut self, matrix: Mat4) {
        self.stack.push(matrix);
        self.pushes += 1;
    }

    /// Pop the top matrix; the base is never popped
    pub fn pop(&mut self) -> Option<Mat4> {
        if self.stack.len() <= 1 {
            return None;
        }
        self.pops += 1;
        self.stack.pop()
    }

    /// Entries above the base
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    pub fn pushes(&self) -> usize {
        self.pushes
    }

    pub fn pops(&self) -> usize {
        self.pops
    }
}

impl Default for MatrixStack {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY)
    }
}

/// Rectangle clip stack
#[derive(Debug, Clone, Default)]
pub struct ClipStack {
    stack: Vec<ClipRect>,
    pushes: usize,
    pops: usize,
}

impl ClipStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Innermost clip, if any
    pub fn top(&self) -> Option<ClipRect> {
        self.stack.last().copied()
    }

    pub fn push(&mut self, clip: ClipRect) {
        self.stack.push(clip);
        self.pushes += 1;
    }

    pub fn pop(&mut self) -> Option<ClipRect> {
        let clip = self.stack.pop()?;
        self.pops += 1;
        Some(clip)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn pushes(&self) -> usize {
        self.pushes
    }

    pub fn pops(&self) -> usize {
        self.pops
    }
}

/// Push/pop totals of a [`TargetStacks`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StackCounters {
    pub matrix_pushes: usize,
    pub matrix_pops: usize,
    pub clip_pushes: usize,
    pub clip_pops: usize,
}

impl StackCounters {
    pub fn is_balanced(&self) -> bool {
        self.matrix_pushes == self.matrix_pops && self.clip_pushes == self.clip_pops
    }

    /// Counters accumulated since `start`
    pub fn since(&self, start: &StackCounters) -> StackCounters {
        StackCounters {
            matrix_pushes: self.matrix_pushes - start.matrix_pushes,
            matrix_pops: self.matrix_pops - start.matrix_pops,
            clip_pushes: self.clip_pushes - start.clip_pushes,
            clip_pops: self.clip_pops - start.clip_pops,
        }
    }
}

/// Matrix and clip stacks belonging to one render target
#[derive(Debug, Clone, Default)]
pub struct TargetStacks {
    pub matrices: MatrixStack,
    pub clips: ClipStack,
}

impl TargetStacks {
    pub fn new(view: Mat4) -> Self {
        Self {
            matrices: MatrixStack::new(view),
            clips: ClipStack::new(),
        }
    }

    pub fn modelview(&self) -> Mat4 {
        self.matrices.top()
    }

    pub fn clip(&self) -> Option<ClipRect> {
        self.clips.top()
    }

    pub fn counters(&self) -> StackCounters {
        StackCounters {
            matrix_pushes: self.matrices.pushes(),
            matrix_pops: self.matrices.pops(),
            clip_pushes: self.clips.pushes(),
            clip_pops: self.clips.pops(),
        }
    }
}

/// Scoped pushes onto a [`TargetStacks`].
///
/// Everything pushed through the guard is popped when it is dropped, clip
/// first and matrix second. Nested traversal borrows the stacks through the
/// guard (`&mut *guard`), so inner guards always drop first.
pub struct StackGuard<'a> {
    stacks: &'a mut TargetStacks,
    matrix_pushed: bool,
    clip_pushed: bool,
}

impl<'a> StackGuard<'a> {
    pub fn new(stacks: &'a mut TargetStacks) -> Self {
        Self {
            stacks,
            matrix_pushed: false,
            clip_pushed: false,
        }
    }

    /// Compose `local` onto the matrix stack. At most once per guard.
    pub fn push_matrix(&mut self, local: Mat4) {
        debug_assert!(!self.matrix_pushed, "matrix already pushed by this guard");
        if !self.matrix_pushed {
            self.stacks.matrices.push(local);
            self.matrix_pushed = true;
        }
    }

    /// Push `matrix` verbatim. At most once per guard.
    pub fn replace_matrix(&mut self, matrix: Mat4) {
        debug_assert!(!self.matrix_pushed, "matrix already pushed by this guard");
        if !self.matrix_pushed {
            self.stacks.matrices.push_replace(matrix);
            self.matrix_pushed = true;
        }
    }

    /// Push the rectangle `(x0, y0)-(x1, y1)` in current model-view space.
    /// At most once per guard.
    pub fn push_clip_rectangle(&mut self, x0: f32, y0: f32, x1: f32, y1: f32) {
        debug_assert!(!self.clip_pushed, "clip already pushed by this guard");
        if !self.clip_pushed {
            let modelview = self.stacks.modelview();
            self.stacks.clips.push(ClipRect {
                x0,
                y0,
                x1,
                y1,
                modelview,
            });
            self.clip_pushed = true;
        }
    }
}

impl Deref for StackGuard<'_> {
    type Target = TargetStacks;

    fn deref(&self) -> &TargetStacks {
        self.stacks
    }
}

impl DerefMut for StackGuard<'_> {
    fn deref_mut(&mut self) -> &mut TargetStacks {
        self.stacks
    }
}

impl Drop for StackGuard<'_> {
    fn drop(&mut self) {
        if self.clip_pushed {
            self.stacks.clips.pop();
        }
        if self.matrix_pushed {
            self.stacks.matrices.pop();
        }
    }
}

impl fmt::Debug for StackGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackGuard")
            .field("matrix_pushed", &self.matrix_pushed)
            .field("clip_pushed", &self.clip_pushed)
            .finish()
    }
}

use crate::canvas::Canvas;
use crate::flowable::{Flowable, placement_for};
use crate::types::{Pt, Rect, Size};

pub enum AddResult {
    Placed,
    Split(Box<dyn Flowable>),
    Overflow(Box<dyn Flowable>),
}

/// Content area of one page. Flowables stack top to bottom from `rect.y`.
pub struct Frame {
    rect: Rect,
    cursor_y: Pt,
}

impl Frame {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            cursor_y: Pt::ZERO,
        }
    }

    pub fn remaining_height(&self) -> Pt {
        (self.rect.height - self.cursor_y).max(Pt::ZERO)
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn is_empty(&self) -> bool {
        self.cursor_y <= Pt::ZERO
    }

    pub fn add(&mut self, flowable: Box<dyn Flowable>, canvas: &mut Canvas) -> AddResult {
        let avail_width = self.rect.width;
        let avail_height = self.remaining_height();
        if avail_height <= Pt::ZERO {
            return AddResult::Overflow(flowable);
        }

        let size = flowable.wrap(avail_width, avail_height);
        if size.height <= avail_height {
            self.place(flowable.as_ref(), size, canvas);
            return AddResult::Placed;
        }

        if let Some((first, second)) = flowable.split(avail_width, avail_height) {
            let first_size = first.wrap(avail_width, avail_height);
            if first_size.height > Pt::ZERO && first_size.height <= avail_height {
                self.place(first.as_ref(), first_size, canvas);
                return AddResult::Split(second);
            }
        }

        // Taller than a whole frame and unsplittable: place it anyway and let it
        // run past the bottom edge.
        if self.is_empty() {
            self.place(flowable.as_ref(), size, canvas);
            self.cursor_y = self.rect.height;
            return AddResult::Placed;
        }

        AddResult::Overflow(flowable)
    }

    fn place(&mut self, flowable: &dyn Flowable, size: Size, canvas: &mut Canvas) {
        let x = self.rect.x;
        let y = self.rect.y + self.cursor_y;
        canvas.record_placement(placement_for(flowable, x, y, size));
        flowable.draw(canvas, x, y, self.rect.width, size.height);
        self.cursor_y = self.cursor_y + size.height;
    }
}

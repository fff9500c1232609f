use crate::font::Base14Font;
use crate::types::{Color, Pt, Size};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveState,
    RestoreState,
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    SetFont(Base14Font),
    SetFontSize(Pt),
    DrawString {
        x: Pt,
        y: Pt,
        text: String,
    },
    DrawRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    StrokeRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    DrawImage {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Text,
    Image,
    Stack,
    Columns,
    Table,
    Spacer,
}

/// Where the layout put one node. Recorded while drawing, read by layout observers.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub kind: NodeKind,
    pub x: Pt,
    pub y: Pt,
    pub width: Pt,
    // Image nodes leave this unset; their extent is only known to the painter.
    pub height: Option<Pt>,
    pub image_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub page_size: Size,
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone)]
struct GraphicsState {
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    font_size: Pt,
    font: Base14Font,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_f32(1.0),
            font_size: Pt::from_f32(12.0),
            font: Base14Font::Helvetica,
        }
    }
}

pub struct Canvas {
    page_size: Size,
    pages: Vec<Page>,
    current: Page,
    state_stack: Vec<GraphicsState>,
    state: GraphicsState,
    placements: Vec<Placement>,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            pages: Vec::new(),
            current: Page::default(),
            state_stack: Vec::new(),
            state: GraphicsState::default(),
            placements: Vec::new(),
        }
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn save_state(&mut self) {
        self.state_stack.push(self.state.clone());
        self.emit(Command::SaveState);
    }

    pub fn restore_state(&mut self) {
        let Some(saved) = self.state_stack.pop() else {
            return;
        };
        self.state = saved;
        self.emit(Command::RestoreState);
    }

    pub fn record_placement(&mut self, placement: Placement) {
        self.placements.push(placement);
    }

    pub fn take_placements(&mut self) -> Vec<Placement> {
        std::mem::take(&mut self.placements)
    }

    pub fn set_fill_color(&mut self, color: Color) {
        self.update_state(|s| &mut s.fill_color, color, Command::SetFillColor);
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        self.update_state(|s| &mut s.stroke_color, color, Command::SetStrokeColor);
    }

    pub fn set_line_width(&mut self, width: Pt) {
        self.update_state(|s| &mut s.line_width, width.max(Pt::ZERO), Command::SetLineWidth);
    }

    pub fn set_font(&mut self, font: Base14Font) {
        self.update_state(|s| &mut s.font, font, Command::SetFont);
    }

    pub fn set_font_size(&mut self, size: Pt) {
        self.update_state(|s| &mut s.font_size, size, Command::SetFontSize);
    }

    pub fn draw_string(&mut self, x: Pt, y: Pt, text: impl Into<String>) {
        let text = text.into();
        self.emit(Command::DrawString { x, y, text });
    }

    pub fn draw_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.emit(Command::DrawRect { x, y, width, height });
    }

    pub fn stroke_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.emit(Command::StrokeRect { x, y, width, height });
    }

    pub fn draw_image(&mut self, x: Pt, y: Pt, size: Size, resource_id: impl Into<String>) {
        self.emit(Command::DrawImage {
            x,
            y,
            width: size.width,
            height: size.height,
            resource_id: resource_id.into(),
        });
    }

    // Emits `command(value)` only when the tracked state actually changes.
    fn update_state<T: PartialEq + Copy>(
        &mut self,
        slot: impl FnOnce(&mut GraphicsState) -> &mut T,
        value: T,
        command: fn(T) -> Command,
    ) {
        let current = slot(&mut self.state);
        if *current == value {
            return;
        }
        *current = value;
        self.emit(command(value));
    }

    fn emit(&mut self, command: Command) {
        self.current.commands.push(command);
    }

    pub fn show_page(&mut self) {
        let current = std::mem::take(&mut self.current);
        self.pages.push(current);
        self.state_stack.clear();
        self.state = GraphicsState::default();
    }

    /// Commands recorded on the page being drawn.
    pub fn pending_commands(&self) -> usize {
        self.current.commands.len()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn finish(mut self) -> Document {
        if self.pending_commands() > 0 || self.pages.is_empty() {
            self.show_page();
        }
        Document {
            page_size: self.page_size,
            pages: self.pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redundant_state_changes_are_elided() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.set_font(Base14Font::Helvetica);
        canvas.set_font_size(Pt::from_f32(12.0));
        canvas.set_fill_color(Color::BLACK);
        assert_eq!(canvas.pending_commands(), 0);
        canvas.set_font(Base14Font::Courier);
        canvas.set_font(Base14Font::Courier);
        assert_eq!(canvas.pending_commands(), 1);
    }

    #[test]
    fn show_page_resets_graphics_state() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.set_font(Base14Font::Courier);
        canvas.show_page();
        canvas.set_font(Base14Font::Courier);
        let doc = canvas.finish();
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.pages[1].commands, vec![Command::SetFont(Base14Font::Courier)]);
    }

    #[test]
    fn placements_are_drained() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.record_placement(Placement {
            kind: NodeKind::Spacer,
            x: Pt::ZERO,
            y: Pt::ZERO,
            width: Pt::ZERO,
            height: Some(Pt::ZERO),
            image_id: None,
        });
        assert_eq!(canvas.take_placements().len(), 1);
        assert!(canvas.take_placements().is_empty());
    }

    #[test]
    fn finish_always_yields_a_page() {
        let doc = Canvas::new(Size::a4()).finish();
        assert_eq!(doc.pages.len(), 1);
    }
}

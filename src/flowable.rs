use crate::canvas::{Canvas, NodeKind, Placement};
use crate::content::TextStyle;
use crate::font::FontConfig;
use crate::image_extent::ImageLayout;
use crate::types::{Color, Pt, Size};
use std::ops::Range;
use std::sync::{Arc, Mutex};

fn huge_pt() -> Pt {
    // Large but safe sentinel for "unbounded" layout measurements.
    Pt::from_f32(1.0e9)
}

pub trait Flowable: FlowableClone + Send + Sync {
    fn wrap(&self, avail_width: Pt, avail_height: Pt) -> Size;
    fn split(
        &self,
        avail_width: Pt,
        avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)>;
    fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, avail_width: Pt, avail_height: Pt);

    fn kind(&self) -> NodeKind;

    fn image_id(&self) -> Option<&str> {
        None
    }

    fn debug_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

pub trait FlowableClone {
    fn clone_box(&self) -> Box<dyn Flowable>;
}

impl<T> FlowableClone for T
where
    T: 'static + Flowable + Clone,
{
    fn clone_box(&self) -> Box<dyn Flowable> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Flowable> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Placement record for a flowable laid out at (`x`, `y`) with `size`.
pub(crate) fn placement_for(flowable: &dyn Flowable, x: Pt, y: Pt, size: Size) -> Placement {
    let image_id = flowable.image_id().map(str::to_string);
    let height = if image_id.is_some() {
        None
    } else {
        Some(size.height)
    };
    Placement {
        kind: flowable.kind(),
        x,
        y,
        width: size.width,
        height,
        image_id,
    }
}

#[derive(Debug, Clone)]
struct LineLayout {
    text: String,
    width: Pt,
}

#[derive(Debug, Default)]
struct TextLayoutCache {
    entries: Vec<(i64, Arc<Vec<LineLayout>>)>,
}

impl TextLayoutCache {
    fn get(&self, key: i64) -> Option<Arc<Vec<LineLayout>>> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.clone())
    }

    fn insert(&mut self, key: i64, value: Arc<Vec<LineLayout>>) {
        if self.entries.len() >= 8 {
            self.entries.remove(0);
        }
        self.entries.push((key, value));
    }
}

#[derive(Debug, Clone)]
pub struct Paragraph {
    text: String,
    style: TextStyle,
    fonts: Arc<FontConfig>,
    // Set on the leading half of a split so the gap is only paid once.
    suppress_space_after: bool,
    layout_cache: Arc<Mutex<TextLayoutCache>>,
}

impl Paragraph {
    pub fn new(text: impl Into<String>, style: TextStyle, fonts: Arc<FontConfig>) -> Self {
        Self {
            text: text.into(),
            style,
            fonts,
            suppress_space_after: false,
            layout_cache: Arc::new(Mutex::new(TextLayoutCache::default())),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn measure_text_width(&self, text: &str) -> Pt {
        self.fonts
            .measure(self.style.font, self.style.font_size, text)
    }

    fn line_height(&self) -> Pt {
        self.fonts.line_height(self.style.font_size)
    }

    fn space_after(&self) -> Pt {
        if self.suppress_space_after {
            Pt::ZERO
        } else {
            self.style.space_after.max(Pt::ZERO)
        }
    }

    fn layout_lines(&self, avail_width: Pt) -> Arc<Vec<LineLayout>> {
        let max_width = avail_width.max(Pt::from_f32(1.0));
        let key = max_width.to_milli_i64();
        if let Ok(cache) = self.layout_cache.lock() {
            if let Some(lines) = cache.get(key) {
                return lines;
            }
        }

        let mut out = Vec::new();
        for raw_line in self.text.split('\n') {
            self.wrap_line(raw_line, max_width, &mut out);
        }
        let lines = Arc::new(out);
        if let Ok(mut cache) = self.layout_cache.lock() {
            cache.insert(key, lines.clone());
        }
        lines
    }

    fn wrap_line(&self, raw_line: &str, max_width: Pt, out: &mut Vec<LineLayout>) {
        let space_width = self.measure_text_width(" ");
        let mut current = String::new();
        let mut current_width = Pt::ZERO;
        let mut pushed_any = false;

        for word in raw_line.split_whitespace() {
            let word_width = self.measure_text_width(word);
            if current.is_empty() {
                if word_width > max_width {
                    pushed_any |= self.break_long_word(
                        word,
                        max_width,
                        out,
                        &mut current,
                        &mut current_width,
                    );
                } else {
                    current.push_str(word);
                    current_width = word_width;
                }
                continue;
            }
            let candidate = current_width + space_width + word_width;
            if candidate <= max_width {
                current.push(' ');
                current.push_str(word);
                current_width = candidate;
                continue;
            }
            out.push(LineLayout {
                text: std::mem::take(&mut current),
                width: current_width,
            });
            pushed_any = true;
            current_width = Pt::ZERO;
            if word_width > max_width {
                self.break_long_word(word, max_width, out, &mut current, &mut current_width);
            } else {
                current.push_str(word);
                current_width = word_width;
            }
        }

        if !current.is_empty() || !pushed_any {
            out.push(LineLayout {
                text: current,
                width: current_width,
            });
        }
    }

    // Hard-breaks a word wider than the line; the tail stays in `current`.
    fn break_long_word(
        &self,
        word: &str,
        max_width: Pt,
        out: &mut Vec<LineLayout>,
        current: &mut String,
        current_width: &mut Pt,
    ) -> bool {
        let mut pushed = false;
        for ch in word.chars() {
            let mut buf = [0u8; 4];
            let ch_width = self.measure_text_width(ch.encode_utf8(&mut buf));
            if !current.is_empty() && *current_width + ch_width > max_width {
                out.push(LineLayout {
                    text: std::mem::take(current),
                    width: *current_width,
                });
                *current_width = Pt::ZERO;
                pushed = true;
            }
            current.push(ch);
            *current_width = *current_width + ch_width;
        }
        pushed
    }

    fn from_lines(&self, lines: &[LineLayout], suppress_space_after: bool) -> Paragraph {
        Paragraph {
            text: lines
                .iter()
                .map(|line| line.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            style: self.style.clone(),
            fonts: self.fonts.clone(),
            suppress_space_after,
            layout_cache: Arc::new(Mutex::new(TextLayoutCache::default())),
        }
    }
}

impl Flowable for Paragraph {
    fn wrap(&self, avail_width: Pt, _avail_height: Pt) -> Size {
        let lines = self.layout_lines(avail_width);
        let height = self.line_height() * (lines.len() as i32) + self.space_after();
        let width = lines
            .iter()
            .fold(Pt::ZERO, |acc, line| acc.max(line.width))
            .min(avail_width);
        Size { width, height }
    }

    fn split(
        &self,
        avail_width: Pt,
        avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        let lines = self.layout_lines(avail_width);
        let lh = self.line_height().to_milli_i64();
        let ah = avail_height.to_milli_i64();
        if lh <= 0 || ah <= 0 {
            return None;
        }
        let max_lines = (ah / lh) as usize;
        if max_lines == 0 || max_lines >= lines.len() {
            return None;
        }
        let first = self.from_lines(&lines[..max_lines], true);
        let second = self.from_lines(&lines[max_lines..], self.suppress_space_after);
        Some((Box::new(first), Box::new(second)))
    }

    fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, avail_width: Pt, _avail_height: Pt) {
        let lines = self.layout_lines(avail_width);
        canvas.set_fill_color(self.style.color);
        canvas.set_font(self.fonts.font_for(self.style.font));
        canvas.set_font_size(self.style.font_size);

        let line_height = self.line_height();
        let mut cursor_y = y;
        for line in lines.iter() {
            if !line.text.is_empty() {
                canvas.draw_string(x, cursor_y, line.text.clone());
            }
            cursor_y = cursor_y + line_height;
        }
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Text
    }
}

#[derive(Debug, Clone)]
pub struct Spacer {
    height: Pt,
}

impl Spacer {
    pub fn new(height: f32) -> Self {
        Self::new_pt(Pt::from_f32(height))
    }

    pub fn new_pt(height: Pt) -> Self {
        Self { height }
    }
}

impl Flowable for Spacer {
    fn wrap(&self, avail_width: Pt, _avail_height: Pt) -> Size {
        Size {
            width: avail_width,
            height: self.height.max(Pt::ZERO),
        }
    }

    fn split(
        &self,
        _avail_width: Pt,
        _avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        None
    }

    fn draw(&self, _canvas: &mut Canvas, _x: Pt, _y: Pt, _avail_width: Pt, _avail_height: Pt) {}

    fn kind(&self) -> NodeKind {
        NodeKind::Spacer
    }
}

/// An image already scaled into the fit box, padded by the image margins.
#[derive(Debug, Clone)]
pub struct ImageFlowable {
    pub width: Pt,
    pub height: Pt,
    pub resource_id: String,
    margin_top: Pt,
    margin_bottom: Pt,
}

impl ImageFlowable {
    pub fn new(rendered: Size, resource_id: impl Into<String>, layout: &ImageLayout) -> Self {
        Self {
            width: rendered.width,
            height: rendered.height,
            resource_id: resource_id.into(),
            margin_top: layout.margin_top,
            margin_bottom: layout.margin_bottom,
        }
    }
}

impl Flowable for ImageFlowable {
    fn wrap(&self, _avail_width: Pt, _avail_height: Pt) -> Size {
        Size {
            width: self.width,
            height: self.margin_top + self.height + self.margin_bottom,
        }
    }

    fn split(
        &self,
        _avail_width: Pt,
        _avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        None
    }

    fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, _avail_width: Pt, _avail_height: Pt) {
        let size = Size {
            width: self.width,
            height: self.height,
        };
        canvas.draw_image(x, y + self.margin_top, size, self.resource_id.as_str());
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Image
    }

    fn image_id(&self) -> Option<&str> {
        Some(&self.resource_id)
    }
}

/// Vertical stack; splits between children, or inside the first child that
/// straddles the break.
#[derive(Clone)]
pub struct StackFlowable {
    children: Vec<Box<dyn Flowable>>,
}

impl StackFlowable {
    pub fn new(children: Vec<Box<dyn Flowable>>) -> Self {
        Self { children }
    }
}

impl Flowable for StackFlowable {
    fn wrap(&self, avail_width: Pt, _avail_height: Pt) -> Size {
        let mut height = Pt::ZERO;
        let mut width = Pt::ZERO;
        for child in &self.children {
            let size = child.wrap(avail_width, huge_pt());
            height = height + size.height;
            width = width.max(size.width);
        }
        Size { width, height }
    }

    fn split(
        &self,
        avail_width: Pt,
        avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        let mut used = Pt::ZERO;
        for (idx, child) in self.children.iter().enumerate() {
            let size = child.wrap(avail_width, huge_pt());
            if used + size.height <= avail_height {
                used = used + size.height;
                continue;
            }
            let remaining = avail_height - used;
            if let Some((head, tail)) = child.split(avail_width, remaining) {
                let mut first: Vec<Box<dyn Flowable>> = self.children[..idx].to_vec();
                first.push(head);
                let mut second: Vec<Box<dyn Flowable>> = vec![tail];
                second.extend(self.children[idx + 1..].iter().cloned());
                return Some((
                    Box::new(StackFlowable::new(first)),
                    Box::new(StackFlowable::new(second)),
                ));
            }
            if idx == 0 {
                return None;
            }
            return Some((
                Box::new(StackFlowable::new(self.children[..idx].to_vec())),
                Box::new(StackFlowable::new(self.children[idx..].to_vec())),
            ));
        }
        None
    }

    fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, avail_width: Pt, _avail_height: Pt) {
        let mut cursor_y = y;
        for child in &self.children {
            let size = child.wrap(avail_width, huge_pt());
            canvas.record_placement(placement_for(child.as_ref(), x, cursor_y, size));
            child.draw(canvas, x, cursor_y, avail_width, size.height);
            cursor_y = cursor_y + size.height;
        }
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Stack
    }
}

/// Equal-width columns laid side by side; never split.
#[derive(Clone)]
pub struct ColumnsFlowable {
    children: Vec<Box<dyn Flowable>>,
    gap: Pt,
}

impl ColumnsFlowable {
    pub fn new(children: Vec<Box<dyn Flowable>>, gap: Pt) -> Self {
        Self { children, gap }
    }

    fn column_width(&self, avail_width: Pt) -> Pt {
        let count = self.children.len().max(1) as i32;
        let gaps = self.gap * (count - 1);
        ((avail_width - gaps) / count).max(Pt::from_f32(1.0))
    }
}

impl Flowable for ColumnsFlowable {
    fn wrap(&self, avail_width: Pt, _avail_height: Pt) -> Size {
        let column_width = self.column_width(avail_width);
        let height = self
            .children
            .iter()
            .map(|child| child.wrap(column_width, huge_pt()).height)
            .fold(Pt::ZERO, Pt::max);
        Size {
            width: avail_width,
            height,
        }
    }

    fn split(
        &self,
        _avail_width: Pt,
        _avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        None
    }

    fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, avail_width: Pt, _avail_height: Pt) {
        let column_width = self.column_width(avail_width);
        let mut cursor_x = x;
        for child in &self.children {
            let size = child.wrap(column_width, huge_pt());
            canvas.record_placement(placement_for(child.as_ref(), cursor_x, y, size));
            child.draw(canvas, cursor_x, y, column_width, size.height);
            cursor_x = cursor_x + column_width + self.gap;
        }
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Columns
    }
}

#[derive(Clone)]
struct TableData {
    header_rows: Vec<Vec<Box<dyn Flowable>>>,
    body_rows: Vec<Vec<Box<dyn Flowable>>>,
    columns: usize,
    cell_padding: Pt,
    border_color: Color,
    header_fill: Color,
}

/// Grid of equal-width columns. Splits between body rows and repeats the header
/// rows on the continuation.
#[derive(Clone)]
pub struct TableFlowable {
    data: Arc<TableData>,
    body_range: Range<usize>,
    include_header: bool,
}

impl TableFlowable {
    pub fn new(rows: Vec<Vec<Box<dyn Flowable>>>, header_rows: usize, cell_padding: Pt) -> Self {
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
        let header_count = header_rows.min(rows.len());
        let mut rows = rows;
        let body_rows = rows.split_off(header_count);
        let body_len = body_rows.len();
        Self {
            data: Arc::new(TableData {
                header_rows: rows,
                body_rows,
                columns,
                cell_padding,
                border_color: Color::gray(0.6),
                header_fill: Color::gray(0.92),
            }),
            body_range: 0..body_len,
            include_header: true,
        }
    }

    fn column_width(&self, avail_width: Pt) -> Pt {
        (avail_width / self.data.columns as i32).max(Pt::from_f32(1.0))
    }

    fn row_height(&self, row: &[Box<dyn Flowable>], column_width: Pt) -> Pt {
        let padding = self.data.cell_padding * 2;
        let inner = (column_width - padding).max(Pt::from_f32(1.0));
        let content = row
            .iter()
            .map(|cell| cell.wrap(inner, huge_pt()).height)
            .fold(Pt::ZERO, Pt::max);
        content + padding
    }

    fn visible_rows(&self) -> impl Iterator<Item = (bool, &Vec<Box<dyn Flowable>>)> {
        let header: &[Vec<Box<dyn Flowable>>] = if self.include_header {
            &self.data.header_rows
        } else {
            &[]
        };
        header
            .iter()
            .map(|row| (true, row))
            .chain(
                self.data.body_rows[self.body_range.clone()]
                    .iter()
                    .map(|row| (false, row)),
            )
    }

    fn header_height(&self, column_width: Pt) -> Pt {
        if !self.include_header {
            return Pt::ZERO;
        }
        self.data
            .header_rows
            .iter()
            .map(|row| self.row_height(row, column_width))
            .sum()
    }

    fn draw_row(
        &self,
        canvas: &mut Canvas,
        row: &[Box<dyn Flowable>],
        is_header: bool,
        x: Pt,
        y: Pt,
        column_width: Pt,
        row_height: Pt,
    ) {
        let padding = self.data.cell_padding;
        let inner = (column_width - padding * 2).max(Pt::from_f32(1.0));
        if is_header {
            canvas.save_state();
            canvas.set_fill_color(self.data.header_fill);
            canvas.draw_rect(x, y, column_width * self.data.columns as i32, row_height);
            canvas.restore_state();
        }
        for col in 0..self.data.columns {
            let cell_x = x + column_width * col as i32;
            canvas.set_stroke_color(self.data.border_color);
            canvas.set_line_width(Pt::from_f32(0.5));
            canvas.stroke_rect(cell_x, y, column_width, row_height);
            if let Some(cell) = row.get(col) {
                let size = cell.wrap(inner, huge_pt());
                let cell_y = y + padding;
                let cell_x = cell_x + padding;
                canvas.record_placement(placement_for(cell.as_ref(), cell_x, cell_y, size));
                cell.draw(canvas, cell_x, cell_y, inner, size.height);
            }
        }
    }
}

impl Flowable for TableFlowable {
    fn wrap(&self, avail_width: Pt, _avail_height: Pt) -> Size {
        let column_width = self.column_width(avail_width);
        let height = self
            .visible_rows()
            .map(|(_, row)| self.row_height(row, column_width))
            .sum();
        Size {
            width: avail_width,
            height,
        }
    }

    fn split(
        &self,
        avail_width: Pt,
        avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        let column_width = self.column_width(avail_width);
        let mut used = self.header_height(column_width);
        let mut fitted = 0usize;
        for row in &self.data.body_rows[self.body_range.clone()] {
            let height = self.row_height(row, column_width);
            if used + height > avail_height {
                break;
            }
            used = used + height;
            fitted += 1;
        }
        let body_len = self.body_range.end - self.body_range.start;
        if fitted == 0 || fitted >= body_len {
            return None;
        }
        let mid = self.body_range.start + fitted;
        let first = TableFlowable {
            data: self.data.clone(),
            body_range: self.body_range.start..mid,
            include_header: self.include_header,
        };
        let second = TableFlowable {
            data: self.data.clone(),
            body_range: mid..self.body_range.end,
            include_header: true,
        };
        Some((Box::new(first), Box::new(second)))
    }

    fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, avail_width: Pt, _avail_height: Pt) {
        let column_width = self.column_width(avail_width);
        let mut cursor_y = y;
        for (is_header, row) in self.visible_rows() {
            let row_height = self.row_height(row, column_width);
            self.draw_row(canvas, row, is_header, x, cursor_y, column_width, row_height);
            cursor_y = cursor_y + row_height;
        }
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Table
    }
}

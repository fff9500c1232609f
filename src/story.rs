//! Lowers a content tree into the flowables the paginator consumes.

use crate::assets::ImageStore;
use crate::content::{ContentNode, TextStyle};
use crate::flowable::{
    ColumnsFlowable, Flowable, ImageFlowable, Paragraph, Spacer, StackFlowable, TableFlowable,
};
use crate::font::FontConfig;
use crate::image_extent::{ImageLayout, fit_image};
use crate::types::{Color, Pt};
use std::sync::Arc;

const COLUMN_GAP: i32 = 10;
const CELL_PADDING: i32 = 4;

pub struct StoryBuilder<'a> {
    images: &'a ImageStore,
    fonts: Arc<FontConfig>,
    image_layout: ImageLayout,
}

impl<'a> StoryBuilder<'a> {
    pub fn new(images: &'a ImageStore, fonts: &FontConfig, image_layout: ImageLayout) -> Self {
        Self {
            images,
            fonts: Arc::new(fonts.clone()),
            image_layout,
        }
    }

    /// Top-level flowables. A root stack is flattened so each of its children is
    /// paginated (and observed) on its own.
    pub fn build(&self, root: &ContentNode) -> Vec<Box<dyn Flowable>> {
        match root {
            ContentNode::Stack(children) => {
                children.iter().map(|child| self.lower(child)).collect()
            }
            other => vec![self.lower(other)],
        }
    }

    fn lower(&self, node: &ContentNode) -> Box<dyn Flowable> {
        match node {
            ContentNode::Text(block) => Box::new(Paragraph::new(
                block.text.clone(),
                block.style.clone(),
                self.fonts.clone(),
            )),
            ContentNode::Image { id } => self.lower_image(id),
            ContentNode::Stack(children) => Box::new(StackFlowable::new(
                children.iter().map(|child| self.lower(child)).collect(),
            )),
            ContentNode::Columns(children) => Box::new(ColumnsFlowable::new(
                children.iter().map(|child| self.lower(child)).collect(),
                Pt::from_i32(COLUMN_GAP),
            )),
            ContentNode::Table(table) => Box::new(TableFlowable::new(
                table
                    .rows
                    .iter()
                    .map(|row| row.iter().map(|cell| self.lower(cell)).collect())
                    .collect(),
                table.header_rows,
                Pt::from_i32(CELL_PADDING),
            )),
            ContentNode::Spacer(height) => Box::new(Spacer::new_pt(*height)),
        }
    }

    // Trees normally arrive with placeholders already spliced in; this covers
    // callers that hand the engine an unchecked tree.
    fn lower_image(&self, id: &str) -> Box<dyn Flowable> {
        let rendered = self
            .images
            .dimensions(id)
            .and_then(|dims| fit_image(dims, self.image_layout.fit_box));
        match rendered {
            Some(size) => Box::new(ImageFlowable::new(size, id, &self.image_layout)),
            None => Box::new(Paragraph::new(
                placeholder_text(id),
                placeholder_style(),
                self.fonts.clone(),
            )),
        }
    }
}

pub(crate) fn placeholder_text(id: &str) -> String {
    format!("[image unavailable: {id}]")
}

pub(crate) fn placeholder_style() -> TextStyle {
    TextStyle {
        color: Color::gray(0.45),
        ..TextStyle::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::NodeKind;

    fn png_header(width: u32, height: u32) -> Vec<u8> {
        let mut out = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        out.extend_from_slice(&13u32.to_be_bytes());
        out.extend_from_slice(b"IHDR");
        out.extend_from_slice(&width.to_be_bytes());
        out.extend_from_slice(&height.to_be_bytes());
        out
    }

    #[test]
    fn root_stack_is_flattened() {
        let images = ImageStore::new();
        let fonts = FontConfig::default();
        let builder = StoryBuilder::new(&images, &fonts, ImageLayout::default());
        let story = builder.build(&ContentNode::stack(vec![
            ContentNode::text("a"),
            ContentNode::stack(vec![ContentNode::text("b")]),
            ContentNode::spacer(4.0),
        ]));
        let kinds: Vec<_> = story.iter().map(|f| f.kind()).collect();
        assert_eq!(kinds, vec![NodeKind::Text, NodeKind::Stack, NodeKind::Spacer]);
    }

    #[test]
    fn images_are_fitted_and_missing_ones_become_text() {
        let mut images = ImageStore::new();
        images.insert_bytes("wide", png_header(1000, 500), "image/png");
        let fonts = FontConfig::default();
        let builder = StoryBuilder::new(&images, &fonts, ImageLayout::default());
        let story = builder.build(&ContentNode::stack(vec![
            ContentNode::image("wide"),
            ContentNode::image("missing"),
        ]));
        assert_eq!(story[0].image_id(), Some("wide"));
        let size = story[0].wrap(Pt::from_i32(515), Pt::from_i32(10_000));
        assert_eq!(size.height, Pt::from_i32(265));
        assert_eq!(story[1].kind(), NodeKind::Text);
        assert_eq!(story[1].image_id(), None);
    }
}

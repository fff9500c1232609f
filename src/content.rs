//! Content tree handed to the layout engine.

use crate::assets::ImageStore;
use crate::story::{placeholder_style, placeholder_text};
use crate::types::{Color, Pt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontRole {
    Regular,
    Bold,
    Monospace,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font: FontRole,
    pub font_size: Pt,
    pub color: Color,
    pub space_after: Pt,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: FontRole::Regular,
            font_size: Pt::from_i32(11),
            color: Color::BLACK,
            space_after: Pt::from_i32(6),
        }
    }
}

impl TextStyle {
    pub fn heading(level: u8) -> Self {
        let size = match level {
            0 | 1 => 22,
            2 => 18,
            3 => 15,
            _ => 13,
        };
        Self {
            font: FontRole::Bold,
            font_size: Pt::from_i32(size),
            color: Color::BLACK,
            space_after: Pt::from_i32(8),
        }
    }

    pub fn code() -> Self {
        Self {
            font: FontRole::Monospace,
            font_size: Pt::from_i32(10),
            color: Color::gray(0.2),
            space_after: Pt::from_i32(6),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub style: TextStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableNode {
    pub rows: Vec<Vec<ContentNode>>,
    pub header_rows: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentNode {
    Text(TextBlock),
    Image { id: String },
    Stack(Vec<ContentNode>),
    Columns(Vec<ContentNode>),
    Table(TableNode),
    Spacer(Pt),
}

impl ContentNode {
    pub fn text(text: impl Into<String>) -> Self {
        ContentNode::Text(TextBlock {
            text: text.into(),
            style: TextStyle::default(),
        })
    }

    pub fn styled_text(text: impl Into<String>, style: TextStyle) -> Self {
        ContentNode::Text(TextBlock {
            text: text.into(),
            style,
        })
    }

    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Self::styled_text(text, TextStyle::heading(level))
    }

    pub fn image(id: impl Into<String>) -> Self {
        ContentNode::Image { id: id.into() }
    }

    pub fn stack(children: Vec<ContentNode>) -> Self {
        ContentNode::Stack(children)
    }

    pub fn columns(children: Vec<ContentNode>) -> Self {
        ContentNode::Columns(children)
    }

    pub fn table(rows: Vec<Vec<ContentNode>>, header_rows: usize) -> Self {
        ContentNode::Table(TableNode { rows, header_rows })
    }

    pub fn spacer(height: f32) -> Self {
        ContentNode::Spacer(Pt::from_f32(height))
    }

    pub fn image_ref(&self) -> Option<&str> {
        match self {
            ContentNode::Image { id } => Some(id.as_str()),
            _ => None,
        }
    }

    /// Direct children of stack and column containers. Table cells are reached
    /// through [`ContentNode::for_each`].
    pub fn children(&self) -> Option<&[ContentNode]> {
        match self {
            ContentNode::Stack(children) | ContentNode::Columns(children) => Some(children),
            _ => None,
        }
    }

    /// Depth-first pre-order walk, including table cells.
    pub fn for_each<'a>(&'a self, visit: &mut dyn FnMut(&'a ContentNode)) {
        visit(self);
        match self {
            ContentNode::Stack(children) | ContentNode::Columns(children) => {
                for child in children {
                    child.for_each(visit);
                }
            }
            ContentNode::Table(table) => {
                for cell in table.rows.iter().flatten() {
                    cell.for_each(visit);
                }
            }
            ContentNode::Text(_) | ContentNode::Image { .. } | ContentNode::Spacer(_) => {}
        }
    }

    /// Every image id referenced in the tree, in document order, repeats included.
    pub fn image_refs(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.for_each(&mut |node| {
            if let Some(id) = node.image_ref() {
                out.push(id);
            }
        });
        out
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0usize;
        self.for_each(&mut |_| count += 1);
        count
    }

    /// Copy of the tree where images without readable dimensions are replaced by a
    /// text placeholder. Returns the ids that were replaced.
    pub fn with_image_placeholders(&self, images: &ImageStore) -> (ContentNode, Vec<String>) {
        let mut failed = Vec::new();
        let node = self.splice_placeholders(images, &mut failed);
        (node, failed)
    }

    fn splice_placeholders(&self, images: &ImageStore, failed: &mut Vec<String>) -> ContentNode {
        match self {
            ContentNode::Image { id } => {
                if images.dimensions(id).is_some() {
                    return self.clone();
                }
                if !failed.contains(id) {
                    failed.push(id.clone());
                }
                ContentNode::styled_text(placeholder_text(id), placeholder_style())
            }
            ContentNode::Stack(children) => ContentNode::Stack(
                children
                    .iter()
                    .map(|child| child.splice_placeholders(images, failed))
                    .collect(),
            ),
            ContentNode::Columns(children) => ContentNode::Columns(
                children
                    .iter()
                    .map(|child| child.splice_placeholders(images, failed))
                    .collect(),
            ),
            ContentNode::Table(table) => ContentNode::Table(TableNode {
                rows: table
                    .rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|cell| cell.splice_placeholders(images, failed))
                            .collect()
                    })
                    .collect(),
                header_rows: table.header_rows,
            }),
            ContentNode::Text(_) | ContentNode::Spacer(_) => self.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_header(width: u32, height: u32) -> Vec<u8> {
        let mut out = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        out.extend_from_slice(&13u32.to_be_bytes());
        out.extend_from_slice(b"IHDR");
        out.extend_from_slice(&width.to_be_bytes());
        out.extend_from_slice(&height.to_be_bytes());
        out
    }

    fn sample_tree() -> ContentNode {
        ContentNode::stack(vec![
            ContentNode::heading(1, "Title"),
            ContentNode::image("a"),
            ContentNode::columns(vec![ContentNode::text("left"), ContentNode::image("b")]),
            ContentNode::table(
                vec![vec![ContentNode::text("h")], vec![ContentNode::image("a")]],
                1,
            ),
        ])
    }

    #[test]
    fn image_refs_walk_containers_and_tables() {
        assert_eq!(sample_tree().image_refs(), vec!["a", "b", "a"]);
    }

    #[test]
    fn node_count_includes_containers() {
        assert_eq!(sample_tree().node_count(), 9);
    }

    #[test]
    fn children_only_for_stack_and_columns() {
        assert_eq!(ContentNode::text("x").children(), None);
        assert_eq!(
            ContentNode::columns(vec![ContentNode::spacer(1.0)])
                .children()
                .map(|c| c.len()),
            Some(1)
        );
    }

    #[test]
    fn placeholders_replace_unreadable_images() {
        let mut images = ImageStore::new();
        images.insert_bytes("a", png_header(4, 4), "image/png");
        images.insert_bytes("b", b"not an image".to_vec(), "image/png");

        let (tree, failed) = sample_tree().with_image_placeholders(&images);
        assert_eq!(failed, vec!["b".to_string()]);
        assert_eq!(tree.image_refs(), vec!["a", "a"]);
        let mut placeholder_found = false;
        tree.for_each(&mut |node| {
            if let ContentNode::Text(block) = node {
                placeholder_found |= block.text.contains("image unavailable: b");
            }
        });
        assert!(placeholder_found);
    }
}

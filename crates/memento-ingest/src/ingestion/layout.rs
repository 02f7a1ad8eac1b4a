//! Reading-order reconstruction for PDF pages.
//!
//! Operates purely on geometry extracted by the PDF adapter: positioned
//! words, ruling lines (thin path objects), and image anchors. Coordinates
//! are top-down layout units (distance from the top of the page), so sorting
//! by `top` yields the order a human reads the page in.

use crate::types::PlaceholderToken;

/// Tolerance for clustering ruling positions into grid cuts
const RULING_TOLERANCE: f32 = 2.0;
/// Path objects at most this thick count as ruling lines
const RULING_THICKNESS: f32 = 2.0;

/// Axis-aligned box in top-down page coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x0: f32,
    pub top: f32,
    pub x1: f32,
    pub bottom: f32,
}

impl BBox {
    pub fn new(x0: f32, top: f32, x1: f32, bottom: f32) -> Self {
        Self { x0, top, x1, bottom }
    }

    fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    fn height(&self) -> f32 {
        self.bottom - self.top
    }

    fn contains_point(&self, x: f32, y: f32) -> bool {
        self.x0 <= x && x <= self.x1 && self.top <= y && y <= self.bottom
    }

    fn intersects(&self, other: &BBox, tolerance: f32) -> bool {
        self.x0 - tolerance <= other.x1
            && other.x0 - tolerance <= self.x1
            && self.top - tolerance <= other.bottom
            && other.top - tolerance <= self.bottom
    }

    fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            top: self.top.min(other.top),
            x1: self.x1.max(other.x1),
            bottom: self.bottom.max(other.bottom),
        }
    }
}

/// A word with its bounding box
#[derive(Debug, Clone)]
pub struct PageWord {
    pub text: String,
    pub bbox: BBox,
}

impl PageWord {
    /// Midpoint test used to decide table membership
    fn midpoint(&self) -> (f32, f32) {
        (
            (self.bbox.x0 + self.bbox.x1) / 2.0,
            (self.bbox.top + self.bbox.bottom) / 2.0,
        )
    }
}

/// An image anchor: where an embedded image is painted on the page
#[derive(Debug, Clone, Copy)]
pub struct ImageAnchor {
    pub top: f32,
    pub image_index: u32,
}

/// A detected table: bounding box plus extracted cell grid
#[derive(Debug, Clone)]
pub struct TableRegion {
    pub bbox: BBox,
    pub grid: Vec<Vec<String>>,
}

/// One ordered element of a reconstructed page
#[derive(Debug, Clone)]
pub enum PageElement {
    TextBlock { top: f32, content: String },
    Table { top: f32, grid: Vec<Vec<String>> },
    Placeholder { top: f32, token: PlaceholderToken },
}

impl PageElement {
    fn top(&self) -> f32 {
        match self {
            Self::TextBlock { top, .. } | Self::Table { top, .. } | Self::Placeholder { top, .. } => {
                *top
            }
        }
    }
}

/// Reconstruct one page's text in reading order.
///
/// Tables are detected from ruling lines, words inside table regions are
/// routed into cell grids instead of the text flow, remaining words become
/// line-grouped text blocks, and every image anchor becomes a placeholder
/// token. All elements are then serialized top-to-bottom.
pub fn compose_page(
    page_number: u32,
    words: &[PageWord],
    rulings: &[BBox],
    anchors: &[ImageAnchor],
    line_gap: f32,
) -> String {
    let tables = detect_tables(rulings, words);
    let table_bboxes: Vec<BBox> = tables.iter().map(|t| t.bbox).collect();

    let flow_words: Vec<&PageWord> = words
        .iter()
        .filter(|word| {
            let (x, y) = word.midpoint();
            !table_bboxes.iter().any(|bbox| bbox.contains_point(x, y))
        })
        .collect();

    let lines = group_into_lines(&flow_words);
    let blocks = merge_lines_into_blocks(&lines, line_gap);

    let mut elements: Vec<PageElement> = Vec::new();
    for table in tables {
        elements.push(PageElement::Table {
            top: table.bbox.top,
            grid: table.grid,
        });
    }
    for block in blocks {
        elements.push(PageElement::TextBlock {
            top: block.top,
            content: block.content,
        });
    }
    for anchor in anchors {
        elements.push(PageElement::Placeholder {
            top: anchor.top,
            token: PlaceholderToken::new(page_number, anchor.image_index),
        });
    }

    render_elements(order_elements(elements))
}

/// Sort page elements into reading order by their top coordinate
pub fn order_elements(mut elements: Vec<PageElement>) -> Vec<PageElement> {
    elements.sort_by(|a, b| a.top().total_cmp(&b.top()));
    elements
}

/// Serialize ordered elements: markdown tables, plain paragraphs, opaque
/// placeholder tokens, joined with blank lines
pub fn render_elements(elements: Vec<PageElement>) -> String {
    let mut parts = Vec::new();
    for element in elements {
        match element {
            PageElement::TextBlock { content, .. } => {
                if !content.is_empty() {
                    parts.push(content);
                }
            }
            PageElement::Table { grid, .. } => {
                let markdown = table_to_markdown(&grid);
                if !markdown.is_empty() {
                    parts.push(markdown);
                }
            }
            PageElement::Placeholder { token, .. } => parts.push(token.render()),
        }
    }
    parts.join("\n\n")
}

/// A line of words sharing (rounded) top coordinate
#[derive(Debug, Clone)]
struct Line {
    top: f32,
    text: String,
}

/// A merged paragraph block
#[derive(Debug, Clone)]
struct TextBlock {
    top: f32,
    content: String,
}

/// Group words into lines by rounding the top coordinate to one decimal and
/// sorting within a line by x
fn group_into_lines(words: &[&PageWord]) -> Vec<Line> {
    use std::collections::BTreeMap;

    let mut by_top: BTreeMap<i64, Vec<&PageWord>> = BTreeMap::new();
    for word in words {
        let key = (word.bbox.top * 10.0).round() as i64;
        by_top.entry(key).or_default().push(word);
    }

    by_top
        .into_iter()
        .map(|(key, mut line_words)| {
            line_words.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
            let text = line_words
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            Line {
                top: key as f32 / 10.0,
                text,
            }
        })
        .collect()
}

/// Merge adjacent lines into blocks while the vertical gap stays within
/// `line_gap`; a larger gap starts a new block.
///
/// The builder is explicit: it flushes on a gap break or end-of-stream.
fn merge_lines_into_blocks(lines: &[Line], line_gap: f32) -> Vec<TextBlock> {
    struct BlockBuilder {
        blocks: Vec<TextBlock>,
        top: Option<f32>,
        lines: Vec<String>,
    }

    impl BlockBuilder {
        fn push(&mut self, line: &Line) {
            if self.top.is_none() {
                self.top = Some(line.top);
            }
            self.lines.push(line.text.clone());
        }

        fn flush(&mut self) {
            if let Some(top) = self.top.take() {
                self.blocks.push(TextBlock {
                    top,
                    content: std::mem::take(&mut self.lines).join("\n"),
                });
            }
        }
    }

    let mut builder = BlockBuilder {
        blocks: Vec::new(),
        top: None,
        lines: Vec::new(),
    };

    let mut prev_top: Option<f32> = None;
    for line in lines {
        if let Some(prev) = prev_top {
            if line.top - prev > line_gap {
                builder.flush();
            }
        }
        builder.push(line);
        prev_top = Some(line.top);
    }
    builder.flush();
    builder.blocks
}

/// Detect table regions from ruling lines.
///
/// Thin path objects are rulings; rulings that touch form a lattice, and any
/// lattice with at least two horizontal and two vertical rulings is a table.
/// Cell text comes from the words whose midpoint falls inside the cell.
pub fn detect_tables(rulings: &[BBox], words: &[PageWord]) -> Vec<TableRegion> {
    let rulings: Vec<&BBox> = rulings
        .iter()
        .filter(|r| r.height() <= RULING_THICKNESS || r.width() <= RULING_THICKNESS)
        .collect();
    if rulings.len() < 4 {
        return Vec::new();
    }

    let mut tables = Vec::new();
    for group in connected_groups(&rulings) {
        let horizontals: Vec<&BBox> = group
            .iter()
            .filter(|r| r.width() >= r.height())
            .copied()
            .collect();
        let verticals: Vec<&BBox> = group
            .iter()
            .filter(|r| r.height() > r.width())
            .copied()
            .collect();
        if horizontals.len() < 2 || verticals.len() < 2 {
            continue;
        }

        let ys = cluster_positions(
            horizontals.iter().map(|r| (r.top + r.bottom) / 2.0).collect(),
        );
        let xs = cluster_positions(verticals.iter().map(|r| (r.x0 + r.x1) / 2.0).collect());
        if ys.len() < 2 || xs.len() < 2 {
            continue;
        }

        let bbox = group
            .iter()
            .skip(1)
            .copied()
            .fold(*group[0], |acc, r| acc.union(r));

        let mut grid = Vec::with_capacity(ys.len() - 1);
        for row in 0..ys.len() - 1 {
            let mut cells = Vec::with_capacity(xs.len() - 1);
            for col in 0..xs.len() - 1 {
                let cell = BBox::new(xs[col], ys[row], xs[col + 1], ys[row + 1]);
                cells.push(cell_text(&cell, words));
            }
            grid.push(cells);
        }
        tables.push(TableRegion { bbox, grid });
    }

    tables.sort_by(|a, b| a.bbox.top.total_cmp(&b.bbox.top));
    tables
}

/// Words whose midpoint falls inside `cell`, in reading order
fn cell_text(cell: &BBox, words: &[PageWord]) -> String {
    let mut in_cell: Vec<&PageWord> = words
        .iter()
        .filter(|word| {
            let (x, y) = word.midpoint();
            cell.contains_point(x, y)
        })
        .collect();
    in_cell.sort_by(|a, b| {
        a.bbox
            .top
            .total_cmp(&b.bbox.top)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });
    in_cell
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Partition rulings into groups of touching lines (the lattices)
fn connected_groups<'a>(rulings: &[&'a BBox]) -> Vec<Vec<&'a BBox>> {
    let mut parent: Vec<usize> = (0..rulings.len()).collect();

    fn find(parent: &mut Vec<usize>, mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..rulings.len() {
        for j in i + 1..rulings.len() {
            if rulings[i].intersects(rulings[j], RULING_TOLERANCE) {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[ri] = rj;
                }
            }
        }
    }

    let mut groups: std::collections::HashMap<usize, Vec<&BBox>> = std::collections::HashMap::new();
    for i in 0..rulings.len() {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(rulings[i]);
    }
    groups.into_values().collect()
}

/// Dedupe nearby positions into sorted grid cuts
fn cluster_positions(mut positions: Vec<f32>) -> Vec<f32> {
    positions.sort_by(f32::total_cmp);
    let mut cuts: Vec<f32> = Vec::new();
    for position in positions {
        match cuts.last() {
            Some(last) if (position - last).abs() <= RULING_TOLERANCE => {}
            _ => cuts.push(position),
        }
    }
    cuts
}

/// Render a cell grid as a markdown pipe table; first row is the header
pub fn table_to_markdown(grid: &[Vec<String>]) -> String {
    let Some(header) = grid.first() else {
        return String::new();
    };
    if header.is_empty() {
        return String::new();
    }

    let mut lines = Vec::with_capacity(grid.len() + 1);
    lines.push(format!("| {} |", header.join(" | ")));
    lines.push(format!(
        "| {} |",
        vec!["---"; header.len()].join(" | ")
    ));
    for row in &grid[1..] {
        lines.push(format!("| {} |", row.join(" | ")));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, x0: f32, top: f32, x1: f32, bottom: f32) -> PageWord {
        PageWord {
            text: text.to_string(),
            bbox: BBox::new(x0, top, x1, bottom),
        }
    }

    #[test]
    fn test_reading_order_text_image_table() {
        let elements = vec![
            PageElement::Table {
                top: 100.0,
                grid: vec![
                    vec!["h1".to_string(), "h2".to_string()],
                    vec!["a".to_string(), "b".to_string()],
                ],
            },
            PageElement::TextBlock {
                top: 50.0,
                content: "intro paragraph".to_string(),
            },
            PageElement::Placeholder {
                top: 75.0,
                token: PlaceholderToken::new(1, 0),
            },
        ];

        let rendered = render_elements(order_elements(elements));
        let parts: Vec<&str> = rendered.split("\n\n").collect();
        assert_eq!(parts[0], "intro paragraph");
        assert_eq!(parts[1], "__IMAGE_PLACEHOLDER_p1_i0__");
        assert!(parts[2].starts_with("| h1 | h2 |"));
    }

    #[test]
    fn test_lines_group_by_rounded_top_and_sort_by_x() {
        let words = vec![
            word("world", 60.0, 100.02, 90.0, 110.0),
            word("hello", 10.0, 100.04, 50.0, 110.0),
        ];
        let refs: Vec<&PageWord> = words.iter().collect();
        let lines = group_into_lines(&refs);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "hello world");
    }

    #[test]
    fn test_block_merge_respects_line_gap() {
        let words = vec![
            word("first", 0.0, 10.0, 30.0, 20.0),
            word("second", 0.0, 25.0, 30.0, 35.0),
            // 30-unit gap: starts a new block at the default threshold
            word("third", 0.0, 55.0, 30.0, 65.0),
        ];
        let refs: Vec<&PageWord> = words.iter().collect();
        let blocks = merge_lines_into_blocks(&group_into_lines(&refs), 20.0);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].content, "first\nsecond");
        assert_eq!(blocks[1].content, "third");
    }

    #[test]
    fn test_table_detection_builds_grid_and_excludes_words() {
        // 2x2 lattice: horizontals at y = 10, 30, 50; verticals at x = 0, 50, 100
        let rulings = vec![
            BBox::new(0.0, 10.0, 100.0, 10.5),
            BBox::new(0.0, 30.0, 100.0, 30.5),
            BBox::new(0.0, 50.0, 100.0, 50.5),
            BBox::new(0.0, 10.0, 0.5, 50.0),
            BBox::new(50.0, 10.0, 50.5, 50.0),
            BBox::new(100.0, 10.0, 100.5, 50.0),
        ];
        let words = vec![
            word("이름", 10.0, 15.0, 30.0, 25.0),
            word("값", 60.0, 15.0, 70.0, 25.0),
            word("예산", 10.0, 35.0, 30.0, 45.0),
            word("1000", 60.0, 35.0, 80.0, 45.0),
            word("outside", 10.0, 200.0, 60.0, 210.0),
        ];

        let tables = detect_tables(&rulings, &words);
        assert_eq!(tables.len(), 1);
        assert_eq!(
            tables[0].grid,
            vec![
                vec!["이름".to_string(), "값".to_string()],
                vec!["예산".to_string(), "1000".to_string()],
            ]
        );

        let page = compose_page(1, &words, &rulings, &[], 20.0);
        // The table renders as markdown; in-table words do not leak into text flow
        assert!(page.contains("| 이름 | 값 |"));
        assert!(page.contains("| 예산 | 1000 |"));
        assert!(page.contains("outside"));
        assert_eq!(page.matches("예산").count(), 1);
    }

    #[test]
    fn test_scattered_rulings_are_not_a_table() {
        // Two disconnected horizontal lines: no lattice
        let rulings = vec![
            BBox::new(0.0, 10.0, 100.0, 10.5),
            BBox::new(0.0, 300.0, 100.0, 300.5),
        ];
        assert!(detect_tables(&rulings, &[]).is_empty());
    }

    #[test]
    fn test_compose_page_full_interleave() {
        let words = vec![
            word("제목", 10.0, 20.0, 40.0, 30.0),
            word("본문", 10.0, 120.0, 40.0, 130.0),
        ];
        let anchors = vec![ImageAnchor {
            top: 60.0,
            image_index: 0,
        }];

        let page = compose_page(3, &words, &[], &anchors, 20.0);
        let parts: Vec<&str> = page.split("\n\n").collect();
        assert_eq!(parts, vec!["제목", "__IMAGE_PLACEHOLDER_p3_i0__", "본문"]);
    }

    #[test]
    fn test_empty_page_is_empty_string() {
        assert_eq!(compose_page(1, &[], &[], &[], 20.0), "");
    }

    #[test]
    fn test_markdown_table_shape() {
        let grid = vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["".to_string(), "d".to_string()],
        ];
        assert_eq!(
            table_to_markdown(&grid),
            "| a | b |\n| --- | --- |\n|  | d |"
        );
        assert_eq!(table_to_markdown(&[]), "");
    }
}

use crate::tagset::TagSet;

/// Axis-aligned rectangle a component occupies on screen.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Region {
        Region {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// User interaction relevant to the suggestion dropdown.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Interaction {
    /// Tag input received focus.
    Focus,
    /// Text of the tag input changed.
    Typed,
    /// Pointer pressed somewhere on the page.
    PointerDown { x: f32, y: f32 },
}

/// Open/closed state of a tag suggestion list bound to a screen region.
#[derive(Clone, Debug, Default)]
pub struct Dropdown {
    region: Region,
    open: bool,
}

impl Dropdown {
    pub fn new(region: Region) -> Dropdown {
        Dropdown {
            region,
            open: false,
        }
    }

    pub fn set_region(&mut self, region: Region) {
        self.region = region;
    }

    pub fn handle(&mut self, interaction: Interaction) {
        match interaction {
            Interaction::Focus | Interaction::Typed => self.open = true,
            Interaction::PointerDown { x, y } => {
                if !self.region.contains(x, y) {
                    self.open = false;
                }
            }
        }
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

/// Known tags a folder does not carry yet whose text contains `input`,
/// ignoring case.
pub fn suggestions(vocabulary: &[String], current: &TagSet, input: &str) -> Vec<String> {
    let needle = input.to_lowercase();
    vocabulary
        .iter()
        .filter(|t| !current.contains(t))
        .filter(|t| t.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

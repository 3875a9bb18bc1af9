//! Backdrop scenes: vertical colour gradients cycled by index

use crate::colors::{blend, from_triple};
use crate::terminal::Terminal;
use serde::Deserialize;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Scene {
    pub name: String,
    pub top: [u8; 3],
    pub bottom: [u8; 3],
}

impl Scene {
    fn new(name: &str, top: [u8; 3], bottom: [u8; 3]) -> Self {
        Self {
            name: name.to_string(),
            top,
            bottom,
        }
    }
}

pub fn default_scenes() -> Vec<Scene> {
    vec![
        Scene::new("summer", [120, 190, 240], [245, 215, 150]),
        Scene::new("city", [40, 30, 70], [150, 90, 110]),
        Scene::new("landscape", [90, 160, 200], [40, 110, 60]),
    ]
}

pub struct Backdrop {
    scenes: Vec<Scene>,
    index: usize,
}

impl Backdrop {
    /// An empty list gets the default scenes
    pub fn new(scenes: Vec<Scene>) -> Self {
        let scenes = if scenes.is_empty() { default_scenes() } else { scenes };
        Self { scenes, index: 0 }
    }

    pub fn current(&self) -> &Scene {
        &self.scenes[self.index]
    }

    /// Move to the next scene, wrapping around
    pub fn advance(&mut self) -> &Scene {
        self.index = (self.index + 1) % self.scenes.len();
        tracing::debug!(scene = %self.scenes[self.index].name, "backdrop changed");
        self.current()
    }

    /// Colour of row `y` in a surface `height` rows tall
    pub fn row_color(&self, y: u16, height: u16) -> [u8; 3] {
        let scene = self.current();
        let t = if height > 1 { y as f32 / (height - 1) as f32 } else { 0.0 };
        blend(scene.top, scene.bottom, t)
    }

    pub fn draw(&self, term: &mut Terminal) {
        let (w, h) = term.size();
        for y in 0..h {
            let color = from_triple(self.row_color(y, h));
            term.fill_bg(0, y as i32, w as usize, 1, Some(color));
        }
    }
}

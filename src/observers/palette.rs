// Colours for user slots and density shading

use crate::{ScalarField, sim::multi_user::MultiUserField};

/// Added to density before shading so open fluid never renders pure black
pub const BG_OFFSET: f32 = 0.1;

/// Hue of single-user density, on the `[0, 6)` HSV sextant scale
pub const DENSITY_HUE: f32 = 3.25;
pub const DENSITY_SATURATION: f32 = 1.;

/// Grey drawn over obstacle cells
pub const BOUND_COLOR: Rgb = Rgb::new(0.3, 0.3, 0.3);

/// Linear colour, channels nominally in `[0, 1]`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0., 0., 0.);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Rgb { r, g, b }
    }

    pub fn scale(self, k: f32) -> Rgb {
        Rgb::new(self.r * k, self.g * k, self.b * k)
    }

    /// Quantize to 8 bits, saturating channels outside `[0, 1]`
    pub fn to_bytes(self) -> [u8; 3] {
        let q = |c: f32| (c.clamp(0., 1.) * 255.).round() as u8;
        [q(self.r), q(self.g), q(self.b)]
    }
}

impl std::ops::Add for Rgb {
    type Output = Rgb;

    fn add(self, other: Rgb) -> Rgb {
        Rgb::new(self.r + other.r, self.g + other.g, self.b + other.b)
    }
}

/// Colour per user slot. Slot 0 is the background.
#[derive(Clone, Debug)]
pub struct UserPalette {
    colors: Vec<Rgb>,
    fallback: Rgb,
}

impl UserPalette {
    pub fn new(colors: Vec<Rgb>, fallback: Rgb) -> Self {
        UserPalette { colors, fallback }
    }

    /// Bright colours for a dark background
    pub fn dark() -> Self {
        UserPalette::new(
            vec![
                Rgb::new(0., 0., 0.),
                Rgb::new(0., 1., 1.),
                Rgb::new(0.5, 1., 0.),
                Rgb::new(0.5, 0.5, 0.),
                Rgb::new(0., 0.4, 0.6),
                Rgb::new(0., 1., 0.),
                Rgb::new(1., 0.5, 0.),
                Rgb::new(1., 1., 0.),
                Rgb::new(1., 0., 0.),
                Rgb::new(0., 0.5, 1.),
                Rgb::new(1., 1., 0.5),
                Rgb::new(1., 1., 1.),
            ],
            Rgb::new(1., 1., 1.),
        )
    }

    pub fn white_background() -> Self {
        UserPalette::new(
            vec![
                Rgb::new(0.02, 0.02, 0.02),
                Rgb::new(0., 1., 1.),
                Rgb::new(0.5, 1., 0.),
                Rgb::new(1., 0.5, 0.),
                Rgb::new(0., 0., 1.),
                Rgb::new(0., 1., 0.),
                Rgb::new(1., 1., 0.),
                Rgb::new(1., 0., 0.),
                Rgb::new(0., 0.5, 1.),
                Rgb::new(0.5, 0., 1.),
                Rgb::new(1., 1., 0.5),
                Rgb::new(1., 1., 1.),
            ],
            Rgb::new(0.02, 0.02, 0.02),
        )
    }

    pub fn for_background(white: bool) -> Self {
        if white {
            UserPalette::white_background()
        } else {
            UserPalette::dark()
        }
    }

    /// Colour of `slot`, or the fallback for slots past the table
    pub fn color(&self, slot: usize) -> Rgb {
        self.colors.get(slot).copied().unwrap_or(self.fallback)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }
}

/// HSV to RGB with the hue on `[0, 6)`; a negative hue is achromatic.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb {
    if h < 0. {
        return Rgb::new(v, v, v);
    }

    let sextant = h.floor();
    let mut f = h - sextant;
    if (sextant as i32) % 2 == 0 {
        f = 1. - f;
    }
    let m = v * (1. - s);
    let n = v * (1. - s * f);

    match sextant as i32 % 6 {
        0 => Rgb::new(v, n, m),
        1 => Rgb::new(n, v, m),
        2 => Rgb::new(m, v, n),
        3 => Rgb::new(m, n, v),
        4 => Rgb::new(n, m, v),
        _ => Rgb::new(v, m, n),
    }
}

/// Single-user shading: obstacle cells are black, open cells brighten with
/// density above a dim background.
pub fn density_color(density: f32, bound: bool) -> Rgb {
    let value = if bound { 0. } else { BG_OFFSET + density };
    hsv_to_rgb(DENSITY_HUE, DENSITY_SATURATION, value)
}

/// Blend of every user's density at a cell, each tinted by its slot colour.
pub fn weighted_color(layers: &[ScalarField], x: usize, y: usize, palette: &UserPalette) -> Rgb {
    layers
        .iter()
        .enumerate()
        .filter_map(|(slot, layer)| layer.get((x, y)).map(|&d| palette.color(slot).scale(d)))
        .fold(Rgb::BLACK, |acc, c| acc + c)
}

/// Copy every user layer out of a multi-user field, in slot order
pub fn user_layers(field: &MultiUserField) -> Vec<ScalarField> {
    (0..field.user_count())
        .filter_map(|slot| field.user_density(slot).cloned())
        .collect()
}

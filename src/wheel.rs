//! The status pixel's slow trip around the color wheel.

/// A single RGB status LED.
pub trait Indicator {
    fn set_color(&mut self, r: u8, g: u8, b: u8) -> anyhow::Result<()>;
}

impl<I: Indicator + ?Sized> Indicator for Box<I> {
    fn set_color(&mut self, r: u8, g: u8, b: u8) -> anyhow::Result<()> {
        (**self).set_color(r, g, b)
    }
}

#[derive(Debug)]
pub struct PixelWheel<I> {
    pixel: I,
    position: u8,
    brightness: f32,
}

/// Returns the color at `position` on a 255-step RGB wheel that fades red to
/// blue, blue to green, and green back to red.
pub fn color_wheel(position: u8) -> (u8, u8, u8) {
    let pos = position % 255;
    if pos < 85 {
        (255 - pos * 3, 0, pos * 3)
    } else if pos < 170 {
        let pos = pos - 85;
        (0, pos * 3, 255 - pos * 3)
    } else {
        let pos = pos - 170;
        (pos * 3, 255 - pos * 3, 0)
    }
}

fn scale(channel: u8, brightness: f32) -> u8 {
    (f32::from(channel) * brightness).round() as u8
}

// === impl PixelWheel ===

impl<I: Indicator> PixelWheel<I> {
    pub const DEFAULT_BRIGHTNESS: f32 = 0.3;

    pub fn new(pixel: I) -> Self {
        Self {
            pixel,
            position: 0,
            brightness: Self::DEFAULT_BRIGHTNESS,
        }
    }

    pub fn with_brightness(self, brightness: f32) -> Self {
        Self {
            brightness: brightness.clamp(0.0, 1.0),
            ..self
        }
    }

    /// Shows the current wheel color and moves on to the next one.
    pub fn step(&mut self) -> anyhow::Result<(u8, u8, u8)> {
        let (r, g, b) = color_wheel(self.position);
        let color = (
            scale(r, self.brightness),
            scale(g, self.brightness),
            scale(b, self.brightness),
        );
        self.pixel.set_color(color.0, color.1, color.2)?;
        log::trace!(target: "airnode::pixel", "pixel -> {color:?}");
        self.position = self.position.wrapping_add(1);
        Ok(color)
    }
}

/// Contain-fit of the native surface inside a display container, with the
/// unused axis split evenly into bars.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub native_width: f32,
    pub native_height: f32,
}

impl Letterbox {
    /// `None` when either size is degenerate.
    pub fn fit(
        container_width: f32,
        container_height: f32,
        native_width: f32,
        native_height: f32,
    ) -> Option<Self> {
        if container_width <= 0.0
            || container_height <= 0.0
            || native_width <= 0.0
            || native_height <= 0.0
        {
            return None;
        }

        let container_ratio = container_width / container_height;
        let native_ratio = native_width / native_height;
        let (scale, offset_x, offset_y) = if container_ratio > native_ratio {
            // Pillarbox: full height, bars left and right.
            let scale = container_height / native_height;
            (scale, (container_width - native_width * scale) / 2.0, 0.0)
        } else {
            let scale = container_width / native_width;
            (scale, 0.0, (container_height - native_height * scale) / 2.0)
        };

        Some(Self {
            scale,
            offset_x,
            offset_y,
            native_width,
            native_height,
        })
    }

    pub fn display_size(&self) -> (f32, f32) {
        (
            self.native_width * self.scale,
            self.native_height * self.scale,
        )
    }

    /// Container coordinates to native pixels; `None` on the bars.
    pub fn to_native(&self, x: f32, y: f32) -> Option<(f32, f32)> {
        let (display_w, display_h) = self.display_size();
        let local_x = x - self.offset_x;
        let local_y = y - self.offset_y;
        if local_x < 0.0 || local_y < 0.0 || local_x > display_w || local_y > display_h {
            return None;
        }
        Some((local_x / self.scale, local_y / self.scale))
    }

    #[cfg(test)]
    pub fn to_display(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.scale + self.offset_x,
            y * self.scale + self.offset_y,
        )
    }
}

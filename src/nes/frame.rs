use std::sync::Arc;

pub const FRAME_WIDTH: usize = 256;
pub const FRAME_HEIGHT: usize = 240;
pub const BYTES_PER_PIXEL: usize = 3;
pub const FRAME_BYTES: usize = FRAME_WIDTH * FRAME_HEIGHT * BYTES_PER_PIXEL;

/// A completed 256x240 RGB frame. Cheap to clone and safe to hand to another thread.
pub type Frame = Arc<Vec<u8>>;

/// Double buffer. The PPU draws into `back`; `front` is replaced wholesale
/// at the frame boundary so readers only ever hold complete frames.
pub struct FrameBuffer {
    back: Vec<u8>,
    front: Frame,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            back: vec![0; FRAME_BYTES],
            front: Arc::new(vec![0; FRAME_BYTES]),
        }
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        let idx = (y * FRAME_WIDTH + x) * BYTES_PER_PIXEL;
        self.back[idx..idx + BYTES_PER_PIXEL].copy_from_slice(&rgb);
    }

    pub fn back_pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let idx = (y * FRAME_WIDTH + x) * BYTES_PER_PIXEL;
        [self.back[idx], self.back[idx + 1], self.back[idx + 2]]
    }

    pub fn front(&self) -> Frame {
        Arc::clone(&self.front)
    }

    pub fn swap(&mut self) {
        let finished = std::mem::take(&mut self.back);
        let previous = std::mem::replace(&mut self.front, Arc::new(finished));
        // Reuse the old front allocation unless a consumer still holds it.
        self.back = Arc::try_unwrap(previous).unwrap_or_else(|_| vec![0; FRAME_BYTES]);
    }

    pub fn clear(&mut self) {
        self.back.fill(0);
        self.front = Arc::new(vec![0; FRAME_BYTES]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_publishes_back_buffer() {
        let mut fb = FrameBuffer::new();
        fb.set_pixel(10, 20, [1, 2, 3]);
        assert_eq!(fb.front()[(20 * FRAME_WIDTH + 10) * 3], 0);

        fb.swap();
        let front = fb.front();
        let idx = (20 * FRAME_WIDTH + 10) * 3;
        assert_eq!(&front[idx..idx + 3], &[1, 2, 3]);
        assert_eq!(front.len(), FRAME_BYTES);
    }

    #[test]
    fn held_frame_is_not_torn_by_later_draws() {
        let mut fb = FrameBuffer::new();
        fb.set_pixel(0, 0, [9, 9, 9]);
        fb.swap();
        let held = fb.front();

        fb.set_pixel(0, 0, [7, 7, 7]);
        fb.swap();
        fb.set_pixel(0, 0, [5, 5, 5]);

        assert_eq!(&held[0..3], &[9, 9, 9]);
        assert_eq!(&fb.front()[0..3], &[7, 7, 7]);
        assert_eq!(fb.back_pixel(0, 0), [5, 5, 5]);
    }
}

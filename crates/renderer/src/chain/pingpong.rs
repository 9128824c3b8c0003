use crate::gpu::Framebuffer;

/// Frame `n` writes slot `n % 2` and reads slot `(n + 1) % 2`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PingPongState {
    frame: u64,
}

impl PingPongState {
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn write_index(&self) -> usize {
        (self.frame % 2) as usize
    }

    pub fn read_index(&self) -> usize {
        ((self.frame + 1) % 2) as usize
    }

    pub fn advance(&mut self) {
        self.frame = self.frame.wrapping_add(1);
    }

    pub fn reset(&mut self) {
        self.frame = 0;
    }
}

pub(crate) struct PingPongBuffer {
    targets: [Framebuffer; 2],
    state: PingPongState,
}

impl PingPongBuffer {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        tracing::debug!(width, height, "allocating ping-pong pair");
        Self {
            targets: [
                Framebuffer::new(device, "ping-pong 0", width, height),
                Framebuffer::new(device, "ping-pong 1", width, height),
            ],
            state: PingPongState::default(),
        }
    }

    pub fn state(&self) -> PingPongState {
        self.state
    }

    pub fn write_target(&self) -> &Framebuffer {
        &self.targets[self.state.write_index()]
    }

    pub fn history_target(&self) -> &Framebuffer {
        &self.targets[self.state.read_index()]
    }

    pub fn advance(&mut self) {
        self.state.advance();
    }

    pub fn reallocate(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        *self = Self::new(device, width, height);
    }

    pub fn encode_clear(&mut self, encoder: &mut wgpu::CommandEncoder) {
        for target in &self.targets {
            target.encode_clear(encoder);
        }
        self.state.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_and_write_never_coincide() {
        let mut state = PingPongState::default();
        for _ in 0..8 {
            assert_ne!(state.read_index(), state.write_index());
            state.advance();
        }
    }

    #[test]
    fn each_frame_reads_what_the_previous_one_wrote() {
        let mut state = PingPongState::default();
        let mut last_written = state.write_index();
        state.advance();
        for _ in 0..6 {
            assert_eq!(state.read_index(), last_written);
            last_written = state.write_index();
            state.advance();
        }
    }

    #[test]
    fn reset_rewinds_to_slot_zero() {
        let mut state = PingPongState::default();
        state.advance();
        state.advance();
        state.advance();
        assert_eq!(state.frame(), 3);
        state.reset();
        assert_eq!(state.frame(), 0);
        assert_eq!(state.write_index(), 0);
        assert_eq!(state.read_index(), 1);
    }
}

use std::sync::Arc;

use ash::vk;

use crate::renderer::uniform::UniformBuffer;
use crate::vulkan::{Allocator, CommandPool, FrameSync, VulkanDevice};
use crate::Result;

/// Slot index used by the `frame_number`-th frame under a round-robin
/// rotation over `render_ahead` slots. With a render-ahead of 2, frame 2
/// reuses slot 0 and therefore waits on frame 0's fence.
pub fn slot_for_frame(frame_number: usize, render_ahead: usize) -> usize {
    frame_number % render_ahead
}

/// Everything one in-flight frame owns: sync primitives, a command
/// buffer, and its camera uniform buffer.
pub struct FrameSlot {
    pub sync: FrameSync,
    pub command_buffer: vk::CommandBuffer,
    pub uniform: UniformBuffer,
}

/// The ring of in-flight frame slots. The slot fence is the sole
/// backpressure bounding CPU run-ahead to the configured depth.
pub struct FrameSlots {
    slots: Vec<FrameSlot>,
    current: usize,
}

impl FrameSlots {
    pub fn new(
        device: &VulkanDevice,
        allocator: &Arc<Allocator>,
        command_pool: &CommandPool,
        render_ahead: usize,
    ) -> Result<Self> {
        let command_buffers = command_pool.allocate_primary(render_ahead as u32)?;

        let mut slots = Vec::with_capacity(render_ahead);
        for command_buffer in command_buffers {
            slots.push(FrameSlot {
                sync: FrameSync::new(Arc::clone(&device.device))?,
                command_buffer,
                uniform: UniformBuffer::new(allocator)?,
            });
        }

        Ok(Self { slots, current: 0 })
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &FrameSlot {
        &self.slots[self.current]
    }

    pub fn current_mut(&mut self) -> &mut FrameSlot {
        &mut self.slots[self.current]
    }

    pub fn get(&self, index: usize) -> &FrameSlot {
        &self.slots[index]
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Rotate to the next slot. Runs after every frame attempt,
    /// successful or skipped, so the round-robin never stalls on one
    /// slot.
    pub fn advance(&mut self) {
        self.current = slot_for_frame(self.current + 1, self.slots.len());
    }

    /// Wait for every slot's outstanding submission.
    pub fn wait_all(&self) -> Result<()> {
        for slot in &self.slots {
            slot.sync.wait()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_reuses_oldest_slot() {
        // Frame 2 lands on slot 0: it waits on frame 0's fence, not
        // frame 1's.
        assert_eq!(slot_for_frame(0, 2), 0);
        assert_eq!(slot_for_frame(1, 2), 1);
        assert_eq!(slot_for_frame(2, 2), slot_for_frame(0, 2));
        assert_ne!(slot_for_frame(2, 2), slot_for_frame(1, 2));
    }

    #[test]
    fn rotation_covers_every_slot_in_order() {
        let order: Vec<usize> = (0..6).map(|frame| slot_for_frame(frame, 3)).collect();
        assert_eq!(order, vec![0, 1, 2, 0, 1, 2]);
    }
}

/// 帧计数器
///
/// `frame_id` 单调递增，`frame_slot` 在 `[0, num_frames)` 之间循环，
/// 对应 graph 中的 frame slot。
#[derive(Clone, Debug)]
pub struct RgFrameCounter {
    frame_id: u64,
    num_frames: u32,
}

// new & init
impl RgFrameCounter {
    pub fn new(num_frames: u32) -> Self {
        Self {
            frame_id: 0,
            num_frames: num_frames.max(1),
        }
    }
}

// getters
impl RgFrameCounter {
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    #[inline]
    pub fn frame_slot(&self) -> u32 {
        (self.frame_id % self.num_frames as u64) as u32
    }

    #[inline]
    pub fn num_frames(&self) -> u32 {
        self.num_frames
    }

    /// 用于日志的帧标签，例如 `[F12#0]`
    #[inline]
    pub fn frame_label(&self) -> String {
        format!("[F{}#{}]", self.frame_id, self.frame_slot())
    }
}

// update
impl RgFrameCounter {
    #[inline]
    pub fn next_frame(&mut self) {
        self.frame_id += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_wraps() {
        let mut counter = RgFrameCounter::new(3);
        let slots: Vec<u32> = (0..7)
            .map(|_| {
                let slot = counter.frame_slot();
                counter.next_frame();
                slot
            })
            .collect();
        assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(counter.frame_label(), "[F7#1]");
    }
}

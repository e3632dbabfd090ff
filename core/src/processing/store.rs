use crate::envelope::{ChannelTag, UpdatePolicy};
use crate::prelude::{ChannelLayout, StoreError, StoreResult};
use crate::processing::window::RollingWindow;

/// Current value(s) of one channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelState {
    Latest(Vec<f32>),
    Rolling(RollingWindow),
}

impl ChannelState {
    fn for_channel(tag: ChannelTag, len: usize) -> Self {
        match tag.policy() {
            UpdatePolicy::Latest => Self::Latest(vec![0.0; len]),
            UpdatePolicy::Rolling => Self::Rolling(RollingWindow::zeroed(len)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Latest(values) => values.len(),
            Self::Rolling(window) => window.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_vec(&self) -> Vec<f32> {
        match self {
            Self::Latest(values) => values.clone(),
            Self::Rolling(window) => window.to_vec(),
        }
    }
}

struct Slot {
    tag: ChannelTag,
    state: ChannelState,
    generation: u64,
}

/// Per-channel state owned by the consumer loop.
///
/// One slot per configured tag, created zero-filled. Reads copy; writes are
/// crate-private so only the drain task can mutate.
pub struct ChannelStore {
    slots: Vec<Slot>,
}

impl ChannelStore {
    pub fn from_layout(layout: &ChannelLayout) -> Self {
        let slots = layout
            .channels
            .iter()
            .map(|spec| Slot {
                tag: spec.tag,
                state: ChannelState::for_channel(spec.tag, spec.len),
                generation: 0,
            })
            .collect();
        Self { slots }
    }

    /// Snapshot of the channel's values, oldest-first for windows.
    pub fn read(&self, tag: ChannelTag) -> Option<Vec<f32>> {
        self.slot(tag).map(|slot| slot.state.to_vec())
    }

    pub fn state(&self, tag: ChannelTag) -> Option<&ChannelState> {
        self.slot(tag).map(|slot| &slot.state)
    }

    /// Most recent scalar: the newest window entry or the slot's last element.
    pub fn newest(&self, tag: ChannelTag) -> Option<f32> {
        match &self.slot(tag)?.state {
            ChannelState::Latest(values) => values.last().copied(),
            ChannelState::Rolling(window) => window.newest(),
        }
    }

    /// Number of updates applied to the channel since start.
    pub fn generation(&self, tag: ChannelTag) -> Option<u64> {
        self.slot(tag).map(|slot| slot.generation)
    }

    pub fn tags(&self) -> impl Iterator<Item = ChannelTag> + '_ {
        self.slots.iter().map(|slot| slot.tag)
    }

    pub(crate) fn write(&mut self, tag: ChannelTag, update: &[f32]) -> StoreResult<()> {
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| slot.tag == tag)
            .ok_or(StoreError::MissingChannel(tag))?;

        match &mut slot.state {
            ChannelState::Latest(values) => {
                if update.len() != values.len() {
                    return Err(StoreError::SlotShape {
                        tag,
                        observed: update.len(),
                        expected: values.len(),
                    });
                }
                values.copy_from_slice(update);
            }
            ChannelState::Rolling(window) => match update {
                [value] => window.push(*value),
                _ => {
                    return Err(StoreError::SlotShape {
                        tag,
                        observed: update.len(),
                        expected: 1,
                    })
                }
            },
        }
        slot.generation += 1;
        Ok(())
    }

    fn slot(&self, tag: ChannelTag) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.tag == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::ChannelSpec;

    fn layout() -> ChannelLayout {
        ChannelLayout::new(vec![
            ChannelSpec::new(ChannelTag::Fft, 2),
            ChannelSpec::new(ChannelTag::Mrf, 3),
        ])
        .unwrap()
    }

    #[test]
    fn slots_start_zero_filled() {
        let store = ChannelStore::from_layout(&layout());
        assert_eq!(store.read(ChannelTag::Fft), Some(vec![0.0, 0.0]));
        assert_eq!(store.read(ChannelTag::Mrf), Some(vec![0.0, 0.0, 0.0]));
        assert_eq!(store.read(ChannelTag::Freq), None);
    }

    #[test]
    fn latest_slot_is_overwritten_and_reads_are_copies() {
        let mut store = ChannelStore::from_layout(&layout());
        store.write(ChannelTag::Fft, &[1.0, 2.0]).unwrap();
        let before = store.read(ChannelTag::Fft).unwrap();
        store.write(ChannelTag::Fft, &[3.0, 4.0]).unwrap();
        assert_eq!(before, vec![1.0, 2.0]);
        assert_eq!(store.read(ChannelTag::Fft), Some(vec![3.0, 4.0]));
        assert_eq!(store.generation(ChannelTag::Fft), Some(2));
    }

    #[test]
    fn bad_writes_leave_state_untouched() {
        let mut store = ChannelStore::from_layout(&layout());
        assert_eq!(
            store.write(ChannelTag::Fft, &[1.0]),
            Err(StoreError::SlotShape {
                tag: ChannelTag::Fft,
                observed: 1,
                expected: 2,
            })
        );
        assert_eq!(
            store.write(ChannelTag::Phase, &[1.0]),
            Err(StoreError::MissingChannel(ChannelTag::Phase))
        );
        assert_eq!(store.read(ChannelTag::Fft), Some(vec![0.0, 0.0]));
        assert_eq!(store.generation(ChannelTag::Fft), Some(0));
    }

    #[test]
    fn newest_reports_window_head() {
        let mut store = ChannelStore::from_layout(&layout());
        store.write(ChannelTag::Mrf, &[7.5]).unwrap();
        assert_eq!(store.newest(ChannelTag::Mrf), Some(7.5));
    }
}

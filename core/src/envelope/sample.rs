use crate::envelope::ChannelTag;

/// One tagged sample crossing the producer/consumer boundary.
///
/// Values are frozen at construction; the consumer takes ownership and drops
/// the envelope once it has been applied or rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleEnvelope {
    tag: ChannelTag,
    values: Box<[f32]>,
}

impl SampleEnvelope {
    pub fn new(tag: ChannelTag, values: impl Into<Box<[f32]>>) -> Self {
        Self {
            tag,
            values: values.into(),
        }
    }

    /// Single-value envelope, the shape rolling-window channels expect.
    pub fn scalar(tag: ChannelTag, value: f32) -> Self {
        Self::new(tag, vec![value])
    }

    pub fn tag(&self) -> ChannelTag {
        self.tag
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_parts(self) -> (ChannelTag, Box<[f32]>) {
        (self.tag, self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_envelope_carries_one_value() {
        let env = SampleEnvelope::scalar(ChannelTag::Mrf, 2.5);
        assert_eq!(env.len(), 1);
        assert_eq!(env.values(), &[2.5]);
        assert_eq!(env.tag(), ChannelTag::Mrf);
    }
}

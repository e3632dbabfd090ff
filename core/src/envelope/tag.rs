use crate::prelude::EnvelopeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a channel folds incoming payloads into its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Each update replaces the slot wholesale.
    Latest,
    /// Each update pushes one scalar into a fixed-length window.
    Rolling,
}

/// Discriminator for payload kinds sharing one transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelTag {
    /// Range-bin power spectrum.
    #[serde(alias = "range")]
    Fft,
    /// Vibration frequency spectrum.
    Freq,
    /// Unwrapped phase trace.
    Phase,
    /// Micro-range-feature scalar.
    Mrf,
}

impl ChannelTag {
    pub const ALL: [ChannelTag; 4] = [Self::Fft, Self::Freq, Self::Phase, Self::Mrf];

    pub fn policy(self) -> UpdatePolicy {
        match self {
            Self::Fft | Self::Freq => UpdatePolicy::Latest,
            Self::Phase | Self::Mrf => UpdatePolicy::Rolling,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fft => "fft",
            Self::Freq => "freq",
            Self::Phase => "phase",
            Self::Mrf => "mrf",
        }
    }
}

impl fmt::Display for ChannelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelTag {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fft" | "range" => Ok(Self::Fft),
            "freq" => Ok(Self::Freq),
            "phase" => Ok(Self::Phase),
            "mrf" => Ok(Self::Mrf),
            _ => Err(EnvelopeError::UnknownTag(s.to_string())),
        }
    }
}

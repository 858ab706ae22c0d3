//! Configuration types for the Amazon Transcribe Streaming engine.
//!
//! Covers the region the streaming endpoint lives in, the audio encodings the
//! service accepts, and partial-results stabilization.

use std::fmt;
use std::str::FromStr;

use crate::core::stt::base::StreamConfig;

/// Declares [`AwsRegion`] from a table of variant/region-code pairs.
macro_rules! streaming_regions {
    ($($(#[$meta:meta])* $variant:ident => $code:literal,)+) => {
        /// AWS regions with a Transcribe Streaming endpoint.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub enum AwsRegion {
            $($(#[$meta])* $variant,)+
        }

        impl AwsRegion {
            /// Every region, in declaration order.
            pub const ALL: &'static [AwsRegion] = &[$(Self::$variant,)+];

            /// Region code as used in endpoints and signing.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $code,)+
                }
            }
        }
    };
}

streaming_regions! {
    UsEast1 => "us-east-1",
    UsEast2 => "us-east-2",
    UsWest1 => "us-west-1",
    #[default]
    UsWest2 => "us-west-2",
    ApSouth1 => "ap-south-1",
    ApSoutheast1 => "ap-southeast-1",
    ApSoutheast2 => "ap-southeast-2",
    ApNortheast1 => "ap-northeast-1",
    ApNortheast2 => "ap-northeast-2",
    CaCentral1 => "ca-central-1",
    EuCentral1 => "eu-central-1",
    EuWest1 => "eu-west-1",
    EuWest2 => "eu-west-2",
    EuWest3 => "eu-west-3",
    SaEast1 => "sa-east-1",
    UsGovWest1 => "us-gov-west-1",
}

impl AwsRegion {
    /// Case-insensitive lookup. `None` for regions without streaming transcription.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|region| region.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for AwsRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audio encodings accepted by Transcribe Streaming.
///
/// Browser clients send PCM: 16-bit signed little-endian, mono.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaEncoding {
    #[default]
    Pcm,
    Flac,
    /// Opus in an OGG container
    OggOpus,
}

impl MediaEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pcm => "pcm",
            Self::Flac => "flac",
            Self::OggOpus => "ogg-opus",
        }
    }
}

impl fmt::Display for MediaEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pcm" | "linear16" | "pcm_s16le" => Ok(Self::Pcm),
            "flac" => Ok(Self::Flac),
            "ogg-opus" | "ogg_opus" | "opus" => Ok(Self::OggOpus),
            other => Err(format!("unsupported encoding '{}'", other)),
        }
    }
}

/// How aggressively Transcribe stabilizes partial results.
///
/// Higher stability settles words sooner at some cost in accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialResultsStability {
    #[default]
    High,
    Medium,
    Low,
}

impl FromStr for PartialResultsStability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" | "med" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("expected high, medium or low, got '{}'", other)),
        }
    }
}

/// Minimum sample rate accepted by Transcribe Streaming.
pub const MIN_SAMPLE_RATE: u32 = 8000;

/// Maximum sample rate accepted by Transcribe Streaming.
pub const MAX_SAMPLE_RATE: u32 = 48000;

/// Sample rate of the client PCM stream.
pub const RECOMMENDED_SAMPLE_RATE: u32 = 16000;

/// Default timeout for the engine to accept a new stream, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Engine-wide settings applied to every stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsTranscribeConfig {
    pub enable_partial_results_stabilization: bool,
    pub partial_results_stability: PartialResultsStability,
    /// Seconds to wait for Transcribe to accept a new stream
    pub connect_timeout_secs: u64,
}

impl Default for AwsTranscribeConfig {
    fn default() -> Self {
        Self {
            enable_partial_results_stabilization: true,
            partial_results_stability: PartialResultsStability::High,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

/// Check a stream configuration against Transcribe's limits.
pub fn validate_stream_config(config: &StreamConfig) -> Result<(), String> {
    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&config.sample_rate_hz) {
        return Err(format!(
            "Sample rate must be between {} and {} Hz, got {}",
            MIN_SAMPLE_RATE, MAX_SAMPLE_RATE, config.sample_rate_hz
        ));
    }

    if config.language_code.trim().is_empty() {
        return Err("Language code must not be empty".to_string());
    }

    Ok(())
}

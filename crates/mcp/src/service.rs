// The five tool servers and what each one exposes

use crate::tools::ToolName;
use std::fmt;

/// A deployable tool server. Each binary serves exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Imagen,
    Veo,
    Chirp3,
    Lyria,
    Avtool,
}

impl Service {
    pub const ALL: [Service; 5] = [
        Service::Imagen,
        Service::Veo,
        Service::Chirp3,
        Service::Lyria,
        Service::Avtool,
    ];

    /// Name reported in `serverInfo` and logs.
    pub fn server_name(&self) -> &'static str {
        match self {
            Self::Imagen => "mcp-imagen",
            Self::Veo => "mcp-veo",
            Self::Chirp3 => "mcp-chirp3",
            Self::Lyria => "mcp-lyria",
            Self::Avtool => "mcp-avtool",
        }
    }

    /// Tools in registration order.
    pub fn tools(&self) -> &'static [ToolName] {
        match self {
            Self::Imagen => &[ToolName::ImagenT2i, ToolName::ImagenEdit],
            Self::Veo => &[ToolName::VeoT2v, ToolName::VeoI2v],
            Self::Chirp3 => &[ToolName::ChirpTts, ToolName::ListChirpVoices],
            Self::Lyria => &[ToolName::LyriaGenerateMusic],
            Self::Avtool => &[
                ToolName::FfmpegGetMediaInfo,
                ToolName::FfmpegConvertAudioWavToMp3,
                ToolName::FfmpegVideoToGif,
                ToolName::FfmpegCombineAudioAndVideo,
                ToolName::FfmpegOverlayImageOnVideo,
                ToolName::FfmpegConcatenateMediaFiles,
                ToolName::FfmpegAdjustVolume,
                ToolName::FfmpegLayerAudioFiles,
            ],
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.server_name())
    }
}

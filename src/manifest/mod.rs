mod device;
mod fetch;
mod select;
mod video;

pub use device::{DeviceUpgrader, ManifestUpgrader, wants_device_upgrade};
pub use fetch::{Manifest, fetch_manifest};
pub use select::{
    AudioConstraints, AudioSelection, FormatSummary, VariantDescriptor, decode_variants,
    enumerate_audio_formats, select_audio_variant,
};
pub use video::{select_audio_for_video, select_video_variant};

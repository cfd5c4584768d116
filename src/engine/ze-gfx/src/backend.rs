use crate::resource::MultisampleCount;
use crate::PixelFormat;
use enumflags2::{bitflags, BitFlags};
use raw_window_handle::RawWindowHandle;
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Ord, PartialOrd, Eq, PartialEq, Debug)]
pub enum BackendError {
    Unsupported,
    NoAdapterFound,
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Unsupported => write!(f, "backend unsupported on this platform"),
            BackendError::NoAdapterFound => write!(f, "no compatible adapter found"),
        }
    }
}

impl std::error::Error for BackendError {}

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug)]
pub enum DeviceError {
    Unknown,
    OutOfMemory,
    InvalidParameters,
    InvalidOperation,
    Unsupported,
    NotFound,
    DeviceRemoved,
    StillDrawing,
    NotCurrentlyAvailable,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Unknown => write!(f, "unknown device error"),
            DeviceError::OutOfMemory => write!(f, "out of memory"),
            DeviceError::InvalidParameters => write!(f, "invalid parameters"),
            DeviceError::InvalidOperation => write!(f, "invalid operation"),
            DeviceError::Unsupported => write!(f, "unsupported"),
            DeviceError::NotFound => write!(f, "not found"),
            DeviceError::DeviceRemoved => write!(f, "device removed"),
            DeviceError::StillDrawing => write!(f, "device still drawing"),
            DeviceError::NotCurrentlyAvailable => write!(f, "not currently available"),
        }
    }
}

impl std::error::Error for DeviceError {}

/// Hardware feature level. Values match the native feature level encoding.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[repr(u32)]
pub enum GraphicsProfile {
    Level9_1 = 0x9100,
    Level9_2 = 0x9200,
    Level9_3 = 0x9300,
    Level10_0 = 0xa000,
    Level10_1 = 0xa100,
    #[default]
    Level11_0 = 0xb000,
    Level11_1 = 0xb100,
    Level12_0 = 0xc000,
    Level12_1 = 0xc100,
}

impl GraphicsProfile {
    pub const ALL: [GraphicsProfile; 9] = [
        GraphicsProfile::Level9_1,
        GraphicsProfile::Level9_2,
        GraphicsProfile::Level9_3,
        GraphicsProfile::Level10_0,
        GraphicsProfile::Level10_1,
        GraphicsProfile::Level11_0,
        GraphicsProfile::Level11_1,
        GraphicsProfile::Level12_0,
        GraphicsProfile::Level12_1,
    ];

    pub fn from_raw(value: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|profile| *profile as u32 == value)
    }
}

impl fmt::Display for GraphicsProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = *self as u32;
        write!(f, "{}_{}", value >> 12, (value >> 8) & 0xf)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GraphicsDeviceStatus {
    Normal,
    Removed,
    Reset,
    Hung,
    InternalError,
    InvalidCall,
}

#[bitflags]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceCreationFlags {
    Debug = 1 << 0,
    VideoSupport = 1 << 1,
    BgraSupport = 1 << 2,
    SingleThreaded = 1 << 3,
    PreventThreadingOptimizations = 1 << 4,
}

/// Device configuration, usually loaded from the engine settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsDeviceDesc {
    /// Tried in order, the first profile the adapter accepts wins
    pub profiles: Vec<GraphicsProfile>,
    pub flags: BitFlags<DeviceCreationFlags>,
    pub adapter_index: usize,
}

impl Default for GraphicsDeviceDesc {
    fn default() -> Self {
        Self {
            profiles: vec![
                GraphicsProfile::Level11_1,
                GraphicsProfile::Level11_0,
                GraphicsProfile::Level10_1,
                GraphicsProfile::Level10_0,
            ],
            flags: DeviceCreationFlags::BgraSupport.into(),
            adapter_index: 0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rational {
    pub numerator: u32,
    pub denominator: u32,
}

impl Rational {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DisplayMode {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub refresh_rate: Rational,
}

impl DisplayMode {
    pub fn new(format: PixelFormat, width: u32, height: u32, refresh_rate: Rational) -> Self {
        Self {
            format,
            width,
            height,
            refresh_rate,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PresentInterval {
    Immediate,
    #[default]
    One,
    Two,
    Four,
}

impl PresentInterval {
    pub fn sync_interval(&self) -> u32 {
        match self {
            PresentInterval::Immediate => 0,
            PresentInterval::One => 1,
            PresentInterval::Two => 2,
            PresentInterval::Four => 4,
        }
    }
}

/// Parameters of a swap chain presenter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationParameters {
    pub back_buffer_width: u32,
    pub back_buffer_height: u32,
    pub back_buffer_format: PixelFormat,
    pub depth_stencil_format: PixelFormat,
    pub multisample_count: MultisampleCount,
    pub present_interval: PresentInterval,
    pub is_full_screen: bool,
    pub refresh_rate: Rational,
    pub preferred_full_screen_output_index: usize,
    #[serde(skip)]
    pub device_window_handle: Option<RawWindowHandle>,
}

impl Default for PresentationParameters {
    fn default() -> Self {
        Self {
            back_buffer_width: 800,
            back_buffer_height: 480,
            back_buffer_format: PixelFormat::R8G8B8A8Unorm,
            depth_stencil_format: PixelFormat::Unknown,
            multisample_count: MultisampleCount::None,
            present_interval: PresentInterval::One,
            is_full_screen: false,
            refresh_rate: Rational::new(60, 1),
            preferred_full_screen_output_index: 0,
            device_window_handle: None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct FormatFeatures {
    pub maximum_multisample_count: MultisampleCount,
    /// Native format support bits
    pub format_support: u32,
}

#[derive(Clone, Debug, Default)]
pub struct GraphicsDeviceFeatures {
    pub requested_profile: GraphicsProfile,
    pub current_profile: GraphicsProfile,
    pub has_compute_shaders: bool,
    pub has_double_precision: bool,
    pub has_multithreading_concurrent_resources: bool,
    pub has_driver_command_lists: bool,
    pub has_srgb: bool,
    pub has_resource_renaming: bool,
    pub has_depth_as_srv: bool,
    pub has_depth_as_read_only_rt: bool,
    pub has_multisample_depth_as_srv: bool,
    pub format_features: HashMap<PixelFormat, FormatFeatures>,
}

impl GraphicsDeviceFeatures {
    pub fn format(&self, format: PixelFormat) -> FormatFeatures {
        self.format_features
            .get(&format)
            .copied()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::{
        DeviceCreationFlags, GraphicsDeviceDesc, GraphicsProfile, PresentationParameters,
    };
    use crate::PixelFormat;

    #[test]
    fn profiles_are_ordered_by_level() {
        assert!(GraphicsProfile::Level9_1 < GraphicsProfile::Level10_0);
        assert!(GraphicsProfile::Level11_1 < GraphicsProfile::Level12_0);
        assert_eq!(GraphicsProfile::from_raw(0xb100), Some(GraphicsProfile::Level11_1));
        assert_eq!(GraphicsProfile::from_raw(0xb200), None);
        assert_eq!(GraphicsProfile::Level10_1.to_string(), "10_1");
    }

    #[test]
    fn device_desc_loads_with_missing_fields() {
        let desc: GraphicsDeviceDesc =
            serde_json::from_str(r#"{ "profiles": ["Level10_0"], "flags": 1 }"#).unwrap();
        assert_eq!(desc.profiles, vec![GraphicsProfile::Level10_0]);
        assert!(desc.flags.contains(DeviceCreationFlags::Debug));
        assert_eq!(desc.adapter_index, 0);
    }

    #[test]
    fn presentation_parameters_skip_window_handle() {
        let params = PresentationParameters {
            back_buffer_format: PixelFormat::B8G8R8A8UnormSrgb,
            ..Default::default()
        };
        let json = serde_json::to_string(&params).unwrap();
        assert!(!json.contains("device_window_handle"));

        let loaded: PresentationParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, params);
    }
}

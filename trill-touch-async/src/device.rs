//! Sensor families and their fixed properties.

/// The family of a touch sensor, as reported by its identify response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    /// Linear slider, 26 channels.
    Bar,
    /// Two-dimensional square pad.
    Square,
    /// Breakout with 30 free-form electrodes.
    Craft,
    /// Circular slider.
    Ring,
    /// Two-dimensional hexagonal pad.
    Hex,
    /// Flexible linear strip.
    Flex,
}

/// How raw payload bytes are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// A variable-length list of touch positions.
    Centroid,
    /// One reading per channel.
    Raw,
}

impl DecodeMode {
    /// The value written to the mode command.
    pub(crate) fn command_byte(self) -> u8 {
        match self {
            DecodeMode::Centroid => 0,
            DecodeMode::Raw => 1,
        }
    }
}

/// The scan mode requested at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    /// Use whatever mode the probed device natively runs in.
    #[default]
    Auto,
    /// Force centroid decoding.
    Centroid,
    /// Force raw per-channel decoding.
    Raw,
}

impl ScanMode {
    /// Resolves the requested mode against a probed device.
    pub fn resolve(self, device: DeviceType) -> DecodeMode {
        match self {
            ScanMode::Auto => device.native_mode(),
            ScanMode::Centroid => DecodeMode::Centroid,
            ScanMode::Raw => DecodeMode::Raw,
        }
    }
}

/// Largest channel count of any family.
pub const MAX_CHANNELS: usize = 30;

/// Largest number of simultaneous touches of any family.
pub const MAX_TOUCHES: usize = 5;

impl DeviceType {
    /// All families, in identifier order.
    pub const ALL: [DeviceType; 6] = [
        DeviceType::Bar,
        DeviceType::Square,
        DeviceType::Craft,
        DeviceType::Ring,
        DeviceType::Hex,
        DeviceType::Flex,
    ];

    /// Maps the family id of an identify response.
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|device| device.id() == id)
    }

    /// The family id used in the identify response.
    pub fn id(self) -> u8 {
        match self {
            DeviceType::Bar => 1,
            DeviceType::Square => 2,
            DeviceType::Craft => 3,
            DeviceType::Ring => 4,
            DeviceType::Hex => 5,
            DeviceType::Flex => 6,
        }
    }

    /// The factory address, used when no address is configured.
    ///
    /// Each family owns eight consecutive addresses selected by solder
    /// jumpers; this is the lowest one.
    pub fn default_address(self) -> u8 {
        match self {
            DeviceType::Bar => 0x20,
            DeviceType::Square => 0x28,
            DeviceType::Craft => 0x30,
            DeviceType::Ring => 0x38,
            DeviceType::Hex => 0x40,
            DeviceType::Flex => 0x48,
        }
    }

    /// Number of sensing channels.
    pub fn channel_count(self) -> usize {
        match self {
            DeviceType::Bar => 26,
            DeviceType::Ring => 28,
            DeviceType::Square | DeviceType::Craft | DeviceType::Hex | DeviceType::Flex => 30,
        }
    }

    /// Whether touches carry a horizontal coordinate.
    pub fn is_2d(self) -> bool {
        matches!(self, DeviceType::Square | DeviceType::Hex)
    }

    /// The mode the device boots into.
    pub fn native_mode(self) -> DecodeMode {
        match self {
            DeviceType::Craft | DeviceType::Flex => DecodeMode::Raw,
            _ => DecodeMode::Centroid,
        }
    }

    /// Number of touch slots in a centroid frame.
    pub fn max_touches(self) -> usize {
        if self.is_2d() {
            4
        } else {
            MAX_TOUCHES
        }
    }

    /// Full-scale value of a vertical (or only) location.
    pub(crate) fn vertical_scale(self) -> f32 {
        Self::position_scale(match self {
            DeviceType::Bar => 26,
            DeviceType::Ring => 28,
            DeviceType::Craft | DeviceType::Flex => 30,
            DeviceType::Square => 15,
            DeviceType::Hex => 16,
        })
    }

    /// Full-scale value of a horizontal location. Only meaningful for 2-D families.
    pub(crate) fn horizontal_scale(self) -> f32 {
        Self::position_scale(match self {
            DeviceType::Hex => 14,
            DeviceType::Square => 15,
            _ => 1,
        })
    }

    /// Full-scale value of a touch size.
    pub(crate) fn size_scale(self) -> f32 {
        if self.is_2d() {
            3200.0
        } else {
            5000.0
        }
    }

    // Centroids are interpolated with 7 fractional bits between adjacent pads.
    fn position_scale(positions: u16) -> f32 {
        (128 * positions.saturating_sub(1)).max(1) as f32
    }

    /// Length of one payload in `mode`.
    pub(crate) fn payload_len(self, mode: DecodeMode) -> usize {
        match mode {
            DecodeMode::Raw => 2 * self.channel_count(),
            DecodeMode::Centroid if self.is_2d() => 8 * self.max_touches(),
            DecodeMode::Centroid => 4 * self.max_touches(),
        }
    }
}

//! Sensor channel identifiers.
//!
//! The sensor reports eight visible wavelength bands plus near-infrared and
//! a clear (broadband) channel, always in this fixed order.

/// Number of channels reported by the sensor.
pub const NUM_CHANNELS: usize = 10;

/// One raw sample: counts for every channel, in wavelength order.
pub type RawReading = [u16; NUM_CHANNELS];

/// One discrete wavelength band (or NIR / clear) reported by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Nm415,
    Nm445,
    Nm480,
    Nm515,
    Nm555,
    Nm590,
    Nm630,
    Nm680,
    Nm910,
    Clear,
}

impl Channel {
    /// All channels, in the order the sensor reports them.
    pub const ALL: [Channel; NUM_CHANNELS] = [
        Channel::Nm415,
        Channel::Nm445,
        Channel::Nm480,
        Channel::Nm515,
        Channel::Nm555,
        Channel::Nm590,
        Channel::Nm630,
        Channel::Nm680,
        Channel::Nm910,
        Channel::Clear,
    ];

    /// Index into a `RawReading` / channel vector.
    pub fn index(self) -> usize {
        match self {
            Channel::Nm415 => 0,
            Channel::Nm445 => 1,
            Channel::Nm480 => 2,
            Channel::Nm515 => 3,
            Channel::Nm555 => 4,
            Channel::Nm590 => 5,
            Channel::Nm630 => 6,
            Channel::Nm680 => 7,
            Channel::Nm910 => 8,
            Channel::Clear => 9,
        }
    }

    /// Wire/display name, also used as the key in protocol responses.
    pub fn name(self) -> &'static str {
        match self {
            Channel::Nm415 => "415nm",
            Channel::Nm445 => "445nm",
            Channel::Nm480 => "480nm",
            Channel::Nm515 => "515nm",
            Channel::Nm555 => "555nm",
            Channel::Nm590 => "590nm",
            Channel::Nm630 => "630nm",
            Channel::Nm680 => "680nm",
            Channel::Nm910 => "910nm",
            Channel::Clear => "clear",
        }
    }

    pub fn from_name(name: &str) -> Option<Channel> {
        Channel::ALL.iter().copied().find(|c| c.name() == name)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

//! Relay model detection and the `CEV` command templates per model.
//!
//! Adding a model means adding a row to [`FIRMWARE_MARKERS`] and a profile
//! in [`DeviceModel::profile`]; the dispatcher itself does not branch on
//! model names.

use strum_macros::Display;

/// Relay family, derived once per session from the firmware id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum DeviceModel {
    /// SEL-311L, SEL-351 and SEL-311C: capture length is selectable.
    #[strum(to_string = "311L_351")]
    Sel311L351,
    #[strum(to_string = "487E")]
    Sel487E,
    #[strum(to_string = "487B")]
    Sel487B,
    #[strum(to_string = "other")]
    Other,
}

/// Firmware id substrings, checked in order; the first hit decides.
pub const FIRMWARE_MARKERS: &[(&str, DeviceModel)] = &[
    ("311L", DeviceModel::Sel311L351),
    ("351", DeviceModel::Sel311L351),
    ("311C", DeviceModel::Sel311L351),
    ("487E", DeviceModel::Sel487E),
    ("487B", DeviceModel::Sel487B),
];

/// Command templates of one model. `{id}` and `{cycles}` are substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandProfile {
    pub four_samples: &'static str,
    /// `None` when the model has no known full-resolution form.
    pub all_samples: Option<&'static str>,
    /// Whether a "No Data Available" reply asks the user for a shorter
    /// capture instead of failing the event.
    pub narrows_on_no_data: bool,
}

const SEL_311L_351: CommandProfile = CommandProfile {
    four_samples: "CEV L{cycles} {id}",
    all_samples: Some("CEV R L{cycles} {id}"),
    narrows_on_no_data: true,
};

const SEL_487E: CommandProfile = CommandProfile {
    four_samples: "CEV {id}",
    all_samples: Some("CEV {id} S8"),
    narrows_on_no_data: false,
};

const SEL_487B: CommandProfile = CommandProfile {
    four_samples: "CEV {id}",
    all_samples: Some("CEV R {id}"),
    narrows_on_no_data: false,
};

const OTHER: CommandProfile = CommandProfile {
    four_samples: "CEV {id}",
    all_samples: None,
    narrows_on_no_data: false,
};

impl DeviceModel {
    pub fn from_firmware_id(fid: &str) -> Self {
        FIRMWARE_MARKERS
            .iter()
            .find(|(marker, _)| fid.contains(marker))
            .map(|&(_, model)| model)
            .unwrap_or(DeviceModel::Other)
    }

    pub fn profile(self) -> &'static CommandProfile {
        match self {
            DeviceModel::Sel311L351 => &SEL_311L_351,
            DeviceModel::Sel487E => &SEL_487E,
            DeviceModel::Sel487B => &SEL_487B,
            DeviceModel::Other => &OTHER,
        }
    }

    /// Render the download command for one event.
    pub fn command_for(self, samples: SamplesMode, event_id: &str, cycles: u32) -> String {
        let profile = self.profile();
        let template = match (samples, profile.all_samples) {
            (SamplesMode::Four, _) => profile.four_samples,
            (SamplesMode::All, Some(template)) => template,
            (SamplesMode::All, None) => {
                tracing::warn!(model = %self, "Full resolution download is not supported for this model, using 4 samples/cycle");
                profile.four_samples
            }
        };
        template
            .replace("{cycles}", &cycles.to_string())
            .replace("{id}", event_id)
    }
}

/// Samples-per-cycle setting of a waveform download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum SamplesMode {
    #[default]
    #[strum(to_string = "4")]
    Four,
    #[strum(to_string = "all")]
    All,
}

impl SamplesMode {
    /// Accepts `4` or `all` in any case.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input == "4" {
            Some(SamplesMode::Four)
        } else if input.eq_ignore_ascii_case("all") {
            Some(SamplesMode::All)
        } else {
            None
        }
    }

    /// Like [`parse`](Self::parse), but anything unrecognized becomes
    /// [`SamplesMode::Four`].
    pub fn coerce(input: &str) -> Self {
        Self::parse(input).unwrap_or_else(|| {
            tracing::warn!(input = %input, "Samples/Cycles can only be 4 or all, using 4");
            SamplesMode::Four
        })
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mali GPU architecture families reported by the offline compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GpuArchitecture {
    Midgard,
    Bifrost,
    Valhall,
}

impl GpuArchitecture {
    /// Returns all known architectures, oldest first
    pub fn all() -> &'static [GpuArchitecture] {
        &[
            GpuArchitecture::Midgard,
            GpuArchitecture::Bifrost,
            GpuArchitecture::Valhall,
        ]
    }

    /// Returns the name as it appears in compiler reports
    pub fn display_name(&self) -> &'static str {
        match self {
            GpuArchitecture::Midgard => "Midgard",
            GpuArchitecture::Bifrost => "Bifrost",
            GpuArchitecture::Valhall => "Valhall",
        }
    }

    /// Parse architecture from string (case-insensitive)
    pub fn from_str_loose(s: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|arch| arch.display_name().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for GpuArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A GPU model the offline compiler can target with `-c`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GpuModel {
    pub name: &'static str,
    pub architecture: GpuArchitecture,
}

static MODELS: &[GpuModel] = &[
    GpuModel { name: "Mali-T720", architecture: GpuArchitecture::Midgard },
    GpuModel { name: "Mali-T760", architecture: GpuArchitecture::Midgard },
    GpuModel { name: "Mali-T820", architecture: GpuArchitecture::Midgard },
    GpuModel { name: "Mali-T830", architecture: GpuArchitecture::Midgard },
    GpuModel { name: "Mali-T860", architecture: GpuArchitecture::Midgard },
    GpuModel { name: "Mali-T880", architecture: GpuArchitecture::Midgard },
    GpuModel { name: "Mali-G31", architecture: GpuArchitecture::Bifrost },
    GpuModel { name: "Mali-G51", architecture: GpuArchitecture::Bifrost },
    GpuModel { name: "Mali-G52", architecture: GpuArchitecture::Bifrost },
    GpuModel { name: "Mali-G71", architecture: GpuArchitecture::Bifrost },
    GpuModel { name: "Mali-G72", architecture: GpuArchitecture::Bifrost },
    GpuModel { name: "Mali-G76", architecture: GpuArchitecture::Bifrost },
    GpuModel { name: "Mali-G57", architecture: GpuArchitecture::Valhall },
    GpuModel { name: "Mali-G68", architecture: GpuArchitecture::Valhall },
    GpuModel { name: "Mali-G77", architecture: GpuArchitecture::Valhall },
    GpuModel { name: "Mali-G78", architecture: GpuArchitecture::Valhall },
    GpuModel { name: "Mali-G310", architecture: GpuArchitecture::Valhall },
    GpuModel { name: "Mali-G510", architecture: GpuArchitecture::Valhall },
    GpuModel { name: "Mali-G610", architecture: GpuArchitecture::Valhall },
    GpuModel { name: "Mali-G710", architecture: GpuArchitecture::Valhall },
    GpuModel { name: "Mali-G615", architecture: GpuArchitecture::Valhall },
    GpuModel { name: "Mali-G715", architecture: GpuArchitecture::Valhall },
];

impl GpuModel {
    pub fn all() -> &'static [GpuModel] {
        MODELS
    }

    /// Finds a model by name, ignoring case and an optional `Mali-` prefix.
    pub fn find(name: &str) -> Option<&'static GpuModel> {
        let wanted = strip_vendor(name.trim());
        MODELS
            .iter()
            .find(|model| strip_vendor(model.name).eq_ignore_ascii_case(wanted))
    }

    pub fn by_architecture(architecture: GpuArchitecture) -> impl Iterator<Item = &'static GpuModel> {
        MODELS
            .iter()
            .filter(move |model| model.architecture == architecture)
    }
}

impl fmt::Display for GpuModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.architecture)
    }
}

fn strip_vendor(name: &str) -> &str {
    match name.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("mali-") => &name[5..],
        _ => name,
    }
}

//! Enumerations shared by catalog entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a mod or group (see [`crate::ids`] for the ranges)
pub type ModId = u64;

/// Steam-style app id of a DLC
pub type DlcId = u32;

fn parse_named<T: Copy>(all: &[T], name: impl Fn(T) -> &'static str, s: &str) -> Option<T> {
    let wanted: String = s
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    all.iter().copied().find(|v| name(*v).to_lowercase() == wanted)
}

/// Overall stability classification of a mod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Stability {
    #[default]
    NotReviewed,
    IncompatibleAccordingToSource,
    RequiresIncompatibleMod,
    GameBreaking,
    Broken,
    MajorIssues,
    MinorIssues,
    UsersReportIssues,
    NotEnoughInformation,
    Stable,
}

impl Stability {
    pub const ALL: [Stability; 10] = [
        Stability::NotReviewed,
        Stability::IncompatibleAccordingToSource,
        Stability::RequiresIncompatibleMod,
        Stability::GameBreaking,
        Stability::Broken,
        Stability::MajorIssues,
        Stability::MinorIssues,
        Stability::UsersReportIssues,
        Stability::NotEnoughInformation,
        Stability::Stable,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stability::NotReviewed => "NotReviewed",
            Stability::IncompatibleAccordingToSource => "IncompatibleAccordingToSource",
            Stability::RequiresIncompatibleMod => "RequiresIncompatibleMod",
            Stability::GameBreaking => "GameBreaking",
            Stability::Broken => "Broken",
            Stability::MajorIssues => "MajorIssues",
            Stability::MinorIssues => "MinorIssues",
            Stability::UsersReportIssues => "UsersReportIssues",
            Stability::NotEnoughInformation => "NotEnoughInformation",
            Stability::Stable => "Stable",
        }
    }
}

/// Status flags a mod can carry alongside its stability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModStatus {
    UnlistedInSource,
    RemovedFromSource,
    NoDescription,
    NoCommercialUse,
    SourceUnavailable,
    SourceNotUpdated,
    SourceObsolete,
    SourceBundled,
    SavesCantLoadWithout,
    BreaksEditors,
    ModForModders,
    Abandoned,
}

impl ModStatus {
    pub const ALL: [ModStatus; 12] = [
        ModStatus::UnlistedInSource,
        ModStatus::RemovedFromSource,
        ModStatus::NoDescription,
        ModStatus::NoCommercialUse,
        ModStatus::SourceUnavailable,
        ModStatus::SourceNotUpdated,
        ModStatus::SourceObsolete,
        ModStatus::SourceBundled,
        ModStatus::SavesCantLoadWithout,
        ModStatus::BreaksEditors,
        ModStatus::ModForModders,
        ModStatus::Abandoned,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModStatus::UnlistedInSource => "UnlistedInSource",
            ModStatus::RemovedFromSource => "RemovedFromSource",
            ModStatus::NoDescription => "NoDescription",
            ModStatus::NoCommercialUse => "NoCommercialUse",
            ModStatus::SourceUnavailable => "SourceUnavailable",
            ModStatus::SourceNotUpdated => "SourceNotUpdated",
            ModStatus::SourceObsolete => "SourceObsolete",
            ModStatus::SourceBundled => "SourceBundled",
            ModStatus::SavesCantLoadWithout => "SavesCantLoadWithout",
            ModStatus::BreaksEditors => "BreaksEditors",
            ModStatus::ModForModders => "ModForModders",
            ModStatus::Abandoned => "Abandoned",
        }
    }

    /// Statuses the reconciliation pass adds and removes from collected data
    ///
    /// RemovedFromSource is not in this list: it is set by the absence rule
    /// and only cleared when the mod is observed again.
    pub fn is_auto_managed(self) -> bool {
        matches!(self, ModStatus::UnlistedInSource | ModStatus::NoDescription)
    }

    /// Only a detail-page scrape can tell whether this status applies
    pub fn needs_details(self) -> bool {
        matches!(self, ModStatus::NoDescription)
    }

    /// The exclusion category that freezes this status, if any
    pub fn exclusion_category(self) -> Option<ExclusionCategory> {
        match self {
            ModStatus::NoDescription => Some(ExclusionCategory::NoDescription),
            ModStatus::SourceUnavailable => Some(ExclusionCategory::SourceUnavailable),
            _ => None,
        }
    }

    /// Mods that are gone from the source or hidden from listings
    pub fn hides_mod(self) -> bool {
        matches!(
            self,
            ModStatus::RemovedFromSource | ModStatus::UnlistedInSource
        )
    }
}

/// How two mods behave together, from the perspective of the first one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CompatibilityStatus {
    NewerVersion,
    OlderVersion,
    FunctionalityCovered,
    FunctionalityCoveredBy,
    SameModDifferentReleaseType,
    SameFunctionality,
    IncompatibleAccordingToAuthor,
    IncompatibleAccordingToUsers,
    MajorIssues,
    MinorIssues,
    RequiresSpecificSettings,
    CompatibleAccordingToAuthor,
}

impl CompatibilityStatus {
    pub const ALL: [CompatibilityStatus; 12] = [
        CompatibilityStatus::NewerVersion,
        CompatibilityStatus::OlderVersion,
        CompatibilityStatus::FunctionalityCovered,
        CompatibilityStatus::FunctionalityCoveredBy,
        CompatibilityStatus::SameModDifferentReleaseType,
        CompatibilityStatus::SameFunctionality,
        CompatibilityStatus::IncompatibleAccordingToAuthor,
        CompatibilityStatus::IncompatibleAccordingToUsers,
        CompatibilityStatus::MajorIssues,
        CompatibilityStatus::MinorIssues,
        CompatibilityStatus::RequiresSpecificSettings,
        CompatibilityStatus::CompatibleAccordingToAuthor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CompatibilityStatus::NewerVersion => "NewerVersion",
            CompatibilityStatus::OlderVersion => "OlderVersion",
            CompatibilityStatus::FunctionalityCovered => "FunctionalityCovered",
            CompatibilityStatus::FunctionalityCoveredBy => "FunctionalityCoveredBy",
            CompatibilityStatus::SameModDifferentReleaseType => "SameModDifferentReleaseType",
            CompatibilityStatus::SameFunctionality => "SameFunctionality",
            CompatibilityStatus::IncompatibleAccordingToAuthor => "IncompatibleAccordingToAuthor",
            CompatibilityStatus::IncompatibleAccordingToUsers => "IncompatibleAccordingToUsers",
            CompatibilityStatus::MajorIssues => "MajorIssues",
            CompatibilityStatus::MinorIssues => "MinorIssues",
            CompatibilityStatus::RequiresSpecificSettings => "RequiresSpecificSettings",
            CompatibilityStatus::CompatibleAccordingToAuthor => "CompatibleAccordingToAuthor",
        }
    }

    /// The same statement seen from the other mod
    pub fn mirrored(self) -> CompatibilityStatus {
        match self {
            CompatibilityStatus::NewerVersion => CompatibilityStatus::OlderVersion,
            CompatibilityStatus::OlderVersion => CompatibilityStatus::NewerVersion,
            CompatibilityStatus::FunctionalityCovered => CompatibilityStatus::FunctionalityCoveredBy,
            CompatibilityStatus::FunctionalityCoveredBy => CompatibilityStatus::FunctionalityCovered,
            other => other,
        }
    }

    /// Statuses where each side may carry its own statement for the same pair
    ///
    /// Settings requirements and minor issues usually differ per side, so a
    /// reversed statement adds information instead of repeating it.
    pub fn allows_mirrored_pair(self) -> bool {
        matches!(
            self,
            CompatibilityStatus::RequiresSpecificSettings | CompatibilityStatus::MinorIssues
        )
    }
}

/// Fields a manual exclusion can freeze against automatic changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExclusionCategory {
    SourceUrl,
    CompatibleAppVersion,
    RequiredDlc,
    RequiredMod,
    NoDescription,
    SourceUnavailable,
}

impl ExclusionCategory {
    pub const ALL: [ExclusionCategory; 6] = [
        ExclusionCategory::SourceUrl,
        ExclusionCategory::CompatibleAppVersion,
        ExclusionCategory::RequiredDlc,
        ExclusionCategory::RequiredMod,
        ExclusionCategory::NoDescription,
        ExclusionCategory::SourceUnavailable,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExclusionCategory::SourceUrl => "SourceUrl",
            ExclusionCategory::CompatibleAppVersion => "CompatibleAppVersion",
            ExclusionCategory::RequiredDlc => "RequiredDlc",
            ExclusionCategory::RequiredMod => "RequiredMod",
            ExclusionCategory::NoDescription => "NoDescription",
            ExclusionCategory::SourceUnavailable => "SourceUnavailable",
        }
    }

    /// Categories that target one item of a list field
    pub fn has_sub_item(self) -> bool {
        matches!(
            self,
            ExclusionCategory::RequiredDlc | ExclusionCategory::RequiredMod
        )
    }
}

macro_rules! display_and_parse {
    ($($ty:ident),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl FromStr for $ty {
                type Err = String;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    parse_named(&$ty::ALL, $ty::as_str, s)
                        .ok_or_else(|| format!("unknown {}: '{}'", stringify!($ty), s))
                }
            }
        )*
    };
}

display_and_parse!(Stability, ModStatus, CompatibilityStatus, ExclusionCategory);

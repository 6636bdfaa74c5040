//! Fixed region and severity taxonomies seeded into every rebuild.
//!
//! Resolution accepts canonical English names (case-insensitive) and the
//! Chinese names used by the patient intake forms. Nodes are always written
//! with the canonical English name.

use std::fmt;

/// Yunnan prefecture-level regions a patient can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    Kunming,
    Dali,
    Lijiang,
    Xishuangbanna,
    Qujing,
    Yuxi,
    Honghe,
    Wenshan,
    Puer,
    Baoshan,
    Zhaotong,
    Lincang,
    Chuxiong,
    Dehong,
    Nujiang,
    Diqing,
}

impl Region {
    /// Every region in seeding order.
    pub const ALL: [Self; 16] = [
        Self::Kunming,
        Self::Dali,
        Self::Lijiang,
        Self::Xishuangbanna,
        Self::Qujing,
        Self::Yuxi,
        Self::Honghe,
        Self::Wenshan,
        Self::Puer,
        Self::Baoshan,
        Self::Zhaotong,
        Self::Lincang,
        Self::Chuxiong,
        Self::Dehong,
        Self::Nujiang,
        Self::Diqing,
    ];

    /// Region used when a patient's location is missing or unrecognized.
    pub const DEFAULT: Self = Self::Kunming;

    /// Canonical name, also the node's natural key.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Kunming => "Kunming",
            Self::Dali => "Dali",
            Self::Lijiang => "Lijiang",
            Self::Xishuangbanna => "Xishuangbanna",
            Self::Qujing => "Qujing",
            Self::Yuxi => "Yuxi",
            Self::Honghe => "Honghe",
            Self::Wenshan => "Wenshan",
            Self::Puer => "Puer",
            Self::Baoshan => "Baoshan",
            Self::Zhaotong => "Zhaotong",
            Self::Lincang => "Lincang",
            Self::Chuxiong => "Chuxiong",
            Self::Dehong => "Dehong",
            Self::Nujiang => "Nujiang",
            Self::Diqing => "Diqing",
        }
    }

    const fn local_name(self) -> &'static str {
        match self {
            Self::Kunming => "昆明",
            Self::Dali => "大理",
            Self::Lijiang => "丽江",
            Self::Xishuangbanna => "西双版纳",
            Self::Qujing => "曲靖",
            Self::Yuxi => "玉溪",
            Self::Honghe => "红河",
            Self::Wenshan => "文山",
            Self::Puer => "普洱",
            Self::Baoshan => "保山",
            Self::Zhaotong => "昭通",
            Self::Lincang => "临沧",
            Self::Chuxiong => "楚雄",
            Self::Dehong => "德宏",
            Self::Nujiang => "怒江",
            Self::Diqing => "迪庆",
        }
    }

    /// Parse a stored location string; `None` when it names no known region.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        Self::ALL.into_iter().find(|region| {
            region.name().eq_ignore_ascii_case(trimmed) || region.local_name() == trimmed
        })
    }

    /// Resolve a patient's location, falling back to [`Region::DEFAULT`].
    #[must_use]
    pub fn resolve(location: Option<&str>) -> Resolved<Self> {
        match location.and_then(Self::parse) {
            Some(region) => Resolved::Matched(region),
            None => Resolved::Fallback(Self::DEFAULT),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordinal dry-eye severity assigned by image analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Normal,
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    pub const ALL: [Self; 4] = [Self::Normal, Self::Mild, Self::Moderate, Self::Severe];

    pub const DEFAULT: Self = Self::Normal;

    /// Disease family stored on every level node.
    pub const DISEASE_TYPE: &'static str = "DryEye";

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Mild => "Mild",
            Self::Moderate => "Moderate",
            Self::Severe => "Severe",
        }
    }

    const fn local_name(self) -> &'static str {
        match self {
            Self::Normal => "正常",
            Self::Mild => "轻度",
            Self::Moderate => "中度",
            Self::Severe => "重度",
        }
    }

    /// Ordinal rank, 0 for `Normal` through 3 for `Severe`.
    #[must_use]
    pub const fn rank(self) -> i64 {
        self as i64
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        Self::ALL.into_iter().find(|level| {
            level.name().eq_ignore_ascii_case(trimmed) || level.local_name() == trimmed
        })
    }

    /// Resolve an analysis severity, falling back to [`Severity::DEFAULT`]
    /// when it is absent or unrecognized.
    #[must_use]
    pub fn resolve(severity: Option<&str>) -> Resolved<Self> {
        match severity.and_then(Self::parse) {
            Some(level) => Resolved::Matched(level),
            None => Resolved::Fallback(Self::DEFAULT),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of resolving a raw record value against a fixed taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved<T> {
    Matched(T),
    Fallback(T),
}

impl<T: Copy> Resolved<T> {
    #[must_use]
    pub const fn value(self) -> T {
        match self {
            Self::Matched(value) | Self::Fallback(value) => value,
        }
    }

    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}
